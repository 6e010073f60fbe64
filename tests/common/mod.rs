//! Builds GPMF packets byte by byte.

#![allow(dead_code)]

pub fn leaf(fourcc: &[u8; 4], type_code: u8, size: u8, repeat: u16, payload: &[u8]) -> Vec<u8> {
    let padded = (payload.len() + 3) / 4 * 4;
    let mut bytes = Vec::with_capacity(8 + padded);
    bytes.extend_from_slice(fourcc);
    bytes.push(type_code);
    bytes.push(size);
    bytes.extend_from_slice(&repeat.to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes.resize(8 + padded, 0);
    bytes
}

pub fn nested(fourcc: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let body = children.concat();
    let mut bytes = Vec::with_capacity(8 + body.len());
    bytes.extend_from_slice(fourcc);
    bytes.extend_from_slice(&[0, 4]);
    bytes.extend_from_slice(&((body.len() / 4) as u16).to_be_bytes());
    bytes.extend(body);
    bytes
}

pub fn text(fourcc: &[u8; 4], value: &str) -> Vec<u8> {
    leaf(fourcc, b'c', 1, value.len() as u16, value.as_bytes())
}

pub fn i16s(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

pub fn i32s(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

pub fn u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// `STRM` with a scale and signed 16-bit, 3-axis samples.
pub fn imu(fourcc: &[u8; 4], scale: i16, samples: &[[i16; 3]]) -> Vec<u8> {
    let flat: Vec<i16> = samples.iter().flatten().copied().collect();
    nested(b"STRM", &[
        leaf(b"TSMP", b'L', 4, 1, &u32s(&[samples.len() as u32])),
        leaf(b"SCAL", b's', 2, 1, &i16s(&[scale])),
        leaf(fourcc, b's', 6, samples.len() as u16, &i16s(&flat)),
    ])
}

/// `STRM` with `GPS5` samples and the usual per-component scale.
pub fn gps5(samples: &[[i32; 5]]) -> Vec<u8> {
    let flat: Vec<i32> = samples.iter().flatten().copied().collect();
    nested(b"STRM", &[
        text(b"STNM", "GPS (Lat., Long., Alt., 2D speed, 3D speed)"),
        leaf(b"SCAL", b'l', 4, 5, &i32s(&[10_000_000, 10_000_000, 1000, 1000, 100])),
        leaf(b"GPS5", b'l', 20, samples.len() as u16, &i32s(&flat)),
    ])
}

/// `DEVC` naming the camera, holding `streams`.
pub fn devc(name: &str, streams: &[Vec<u8>]) -> Vec<u8> {
    let mut children = vec![leaf(b"DVID", b'L', 4, 1, &u32s(&[1])), text(b"DVNM", name)];
    children.extend(streams.iter().cloned());
    nested(b"DEVC", &children)
}
