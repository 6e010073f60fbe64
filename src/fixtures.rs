//! Byte-level packet builders for unit tests.

use crate::gpmf::padded;

/// Encodes a leaf record, padded to 4 bytes.
pub(crate) fn leaf(fourcc: &[u8; 4], type_code: u8, size: u8, repeat: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + padded(payload.len()));
    bytes.extend_from_slice(fourcc);
    bytes.push(type_code);
    bytes.push(size);
    bytes.extend_from_slice(&repeat.to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes.resize(8 + padded(payload.len()), 0);
    bytes
}

/// Encodes a container record holding the already encoded `children`.
pub(crate) fn nested(fourcc: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = children.concat();
    let mut bytes = Vec::with_capacity(8 + body.len());
    bytes.extend_from_slice(fourcc);
    bytes.push(0);
    // Containers are declared as 4-byte elements
    bytes.push(4);
    bytes.extend_from_slice(&((body.len() / 4) as u16).to_be_bytes());
    bytes.extend(body);
    bytes
}

pub(crate) fn i16s(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

pub(crate) fn u16s(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

pub(crate) fn i32s(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

pub(crate) fn u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

pub(crate) fn f32s(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// `DEVC` with identity records followed by `streams`.
pub(crate) fn device(name: &str, streams: &[Vec<u8>]) -> Vec<u8> {
    let mut children = vec![
        leaf(b"DVID", b'L', 4, 1, &u32s(&[1])),
        leaf(b"DVNM", b'c', 1, name.len() as u16, name.as_bytes()),
    ];
    children.extend(streams.iter().cloned());
    nested(b"DEVC", &children)
}
