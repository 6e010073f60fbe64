//! Recursive KLV decoder.
//!
//! Decoding is a pure function of the packet bytes. Records that declare
//! more payload than is left in their buffer are kept in the tree as
//! `Value::Malformed` and listed in `KlvTree::malformed`; their siblings
//! still decode.

use super::{padded, ComplexType, FourCC, Header, TypeCode, Value, HEADER_SIZE};

/// A single decoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct Klv {
    pub header: Header,
    /// Byte offset of the header within the packet.
    pub offset: usize,
    pub value: Value,
    /// Payload bytes as stored, padding excluded.
    /// Empty for containers.
    pub raw: Vec<u8>,
}

impl Klv {
    pub fn fourcc(&self) -> FourCC {
        self.header.fourcc
    }

    pub fn is_container(&self) -> bool {
        matches!(self.value, Value::Container(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self.value, Value::Malformed(_))
    }

    /// Child records, empty for leaves.
    pub fn children(&self) -> &[Klv] {
        match &self.value {
            Value::Container(children) => children,
            _ => &[],
        }
    }

    /// First direct child with specified FourCC.
    pub fn find(&self, fourcc: &FourCC) -> Option<&Klv> {
        self.children().iter().find(|k| &k.header.fourcc == fourcc)
    }

    /// All descendants with specified FourCC, depth first.
    pub fn find_all(&self, fourcc: &FourCC) -> Vec<&Klv> {
        let mut found = Vec::new();
        collect(self.children(), fourcc, &mut found);
        found
    }

    /// Raw payload split into per-sample chunks of `header.size` bytes.
    pub fn sample_bytes(&self) -> impl Iterator<Item = &[u8]> {
        self.raw.chunks(self.header.size.max(1) as usize)
    }
}

fn collect<'a>(records: &'a [Klv], fourcc: &FourCC, found: &mut Vec<&'a Klv>) {
    for record in records.iter() {
        if &record.header.fourcc == fourcc {
            found.push(record);
        }
        collect(record.children(), fourcc, found);
    }
}

/// How a record failed to fit its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// Leaf payload runs past the end of its buffer.
    Truncated,
    /// Container payload runs past the end of its buffer.
    /// Children found in the available bytes are kept.
    ContainerTruncated,
    /// Fewer than 8 non-zero bytes left where a header was expected.
    TruncatedHeader,
}

/// A record that could not be fully decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{} at offset {offset} declares {declared} bytes, {available} available ({kind:?})",
    label(.fourcc)
)]
pub struct MalformedRecord {
    /// `None` when not even the header could be read.
    pub fourcc: Option<FourCC>,
    /// Byte offset of the header within the packet.
    pub offset: usize,
    /// Declared size in bytes (payload, or header for `TruncatedHeader`).
    pub declared: usize,
    /// Bytes that were actually available.
    pub available: usize,
    pub kind: MalformedKind,
}

fn label(fourcc: &Option<FourCC>) -> String {
    fourcc
        .map(|f| f.to_string())
        .unwrap_or_else(|| String::from("<header>"))
}

/// Decoded packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KlvTree {
    pub records: Vec<Klv>,
    pub malformed: Vec<MalformedRecord>,
}

impl KlvTree {
    /// Top level device blocks (`DEVC`).
    pub fn devices(&self) -> impl Iterator<Item = &Klv> {
        self.records
            .iter()
            .filter(|k| k.header.fourcc == FourCC::DEVC && k.is_container())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records with specified FourCC at any depth.
    pub fn find_all(&self, fourcc: &FourCC) -> Vec<&Klv> {
        let mut found = Vec::new();
        collect(&self.records, fourcc, &mut found);
        found
    }
}

/// Decodes a packet into a record tree.
pub fn decode(bytes: &[u8]) -> KlvTree {
    let mut malformed = Vec::new();
    let records = decode_records(bytes, 0, &mut malformed);
    KlvTree { records, malformed }
}

/// Decodes sibling records in `bytes`, which starts at `base` within the packet.
fn decode_records(bytes: &[u8], base: usize, malformed: &mut Vec<MalformedRecord>) -> Vec<Klv> {
    let mut records = Vec::new();
    // `TYPE` is sticky within its container
    let mut complex: Option<ComplexType> = None;
    let mut pos = 0;

    while pos < bytes.len() {
        let remaining = &bytes[pos..];

        if remaining.len() < HEADER_SIZE {
            if remaining.iter().any(|b| *b != 0) {
                malformed.push(MalformedRecord {
                    fourcc: None,
                    offset: base + pos,
                    declared: HEADER_SIZE,
                    available: remaining.len(),
                    kind: MalformedKind::TruncatedHeader,
                });
            }
            break;
        }

        let Ok(header) = Header::from_slice(remaining) else {
            break;
        };

        // Zero padding
        if header.fourcc.is_invalid() {
            break;
        }

        let start = pos + HEADER_SIZE;
        let declared = header.payload_len();
        let available = bytes.len() - start;

        if header.is_nested() {
            let end = start + declared.min(available);
            let children = decode_records(&bytes[start..end], base + start, malformed);
            records.push(Klv {
                header,
                offset: base + pos,
                value: Value::Container(children),
                raw: Vec::new(),
            });

            if declared > available {
                malformed.push(MalformedRecord {
                    fourcc: Some(header.fourcc),
                    offset: base + pos,
                    declared,
                    available,
                    kind: MalformedKind::ContainerTruncated,
                });
                break;
            }

            pos = start + header.padded_len();
            continue;
        }

        if declared > available {
            malformed.push(MalformedRecord {
                fourcc: Some(header.fourcc),
                offset: base + pos,
                declared,
                available,
                kind: MalformedKind::Truncated,
            });
            records.push(Klv {
                header,
                offset: base + pos,
                value: Value::Malformed(bytes[start..].to_vec()),
                raw: bytes[start..].to_vec(),
            });

            match resume_offset(bytes, start) {
                Some(next) => {
                    pos = next;
                    continue;
                }
                None => break,
            }
        }

        let payload = &bytes[start..start + declared];
        let value = Value::decode(
            header.type_code(),
            header.size as usize,
            header.repeat as usize,
            payload,
            complex.as_ref(),
        );

        if header.fourcc == FourCC::TYPE {
            complex = value.first_text().and_then(ComplexType::parse);
        }

        records.push(Klv {
            header,
            offset: base + pos,
            value,
            raw: payload.to_vec(),
        });

        pos = start + header.padded_len();
    }

    records
}

/// Finds the first aligned offset at or after `from` holding a header
/// that looks valid and whose payload fits in `bytes`.
fn resume_offset(bytes: &[u8], from: usize) -> Option<usize> {
    (padded(from)..bytes.len())
        .step_by(4)
        .find(|&offset| {
            let Some(slice) = bytes.get(offset..) else {
                return false;
            };
            let Ok(header) = Header::from_slice(slice) else {
                return false;
            };
            let known = match header.type_code() {
                TypeCode::Nested | TypeCode::Complex => true,
                code => code.width().is_some(),
            };
            known
                && header.fourcc.is_plausible()
                && offset + HEADER_SIZE + header.payload_len() <= bytes.len()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::gpmf::Number;

    #[test]
    fn nested_tree() {
        let strm = nested(b"STRM", &[
            leaf(b"STNM", b'c', 1, 5, b"Accel"),
            leaf(b"SCAL", b's', 2, 1, &i16s(&[418])),
            leaf(b"ACCL", b's', 6, 1, &i16s(&[1254, -527, 209])),
        ]);
        let packet = nested(b"DEVC", &[
            leaf(b"DVID", b'L', 4, 1, &u32s(&[1])),
            leaf(b"DVNM", b'c', 1, 11, b"Hero9 Black"),
            strm,
        ]);

        let tree = decode(&packet);
        assert!(tree.malformed.is_empty());
        assert_eq!(tree.devices().count(), 1);

        let devc = &tree.records[0];
        assert_eq!(devc.children().len(), 3);
        assert_eq!(devc.find(&FourCC::DVNM).unwrap().value.first_text(), Some("Hero9 Black"));

        let accl = tree.find_all(&FourCC::ACCL);
        assert_eq!(accl.len(), 1);
        assert_eq!(accl[0].value.to_vec_f64(), Some(vec![vec![1254., -527., 209.]]));
        assert_eq!(accl[0].raw.len(), 6);
        // STNM: 8 header + 5 payload + 3 padding, DVID + DVNM before it
        assert_eq!(tree.find_all(&FourCC::SCAL)[0].offset, 8 + 12 + 20 + 8 + 16);
    }

    #[test]
    fn padding_stops_container() {
        let mut packet = leaf(b"DVID", b'L', 4, 1, &u32s(&[7]));
        packet.extend_from_slice(&[0; 12]);
        let tree = decode(&packet);
        assert_eq!(tree.len(), 1);
        assert!(tree.malformed.is_empty());
    }

    #[test]
    fn overlong_leaf_keeps_prior_siblings() {
        let mut packet = leaf(b"SCAL", b's', 2, 1, &i16s(&[100]));
        packet.extend(leaf(b"GYRO", b's', 6, 1, &i16s(&[1, 2, 3])));
        // Repeat count 50 but only one sample present
        let mut bad = leaf(b"ACCL", b's', 6, 1, &i16s(&[4, 5, 6]));
        bad[7] = 50;
        packet.extend(bad);

        let tree = decode(&packet);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.malformed.len(), 1);
        let m = &tree.malformed[0];
        assert_eq!(m.fourcc, Some(FourCC::ACCL));
        assert_eq!(m.kind, MalformedKind::Truncated);
        assert_eq!(m.declared, 300);
        assert_eq!(m.available, 8);
        assert!(tree.records[2].is_malformed());
        assert_eq!(
            tree.records[1].value,
            Value::Vector(vec![vec![Number::Int(1), Number::Int(2), Number::Int(3)]])
        );
    }

    #[test]
    fn resumes_after_bad_repeat_count() {
        let mut bad = leaf(b"ACCL", b's', 6, 1, &i16s(&[4, 5, 6]));
        bad[7] = 5;
        let mut strm = bad;
        strm.extend(leaf(b"GYRO", b's', 6, 1, &i16s(&[1, 2, 3])));

        let tree = decode(&strm);
        assert_eq!(tree.malformed.len(), 1);
        assert_eq!(tree.records.len(), 2);
        assert_eq!(tree.records[1].header.fourcc, FourCC::GYRO);
    }

    #[test]
    fn truncated_container_keeps_complete_children() {
        let strm = nested(b"STRM", &[
            leaf(b"SCAL", b's', 2, 1, &i16s(&[1])),
            leaf(b"ACCL", b's', 6, 2, &i16s(&[1, 2, 3, 4, 5, 6])),
        ]);
        let mut packet = nested(b"DEVC", &[strm]);
        packet.truncate(packet.len() - 6);

        let tree = decode(&packet);
        let kinds: Vec<_> = tree.malformed.iter().map(|m| m.kind).collect();
        assert!(kinds.contains(&MalformedKind::ContainerTruncated));
        assert!(kinds.contains(&MalformedKind::Truncated));
        assert_eq!(tree.find_all(&FourCC::SCAL).len(), 1);
    }

    #[test]
    fn trailing_garbage_is_reported() {
        let mut packet = leaf(b"DVID", b'L', 4, 1, &u32s(&[7]));
        packet.extend_from_slice(&[b'A', b'C', 0]);
        let tree = decode(&packet);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.malformed[0].kind, MalformedKind::TruncatedHeader);
    }

    #[test]
    fn unknown_identifier_decodes_structurally() {
        let packet = leaf(b"XYZZ", b'S', 2, 2, &[0, 1, 0, 2]);
        let tree = decode(&packet);
        assert_eq!(
            tree.records[0].value,
            Value::Scalar(vec![Number::UInt(1), Number::UInt(2)])
        );
    }

    #[test]
    fn complex_uses_sticky_type() {
        let mut payload = Vec::new();
        payload.extend(i32s(&[-5]));
        payload.extend(u16s(&[7]));
        payload.extend([0, 0]);
        let strm = nested(b"STRM", &[
            leaf(b"TYPE", b'c', 1, 2, b"lS"),
            leaf(b"GPS9", b'?', 6, 1, &payload[..6]),
        ]);
        let tree = decode(&strm);
        let gps9 = tree.find_all(&FourCC::GPS9)[0];
        assert_eq!(
            gps9.value,
            Value::Vector(vec![vec![Number::Int(-5), Number::UInt(7)]])
        );
    }
}
