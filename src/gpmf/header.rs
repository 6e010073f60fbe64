//! KLV record header: 4-byte FourCC, 1-byte type code,
//! 1-byte structure size, 2-byte big-endian repeat count.

use std::io::Cursor;

use binrw::{BinRead, BinReaderExt, BinWrite};

use super::{FourCC, TypeCode};
use crate::GpmfError;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 8;

/// GPMF payloads are 32-bit aligned.
pub const ALIGNMENT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct Header {
    pub fourcc: FourCC,
    /// Raw type code, `0` for nested records.
    pub type_code: u8,
    /// Size in bytes of a single sample (structure size).
    pub size: u8,
    /// Number of samples.
    pub repeat: u16,
}

impl Header {
    pub fn new(fourcc: FourCC, type_code: u8, size: u8, repeat: u16) -> Self {
        Self { fourcc, type_code, size, repeat }
    }

    /// Reads a header from the start of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, GpmfError> {
        let mut cursor = Cursor::new(bytes);
        cursor.read_be::<Self>().map_err(|err| err.into())
    }

    /// Header as written on the wire.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let [hi, lo] = self.repeat.to_be_bytes();
        let f = self.fourcc.0;
        [f[0], f[1], f[2], f[3], self.type_code, self.size, hi, lo]
    }

    pub fn type_code(&self) -> TypeCode {
        TypeCode::from(self.type_code)
    }

    pub fn is_nested(&self) -> bool {
        self.type_code() == TypeCode::Nested
    }

    /// Declared payload length in bytes, padding excluded.
    pub fn payload_len(&self) -> usize {
        self.size as usize * self.repeat as usize
    }

    /// Declared payload length in bytes, padding included.
    pub fn padded_len(&self) -> usize {
        padded(self.payload_len())
    }
}

/// Rounds `len` up to the next 4-byte boundary.
pub fn padded(len: usize) -> usize {
    (len + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_header() {
        let bytes = [b'A', b'C', b'C', b'L', b's', 6, 0x01, 0x02];
        let header = Header::from_slice(&bytes).unwrap();
        assert_eq!(header.fourcc, FourCC::ACCL);
        assert_eq!(header.type_code(), TypeCode::I16);
        assert_eq!(header.repeat, 258);
        assert_eq!(header.payload_len(), 6 * 258);
        assert_eq!(header.to_bytes(), bytes);
    }

    #[test]
    fn short_header_fails() {
        assert!(Header::from_slice(b"ACCLs").is_err());
    }

    #[test]
    fn padding() {
        assert_eq!(padded(0), 0);
        assert_eq!(padded(1), 4);
        assert_eq!(padded(4), 4);
        assert_eq!(padded(6), 8);
    }
}
