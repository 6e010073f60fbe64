//! Decoded KLV payloads.
//!
//! Every leaf payload is decoded into a tagged `Value` so that consumers
//! switch on an explicit variant. Numeric samples keep their original
//! integer or float representation in `Number` until they are scaled.

use time::{Date, Month, PrimitiveDateTime, Time};

use super::Klv;

/// Closed GPMF type code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    /// `b`
    I8,
    /// `B`
    U8,
    /// `s`
    I16,
    /// `S`
    U16,
    /// `l`
    I32,
    /// `L`
    U32,
    /// `j`
    I64,
    /// `J`
    U64,
    /// `f`
    F32,
    /// `d`
    F64,
    /// `q`, Q15.16 fixed point
    Q15_16,
    /// `Q`, Q31.32 fixed point
    Q31_32,
    /// `F`
    FourCC,
    /// `c`
    Ascii,
    /// `U`, 16 byte UTC date string `yymmddhhmmss.sss`
    Utc,
    /// `G`, 128-bit ID
    Guid,
    /// `?`, layout given by a preceding `TYPE` record
    Complex,
    /// `\0`
    Nested,
    Unknown(u8),
}

impl From<u8> for TypeCode {
    fn from(value: u8) -> Self {
        match value {
            b'b' => Self::I8,
            b'B' => Self::U8,
            b's' => Self::I16,
            b'S' => Self::U16,
            b'l' => Self::I32,
            b'L' => Self::U32,
            b'j' => Self::I64,
            b'J' => Self::U64,
            b'f' => Self::F32,
            b'd' => Self::F64,
            b'q' => Self::Q15_16,
            b'Q' => Self::Q31_32,
            b'F' => Self::FourCC,
            b'c' => Self::Ascii,
            b'U' => Self::Utc,
            b'G' => Self::Guid,
            b'?' => Self::Complex,
            0 => Self::Nested,
            other => Self::Unknown(other),
        }
    }
}

impl From<TypeCode> for u8 {
    fn from(value: TypeCode) -> Self {
        match value {
            TypeCode::I8 => b'b',
            TypeCode::U8 => b'B',
            TypeCode::I16 => b's',
            TypeCode::U16 => b'S',
            TypeCode::I32 => b'l',
            TypeCode::U32 => b'L',
            TypeCode::I64 => b'j',
            TypeCode::U64 => b'J',
            TypeCode::F32 => b'f',
            TypeCode::F64 => b'd',
            TypeCode::Q15_16 => b'q',
            TypeCode::Q31_32 => b'Q',
            TypeCode::FourCC => b'F',
            TypeCode::Ascii => b'c',
            TypeCode::Utc => b'U',
            TypeCode::Guid => b'G',
            TypeCode::Complex => b'?',
            TypeCode::Nested => 0,
            TypeCode::Unknown(b) => b,
        }
    }
}

impl TypeCode {
    /// Size in bytes of a single element, `None` for
    /// variable layouts (complex, nested) and unknown codes.
    pub fn width(&self) -> Option<usize> {
        match self {
            Self::I8 | Self::U8 | Self::Ascii => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 | Self::Q15_16 | Self::FourCC => Some(4),
            Self::I64 | Self::U64 | Self::F64 | Self::Q31_32 => Some(8),
            Self::Utc | Self::Guid => Some(16),
            Self::Complex | Self::Nested | Self::Unknown(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::U8
                | Self::I16
                | Self::U16
                | Self::I32
                | Self::U32
                | Self::I64
                | Self::U64
                | Self::F32
                | Self::F64
                | Self::Q15_16
                | Self::Q31_32
        )
    }

    /// Reads a single big-endian element. `bytes` must be exactly `self.width()` long.
    fn read_number(&self, bytes: &[u8]) -> Option<Number> {
        let number = match self {
            Self::I8 => Number::Int(i8::from_be_bytes(bytes.try_into().ok()?) as i64),
            Self::U8 => Number::UInt(u8::from_be_bytes(bytes.try_into().ok()?) as u64),
            Self::I16 => Number::Int(i16::from_be_bytes(bytes.try_into().ok()?) as i64),
            Self::U16 => Number::UInt(u16::from_be_bytes(bytes.try_into().ok()?) as u64),
            Self::I32 => Number::Int(i32::from_be_bytes(bytes.try_into().ok()?) as i64),
            Self::U32 => Number::UInt(u32::from_be_bytes(bytes.try_into().ok()?) as u64),
            Self::I64 => Number::Int(i64::from_be_bytes(bytes.try_into().ok()?)),
            Self::U64 => Number::UInt(u64::from_be_bytes(bytes.try_into().ok()?)),
            Self::F32 => Number::Float(f32::from_be_bytes(bytes.try_into().ok()?) as f64),
            Self::F64 => Number::Float(f64::from_be_bytes(bytes.try_into().ok()?)),
            Self::Q15_16 => {
                Number::Float(i32::from_be_bytes(bytes.try_into().ok()?) as f64 / 65_536.0)
            }
            Self::Q31_32 => Number::Float(
                i64::from_be_bytes(bytes.try_into().ok()?) as f64 / 4_294_967_296.0,
            ),
            _ => return None,
        };
        Some(number)
    }
}

/// A single numeric element, in the representation it was stored with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(n) => *n as f64,
            Self::UInt(n) => *n as f64,
            Self::Float(n) => *n,
        }
    }
}

/// Sample layout for `?` records, e.g. `"lllllllSS"` for `GPS9`.
/// `x[n]` repeats the preceding element `n` times in total.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexType(Vec<TypeCode>);

impl ComplexType {
    /// Returns `None` if the definition contains anything
    /// other than fixed width elements.
    pub fn parse(definition: &str) -> Option<Self> {
        let mut codes: Vec<TypeCode> = Vec::new();
        let mut chars = definition.trim_end_matches('\0').bytes();

        while let Some(b) = chars.next() {
            if b == b'[' {
                let mut digits = String::new();
                for d in chars.by_ref() {
                    if d == b']' {
                        break;
                    }
                    digits.push(d as char);
                }
                let count: usize = digits.parse().ok()?;
                let last = *codes.last()?;
                if count == 0 {
                    codes.pop();
                } else {
                    codes.extend(std::iter::repeat(last).take(count - 1));
                }
                continue;
            }
            let code = TypeCode::from(b);
            code.width()?;
            codes.push(code);
        }

        (!codes.is_empty()).then_some(Self(codes))
    }

    pub fn codes(&self) -> &[TypeCode] {
        &self.0
    }

    /// Size in bytes of one structure.
    pub fn width(&self) -> usize {
        self.0.iter().filter_map(|c| c.width()).sum()
    }

    fn is_numeric(&self) -> bool {
        self.0.iter().all(|c| c.is_numeric())
    }
}

/// Decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// One number per sample.
    Scalar(Vec<Number>),
    /// Several numbers per sample, same count for every sample.
    Vector(Vec<Vec<Number>>),
    /// Nested records.
    Container(Vec<Klv>),
    /// One string per sample (ASCII, UTC dates, FourCC values).
    Text(Vec<String>),
    /// Payload that has no numeric or text interpretation.
    Raw(Vec<u8>),
    /// Leaf whose declared payload ran past the end of its buffer.
    /// Holds whatever bytes were available.
    Malformed(Vec<u8>),
}

impl Value {
    /// Decodes a leaf payload. `payload` holds exactly the declared
    /// `size * repeat` bytes; `complex` is the layout declared by the
    /// most recent `TYPE` record in the same container.
    pub fn decode(
        type_code: TypeCode,
        size: usize,
        repeat: usize,
        payload: &[u8],
        complex: Option<&ComplexType>,
    ) -> Self {
        if size == 0 || repeat == 0 {
            return Self::Raw(Vec::new());
        }

        match type_code {
            TypeCode::Ascii => {
                if size == 1 {
                    Self::Text(vec![ascii(payload)])
                } else {
                    Self::Text(payload.chunks_exact(size).map(ascii).collect())
                }
            }
            TypeCode::Utc => Self::Text(payload.chunks_exact(16).map(ascii).collect()),
            TypeCode::FourCC => Self::Text(payload.chunks_exact(4).map(ascii).collect()),
            TypeCode::Complex => match complex {
                Some(def) if def.is_numeric() && def.width() == size => {
                    decode_structs(def.codes(), size, payload)
                        .unwrap_or_else(|| Self::Raw(payload.to_vec()))
                }
                _ => Self::Raw(payload.to_vec()),
            },
            code if code.is_numeric() => {
                let width = code.width().unwrap_or(size);
                if size % width != 0 {
                    return Self::Raw(payload.to_vec());
                }
                let codes = vec![code; size / width];
                decode_structs(&codes, size, payload)
                    .unwrap_or_else(|| Self::Raw(payload.to_vec()))
            }
            _ => Self::Raw(payload.to_vec()),
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(v) => v.len(),
            Self::Vector(v) => v.len(),
            Self::Container(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::Raw(_) | Self::Malformed(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Vector(_))
    }

    /// Values per sample for numeric payloads.
    pub fn width(&self) -> Option<usize> {
        match self {
            Self::Scalar(_) => Some(1),
            Self::Vector(v) => v.first().map(|s| s.len()),
            _ => None,
        }
    }

    /// Numeric samples as `f64`, one inner vec per sample.
    pub fn to_vec_f64(&self) -> Option<Vec<Vec<f64>>> {
        match self {
            Self::Scalar(v) => Some(v.iter().map(|n| vec![n.as_f64()]).collect()),
            Self::Vector(v) => Some(
                v.iter()
                    .map(|s| s.iter().map(Number::as_f64).collect())
                    .collect(),
            ),
            _ => None,
        }
    }

    /// All numeric elements flattened, e.g. a `SCAL` list.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        self.to_vec_f64()
            .map(|v| v.into_iter().flatten().collect())
    }

    pub fn first_number(&self) -> Option<Number> {
        match self {
            Self::Scalar(v) => v.first().copied(),
            Self::Vector(v) => v.first().and_then(|s| s.first()).copied(),
            _ => None,
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => v.first().map(|s| s.as_str()),
            _ => None,
        }
    }

    /// Parses the first string as a GPMF UTC date (`yymmddhhmmss.sss`),
    /// e.g. `GPSU`.
    pub fn to_datetime(&self) -> Option<PrimitiveDateTime> {
        parse_utc(self.first_text()?)
    }
}

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_owned()
}

fn decode_structs(codes: &[TypeCode], size: usize, payload: &[u8]) -> Option<Value> {
    let samples = payload
        .chunks_exact(size)
        .map(|chunk| {
            let mut offset = 0;
            codes.iter()
                .map(|code| {
                    let width = code.width()?;
                    let number = code.read_number(chunk.get(offset..offset + width)?);
                    offset += width;
                    number
                })
                .collect::<Option<Vec<_>>>()
        })
        .collect::<Option<Vec<_>>>()?;

    if codes.len() == 1 {
        Some(Value::Scalar(samples.into_iter().flatten().collect()))
    } else {
        Some(Value::Vector(samples))
    }
}

/// `yymmddhhmmss.sss`, years relative to 2000.
pub(crate) fn parse_utc(s: &str) -> Option<PrimitiveDateTime> {
    let s = s.trim();
    let digits = |range: std::ops::Range<usize>| {
        s.get(range)
            .filter(|d: &&str| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
    };
    let field = |range: std::ops::Range<usize>| -> Option<u32> { digits(range)?.parse().ok() };

    let year = 2000 + field(0..2)? as i32;
    let month = Month::try_from(field(2..4)? as u8).ok()?;
    let day = field(4..6)? as u8;
    let hour = field(6..8)? as u8;
    let minute = field(8..10)? as u8;
    let second = field(10..12)? as u8;
    // Up to three fraction digits, missing digits read as zeros
    let milli = match s.get(12..) {
        Some(frac) if frac.len() > 1 && frac.starts_with('.') => {
            let fraction = digits(13..s.len().min(16))?;
            let value: u32 = fraction.parse().ok()?;
            (value * 10_u32.pow(3 - fraction.len() as u32)) as u16
        }
        _ => 0,
    };

    let date = Date::from_calendar_date(year, month, day).ok()?;
    let time = Time::from_hms_milli(hour, minute, second, milli).ok()?;
    Some(PrimitiveDateTime::new(date, time))
}
