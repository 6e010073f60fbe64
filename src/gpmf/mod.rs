//! GPMF key-length-value format: identifiers, headers, typed values
//! and the recursive packet decoder.

pub mod fourcc;
pub mod header;
pub mod klv;
pub mod timestamp;
pub mod value;

pub use fourcc::{Description, FourCC};
pub use header::{padded, Header, ALIGNMENT, HEADER_SIZE};
pub use klv::{decode, Klv, KlvTree, MalformedKind, MalformedRecord};
pub use timestamp::Timestamp;
pub use value::{ComplexType, Number, TypeCode, Value};
