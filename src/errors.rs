//! Errors and warnings.
//!
//! `GpmfError` aborts a load. `Warning` is recorded on the resulting
//! `TelemetryStore` and processing continues.

use std::path::PathBuf;

use thiserror::Error;

use crate::{gpmf::MalformedRecord, FourCC, TelemetryStore};

/// Fatal errors.
#[derive(Debug, Error)]
pub enum GpmfError {
    /// No packets, or no packet holds a device block (`DEVC`).
    #[error("no GPMF metadata found")]
    NoMetadata,
    /// Explicit device override that matches no known device.
    #[error("unknown device '{name}', known devices: {}", known.join(", "))]
    UnknownDevice { name: String, known: Vec<String> },
    /// Invalid device table.
    #[error("invalid device registry: {0}")]
    Registry(#[from] RegistryError),
    /// Load cancelled between packets. Holds what was assembled so far.
    #[error("cancelled after {packets} packets")]
    Cancelled {
        packets: usize,
        partial: Box<TelemetryStore>,
    },
    #[error("invalid FourCC '{0}'")]
    InvalidFourCC(String),
    /// Exceeds in-memory read limit.
    #[error("{} exceeds maximum size {max} bytes ({got} bytes)", path.display())]
    MaxFileSizeExceeded { max: u64, got: u64, path: PathBuf },
    /// Not a telemetry export, or unsupported export version.
    #[error("invalid export: {0}")]
    InvalidExport(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("binary read/write error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Device table configuration errors. Raised when the registry is built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry has no devices")]
    Empty,
    #[error("device '{0}' is declared more than once")]
    DuplicateDevice(String),
    #[error("device '{device}' inherits from unknown device '{parent}'")]
    UnknownParent { device: String, parent: String },
    #[error("inheritance cycle: {}", .0.join(" -> "))]
    InheritanceCycle(Vec<String>),
    #[error("axis order for {fourcc} on '{device}' is not a permutation")]
    InvalidAxisOrder { device: String, fourcc: FourCC },
    #[error("nominal rate for {fourcc} on '{device}' is not a usable positive rate")]
    InvalidRate { device: String, fourcc: FourCC },
}

/// Recoverable problem recorded during a load.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Warning {
    /// Record that did not fit its buffer. `packet` is the zero-based packet index.
    #[error("packet {packet}: malformed record {record}")]
    MalformedRecord {
        packet: usize,
        record: MalformedRecord,
    },
    /// Observed device identity matched no known device.
    #[error("unrecognized device {}, using {fallback}", .observed.as_deref().unwrap_or("<none>"))]
    DeviceFallback {
        observed: Option<String>,
        fallback: String,
    },
    /// Identifier outside the resolved device's supported set. Kept as raw.
    #[error("unrecognized stream {fourcc}, kept as raw")]
    UnrecognizedStream { fourcc: FourCC },
    /// Sample shape changed between blocks, or did not match the declared
    /// dimensionality or scale. Later samples are kept as raw.
    #[error("{fourcc}: expected {expected} values per sample, found {found}, kept as raw")]
    UnsupportedStreamShape {
        fourcc: FourCC,
        expected: usize,
        found: usize,
    },
    /// Nested container inside a stream block. Skipped.
    #[error("unexpected container {fourcc} in stream block, skipped")]
    UnexpectedContainer { fourcc: FourCC },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpmf::MalformedKind;

    #[test]
    fn warning_messages() {
        let warning = Warning::DeviceFallback {
            observed: None,
            fallback: String::from("HERO13_BLACK"),
        };
        assert_eq!(warning.to_string(), "unrecognized device <none>, using HERO13_BLACK");

        let warning = Warning::MalformedRecord {
            packet: 2,
            record: MalformedRecord {
                fourcc: Some(FourCC::ACCL),
                offset: 16,
                declared: 600,
                available: 12,
                kind: MalformedKind::Truncated,
            },
        };
        assert_eq!(
            warning.to_string(),
            "packet 2: malformed record ACCL at offset 16 declares 600 bytes, 12 available (Truncated)"
        );
    }
}
