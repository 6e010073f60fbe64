//! Packet sources. A packet is one top-level KLV tree's worth of bytes,
//! usually a single `DEVC` block, with an optional duration.
//!
//! - `Vec<Packet>`, `&[Packet]`: explicit packets.
//! - `Vec<Vec<u8>>`: one packet per buffer, no durations.
//! - `&[u8]`, `Vec<u8>`: a raw GPMF stream, split at top-level records.
//! - `&Path`, `PathBuf`: a raw GPMF file (e.g. the "GoPro MET" track
//!   extracted with FFmpeg), or a directory holding one file per packet,
//!   read in file name order.

use std::path::{Path, PathBuf};

use time::Duration;
use walkdir::WalkDir;

use crate::{
    gpmf::{Header, HEADER_SIZE},
    GpmfError,
};

/// Max in-memory size for raw GPMF files: 50MB.
pub const MAX_FILE_SIZE: u64 = 50_000_000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packet {
    pub bytes: Vec<u8>,
    /// Time until the next packet. `None` uses `LoadOptions::packet_duration`.
    pub duration: Option<Duration>,
}

impl Packet {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, duration: None }
    }

    pub fn with_duration(bytes: Vec<u8>, duration: Duration) -> Self {
        Self { bytes, duration: Some(duration) }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Anything that yields packets in file order.
pub trait PacketSource {
    fn packets(self) -> Result<Vec<Packet>, GpmfError>;
}

impl PacketSource for Vec<Packet> {
    fn packets(self) -> Result<Vec<Packet>, GpmfError> {
        Ok(self)
    }
}

impl PacketSource for &[Packet] {
    fn packets(self) -> Result<Vec<Packet>, GpmfError> {
        Ok(self.to_vec())
    }
}

impl PacketSource for Vec<Vec<u8>> {
    fn packets(self) -> Result<Vec<Packet>, GpmfError> {
        Ok(self.into_iter().map(Packet::new).collect())
    }
}

impl PacketSource for &[u8] {
    fn packets(self) -> Result<Vec<Packet>, GpmfError> {
        Ok(split(self))
    }
}

impl PacketSource for Vec<u8> {
    fn packets(self) -> Result<Vec<Packet>, GpmfError> {
        Ok(split(&self))
    }
}

impl PacketSource for &Path {
    fn packets(self) -> Result<Vec<Packet>, GpmfError> {
        if self.is_dir() {
            from_dir(self)
        } else {
            from_raw(self)
        }
    }
}

impl PacketSource for PathBuf {
    fn packets(self) -> Result<Vec<Packet>, GpmfError> {
        self.as_path().packets()
    }
}

impl PacketSource for &PathBuf {
    fn packets(self) -> Result<Vec<Packet>, GpmfError> {
        self.as_path().packets()
    }
}

/// Splits a raw GPMF stream at its top-level records.
/// Zero padding between records is skipped. A top-level record that
/// runs past the end keeps the remaining bytes and is left for the
/// decoder to report.
pub fn split(bytes: &[u8]) -> Vec<Packet> {
    let mut packets = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let remaining = &bytes[pos..];
        if remaining.iter().all(|b| *b == 0) {
            break;
        }

        let header = match Header::from_slice(remaining) {
            Ok(header) if !header.fourcc.is_invalid() => header,
            // Zero padding
            Ok(_) => {
                pos += 4;
                continue;
            }
            // Fewer than 8 bytes left
            Err(_) => {
                packets.push(Packet::new(remaining.to_vec()));
                break;
            }
        };

        let end = (pos + HEADER_SIZE + header.padded_len()).min(bytes.len());
        packets.push(Packet::new(bytes[pos..end].to_vec()));
        pos = end;
    }

    packets
}

/// Reads a raw GPMF file into memory and splits it into packets.
pub fn from_raw(path: &Path) -> Result<Vec<Packet>, GpmfError> {
    let size = path.metadata()?.len();

    if size > MAX_FILE_SIZE {
        return Err(GpmfError::MaxFileSizeExceeded {
            max: MAX_FILE_SIZE,
            got: size,
            path: path.to_owned(),
        });
    }

    let bytes = std::fs::read(path)?;
    let packets = split(&bytes);
    tracing::debug!("{}: {} packets", path.display(), packets.len());
    Ok(packets)
}

/// One packet per file in `dir`, in file name order. Subdirectories are ignored.
pub fn from_dir(dir: &Path) -> Result<Vec<Packet>, GpmfError> {
    let mut packets = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            // Ignore errors, since these are often due to lack of read permissions
            Err(err) => {
                tracing::warn!("skipping entry in {}: {err}", dir.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        packets.push(Packet::new(std::fs::read(entry.path())?));
    }

    tracing::debug!("{}: {} packets", dir.display(), packets.len());
    Ok(packets)
}
