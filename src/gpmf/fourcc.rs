//! GPMF Four CC, i.e. general stream identifier.
//! Stored as the raw four bytes read from the header, so undocumented
//! identifiers round-trip verbatim. `FourCC::INVALID` (all zeros) is
//! what zero padding decodes to and is used to stop a record loop.

use std::{borrow::Cow, fmt::{Debug, Display}, str::FromStr};

use binrw::{BinRead, BinWrite};

use crate::GpmfError;

/// Four character code naming a KLV record. Case-sensitive, fixed width.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BinRead, BinWrite)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    // FOURCC RESERVED FOR GPMF STRUCTURE
    /// unique device source for metadata
    pub const DEVC: Self = Self(*b"DEVC");
    /// device/track ID
    pub const DVID: Self = Self(*b"DVID");
    /// device name
    pub const DVNM: Self = Self(*b"DVNM");
    /// Nested signal stream of metadata/telemetry
    pub const STRM: Self = Self(*b"STRM");
    /// Stream name
    pub const STNM: Self = Self(*b"STNM");
    /// Comments for any stream
    pub const RMRK: Self = Self(*b"RMRK");
    /// Scaling factor (divisor)
    pub const SCAL: Self = Self(*b"SCAL");
    /// Standard Units (like SI)
    pub const SIUN: Self = Self(*b"SIUN");
    /// Display units
    pub const UNIT: Self = Self(*b"UNIT");
    /// Typedefs for complex structures
    pub const TYPE: Self = Self(*b"TYPE");
    /// Total Samples delivered since record start
    pub const TSMP: Self = Self(*b"TSMP");
    /// Time Offset, data is delayed by 'x' seconds
    pub const TIMO: Self = Self(*b"TIMO");
    /// Empty payload count
    pub const EMPT: Self = Self(*b"EMPT");
    /// Microsecond timestamp of the first sample in the stream block
    pub const STMP: Self = Self(*b"STMP");
    /// Legacy clock markers (Hero5)
    pub const TICK: Self = Self(*b"TICK");
    pub const TOCK: Self = Self(*b"TOCK");
    /// Sensor temperature, once per block
    pub const TMPC: Self = Self(*b"TMPC");

    // DEVICE/DATA SPECIFIC FOURCC
    pub const AALP: Self = Self(*b"AALP");
    pub const ACCL: Self = Self(*b"ACCL");
    pub const ALLD: Self = Self(*b"ALLD");
    pub const CORI: Self = Self(*b"CORI");
    pub const DISP: Self = Self(*b"DISP");
    pub const FACE: Self = Self(*b"FACE");
    pub const FACS: Self = Self(*b"FACS");
    pub const FCNM: Self = Self(*b"FCNM");
    pub const GPS5: Self = Self(*b"GPS5");
    pub const GPS9: Self = Self(*b"GPS9");
    pub const GPSA: Self = Self(*b"GPSA");
    pub const GPSF: Self = Self(*b"GPSF");
    pub const GPSP: Self = Self(*b"GPSP");
    pub const GPSU: Self = Self(*b"GPSU");
    pub const GRAV: Self = Self(*b"GRAV");
    pub const GYRO: Self = Self(*b"GYRO");
    pub const HUES: Self = Self(*b"HUES");
    pub const IORI: Self = Self(*b"IORI");
    pub const ISOE: Self = Self(*b"ISOE");
    pub const ISOG: Self = Self(*b"ISOG");
    pub const LSKP: Self = Self(*b"LSKP");
    pub const MAGN: Self = Self(*b"MAGN");
    pub const MSKP: Self = Self(*b"MSKP");
    pub const MTRX: Self = Self(*b"MTRX");
    pub const MWET: Self = Self(*b"MWET");
    pub const ORIN: Self = Self(*b"ORIN");
    pub const ORIO: Self = Self(*b"ORIO");
    pub const SCEN: Self = Self(*b"SCEN");
    pub const SHUT: Self = Self(*b"SHUT");
    pub const SROT: Self = Self(*b"SROT");
    pub const UNIF: Self = Self(*b"UNIF");
    pub const WBAL: Self = Self(*b"WBAL");
    pub const WNDM: Self = Self(*b"WNDM");
    pub const WRGB: Self = Self(*b"WRGB");
    pub const YAVG: Self = Self(*b"YAVG");

    /// Zero padding read as a FourCC.
    pub const INVALID: Self = Self([0; 4]);

    pub const fn new(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Lossy string form. Undocumented FourCC are usually 7-bit ASCII,
    /// but nothing in the format guarantees it.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// `true` for the all-zero FourCC that padding decodes to.
    pub fn is_invalid(&self) -> bool {
        self == &Self::INVALID
    }

    /// `true` if every byte is an ASCII letter, digit or space.
    /// Used when looking for a plausible header to resume decoding at.
    pub fn is_plausible(&self) -> bool {
        self.0.iter().all(|b| b.is_ascii_alphanumeric() || *b == b' ')
            && self.0[0].is_ascii_alphabetic()
    }

    /// Keys that describe a stream block rather than carry its samples.
    /// Orientation and matrix records (`ORIN`, `ORIO`, `MTRX`) and the
    /// sensor temperature accompany the block's primary samples.
    pub fn is_stream_metadata(&self) -> bool {
        matches!(
            *self,
            Self::STNM
                | Self::RMRK
                | Self::SCAL
                | Self::SIUN
                | Self::UNIT
                | Self::TYPE
                | Self::TSMP
                | Self::TIMO
                | Self::EMPT
                | Self::STMP
                | Self::TICK
                | Self::TOCK
                | Self::TMPC
                | Self::ORIN
                | Self::ORIO
                | Self::MTRX
        )
    }

    /// Keys that frame device and stream blocks, or describe them.
    /// Never turned into streams.
    pub fn is_structural(&self) -> bool {
        matches!(*self, Self::DEVC | Self::DVID | Self::DVNM | Self::STRM)
            || self.is_stream_metadata()
    }

    /// Documented description for this FourCC, if any.
    pub fn describe(&self) -> Option<&'static Description> {
        CATALOGUE.iter().find(|d| &d.fourcc == self)
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl Debug for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for FourCC {
    type Err = GpmfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| GpmfError::InvalidFourCC(s.to_owned()))?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(value: [u8; 4]) -> Self {
        Self(value)
    }
}

/// Human readable description of a documented FourCC.
/// Descriptions follow the official GPMF documentation (<https://github.com/gopro/gpmf-parser>).
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub fourcc: FourCC,
    pub name: &'static str,
    pub units: Option<&'static str>,
    /// Values per sample, where the documentation is unambiguous.
    pub dimensionality: Option<usize>,
}

const fn entry(
    fourcc: FourCC,
    name: &'static str,
    units: Option<&'static str>,
    dimensionality: Option<usize>,
) -> Description {
    Description { fourcc, name, units, dimensionality }
}

static CATALOGUE: &[Description] = &[
    entry(FourCC::AALP, "Audio levels (RMS, peak)", Some("dBFS"), Some(2)),
    entry(FourCC::ACCL, "Accelerometer", Some("m/s²"), Some(3)),
    entry(FourCC::ALLD, "Auto low light frame duration", None, None),
    entry(FourCC::CORI, "Camera orientation", None, Some(4)),
    entry(FourCC::DISP, "Disparity track", None, None),
    entry(FourCC::FACE, "Face coordinates and details", None, None),
    entry(FourCC::FACS, "Face detection data", None, None),
    entry(FourCC::FCNM, "Faces counted per frame", None, None),
    entry(FourCC::GPS5, "GPS (lat, lon, alt, 2D speed, 3D speed)", Some("deg, deg, m, m/s, m/s"), Some(5)),
    entry(FourCC::GPS9, "GPS (lat, lon, alt, 2D, 3D, days, secs, DOP, fix)", Some("deg, deg, m, m/s, m/s, day, s, , "), Some(9)),
    entry(FourCC::GPSA, "GPS altitude reference", None, None),
    entry(FourCC::GPSF, "GPS fix", None, Some(1)),
    entry(FourCC::GPSP, "GPS dilution of precision (DOP x100)", None, Some(1)),
    entry(FourCC::GPSU, "GPS UTC time", None, None),
    entry(FourCC::GRAV, "Gravity vector", None, Some(3)),
    entry(FourCC::GYRO, "Gyroscope", Some("rad/s"), Some(3)),
    entry(FourCC::HUES, "Predominant hues", None, None),
    entry(FourCC::IORI, "Image orientation", None, Some(4)),
    entry(FourCC::ISOE, "Sensor ISO", None, Some(1)),
    entry(FourCC::ISOG, "Image sensor gain", None, Some(1)),
    entry(FourCC::LSKP, "Low resolution video frame skip", None, None),
    entry(FourCC::MAGN, "Magnetometer", Some("µT"), Some(3)),
    entry(FourCC::MSKP, "Main video frame skip", None, None),
    entry(FourCC::MTRX, "Sensor orientation matrix", None, Some(9)),
    entry(FourCC::MWET, "Microphone wet", None, None),
    entry(FourCC::ORIN, "Input orientation", None, None),
    entry(FourCC::ORIO, "Output orientation", None, None),
    entry(FourCC::SCEN, "Scene classification", None, None),
    entry(FourCC::SHUT, "Exposure time (shutter speed)", Some("s"), Some(1)),
    entry(FourCC::SROT, "Sensor read out time", Some("ms"), Some(1)),
    entry(FourCC::TMPC, "Sensor temperature", Some("°C"), Some(1)),
    entry(FourCC::UNIF, "Image uniformity", None, Some(1)),
    entry(FourCC::WBAL, "White balance temperature", Some("K"), Some(1)),
    entry(FourCC::WNDM, "Wind processing", None, None),
    entry(FourCC::WRGB, "White balance RGB gains", None, Some(3)),
    entry(FourCC::YAVG, "Luma (Y) average", None, Some(1)),
];
