//! Built-in GoPro device table.
//!
//! Each entry lists only what the device adds on top of its parent.
//! `DeviceRegistry` flattens the chain once. Axis orders are data:
//! correcting a device means editing its entry, not the decoder.

use crate::FourCC;

/// How samples for an identifier are turned into values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DecodeRule {
    /// Divide by the sticky scale, then reorder axes.
    #[default]
    Scaled,
    /// Reorder axes, ignore any scale.
    Unscaled,
    /// Keep per-sample bytes as stored.
    Raw,
}

/// Stored component labels for an identifier, e.g. `["z", "x", "y"]`.
pub type AxisOrder = &'static [&'static str];

/// A single device declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSpec {
    /// Canonical name, e.g. `HERO9_BLACK`.
    pub name: &'static str,
    /// Name as written by the camera in `DVNM`, e.g. `Hero9 Black`.
    pub display_name: &'static str,
    pub inherits_from: Option<&'static str>,
    /// Other names the device is known by.
    pub aliases: &'static [&'static str],
    /// Firmware id prefixes, e.g. `HD9` for `HD9.01.01.60.00`.
    pub firmware_ids: &'static [&'static str],
    pub release_year: u16,
    /// Identifiers added by this device.
    pub identifiers: &'static [FourCC],
    pub axis_order: &'static [(FourCC, AxisOrder)],
    pub overrides: &'static [(FourCC, DecodeRule)],
    /// Nominal sample rates in Hz.
    pub rates: &'static [(FourCC, f64)],
}

impl DeviceSpec {
    /// Device with no additions. Use with struct update syntax.
    pub const fn base(name: &'static str, display_name: &'static str, release_year: u16) -> Self {
        Self {
            name,
            display_name,
            inherits_from: None,
            aliases: &[],
            firmware_ids: &[],
            release_year,
            identifiers: &[],
            axis_order: &[],
            overrides: &[],
            rates: &[],
        }
    }

    /// Device that inherits everything from `parent`.
    pub const fn child(
        name: &'static str,
        display_name: &'static str,
        release_year: u16,
        parent: &'static str,
    ) -> Self {
        let mut spec = Self::base(name, display_name, release_year);
        spec.inherits_from = Some(parent);
        spec
    }
}

const XYZ: AxisOrder = &["x", "y", "z"];
const ZXY: AxisOrder = &["z", "x", "y"];
const WXYZ: AxisOrder = &["w", "x", "y", "z"];

/// Built-in devices, oldest first.
pub static BUILTIN_DEVICES: &[DeviceSpec] = &[
    DeviceSpec {
        // Hero5 Black identifies itself as "Camera".
        aliases: &["HERO5", "H5", "Camera"],
        firmware_ids: &["HD5"],
        identifiers: &[
            FourCC::DEVC, FourCC::DVID, FourCC::DVNM, FourCC::STRM,
            FourCC::STNM, FourCC::RMRK, FourCC::SCAL, FourCC::SIUN,
            FourCC::UNIT, FourCC::TYPE, FourCC::TSMP, FourCC::TIMO,
            FourCC::EMPT, FourCC::STMP, FourCC::TMPC,
            FourCC::ACCL, FourCC::GYRO, FourCC::MAGN,
            FourCC::GPS5, FourCC::GPSU, FourCC::GPSF, FourCC::GPSP,
            FourCC::SHUT, FourCC::WBAL, FourCC::WRGB, FourCC::ISOE,
            FourCC::ISOG,
        ],
        axis_order: &[
            (FourCC::ACCL, ZXY),
            (FourCC::GYRO, ZXY),
            (FourCC::MAGN, ZXY),
            (FourCC::GPS5, &["lat", "lon", "alt", "speed_2d", "speed_3d"]),
            (FourCC::WRGB, &["r", "g", "b"]),
        ],
        rates: &[
            (FourCC::ACCL, 200.0),
            (FourCC::GYRO, 400.0),
            (FourCC::MAGN, 24.0),
            (FourCC::GPS5, 18.0),
            (FourCC::GPSU, 1.0),
            (FourCC::GPSF, 1.0),
            (FourCC::GPSP, 1.0),
        ],
        ..DeviceSpec::base("HERO5_BLACK", "Hero5 Black", 2016)
    },
    DeviceSpec {
        aliases: &["HERO5 Session"],
        ..DeviceSpec::child("HERO5_SESSION", "Hero5 Session", 2016, "HERO5_BLACK")
    },
    DeviceSpec {
        aliases: &["HERO6", "H6"],
        firmware_ids: &["HD6"],
        identifiers: &[FourCC::FACE, FourCC::FCNM, FourCC::ALLD],
        overrides: &[(FourCC::FACE, DecodeRule::Raw)],
        rates: &[(FourCC::GYRO, 200.0), (FourCC::FACE, 30.0)],
        ..DeviceSpec::child("HERO6_BLACK", "Hero6 Black", 2017, "HERO5_BLACK")
    },
    DeviceSpec {
        aliases: &["HERO7", "H7"],
        firmware_ids: &["HD7"],
        identifiers: &[
            FourCC::YAVG, FourCC::HUES, FourCC::UNIF, FourCC::SCEN,
            FourCC::SROT, FourCC::ORIN, FourCC::ORIO, FourCC::MTRX,
        ],
        overrides: &[(FourCC::SCEN, DecodeRule::Raw)],
        ..DeviceSpec::child("HERO7_BLACK", "Hero7 Black", 2018, "HERO6_BLACK")
    },
    DeviceSpec {
        aliases: &["HERO8", "H8"],
        firmware_ids: &["HD8"],
        identifiers: &[
            FourCC::CORI, FourCC::IORI, FourCC::GRAV, FourCC::WNDM,
            FourCC::MWET, FourCC::AALP,
        ],
        axis_order: &[
            (FourCC::CORI, WXYZ),
            (FourCC::IORI, WXYZ),
            (FourCC::GRAV, XYZ),
            (FourCC::AALP, &["rms", "peak"]),
        ],
        rates: &[
            (FourCC::AALP, 10.0),
            (FourCC::WNDM, 10.0),
            (FourCC::MWET, 10.0),
        ],
        ..DeviceSpec::child("HERO8_BLACK", "Hero8 Black", 2019, "HERO7_BLACK")
    },
    DeviceSpec {
        aliases: &["HERO9", "H9"],
        firmware_ids: &["HD9", "H20"],
        identifiers: &[FourCC::GPS9, FourCC::GPSA, FourCC::MSKP, FourCC::LSKP],
        axis_order: &[(
            FourCC::GPS9,
            &["lat", "lon", "alt", "speed_2d", "speed_3d", "days", "secs", "dop", "fix"],
        )],
        rates: &[(FourCC::GPS9, 10.0)],
        ..DeviceSpec::child("HERO9_BLACK", "Hero9 Black", 2020, "HERO8_BLACK")
    },
    DeviceSpec {
        aliases: &["HERO10", "H10"],
        firmware_ids: &["H21"],
        identifiers: &[FourCC::FACS],
        overrides: &[(FourCC::FACS, DecodeRule::Raw)],
        ..DeviceSpec::child("HERO10_BLACK", "Hero10 Black", 2021, "HERO9_BLACK")
    },
    DeviceSpec {
        aliases: &["HERO11", "H11"],
        firmware_ids: &["H22"],
        ..DeviceSpec::child("HERO11_BLACK", "Hero11 Black", 2022, "HERO10_BLACK")
    },
    DeviceSpec {
        aliases: &["HERO12", "H12"],
        firmware_ids: &["H23"],
        ..DeviceSpec::child("HERO12_BLACK", "Hero12 Black", 2023, "HERO11_BLACK")
    },
    DeviceSpec {
        aliases: &["HERO13", "H13"],
        firmware_ids: &["H24"],
        ..DeviceSpec::child("HERO13_BLACK", "Hero13 Black", 2024, "HERO12_BLACK")
    },
];
