//! Decode GoPro GPMF telemetry into named, scaled, axis-ordered,
//! timestamped sensor streams.
//!
//! Input is an ordered sequence of GPMF packets, e.g. the "GoPro MET"
//! track extracted from a GoPro MP4 with FFmpeg
//! (`ffmpeg -i GOPRO.MP4 -codec copy -map 0:3 -f rawvideo GOPRO.gpmf`).
//! Packets are decoded in parallel and folded in order into a
//! `TelemetryStore`, interpreted with the configuration of the
//! detected (or specified) camera model.
//!
//! ```rs
//! use gpmf_telemetry::{load, FourCC};
//! use std::path::Path;
//!
//! fn main() -> Result<(), gpmf_telemetry::GpmfError> {
//!     let store = load(Path::new("GOPRO.gpmf"), None)?;
//!     if let Some(accl) = store.get(&FourCC::ACCL) {
//!         println!("{}: {} samples", accl.human_name(), accl.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod errors;
pub mod export;
pub mod gpmf;
pub mod options;
pub mod source;
pub mod telemetry;

#[cfg(test)]
mod fixtures;

pub use device::{
    AxisPermutation, DecodeRule, DeviceConfig, DeviceHint, DeviceRegistry, DeviceSpec,
    StreamDescriptor,
};
pub use errors::{GpmfError, RegistryError, Warning};
pub use gpmf::{FourCC, Klv, KlvTree, Timestamp, Value};
pub use options::{LoadOptions, ScalePolicy};
pub use source::{Packet, PacketSource};
pub use telemetry::{
    DeviceIdentity, Sample, SampleValue, SensorStream, StreamKind, TelemetryStore,
};

/// Loads telemetry from `source`. `device_override` must name a known
/// device, otherwise the device is detected from the stream, falling
/// back to the newest known device.
pub fn load<S: PacketSource>(
    source: S,
    device_override: Option<&str>,
) -> Result<TelemetryStore, GpmfError> {
    let options = LoadOptions {
        device: device_override.map(String::from),
        ..LoadOptions::default()
    };
    load_with(source, &options)
}

/// Loads telemetry from `source` with the built-in device table.
pub fn load_with<S: PacketSource>(
    source: S,
    options: &LoadOptions,
) -> Result<TelemetryStore, GpmfError> {
    load_with_registry(source, options, DeviceRegistry::builtin()?)
}

/// Loads telemetry from `source` with a custom device table.
pub fn load_with_registry<S: PacketSource>(
    source: S,
    options: &LoadOptions,
    registry: &DeviceRegistry,
) -> Result<TelemetryStore, GpmfError> {
    let packets = source.packets()?;
    telemetry::assemble(&packets, options, registry)
}

/// Names of the built-in devices, oldest first.
pub fn list_known_devices() -> Vec<String> {
    match DeviceRegistry::builtin() {
        Ok(registry) => registry.names(),
        Err(err) => {
            tracing::error!("built-in device table is invalid: {err}");
            Vec::new()
        }
    }
}
