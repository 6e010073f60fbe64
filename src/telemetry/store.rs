//! Immutable result of a load.

use crate::{device::DeviceConfig, errors::Warning, FourCC};

use super::SensorStream;

/// Device the streams were interpreted with, and what the stream said about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Resolved device, e.g. `HERO9_BLACK`.
    pub name: String,
    /// Device name found in the stream (`DVNM`).
    pub observed_name: Option<String>,
    /// Device id found in the stream (`DVID`).
    pub observed_id: Option<u32>,
    /// `true` if the observed identity matched nothing and the newest
    /// known device was used instead.
    pub fallback: bool,
}

/// Streams keyed by identifier, in order of first appearance.
/// Read only: filtering returns a new store.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryStore {
    identity: DeviceIdentity,
    device: DeviceConfig,
    streams: Vec<SensorStream>,
    warnings: Vec<Warning>,
    packets: usize,
    fingerprint: Option<blake3::Hash>,
}

impl TelemetryStore {
    pub(crate) fn new(
        identity: DeviceIdentity,
        device: DeviceConfig,
        streams: Vec<SensorStream>,
        warnings: Vec<Warning>,
        packets: usize,
        fingerprint: Option<blake3::Hash>,
    ) -> Self {
        Self { identity, device, streams, warnings, packets, fingerprint }
    }

    /// Identifiers, in order of first appearance.
    pub fn streams(&self) -> Vec<FourCC> {
        self.streams.iter().map(|s| s.identifier).collect()
    }

    pub fn get(&self, identifier: &FourCC) -> Option<&SensorStream> {
        self.streams.iter().find(|s| &s.identifier == identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorStream> {
        self.streams.iter()
    }

    pub fn device_identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Resolved device name.
    pub fn device_name(&self) -> &str {
        &self.identity.name
    }

    /// Effective configuration the streams were interpreted with.
    pub fn device_config(&self) -> &DeviceConfig {
        &self.device
    }

    /// Recoverable problems, in the order they were found.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Number of packets assembled.
    pub fn packets(&self) -> usize {
        self.packets
    }

    /// Blake3 hash of the first packet. Identical for recordings that
    /// share their telemetry, e.g. high and low resolution clips.
    pub fn fingerprint(&self) -> Option<&blake3::Hash> {
        self.fingerprint.as_ref()
    }

    pub fn fingerprint_hex(&self) -> Option<String> {
        self.fingerprint.map(|h| h.to_hex().to_string())
    }

    /// Number of streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Copy holding only the streams in `identifiers`.
    pub fn retain(&self, identifiers: &[FourCC]) -> Self {
        Self {
            streams: self
                .streams
                .iter()
                .filter(|s| identifiers.contains(&s.identifier))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }
}
