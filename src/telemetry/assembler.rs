//! Ordered fold of decoded packets into sensor streams.
//!
//! Packets are decoded in parallel, then pushed here one at a time in
//! file order: the sticky scale and timestamp continuity depend on it.
//! Within a stream block (`STRM`) a scale (`SCAL`) applies to every
//! following value record until replaced or the block ends.

use std::collections::{HashMap, HashSet};

use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use time::Duration;

use crate::{
    device::{DecodeRule, DeviceConfig, DeviceHint, DeviceRegistry},
    errors::Warning,
    gpmf::{decode, Klv, KlvTree, Number, Timestamp, TypeCode, Value},
    options::{LoadOptions, ScalePolicy},
    source::Packet,
    FourCC, GpmfError,
};

use super::{DeviceIdentity, Sample, SampleValue, SensorStream, StreamKind, TelemetryStore};

/// Per-block metadata read before the values.
#[derive(Debug, Default)]
struct BlockHints {
    name: Option<String>,
    units: Option<String>,
    /// Total samples delivered since record start (`TSMP`).
    total: Option<u64>,
    /// Block start in microseconds (`STMP`).
    stmp: Option<u64>,
    /// Data delay in seconds (`TIMO`).
    timo: Option<f64>,
}

impl BlockHints {
    fn new(block: &Klv) -> Self {
        let mut hints = Self::default();
        for record in block.children().iter() {
            match record.fourcc() {
                FourCC::STNM => hints.name = text(&record.value),
                FourCC::SIUN => hints.units = text(&record.value),
                FourCC::UNIT => {
                    if hints.units.is_none() {
                        hints.units = text(&record.value)
                    }
                }
                FourCC::TSMP => hints.total = record.value.first_number().and_then(unsigned),
                FourCC::STMP => hints.stmp = record.value.first_number().and_then(unsigned),
                FourCC::TIMO => hints.timo = record.value.first_number().map(|n| n.as_f64()),
                _ => (),
            }
        }
        hints
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Text(strings) if !strings.is_empty() => Some(strings.join(", ")),
        _ => None,
    }
}

fn unsigned(number: Number) -> Option<u64> {
    match number {
        Number::UInt(n) => Some(n),
        Number::Int(n) => u64::try_from(n).ok(),
        Number::Float(n) if n >= 0.0 => Some(n as u64),
        Number::Float(_) => None,
    }
}

/// Per-sample payload bytes, as stored.
fn raw_samples(record: &Klv) -> Vec<SampleValue> {
    if record.header.size <= 1 && record.header.type_code() == TypeCode::Ascii {
        // A single string
        return vec![SampleValue::Raw(record.raw.to_owned())];
    }
    record
        .sample_bytes()
        .map(|bytes| SampleValue::Raw(bytes.to_vec()))
        .collect()
}

/// Divides by a scalar or per-component scale. `None` if the scale
/// length is neither 1 nor `width`. A zero divisor leaves the value as is.
fn apply_scale(samples: Vec<Vec<f64>>, scale: &[f64], width: usize) -> Option<Vec<Vec<f64>>> {
    if scale.len() != 1 && scale.len() != width {
        return None;
    }
    let divisor = |i: usize| {
        let d = if scale.len() == 1 { scale[0] } else { scale[i] };
        if d == 0.0 { 1.0 } else { d }
    };
    Some(
        samples
            .into_iter()
            .map(|sample| {
                sample
                    .iter()
                    .enumerate()
                    .map(|(i, v)| v / divisor(i))
                    .collect()
            })
            .collect(),
    )
}

/// Device name (`DVNM`) and id (`DVID`) from the first device block in `tree`.
/// `None` if the packet holds no device block.
pub fn identify(tree: &KlvTree) -> Option<(Option<String>, Option<u32>)> {
    let device = tree.devices().next()?;
    let name = device
        .find(&FourCC::DVNM)
        .and_then(|k| k.value.first_text())
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());
    let id = device
        .find(&FourCC::DVID)
        .and_then(|k| k.value.first_number())
        .and_then(unsigned)
        .and_then(|n| u32::try_from(n).ok());
    Some((name, id))
}

/// Stateful, single-threaded fold over decoded packets.
#[derive(Debug)]
pub struct Assembler<'a> {
    device: &'a DeviceConfig,
    identity: DeviceIdentity,
    policy: ScalePolicy,
    streams: Vec<SensorStream>,
    index: HashMap<FourCC, usize>,
    warnings: Vec<Warning>,
    unrecognized: HashSet<FourCC>,
    /// Persistent scales, keyed by the value identifier they applied to.
    scales: HashMap<FourCC, Vec<f64>>,
    /// First `STMP` per identifier and the packet time it is anchored to.
    anchors: HashMap<FourCC, (u64, Duration)>,
    packets: usize,
    fingerprint: Option<blake3::Hash>,
}

impl<'a> Assembler<'a> {
    /// New assembler interpreting streams with `device`.
    /// A fallback identity is recorded as a warning.
    pub fn new(device: &'a DeviceConfig, identity: DeviceIdentity, policy: ScalePolicy) -> Self {
        let mut assembler = Self {
            device,
            identity,
            policy,
            streams: Vec::new(),
            index: HashMap::new(),
            warnings: Vec::new(),
            unrecognized: HashSet::new(),
            scales: HashMap::new(),
            anchors: HashMap::new(),
            packets: 0,
            fingerprint: None,
        };
        if assembler.identity.fallback {
            assembler.warn(Warning::DeviceFallback {
                observed: assembler.identity.observed_name.clone(),
                fallback: device.name.to_owned(),
            });
        }
        assembler
    }

    pub fn set_fingerprint(&mut self, fingerprint: blake3::Hash) {
        self.fingerprint = Some(fingerprint);
    }

    /// Packets pushed so far.
    pub fn packets(&self) -> usize {
        self.packets
    }

    fn warn(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Adds a decoded packet. Must be called in packet order.
    pub fn push(&mut self, tree: &KlvTree, timestamp: &Timestamp) {
        let packet = self.packets;
        for record in tree.malformed.iter() {
            self.warn(Warning::MalformedRecord {
                packet,
                record: record.to_owned(),
            });
        }

        for device in tree.devices() {
            for record in device.children().iter() {
                match record.fourcc() {
                    FourCC::STRM if record.is_container() => self.stream_block(record, timestamp),
                    fourcc if record.is_container() => {
                        self.warn(Warning::UnexpectedContainer { fourcc })
                    }
                    _ => (),
                }
            }
        }

        tracing::trace!(
            "packet {packet} at {} ms: {} records, {} malformed",
            timestamp.relative_ms(),
            tree.len(),
            tree.malformed.len()
        );
        self.packets += 1;
    }

    fn stream_block(&mut self, block: &Klv, timestamp: &Timestamp) {
        let hints = BlockHints::new(block);
        // Scale declared earlier in this block
        let mut scale: Option<Vec<f64>> = None;

        let mut decoded: Vec<(FourCC, Vec<SampleValue>)> = Vec::new();

        for record in block.children().iter() {
            let fourcc = record.fourcc();
            if record.is_container() {
                self.warn(Warning::UnexpectedContainer { fourcc });
                continue;
            }
            if fourcc == FourCC::SCAL {
                scale = record.value.to_f64().filter(|s| !s.is_empty());
                continue;
            }
            // Malformed records are reported from the tree
            if fourcc.is_structural() || record.is_malformed() {
                continue;
            }

            let persisted = match (self.policy, &scale) {
                (ScalePolicy::Persistent, Some(current)) => {
                    self.scales.insert(fourcc, current.to_owned());
                    None
                }
                (ScalePolicy::Persistent, None) => self.scales.get(&fourcc).cloned(),
                (ScalePolicy::PerBlock, _) => None,
            };

            let values = self.interpret(record, scale.as_deref().or(persisted.as_deref()));
            match decoded.iter_mut().find(|(f, _)| *f == fourcc) {
                Some((_, v)) => v.extend(values),
                None => decoded.push((fourcc, values)),
            }
        }

        for (fourcc, values) in decoded.into_iter() {
            let times = self.sample_times(fourcc, values.len(), &hints, timestamp);
            let Some(stream) = self.index.get(&fourcc).map(|i| &mut self.streams[*i]) else {
                continue;
            };
            if stream.name.is_none() {
                stream.name = hints.name.to_owned();
            }
            if stream.units.is_none() {
                stream.units = hints.units.to_owned();
            }
            if hints.total.is_some() {
                stream.reported_total = hints.total;
            }

            let mut last = stream.last_timestamp().unwrap_or(Duration::ZERO);
            for (time, value) in times.into_iter().zip(values) {
                // Non-decreasing, never before recording start
                let timestamp = time.max(last);
                last = timestamp;
                stream.samples.push(Sample { timestamp, value });
            }
        }
    }

    /// Decodes one value record into samples, creating its stream if needed.
    fn interpret(&mut self, record: &Klv, scale: Option<&[f64]>) -> Vec<SampleValue> {
        let device = self.device;
        let fourcc = record.fourcc();

        // No samples, nothing to say about the stream's shape
        if record.raw.is_empty() {
            return Vec::new();
        }

        if !device.supports(&fourcc) {
            if self.unrecognized.insert(fourcc) {
                self.warn(Warning::UnrecognizedStream { fourcc });
            }
            self.accept(fourcc, StreamKind::Raw, None);
            return raw_samples(record);
        }

        let rule = device.rule(&fourcc);
        if rule == DecodeRule::Raw {
            self.accept(fourcc, StreamKind::Raw, None);
            return raw_samples(record);
        }

        match &record.value {
            Value::Scalar(_) | Value::Vector(_) => {
                let width = record.value.width().unwrap_or(1);
                let Some(samples) = record.value.to_vec_f64() else {
                    return raw_samples(record);
                };
                let samples = match (rule, scale) {
                    (DecodeRule::Scaled, Some(scale)) => {
                        match apply_scale(samples, scale, width) {
                            Some(scaled) => scaled,
                            None => {
                                self.to_raw(fourcc, width, scale.len());
                                return raw_samples(record);
                            }
                        }
                    }
                    _ => samples,
                };

                if !self.accept(fourcc, StreamKind::Numeric, Some(width)) {
                    return raw_samples(record);
                }

                let permutation = device
                    .descriptor(&fourcc)
                    .and_then(|d| d.axis_permutation.as_ref());
                samples
                    .into_iter()
                    .map(|sample| {
                        let sample = match permutation {
                            Some(p) => p.apply(&sample).unwrap_or(sample),
                            None => sample,
                        };
                        SampleValue::Numeric(sample)
                    })
                    .collect()
            }
            Value::Text(strings) => {
                if !self.accept(fourcc, StreamKind::Text, None) {
                    return raw_samples(record);
                }
                strings.iter().map(|s| SampleValue::Text(s.to_owned())).collect()
            }
            _ => {
                self.accept(fourcc, StreamKind::Raw, None);
                raw_samples(record)
            }
        }
    }

    /// Index of the stream for `fourcc`, created with `kind` if new.
    fn stream_index(&mut self, fourcc: FourCC, kind: StreamKind, width: Option<usize>) -> usize {
        if let Some(i) = self.index.get(&fourcc) {
            return *i;
        }
        let descriptor = self.device.descriptor(&fourcc).cloned();
        let mut stream = SensorStream::new(fourcc, kind, descriptor);
        if kind == StreamKind::Numeric {
            stream.dimensionality = stream
                .descriptor
                .as_ref()
                .and_then(|d| d.dimensionality)
                .or(width);
        }
        self.streams.push(stream);
        self.index.insert(fourcc, self.streams.len() - 1);
        self.streams.len() - 1
    }

    /// `true` if samples of `kind` and `width` can be stored as interpreted.
    /// A stream whose kind or width changes becomes raw, with a warning.
    fn accept(&mut self, fourcc: FourCC, kind: StreamKind, width: Option<usize>) -> bool {
        let i = self.stream_index(fourcc, kind, width);
        let stream = &self.streams[i];
        if stream.kind == StreamKind::Raw {
            return false;
        }
        if stream.kind == kind && (kind != StreamKind::Numeric || stream.dimensionality == width) {
            return true;
        }
        let expected = stream.dimensionality.unwrap_or(0);
        self.to_raw(fourcc, expected, width.unwrap_or(0));
        false
    }

    /// Turns the stream for `fourcc` raw. Earlier samples are kept.
    fn to_raw(&mut self, fourcc: FourCC, expected: usize, found: usize) {
        let existing = self.index.get(&fourcc).map(|i| self.streams[*i].kind);
        if existing == Some(StreamKind::Raw) {
            return;
        }
        let i = self.stream_index(fourcc, StreamKind::Raw, None);
        self.streams[i].kind = StreamKind::Raw;
        self.warn(Warning::UnsupportedStreamShape { fourcc, expected, found });
    }

    /// Sample times for `count` samples in a block. A `STMP` start time is
    /// interpolated to the packet end, otherwise samples are spaced at the
    /// nominal rate, else uniformly over the packet. `TIMO` shifts the block earlier.
    fn sample_times(
        &mut self,
        fourcc: FourCC,
        count: usize,
        hints: &BlockHints,
        timestamp: &Timestamp,
    ) -> Vec<Duration> {
        if count == 0 {
            return Vec::new();
        }
        let n = count as u32;

        let nominal = self
            .device
            .nominal_rate(&fourcc)
            .filter(|rate| *rate > 0.0)
            .and_then(|rate| Duration::checked_seconds_f64(rate.recip()))
            .unwrap_or(timestamp.duration / n);

        let (start, step) = match hints.stmp {
            Some(stmp) => {
                let (anchor, anchor_time) = *self
                    .anchors
                    .entry(fourcc)
                    .or_insert((stmp, timestamp.relative));
                let elapsed = (stmp as i64).saturating_sub(anchor as i64);
                let start = anchor_time + Duration::microseconds(elapsed);
                let end = timestamp.end();
                let step = if end > start { (end - start) / n } else { nominal };
                (start, step)
            }
            None => (timestamp.relative, nominal),
        };

        // Offsets beyond a day are ignored
        let offset = hints
            .timo
            .filter(|t| t.is_finite() && t.abs() < 86_400.0)
            .map(Duration::seconds_f64)
            .unwrap_or(Duration::ZERO);

        (0..n).map(|i| start - offset + step * i).collect()
    }

    /// Store holding what has been assembled so far.
    pub fn checkpoint(&self) -> TelemetryStore {
        TelemetryStore::new(
            self.identity.to_owned(),
            self.device.to_owned(),
            self.streams.to_owned(),
            self.warnings.to_owned(),
            self.packets,
            self.fingerprint,
        )
    }

    pub fn finish(self) -> TelemetryStore {
        tracing::debug!(
            "assembled {} streams from {} packets, {} warnings",
            self.streams.len(),
            self.packets,
            self.warnings.len()
        );
        TelemetryStore::new(
            self.identity,
            self.device.to_owned(),
            self.streams,
            self.warnings,
            self.packets,
            self.fingerprint,
        )
    }
}

/// Packet timestamps. Relative time is cumulative, packets without
/// a duration last `default`.
pub fn timeline(packets: &[Packet], default: Duration) -> Vec<Timestamp> {
    let mut relative = Duration::ZERO;
    packets
        .iter()
        .map(|packet| {
            let duration = packet.duration.unwrap_or(default);
            let timestamp = Timestamp { relative, duration };
            relative += duration;
            timestamp
        })
        .collect()
}

/// Decodes packets in parallel, preserving order.
fn decode_all(packets: &[Packet], progress: bool) -> Vec<KlvTree> {
    if progress {
        let bar = ProgressBar::new(packets.len() as u64);
        packets
            .par_iter()
            .progress_with(bar)
            .map(|p| decode(&p.bytes))
            .collect()
    } else {
        packets.par_iter().map(|p| decode(&p.bytes)).collect()
    }
}

/// Decodes and assembles `packets` into a store.
pub fn assemble(
    packets: &[Packet],
    options: &LoadOptions,
    registry: &DeviceRegistry,
) -> Result<TelemetryStore, GpmfError> {
    if packets.is_empty() {
        return Err(GpmfError::NoMetadata);
    }

    let trees = decode_all(packets, options.progress);
    let timestamps = timeline(packets, options.packet_duration);

    tracing::debug!(
        "decoded {} packets, {} malformed records",
        trees.len(),
        trees.iter().map(|t| t.malformed.len()).sum::<usize>()
    );

    let (observed_name, observed_id) = trees
        .iter()
        .find_map(identify)
        .ok_or(GpmfError::NoMetadata)?;

    let hint = match (&observed_name, observed_id) {
        (Some(name), _) => Some(DeviceHint::Name(name.to_owned())),
        (None, Some(id)) => Some(DeviceHint::Id(id)),
        (None, None) => None,
    };
    let resolution = registry.resolve(options.device.as_deref(), hint.as_ref())?;

    let identity = DeviceIdentity {
        name: resolution.config.name.to_owned(),
        observed_name,
        observed_id,
        fallback: resolution.fallback,
    };

    let mut assembler = Assembler::new(resolution.config, identity, options.scale_policy);
    if let Some(first) = packets.first() {
        assembler.set_fingerprint(blake3::hash(&first.bytes));
    }

    for (tree, timestamp) in trees.iter().zip(timestamps.iter()) {
        if options.is_cancelled() {
            tracing::info!("load cancelled after {} packets", assembler.packets());
            return Err(GpmfError::Cancelled {
                packets: assembler.packets(),
                partial: Box::new(assembler.checkpoint()),
            });
        }
        assembler.push(tree, timestamp);
    }

    Ok(assembler.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{device::DeviceSpec, fixtures::*};

    fn registry() -> &'static DeviceRegistry {
        DeviceRegistry::builtin().unwrap()
    }

    fn assembler_for(config: &DeviceConfig, policy: ScalePolicy) -> Assembler<'_> {
        let identity = DeviceIdentity {
            name: config.name.to_owned(),
            observed_name: None,
            observed_id: None,
            fallback: false,
        };
        Assembler::new(config, identity, policy)
    }

    fn assembler(device: &str) -> Assembler<'static> {
        assembler_for(registry().get(device).unwrap(), ScalePolicy::PerBlock)
    }

    fn accl_block(scale: i16, samples: &[i16]) -> Vec<u8> {
        nested(b"STRM", &[
            leaf(b"SCAL", b's', 2, 1, &i16s(&[scale])),
            leaf(b"ACCL", b's', 6, (samples.len() / 3) as u16, &i16s(samples)),
        ])
    }

    fn packet(streams: &[Vec<u8>]) -> KlvTree {
        decode(&device("Hero9 Black", streams))
    }

    #[test]
    fn scaled_and_reordered() {
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[accl_block(418, &[1254, -527, 209])]), &Timestamp::new(0, 1000));
        let store = asm.finish();
        let accl = store.get(&FourCC::ACCL).unwrap();
        let values = accl.values();
        assert_eq!(values.len(), 1);
        // Stored z, x, y
        let expected = [-527.0 / 418.0, 209.0 / 418.0, 1254.0 / 418.0];
        for (v, e) in values[0].iter().zip(expected) {
            assert!((v - e).abs() < 1e-9);
        }
        assert_eq!(accl.columns(), vec!["x", "y", "z"]);
        assert!(store.warnings().is_empty());
    }

    #[test]
    fn vector_scale() {
        let block = nested(b"STRM", &[
            leaf(b"SCAL", b'l', 4, 5, &i32s(&[10_000_000, 10_000_000, 1000, 1000, 100])),
            leaf(b"GPS5", b'l', 20, 1, &i32s(&[593_000_000, 180_000_000, 52_000, 1_500, 1_600])),
        ]);
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[block]), &Timestamp::new(0, 1000));
        let store = asm.finish();
        let gps = store.get(&FourCC::GPS5).unwrap();
        assert_eq!(gps.values()[0], &[59.3, 18.0, 52.0, 1.5, 16.0]);
    }

    #[test]
    fn scale_resets_per_block() {
        let unscaled = nested(b"STRM", &[leaf(b"ACCL", b's', 6, 1, &i16s(&[30, 10, 20]))]);
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[accl_block(10, &[30, 10, 20])]), &Timestamp::new(0, 1000));
        asm.push(&packet(&[unscaled.clone()]), &Timestamp::new(1000, 1000));
        let store = asm.finish();
        let values = store.get(&FourCC::ACCL).unwrap().values();
        assert_eq!(values[0], &[1.0, 2.0, 3.0]);
        assert_eq!(values[1], &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn persistent_scale() {
        let unscaled = nested(b"STRM", &[leaf(b"ACCL", b's', 6, 1, &i16s(&[30, 10, 20]))]);
        let mut asm = assembler_for(registry().get("HERO9_BLACK").unwrap(), ScalePolicy::Persistent);
        asm.push(&packet(&[accl_block(10, &[30, 10, 20])]), &Timestamp::new(0, 1000));
        asm.push(&packet(&[unscaled]), &Timestamp::new(1000, 1000));
        let store = asm.finish();
        let values = store.get(&FourCC::ACCL).unwrap().values();
        assert_eq!(values[1], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn persistent_scale_per_identifier() {
        // Real blocks lead with a temperature before the sensor samples
        let block = |fourcc: &[u8; 4], scale: Option<i16>, samples: &[i16]| {
            let mut records = vec![leaf(b"TMPC", b'f', 4, 1, &f32s(&[41.5]))];
            if let Some(scale) = scale {
                records.push(leaf(b"SCAL", b's', 2, 1, &i16s(&[scale])));
            }
            records.push(leaf(fourcc, b's', 6, 1, &i16s(samples)));
            nested(b"STRM", &records)
        };
        let mut asm = assembler_for(registry().get("HERO9_BLACK").unwrap(), ScalePolicy::Persistent);
        let scaled = packet(&[
            block(b"ACCL", Some(10), &[20, 30, 10]),
            block(b"GYRO", Some(1000), &[2000, 3000, 1000]),
        ]);
        let unscaled = packet(&[
            block(b"ACCL", None, &[20, 30, 10]),
            block(b"GYRO", None, &[2000, 3000, 1000]),
        ]);
        asm.push(&scaled, &Timestamp::new(0, 1000));
        asm.push(&unscaled, &Timestamp::new(1000, 1000));
        let store = asm.finish();
        let accl = store.get(&FourCC::ACCL).unwrap().values();
        assert_eq!(accl, vec![&[3.0, 1.0, 2.0][..], &[3.0, 1.0, 2.0][..]]);
        let gyro = store.get(&FourCC::GYRO).unwrap().values();
        assert_eq!(gyro, vec![&[3.0, 1.0, 2.0][..], &[3.0, 1.0, 2.0][..]]);
    }

    #[test]
    fn empty_record_adds_nothing() {
        let empty = nested(b"STRM", &[leaf(b"ACCL", b's', 6, 0, &[])]);

        // First occurrence
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[empty.clone()]), &Timestamp::new(0, 1000));
        asm.push(&packet(&[accl_block(10, &[30, 10, 20])]), &Timestamp::new(1000, 1000));
        let store = asm.finish();
        let accl = store.get(&FourCC::ACCL).unwrap();
        assert_eq!(accl.kind, StreamKind::Numeric);
        assert_eq!(accl.values(), vec![&[1.0, 2.0, 3.0][..]]);
        assert!(store.warnings().is_empty());

        // Between regular blocks
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[accl_block(10, &[30, 10, 20])]), &Timestamp::new(0, 1000));
        asm.push(&packet(&[empty]), &Timestamp::new(1000, 1000));
        asm.push(&packet(&[accl_block(10, &[30, 10, 20])]), &Timestamp::new(2000, 1000));
        let store = asm.finish();
        let accl = store.get(&FourCC::ACCL).unwrap();
        assert_eq!(accl.kind, StreamKind::Numeric);
        assert_eq!(accl.len(), 2);
        assert!(store.warnings().is_empty());
    }

    #[test]
    fn block_metadata_is_not_a_stream() {
        let block = |fourcc: &[u8; 4]| {
            nested(b"STRM", &[
                leaf(b"ORIN", b'c', 1, 3, b"ZXY"),
                leaf(b"SCAL", b's', 2, 1, &i16s(&[10])),
                leaf(b"TMPC", b'f', 4, 1, &f32s(&[41.5])),
                leaf(fourcc, b's', 6, 1, &i16s(&[30, 10, 20])),
            ])
        };
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[block(b"ACCL"), block(b"GYRO")]), &Timestamp::new(0, 1000));
        let store = asm.finish();
        assert_eq!(store.streams(), vec![FourCC::ACCL, FourCC::GYRO]);
        assert_eq!(store.get(&FourCC::GYRO).unwrap().len(), 1);
        assert!(store.warnings().is_empty());
    }

    #[test]
    fn unscaled_rule_ignores_scale() {
        let specs = [DeviceSpec {
            identifiers: &[FourCC::ACCL],
            axis_order: &[(FourCC::ACCL, &["z", "x", "y"])],
            overrides: &[(FourCC::ACCL, DecodeRule::Unscaled)],
            ..DeviceSpec::base("PLAIN", "Plain", 2020)
        }];
        let registry = DeviceRegistry::new(&specs).unwrap();
        let mut asm = assembler_for(registry.get("PLAIN").unwrap(), ScalePolicy::PerBlock);
        asm.push(&packet(&[accl_block(10, &[30, 10, 20])]), &Timestamp::new(0, 1000));
        let store = asm.finish();
        assert_eq!(store.get(&FourCC::ACCL).unwrap().values(), vec![&[10.0, 20.0, 30.0][..]]);
    }

    #[test]
    fn shape_change_becomes_raw() {
        let two_wide = nested(b"STRM", &[leaf(b"ACCL", b's', 4, 1, &i16s(&[1, 2]))]);
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[accl_block(1, &[3, 1, 2])]), &Timestamp::new(0, 1000));
        asm.push(&packet(&[two_wide]), &Timestamp::new(1000, 1000));
        let store = asm.finish();
        let accl = store.get(&FourCC::ACCL).unwrap();
        assert!(accl.is_raw());
        assert_eq!(accl.len(), 2);
        assert_eq!(accl.samples[1].value, SampleValue::Raw(vec![0, 1, 0, 2]));
        assert_eq!(
            store.warnings(),
            &[Warning::UnsupportedStreamShape { fourcc: FourCC::ACCL, expected: 3, found: 2 }]
        );
    }

    #[test]
    fn mismatched_scale_becomes_raw() {
        let block = nested(b"STRM", &[
            leaf(b"SCAL", b's', 2, 2, &i16s(&[1, 2])),
            leaf(b"ACCL", b's', 6, 1, &i16s(&[1, 2, 3])),
        ]);
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[block]), &Timestamp::new(0, 1000));
        let store = asm.finish();
        assert!(store.get(&FourCC::ACCL).unwrap().is_raw());
        assert_eq!(
            store.warnings(),
            &[Warning::UnsupportedStreamShape { fourcc: FourCC::ACCL, expected: 3, found: 2 }]
        );
    }

    #[test]
    fn unrecognized_identifier_is_raw() {
        let block = nested(b"STRM", &[leaf(b"XYZZ", b'S', 2, 2, &u16s(&[7, 8]))]);
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[block.clone()]), &Timestamp::new(0, 1000));
        asm.push(&packet(&[block]), &Timestamp::new(1000, 1000));
        let store = asm.finish();
        let xyzz = store.get(&FourCC::new(b"XYZZ")).unwrap();
        assert!(xyzz.is_raw());
        assert_eq!(xyzz.len(), 4);
        assert_eq!(xyzz.samples[0].value, SampleValue::Raw(vec![0, 7]));
        // Once per identifier
        assert_eq!(
            store.warnings(),
            &[Warning::UnrecognizedStream { fourcc: FourCC::new(b"XYZZ") }]
        );
    }

    #[test]
    fn raw_rule_without_warning() {
        let block = nested(b"STRM", &[leaf(b"FACE", b'B', 4, 1, &[1, 2, 3, 4])]);
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[block]), &Timestamp::new(0, 1000));
        let store = asm.finish();
        assert!(store.get(&FourCC::FACE).unwrap().is_raw());
        assert!(store.warnings().is_empty());
    }

    #[test]
    fn text_and_metadata() {
        let block = nested(b"STRM", &[
            leaf(b"STNM", b'c', 1, 9, b"GPS (UTC)"),
            leaf(b"TSMP", b'L', 4, 1, &u32s(&[42])),
            leaf(b"GPSU", b'U', 16, 1, b"230415123005.250"),
        ]);
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[block]), &Timestamp::new(0, 1000));
        let store = asm.finish();
        let gpsu = store.get(&FourCC::GPSU).unwrap();
        assert_eq!(gpsu.kind, StreamKind::Text);
        assert_eq!(gpsu.name.as_deref(), Some("GPS (UTC)"));
        assert_eq!(gpsu.reported_total, Some(42));
        assert_eq!(gpsu.samples[0].value.as_text(), Some("230415123005.250"));
    }

    #[test]
    fn uniform_spacing_without_rate() {
        // WBAL has no nominal rate
        let block = nested(b"STRM", &[leaf(b"WBAL", b'S', 2, 4, &u16s(&[5000, 5000, 5100, 5100]))]);
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[block]), &Timestamp::new(2000, 1000));
        let store = asm.finish();
        let times = store.get(&FourCC::WBAL).unwrap().timestamps();
        assert_eq!(
            times,
            vec![
                Duration::milliseconds(2000),
                Duration::milliseconds(2250),
                Duration::milliseconds(2500),
                Duration::milliseconds(2750),
            ]
        );
    }

    #[test]
    fn nominal_rate_spacing() {
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[accl_block(1, &[1, 2, 3, 4, 5, 6])]), &Timestamp::new(0, 1000));
        let store = asm.finish();
        let times = store.get(&FourCC::ACCL).unwrap().timestamps();
        assert_eq!(times, vec![Duration::ZERO, Duration::milliseconds(5)]);
    }

    #[test]
    fn stmp_anchors_and_timo_shifts() {
        let block = |stmp: u64| {
            nested(b"STRM", &[
                leaf(b"STMP", b'J', 8, 1, &stmp.to_be_bytes()),
                leaf(b"TIMO", b'f', 4, 1, &f32s(&[0.5])),
                leaf(b"WBAL", b'S', 2, 2, &u16s(&[5000, 5000])),
            ])
        };
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[block(1_000_000)]), &Timestamp::new(0, 1000));
        asm.push(&packet(&[block(2_000_000)]), &Timestamp::new(1000, 1000));
        let store = asm.finish();
        let times = store.get(&FourCC::WBAL).unwrap().timestamps();
        // First block: shifted before start, clamped to zero
        assert_eq!(times[0], Duration::ZERO);
        assert_eq!(times[2], Duration::milliseconds(500));
        assert_eq!(times[3], Duration::milliseconds(1000));
    }

    #[test]
    fn nested_container_in_block_is_skipped() {
        let block = nested(b"STRM", &[
            nested(b"XTRA", &[leaf(b"WBAL", b'S', 2, 1, &u16s(&[1]))]),
            leaf(b"WBAL", b'S', 2, 1, &u16s(&[5000])),
        ]);
        let mut asm = assembler("HERO9_BLACK");
        asm.push(&packet(&[block]), &Timestamp::new(0, 1000));
        let store = asm.finish();
        assert_eq!(store.get(&FourCC::WBAL).unwrap().len(), 1);
        assert_eq!(
            store.warnings(),
            &[Warning::UnexpectedContainer { fourcc: FourCC::new(b"XTRA") }]
        );
    }

    #[test]
    fn identify_device() {
        let tree = packet(&[]);
        assert_eq!(identify(&tree), Some((Some(String::from("Hero9 Black")), Some(1))));
        assert_eq!(identify(&decode(&leaf(b"GPSU", b'c', 1, 1, b"x"))), None);
    }

    #[test]
    fn timeline_defaults() {
        let packets = vec![
            Packet::new(vec![]),
            Packet::with_duration(vec![], Duration::milliseconds(500)),
            Packet::new(vec![]),
        ];
        let times = timeline(&packets, Duration::seconds(1));
        assert_eq!(times[1].relative, Duration::seconds(1));
        assert_eq!(times[2].relative, Duration::milliseconds(1500));
    }
}
