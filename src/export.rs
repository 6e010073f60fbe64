//! Lossless binary snapshot of a `TelemetryStore`.
//!
//! Layout (big-endian): magic `GPTS`, format version, device identity,
//! packet count, optional fingerprint, then every stream with its
//! metadata and samples. Timestamps are stored as `i64` nanoseconds,
//! numeric values as `f64`, so a round trip is bit-exact.
//! Warnings are not exported. The device configuration is looked up
//! again by name when reading.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, Write},
    path::Path,
};

use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use time::Duration;

use crate::{
    telemetry::{DeviceIdentity, Sample, SampleValue, SensorStream, StreamKind, TelemetryStore},
    DeviceRegistry, FourCC, GpmfError,
};

pub const VERSION: u16 = 1;

/// Length-prefixed bytes.
#[derive(Debug, BinRead, BinWrite)]
#[brw(big)]
struct Blob {
    len: u32,
    #[br(count = len)]
    bytes: Vec<u8>,
}

impl Blob {
    fn new(bytes: &[u8]) -> Self {
        Self {
            len: bytes.len() as u32,
            bytes: bytes.to_vec(),
        }
    }

    fn into_string(self) -> Result<String, GpmfError> {
        String::from_utf8(self.bytes)
            .map_err(|err| GpmfError::InvalidExport(format!("invalid UTF-8: {err}")))
    }
}

#[derive(Debug, BinRead, BinWrite)]
#[brw(big)]
enum ValueRecord {
    #[brw(magic = 0u8)]
    Numeric {
        count: u16,
        #[br(count = count)]
        values: Vec<f64>,
    },
    #[brw(magic = 1u8)]
    Text(Blob),
    #[brw(magic = 2u8)]
    Raw(Blob),
}

#[derive(Debug, BinRead, BinWrite)]
#[brw(big)]
struct SampleRecord {
    nanos: i64,
    value: ValueRecord,
}

#[derive(Debug, BinRead, BinWrite)]
#[brw(big)]
struct StreamRecord {
    fourcc: FourCC,
    /// 0 numeric, 1 text, 2 raw
    kind: u8,
    has_name: u8,
    #[br(if(has_name != 0))]
    name: Option<Blob>,
    has_units: u8,
    #[br(if(has_units != 0))]
    units: Option<Blob>,
    /// 0 if unknown
    dimensionality: u32,
    has_total: u8,
    reported_total: u64,
    sample_count: u32,
    #[br(count = sample_count)]
    samples: Vec<SampleRecord>,
}

#[derive(Debug, BinRead, BinWrite)]
#[brw(big, magic = b"GPTS")]
struct Snapshot {
    version: u16,
    device: Blob,
    has_observed_name: u8,
    #[br(if(has_observed_name != 0))]
    observed_name: Option<Blob>,
    has_observed_id: u8,
    observed_id: u32,
    fallback: u8,
    packets: u64,
    has_fingerprint: u8,
    fingerprint: [u8; 32],
    stream_count: u32,
    #[br(count = stream_count)]
    streams: Vec<StreamRecord>,
}

fn kind_to_u8(kind: StreamKind) -> u8 {
    match kind {
        StreamKind::Numeric => 0,
        StreamKind::Text => 1,
        StreamKind::Raw => 2,
    }
}

fn kind_from_u8(kind: u8) -> Result<StreamKind, GpmfError> {
    match kind {
        0 => Ok(StreamKind::Numeric),
        1 => Ok(StreamKind::Text),
        2 => Ok(StreamKind::Raw),
        other => Err(GpmfError::InvalidExport(format!("unknown stream kind {other}"))),
    }
}

impl From<&Sample> for SampleRecord {
    fn from(sample: &Sample) -> Self {
        let nanos = sample
            .timestamp
            .whole_nanoseconds()
            .clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        let value = match &sample.value {
            SampleValue::Numeric(values) => ValueRecord::Numeric {
                count: values.len() as u16,
                values: values.to_owned(),
            },
            SampleValue::Text(text) => ValueRecord::Text(Blob::new(text.as_bytes())),
            SampleValue::Raw(bytes) => ValueRecord::Raw(Blob::new(bytes)),
        };
        Self { nanos, value }
    }
}

impl From<&SensorStream> for StreamRecord {
    fn from(stream: &SensorStream) -> Self {
        Self {
            fourcc: stream.identifier,
            kind: kind_to_u8(stream.kind),
            has_name: stream.name.is_some() as u8,
            name: stream.name.as_deref().map(|s| Blob::new(s.as_bytes())),
            has_units: stream.units.is_some() as u8,
            units: stream.units.as_deref().map(|s| Blob::new(s.as_bytes())),
            dimensionality: stream.dimensionality.unwrap_or(0) as u32,
            has_total: stream.reported_total.is_some() as u8,
            reported_total: stream.reported_total.unwrap_or(0),
            sample_count: stream.samples.len() as u32,
            samples: stream.samples.iter().map(SampleRecord::from).collect(),
        }
    }
}

/// Writes `store` to `writer`.
pub fn write<W: Write + Seek>(store: &TelemetryStore, writer: &mut W) -> Result<(), GpmfError> {
    let identity = store.device_identity();
    let snapshot = Snapshot {
        version: VERSION,
        device: Blob::new(identity.name.as_bytes()),
        has_observed_name: identity.observed_name.is_some() as u8,
        observed_name: identity.observed_name.as_deref().map(|s| Blob::new(s.as_bytes())),
        has_observed_id: identity.observed_id.is_some() as u8,
        observed_id: identity.observed_id.unwrap_or(0),
        fallback: identity.fallback as u8,
        packets: store.packets() as u64,
        has_fingerprint: store.fingerprint().is_some() as u8,
        fingerprint: store.fingerprint().map(|h| *h.as_bytes()).unwrap_or([0; 32]),
        stream_count: store.len() as u32,
        streams: store.iter().map(StreamRecord::from).collect(),
    };
    writer.write_be(&snapshot)?;
    Ok(())
}

/// Reads a snapshot, resolving the device in the built-in registry.
pub fn read<R: Read + Seek>(reader: &mut R) -> Result<TelemetryStore, GpmfError> {
    read_with_registry(reader, DeviceRegistry::builtin()?)
}

/// Reads a snapshot, resolving the device in `registry`.
pub fn read_with_registry<R: Read + Seek>(
    reader: &mut R,
    registry: &DeviceRegistry,
) -> Result<TelemetryStore, GpmfError> {
    let snapshot: Snapshot = reader.read_be().map_err(|err| match err {
        binrw::Error::BadMagic { .. } => GpmfError::InvalidExport(String::from("missing GPTS magic")),
        other => GpmfError::BinRw(other),
    })?;

    if snapshot.version != VERSION {
        return Err(GpmfError::InvalidExport(format!(
            "unsupported version {}",
            snapshot.version
        )));
    }

    let name = snapshot.device.into_string()?;
    let device = registry
        .get(&name)
        .ok_or_else(|| GpmfError::InvalidExport(format!("unknown device '{name}'")))?
        .to_owned();

    let identity = DeviceIdentity {
        name,
        observed_name: snapshot.observed_name.map(Blob::into_string).transpose()?,
        observed_id: (snapshot.has_observed_id != 0).then_some(snapshot.observed_id),
        fallback: snapshot.fallback != 0,
    };

    let streams = snapshot
        .streams
        .into_iter()
        .map(|record| {
            let mut stream = SensorStream::new(
                record.fourcc,
                kind_from_u8(record.kind)?,
                device.descriptor(&record.fourcc).cloned(),
            );
            stream.name = record.name.map(Blob::into_string).transpose()?;
            stream.units = record.units.map(Blob::into_string).transpose()?;
            stream.dimensionality = (record.dimensionality != 0).then_some(record.dimensionality as usize);
            stream.reported_total = (record.has_total != 0).then_some(record.reported_total);
            stream.samples = record
                .samples
                .into_iter()
                .map(|sample| {
                    let value = match sample.value {
                        ValueRecord::Numeric { values, .. } => SampleValue::Numeric(values),
                        ValueRecord::Text(blob) => SampleValue::Text(blob.into_string()?),
                        ValueRecord::Raw(blob) => SampleValue::Raw(blob.bytes),
                    };
                    Ok(Sample {
                        timestamp: Duration::nanoseconds(sample.nanos),
                        value,
                    })
                })
                .collect::<Result<Vec<_>, GpmfError>>()?;
            Ok(stream)
        })
        .collect::<Result<Vec<_>, GpmfError>>()?;

    let fingerprint = (snapshot.has_fingerprint != 0).then(|| blake3::Hash::from(snapshot.fingerprint));

    Ok(TelemetryStore::new(
        identity,
        device,
        streams,
        Vec::new(),
        snapshot.packets as usize,
        fingerprint,
    ))
}

/// Writes `store` to a file at `path`.
pub fn write_file(store: &TelemetryStore, path: &Path) -> Result<(), GpmfError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write(store, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Reads a snapshot file, resolving the device in the built-in registry.
pub fn read_file(path: &Path) -> Result<TelemetryStore, GpmfError> {
    let mut reader = BufReader::new(File::open(path)?);
    read(&mut reader)
}
