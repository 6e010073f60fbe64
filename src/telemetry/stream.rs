//! Reconstructed sensor stream: one per identifier, samples in packet order.

use time::Duration;

use crate::{device::StreamDescriptor, FourCC};

/// How samples in a stream are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Scaled, axis-ordered numbers with a fixed count per sample.
    Numeric,
    Text,
    /// Uninterpreted. Unrecognized identifiers, raw decode rules,
    /// and numeric streams whose shape changed.
    Raw,
}

/// A single sample value.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Numeric(Vec<f64>),
    Text(String),
    Raw(Vec<u8>),
}

impl SampleValue {
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Self::Numeric(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            Self::Raw(b) => Some(b),
            _ => None,
        }
    }
}

/// Timestamped sample. `timestamp` is relative to recording start.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: Duration,
    pub value: SampleValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorStream {
    pub identifier: FourCC,
    /// Stream name (`STNM`), first occurrence.
    pub name: Option<String>,
    /// Units (`SIUN`, else `UNIT`), first occurrence.
    pub units: Option<String>,
    pub kind: StreamKind,
    /// Values per sample for numeric streams.
    pub dimensionality: Option<usize>,
    /// `None` for identifiers the device does not support.
    pub descriptor: Option<StreamDescriptor>,
    pub samples: Vec<Sample>,
    /// Last device reported sample total (`TSMP`).
    pub reported_total: Option<u64>,
}

impl SensorStream {
    pub fn new(identifier: FourCC, kind: StreamKind, descriptor: Option<StreamDescriptor>) -> Self {
        Self {
            identifier,
            name: None,
            units: None,
            kind,
            dimensionality: None,
            descriptor,
            samples: Vec::new(),
            reported_total: None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_raw(&self) -> bool {
        self.kind == StreamKind::Raw
    }

    /// Stream name, else the documented name, else the FourCC.
    pub fn human_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.descriptor.as_ref().map(|d| d.human_name.to_owned()))
            .unwrap_or_else(|| self.identifier.to_string())
    }

    /// Column labels for numeric samples, in emitted order.
    /// Falls back to `axis_0`, `axis_1`, ... when the device declares none.
    pub fn columns(&self) -> Vec<String> {
        let Some(width) = self.dimensionality else {
            return Vec::new();
        };
        match self.descriptor.as_ref().and_then(|d| d.axis_permutation.as_ref()) {
            Some(perm) if perm.len() == width => {
                perm.labels().into_iter().map(String::from).collect()
            }
            _ => (0..width).map(|i| format!("axis_{i}")).collect(),
        }
    }

    pub fn timestamps(&self) -> Vec<Duration> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    /// Numeric sample values. Non-numeric samples are skipped.
    pub fn values(&self) -> Vec<&[f64]> {
        self.samples
            .iter()
            .filter_map(|s| s.value.as_numeric())
            .collect()
    }

    pub fn first_timestamp(&self) -> Option<Duration> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<Duration> {
        self.samples.last().map(|s| s.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_columns() {
        let mut stream = SensorStream::new(FourCC::new(b"XYZZ"), StreamKind::Numeric, None);
        assert!(stream.columns().is_empty());
        stream.dimensionality = Some(2);
        assert_eq!(stream.columns(), vec!["axis_0", "axis_1"]);
        assert_eq!(stream.human_name(), "XYZZ");
    }

    #[test]
    fn values_skip_other_kinds() {
        let mut stream = SensorStream::new(FourCC::ACCL, StreamKind::Raw, None);
        stream.samples.push(Sample {
            timestamp: Duration::ZERO,
            value: SampleValue::Numeric(vec![1.0, 2.0, 3.0]),
        });
        stream.samples.push(Sample {
            timestamp: Duration::milliseconds(5),
            value: SampleValue::Raw(vec![0, 1]),
        });
        assert_eq!(stream.values(), vec![&[1.0, 2.0, 3.0][..]]);
        assert_eq!(stream.timestamps(), vec![Duration::ZERO, Duration::milliseconds(5)]);
        assert_eq!(stream.last_timestamp(), Some(Duration::milliseconds(5)));
    }
}
