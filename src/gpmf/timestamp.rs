//! Convenience structure for dealing with relative timestamps.

use time::{self, Duration};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Timestamp containing relative time from recording start
/// and the "duration" (i.e. time until the next packet)
/// of the packet the current data belongs to.
pub struct Timestamp {
    /// Time passed since recording start.
    pub relative: Duration,
    /// 'Sample' duration for the packet,
    /// i.e. time until next `DEVC` is logged.
    pub duration: Duration,
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.relative, self.duration).cmp(&(other.relative, other.duration))
    }
}

impl From<(Duration, Duration)> for Timestamp {
    fn from(value: (Duration, Duration)) -> Self {
        Self {
            relative: value.0,
            duration: value.1,
        }
    }
}

impl Timestamp {
    /// New Timestamp. `relative` equals time in milliseconds
    /// from recording start,
    /// `duration` equals packet duration in milliseconds.
    pub fn new(relative: u32, duration: u32) -> Self {
        Timestamp {
            relative: Duration::milliseconds(relative as i64),
            duration: Duration::milliseconds(duration as i64),
        }
    }

    /// Returns `Timestamp.relative` as milliseconds.
    pub fn relative_ms(&self) -> i128 {
        self.relative.whole_milliseconds()
    }

    /// Returns `Timestamp.duration` as milliseconds.
    pub fn duration_ms(&self) -> i128 {
        self.duration.whole_milliseconds()
    }

    /// End of the time span covered, i.e. `relative + duration`.
    pub fn end(&self) -> Duration {
        self.relative + self.duration
    }

    /// Timestamp for the packet that directly follows this one,
    /// lasting `duration`.
    pub fn next(&self, duration: Duration) -> Self {
        Self {
            relative: self.end(),
            duration,
        }
    }
}
