//! Axis ordering. Devices store multi-component samples in a device
//! specific order, e.g. Hero5 stores `ACCL` as `z, x, y`. A resolved
//! `AxisPermutation` reorders components into the caller facing
//! convention: `x, y, z`, with quaternions kept scalar-first (`w, x, y, z`).
//! Labels that are not spatial axes (`lat`, `rms`, ...) are kept in stored order.

/// Rank of spatial labels in the emitted order.
fn rank(label: &str) -> Option<usize> {
    match label {
        "w" => Some(0),
        "x" => Some(1),
        "y" => Some(2),
        "z" => Some(3),
        _ => None,
    }
}

/// Total reordering of sample components, resolved once per device and identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisPermutation {
    /// `source[i]` is the stored index emitted at position `i`.
    source: Vec<usize>,
    /// Labels in stored order.
    stored: Vec<&'static str>,
}

impl AxisPermutation {
    /// Resolves stored labels into a permutation. Returns `None` if the
    /// labels are empty or contain duplicates, i.e. are not a bijection.
    pub fn resolve(stored: &[&'static str]) -> Option<Self> {
        if stored.is_empty() {
            return None;
        }
        for (i, label) in stored.iter().enumerate() {
            if stored[..i].contains(label) {
                return None;
            }
        }

        let mut source: Vec<usize> = (0..stored.len()).collect();
        if stored.iter().all(|l| rank(l).is_some()) {
            source.sort_by_key(|&i| rank(stored[i]));
        }

        Some(Self {
            source,
            stored: stored.to_vec(),
        })
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn is_identity(&self) -> bool {
        self.source.iter().enumerate().all(|(i, s)| i == *s)
    }

    /// Labels in the order the device stores them.
    pub fn stored_labels(&self) -> &[&'static str] {
        &self.stored
    }

    /// Labels in emitted order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.source.iter().map(|&i| self.stored[i]).collect()
    }

    /// Reorders `values`. `None` if the component count does not match.
    pub fn apply(&self, values: &[f64]) -> Option<Vec<f64>> {
        if values.len() != self.source.len() {
            return None;
        }
        Some(self.source.iter().map(|&i| values[i]).collect())
    }
}
