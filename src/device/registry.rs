//! Flattened device table and device resolution.
//!
//! Inheritance is resolved once, when the registry is built: every
//! device's chain is walked from its oldest ancestor to itself, supported
//! identifiers are unioned, and axis orders, overrides and rates are
//! merged with the child winning. Nothing is looked up through parents later.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt::Display,
    sync::OnceLock,
};

use time::Duration;

use crate::{errors::RegistryError, FourCC, GpmfError};

use super::{AxisPermutation, DecodeRule, DeviceSpec, BUILTIN_DEVICES};

static BUILTIN_REGISTRY: OnceLock<Result<DeviceRegistry, RegistryError>> = OnceLock::new();

/// Interpretation of a single identifier on a resolved device.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub identifier: FourCC,
    pub human_name: String,
    pub units: Option<String>,
    /// Values per sample, where known.
    pub dimensionality: Option<usize>,
    pub axis_permutation: Option<AxisPermutation>,
    pub rule: DecodeRule,
    /// Nominal sample rate in Hz.
    pub nominal_rate: Option<f64>,
}

/// Effective configuration for one device, parents merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub name: String,
    pub display_name: String,
    pub inherits_from: Option<String>,
    /// Oldest ancestor first, ending with this device.
    pub lineage: Vec<String>,
    pub release_year: u16,
    pub aliases: Vec<String>,
    pub firmware_ids: Vec<String>,
    pub supported_identifiers: BTreeSet<FourCC>,
    pub axis_order: HashMap<FourCC, AxisPermutation>,
    pub overrides: HashMap<FourCC, DecodeRule>,
    pub rates: HashMap<FourCC, f64>,
    descriptors: HashMap<FourCC, StreamDescriptor>,
}

impl Display for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

impl DeviceConfig {
    pub fn supports(&self, fourcc: &FourCC) -> bool {
        self.supported_identifiers.contains(fourcc)
    }

    /// Descriptor for a supported, non-structural identifier.
    pub fn descriptor(&self, fourcc: &FourCC) -> Option<&StreamDescriptor> {
        self.descriptors.get(fourcc)
    }

    /// All descriptors, sorted by identifier.
    pub fn descriptors(&self) -> Vec<&StreamDescriptor> {
        let mut descriptors: Vec<_> = self.descriptors.values().collect();
        descriptors.sort_by_key(|d| d.identifier);
        descriptors
    }

    pub fn rule(&self, fourcc: &FourCC) -> DecodeRule {
        self.overrides.get(fourcc).copied().unwrap_or_default()
    }

    pub fn axis_permutation(&self, fourcc: &FourCC) -> Option<&AxisPermutation> {
        self.axis_order.get(fourcc)
    }

    pub fn nominal_rate(&self, fourcc: &FourCC) -> Option<f64> {
        self.rates.get(fourcc).copied()
    }

    /// Exact, case-insensitive match on name, display name or alias.
    fn is_named(&self, name: &str) -> bool {
        let name = name.trim();
        self.name.eq_ignore_ascii_case(name)
            || self.display_name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Loose match for names observed in a stream: case, spaces and
    /// underscores are ignored, firmware strings match on their prefix.
    fn matches_observed(&self, observed: &str) -> bool {
        let wanted = normalize(observed);
        if wanted.is_empty() {
            return false;
        }
        let named = std::iter::once(self.name.as_str())
            .chain(std::iter::once(self.display_name.as_str()))
            .chain(self.aliases.iter().map(|a| a.as_str()))
            .any(|n| normalize(n) == wanted);

        named || self.firmware_ids.iter().any(|id| is_firmware_of(observed.trim(), id))
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// `HD9.01.01.60.00` is firmware for `HD9`.
fn is_firmware_of(observed: &str, firmware_id: &str) -> bool {
    match observed.get(..firmware_id.len()) {
        Some(prefix) => {
            prefix.eq_ignore_ascii_case(firmware_id)
                && matches!(observed.as_bytes().get(firmware_id.len()), None | Some(b'.'))
        }
        None => false,
    }
}

/// Device identity as observed in a stream (`DVNM`, `DVID`, firmware string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceHint {
    Name(String),
    Id(u32),
}

impl Display for DeviceHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for DeviceHint {
    fn from(value: &str) -> Self {
        Self::Name(value.to_owned())
    }
}

/// Result of resolving a device.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub config: &'a DeviceConfig,
    /// `true` if nothing matched and the newest device was used.
    pub fallback: bool,
}

/// Read-only, inheritance-flattened device table.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRegistry {
    /// Declaration order.
    devices: Vec<DeviceConfig>,
}

impl DeviceRegistry {
    /// Flattens `specs`. Fails on duplicate names, unknown parents,
    /// inheritance cycles and axis orders that are not permutations.
    pub fn new(specs: &[DeviceSpec]) -> Result<Self, RegistryError> {
        if specs.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut index: HashMap<String, &DeviceSpec> = HashMap::new();
        for spec in specs.iter() {
            let key = spec.name.to_ascii_lowercase();
            if index.insert(key, spec).is_some() {
                return Err(RegistryError::DuplicateDevice(spec.name.to_owned()));
            }
        }

        let devices = specs
            .iter()
            .map(|spec| flatten(spec, &index))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("device registry built with {} devices", devices.len());

        Ok(Self { devices })
    }

    /// Registry for the built-in device table, built once per process.
    pub fn builtin() -> Result<&'static Self, GpmfError> {
        BUILTIN_REGISTRY
            .get_or_init(|| Self::new(BUILTIN_DEVICES))
            .as_ref()
            .map_err(|err| GpmfError::Registry(err.clone()))
    }

    /// Device names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name.to_owned()).collect()
    }

    pub fn devices(&self) -> &[DeviceConfig] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Exact, case-insensitive lookup on name, display name or alias.
    pub fn get(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.is_named(name))
    }

    /// Newest device: latest release year, later declaration on ties.
    pub fn latest(&self) -> &DeviceConfig {
        // Non-empty, checked in `new`
        let mut latest = &self.devices[0];
        for device in self.devices.iter().skip(1) {
            if device.release_year >= latest.release_year {
                latest = device;
            }
        }
        latest
    }

    /// Explicit override. Must match a known device.
    pub fn resolve_override(&self, name: &str) -> Result<&DeviceConfig, GpmfError> {
        self.get(name).ok_or_else(|| GpmfError::UnknownDevice {
            name: name.to_owned(),
            known: self.names(),
        })
    }

    /// Device for an observed identity, if any matches.
    pub fn detect(&self, hint: &DeviceHint) -> Option<&DeviceConfig> {
        let observed = hint.to_string();
        self.devices.iter().find(|d| d.matches_observed(&observed))
    }

    /// Resolves a device: explicit override first, then the observed
    /// identity, then the newest known device.
    pub fn resolve(
        &self,
        device_override: Option<&str>,
        observed: Option<&DeviceHint>,
    ) -> Result<Resolution<'_>, GpmfError> {
        if let Some(name) = device_override {
            let config = self.resolve_override(name)?;
            tracing::info!("using device override {}", config.name);
            return Ok(Resolution { config, fallback: false });
        }

        if let Some(config) = observed.and_then(|hint| self.detect(hint)) {
            tracing::info!("detected device {}", config.name);
            return Ok(Resolution { config, fallback: false });
        }

        let config = self.latest();
        tracing::info!(
            "unrecognized device {}, falling back to {}",
            observed.map(|h| h.to_string()).unwrap_or_else(|| String::from("<none>")),
            config.name
        );
        Ok(Resolution { config, fallback: true })
    }
}

/// Positive, finite, and slow enough that a sample interval is a valid `Duration`.
fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0 && Duration::checked_seconds_f64(rate.recip()).is_some()
}

/// Merges `spec` with its ancestors, oldest first.
fn flatten(spec: &DeviceSpec, index: &HashMap<String, &DeviceSpec>) -> Result<DeviceConfig, RegistryError> {
    let mut chain: Vec<&DeviceSpec> = vec![spec];
    let mut seen: HashSet<&str> = HashSet::from([spec.name]);
    let mut current = spec;

    while let Some(parent) = current.inherits_from {
        let next = index
            .get(&parent.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| RegistryError::UnknownParent {
                device: current.name.to_owned(),
                parent: parent.to_owned(),
            })?;
        if !seen.insert(next.name) {
            let mut cycle: Vec<String> = chain.iter().map(|s| s.name.to_owned()).collect();
            cycle.push(next.name.to_owned());
            return Err(RegistryError::InheritanceCycle(cycle));
        }
        chain.push(next);
        current = next;
    }
    chain.reverse();

    let mut supported = BTreeSet::new();
    let mut axis_order = HashMap::new();
    let mut overrides = HashMap::new();
    let mut rates = HashMap::new();

    for link in chain.iter() {
        supported.extend(link.identifiers.iter().copied());
        for (fourcc, labels) in link.axis_order.iter() {
            let permutation = AxisPermutation::resolve(labels)
                .ok_or_else(|| RegistryError::InvalidAxisOrder {
                    device: link.name.to_owned(),
                    fourcc: *fourcc,
                })?;
            axis_order.insert(*fourcc, permutation);
        }
        overrides.extend(link.overrides.iter().copied());
        for (fourcc, rate) in link.rates.iter() {
            if !is_valid_rate(*rate) {
                return Err(RegistryError::InvalidRate {
                    device: link.name.to_owned(),
                    fourcc: *fourcc,
                });
            }
            rates.insert(*fourcc, *rate);
        }
    }

    // Identifiers with an axis order, override or rate are supported
    supported.extend(axis_order.keys().copied());
    supported.extend(overrides.keys().copied());
    supported.extend(rates.keys().copied());

    let descriptors = supported
        .iter()
        .filter(|fourcc| !fourcc.is_structural())
        .map(|fourcc| {
            let documented = fourcc.describe();
            let axis_permutation = axis_order.get(fourcc).cloned();
            let dimensionality = axis_permutation
                .as_ref()
                .map(|p| p.len())
                .or_else(|| documented.and_then(|d| d.dimensionality));
            let descriptor = StreamDescriptor {
                identifier: *fourcc,
                human_name: documented
                    .map(|d| d.name.to_owned())
                    .unwrap_or_else(|| fourcc.to_string()),
                units: documented.and_then(|d| d.units).map(String::from),
                dimensionality,
                axis_permutation,
                rule: overrides.get(fourcc).copied().unwrap_or_default(),
                nominal_rate: rates.get(fourcc).copied(),
            };
            (*fourcc, descriptor)
        })
        .collect();

    Ok(DeviceConfig {
        name: spec.name.to_owned(),
        display_name: spec.display_name.to_owned(),
        inherits_from: spec.inherits_from.map(String::from),
        lineage: chain.iter().map(|s| s.name.to_owned()).collect(),
        release_year: spec.release_year,
        aliases: spec.aliases.iter().map(|a| a.to_string()).collect(),
        firmware_ids: spec.firmware_ids.iter().map(|f| f.to_string()).collect(),
        supported_identifiers: supported,
        axis_order,
        overrides,
        rates,
        descriptors,
    })
}
