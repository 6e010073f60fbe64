//! Device configurations: the built-in GoPro table, axis ordering,
//! and the inheritance-flattened registry used to interpret streams.

pub mod axis;
pub mod registry;
pub mod spec;

pub use axis::AxisPermutation;
pub use registry::{DeviceConfig, DeviceHint, DeviceRegistry, Resolution, StreamDescriptor};
pub use spec::{AxisOrder, DecodeRule, DeviceSpec, BUILTIN_DEVICES};
