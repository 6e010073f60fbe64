//! Stream reconstruction: the ordered assembler and the immutable store it produces.

pub mod assembler;
pub mod store;
pub mod stream;

pub use assembler::{assemble, identify, timeline, Assembler};
pub use store::{DeviceIdentity, TelemetryStore};
pub use stream::{Sample, SampleValue, SensorStream, StreamKind};
