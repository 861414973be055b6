//! Hardware accelerator detection and selection.
//!
//! [`HardwareAcceleratorService`] is the only place that decides whether a
//! hardware encoder id may be emitted.

mod error;
mod probe;
mod service;
mod types;

pub use error::HardwareError;
pub use probe::{AcceleratorProbe, FfmpegEncoderProbe};
pub use service::HardwareAcceleratorService;
pub use types::{GpuAccelerator, GpuVendor};
