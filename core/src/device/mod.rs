//! NPU driver access.
//!
//! This module holds the raw FFI bindings to `libsynap_device` and the
//! [`Driver`] trait the safe wrappers in [`crate::inference`] are written
//! against. Two drivers are provided: [`NativeDriver`] (feature `native`)
//! and [`SimulatedDriver`], an in-process stand-in used without hardware.

mod driver;
#[cfg(feature = "native")]
mod ffi;
#[cfg(feature = "native")]
mod native;
mod simulated;

pub use driver::{open_driver, Backend, Driver, RawAttachment, RawBuffer, RawNetwork};
#[cfg(feature = "native")]
pub use native::NativeDriver;
pub use simulated::{
    SimulatedDriver, SimulatedModel, SimulatedOp, SimulatedStats, LEGACY_MODEL_MAGIC, MODEL_MAGIC,
};
