//! synap-rs: Safe Rust bindings for the SyNAP NPU inference driver.
//!
//! This crate wraps the handle-based C interface of `libsynap_device`.
//! Networks, io buffers and their attachments become owned Rust values
//! that release their native resources on drop, and every sentinel failure
//! of the driver becomes a typed [`SynapError`].
//!
//! # Features
//!
//! - **native**: Link `libsynap_device` and enable [`Backend::Native`].
//!   Without it only the in-process [`Backend::Simulated`] driver exists.
//!
//! # Example
//!
//! ```
//! use synap_rs::{Backend, Session};
//! use synap_rs::device::SimulatedModel;
//!
//! let session = Session::open(Backend::Simulated)?;
//! let network = session.create_network(&SimulatedModel::new(vec![4], vec![4]).to_bytes())?;
//!
//! let mut input = session.create_io_buffer(4)?;
//! let output = session.create_io_buffer(4)?;
//!
//! let mut input_attachment = network.attach_io_buffer(&input)?;
//! input_attachment.use_as_input(0)?;
//! input.copy_from_buffer(&[1, 2, 3, 4], 0, 0, 4)?;
//!
//! let mut output_attachment = network.attach_io_buffer(&output)?;
//! output_attachment.use_as_output(0)?;
//!
//! network.run()?;
//!
//! let mut result = [0u8; 4];
//! output.copy_to_buffer(&mut result, 0, 0, 4)?;
//! assert_eq!(result, [1, 2, 3, 4]);
//! # Ok::<(), synap_rs::SynapError>(())
//! ```
//!
//! # Building
//!
//! ```bash
//! # Simulated driver only
//! cargo build --release
//!
//! # With the NPU driver (libsynap_device in SYNAP_LIB_DIR)
//! SYNAP_LIB_DIR=/usr/lib cargo build --release --features native
//! ```

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod inference;
pub mod input;
pub mod timing;

// Re-export commonly used types
pub use device::{Backend, Driver};
pub use error::{Result, SynapError};
pub use inference::{
    infer, Attachment, InferenceResult, IoBuffer, Network, NpuLock, PreparedInference, Session,
    SlotRole,
};
