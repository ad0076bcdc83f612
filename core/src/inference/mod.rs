//! Safe wrappers around the NPU driver.
//!
//! [`Session`] owns the driver connection and creates [`Network`]s and
//! [`IoBuffer`]s. Buffers are bound to network slots through
//! [`Attachment`]s. Every handle releases its native resource on drop;
//! explicit `release()` calls are idempotent.
//!
//! Handles can be moved between threads but not shared: the driver expects
//! a single thread of control per network.

mod attachment;
mod engine;
mod io_buffer;
mod network;
mod session;

use std::cell::Cell;
use std::marker::PhantomData;

pub use attachment::{Attachment, SlotRole};
pub use engine::{infer, InferenceResult, PreparedInference};
pub use io_buffer::IoBuffer;
pub use network::Network;
pub use session::{NpuLock, Session};

/// Marker making a handle `Send` but not `Sync`.
type NotSync = PhantomData<Cell<()>>;
