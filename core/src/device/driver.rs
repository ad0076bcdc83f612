//! The boundary between the safe wrappers and an NPU driver.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Result, SynapError};

/// Raw network handle as returned by the driver.
pub type RawNetwork = u32;

/// Raw attachment handle as returned by the driver.
pub type RawAttachment = u32;

/// Raw io buffer handle as returned by the driver. Never 0.
pub type RawBuffer = u64;

/// Operations exposed by an NPU driver.
///
/// Every method maps to one native call and reports failure the way the
/// native library does: `false` or `None`. Turning those into
/// [`SynapError`] values is the job of the safe wrappers in
/// [`crate::inference`].
///
/// Implementations must tolerate calls with handles they no longer know
/// about by reporting failure, never by panicking.
pub trait Driver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Open the connection to the NPU.
    ///
    /// Fails while the driver is already initialized; a driver backs at
    /// most one session at a time.
    fn init(&self) -> bool;

    /// Close the connection to the NPU.
    fn deinit(&self);

    /// Prepare a network from a compiled model.
    fn create_network(&self, model: &[u8]) -> Option<RawNetwork>;

    /// Release a network together with all of its attachments.
    fn release_network(&self, network: RawNetwork);

    /// Attach an io buffer to a network.
    fn attach_buffer(&self, network: RawNetwork, buffer: RawBuffer) -> Option<RawAttachment>;

    /// Run a network synchronously.
    fn run_network(&self, network: RawNetwork) -> bool;

    /// Detach a buffer from a network.
    fn release_attachment(&self, network: RawNetwork, attachment: RawAttachment);

    /// Bind an attachment to input slot `index`.
    fn use_attachment_as_input(
        &self,
        network: RawNetwork,
        attachment: RawAttachment,
        index: u32,
    ) -> bool;

    /// Bind an attachment to output slot `index`.
    fn use_attachment_as_output(
        &self,
        network: RawNetwork,
        attachment: RawAttachment,
        index: u32,
    ) -> bool;

    /// Allocate an io buffer of `size` bytes.
    fn create_io_buffer(&self, size: usize) -> Option<RawBuffer>;

    /// Free an io buffer.
    fn release_io_buffer(&self, buffer: RawBuffer);

    /// Copy `count` bytes at `src_offset` in the io buffer to `dest[dst_offset..]`.
    fn copy_from_io_buffer(
        &self,
        buffer: RawBuffer,
        dest: &mut [u8],
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> bool;

    /// Copy `count` bytes at `src[src_offset..]` into the io buffer at `dst_offset`.
    fn copy_to_io_buffer(
        &self,
        buffer: RawBuffer,
        src: &[u8],
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> bool;

    /// Take the exclusive NPU inference lock.
    fn lock_npu(&self) -> bool;

    /// Give back the NPU inference lock.
    fn unlock_npu(&self) -> bool;
}

/// Source and destination ranges of a `count` byte copy.
///
/// Returns `None` unless both ranges fit in their slices. Drivers must not
/// touch memory outside the returned ranges.
pub fn copy_ranges(
    src_len: usize,
    dst_len: usize,
    src_offset: usize,
    dst_offset: usize,
    count: usize,
) -> Option<(Range<usize>, Range<usize>)> {
    let src_end = src_offset.checked_add(count)?;
    let dst_end = dst_offset.checked_add(count)?;
    if src_end > src_len || dst_end > dst_len {
        return None;
    }
    Some((src_offset..src_end, dst_offset..dst_end))
}

/// Driver backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// The vendor `synap_device` library.
    Native,
    /// In-process engine, no hardware required.
    Simulated,
}

impl Backend {
    /// Whether this backend was compiled into the crate.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Native => cfg!(feature = "native"),
            Self::Simulated => true,
        }
    }
}

impl FromStr for Backend {
    type Err = SynapError;

    /// Parse a backend string like "native", "simulated" or "sim".
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "native" | "npu" => Ok(Self::Native),
            "simulated" | "sim" => Ok(Self::Simulated),
            other => Err(SynapError::config(format!("Invalid backend: {}", other))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// Instantiate the driver for `backend`.
///
/// The returned driver is not initialized yet; see
/// [`crate::inference::Session::with_driver`].
pub fn open_driver(backend: Backend) -> Result<Arc<dyn Driver>> {
    match backend {
        Backend::Simulated => Ok(Arc::new(super::SimulatedDriver::new())),
        #[cfg(feature = "native")]
        Backend::Native => Ok(Arc::new(super::NativeDriver::new()?)),
        #[cfg(not(feature = "native"))]
        Backend::Native => Err(SynapError::connection(
            "native backend not compiled in (enable the `native` feature)",
        )),
    }
}
