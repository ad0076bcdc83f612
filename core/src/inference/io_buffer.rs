//! Native io buffers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::session::Connection;
use super::NotSync;
use crate::device::RawBuffer;
use crate::error::{Result, SynapError};

/// Fixed-size native memory region used to move tensor bytes to and from
/// the NPU.
///
/// Offsets and counts are forwarded to the driver as given; a range that
/// does not fit the buffer or the caller's slice is reported by the driver
/// as a [`SynapError::Copy`].
pub struct IoBuffer {
    conn: Arc<Connection>,
    handle: RawBuffer,
    len: usize,
    live: Arc<AtomicBool>,
    _not_sync: NotSync,
}

impl IoBuffer {
    pub(crate) fn new(conn: Arc<Connection>, handle: RawBuffer, len: usize) -> Self {
        debug!("Created io buffer {} ({} bytes)", handle, len);
        Self {
            conn,
            handle,
            len,
            live: Arc::new(AtomicBool::new(true)),
            _not_sync: NotSync::default(),
        }
    }

    /// Size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer has zero size.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether [`IoBuffer::release`] has been called.
    pub fn is_released(&self) -> bool {
        !self.live.load(Ordering::Acquire)
    }

    /// Copy `count` bytes from `source[src_offset..]` into this buffer at `dst_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::Copy`] if the driver reports a failure and
    /// [`SynapError::Released`] if the buffer was released.
    pub fn copy_from_buffer(
        &mut self,
        source: &[u8],
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> Result<()> {
        let handle = self.raw()?;
        if self
            .conn
            .driver()
            .copy_to_io_buffer(handle, source, src_offset, dst_offset, count)
        {
            Ok(())
        } else {
            Err(SynapError::copy("Error while copying data to IoBuffer"))
        }
    }

    /// Copy `count` bytes at `src_offset` in this buffer into `dest[dst_offset..]`.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::Copy`] if the driver reports a failure and
    /// [`SynapError::Released`] if the buffer was released.
    pub fn copy_to_buffer(
        &self,
        dest: &mut [u8],
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> Result<()> {
        let handle = self.raw()?;
        if self
            .conn
            .driver()
            .copy_from_io_buffer(handle, dest, src_offset, dst_offset, count)
        {
            Ok(())
        } else {
            Err(SynapError::copy("Error while copying data from IoBuffer"))
        }
    }

    /// Free the native buffer. Calling this more than once has no effect.
    ///
    /// Attachments of this buffer become unusable.
    pub fn release(&mut self) {
        if self.live.swap(false, Ordering::AcqRel) {
            debug!("Releasing io buffer {}", self.handle);
            self.conn.driver().release_io_buffer(self.handle);
        }
    }

    pub(crate) fn raw(&self) -> Result<RawBuffer> {
        if self.is_released() {
            Err(SynapError::Released("IoBuffer"))
        } else {
            Ok(self.handle)
        }
    }

    pub(crate) fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub(crate) fn liveness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.live)
    }
}

impl Drop for IoBuffer {
    fn drop(&mut self) {
        self.release();
    }
}
