//! Driver backed by the vendor `synap_device` library.

use std::collections::HashMap;
use std::fs::File;
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use memmap2::{MmapMut, MmapOptions};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::driver::{copy_ranges, Driver, RawAttachment, RawBuffer, RawNetwork};
use super::ffi;
use crate::error::Result;

/// Set while a `NativeDriver` is initialized. The C library keeps a single
/// device connection per process.
static NATIVE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Io buffer allocated by the driver and mapped into this process.
struct ClientIoBuffer {
    bid: ffi::BufferId,
    map: MmapMut,
    // Dropping the file closes the dma-buf fd; keep it after `map`.
    file: File,
}

impl ClientIoBuffer {
    fn fd(&self) -> i32 {
        self.file.as_raw_fd()
    }

    /// Run `f` on the mapping with CPU access granted by the driver.
    fn with_cpu_access(&mut self, f: impl FnOnce(&mut [u8])) -> bool {
        let fd = self.fd();
        // SAFETY: `fd` is the dma-buf owned by this buffer.
        if !unsafe { ffi::synap_lock_io_buffer(fd) } {
            error!("Cannot resume cpu access to dmabuf {}", fd);
            return false;
        }
        f(&mut self.map[..]);
        // SAFETY: as above.
        if !unsafe { ffi::synap_unlock_io_buffer(fd) } {
            error!("Cannot suspend cpu access to dmabuf {}", fd);
            return false;
        }
        true
    }
}

/// Driver talking to the NPU through `libsynap_device`.
///
/// Only one instance can be initialized per process at a time; `init`
/// fails while another driver holds the device connection, or while this
/// one already does.
pub struct NativeDriver {
    buffers: Mutex<HashMap<RawBuffer, ClientIoBuffer>>,
    next_buffer: AtomicU64,
    initialized: AtomicBool,
}

impl NativeDriver {
    /// Create a driver. The device connection is claimed by `init`.
    pub fn new() -> Result<Self> {
        Ok(Self {
            buffers: Mutex::new(HashMap::new()),
            next_buffer: AtomicU64::new(1),
            initialized: AtomicBool::new(false),
        })
    }

    fn destroy_all(&self) {
        let drained: Vec<_> = self.buffers.lock().drain().map(|(_, b)| b).collect();
        for buffer in drained {
            Self::destroy(buffer);
        }
    }

    fn allocate(&self, size: usize) -> Option<ClientIoBuffer> {
        let mut bid: ffi::BufferId = 0;
        let mut mem_id: u32 = 0;
        let mut fd: u32 = 0;

        // SAFETY: the out-pointers reference live locals.
        if !unsafe { ffi::synap_allocate_io_buffer(size, &mut bid, &mut mem_id, &mut fd) } {
            error!("Unable to create io buffer of {} bytes", size);
            return None;
        }

        // SAFETY: the driver hands over ownership of a freshly opened dma-buf fd.
        let file = unsafe { File::from_raw_fd(fd as i32) };

        // SAFETY: the dma-buf stays valid until `synap_destroy_io_buffer`,
        // which only runs after the mapping is dropped.
        let map = match unsafe { MmapOptions::new().len(size).map_mut(&file) } {
            Ok(map) => map,
            Err(e) => {
                error!("Unable to map dmabuf handle {}: {}", fd, e);
                drop(file);
                // SAFETY: `bid` was just allocated and nothing else refers to it.
                unsafe { ffi::synap_destroy_io_buffer(bid) };
                return None;
            }
        };

        Some(ClientIoBuffer { bid, map, file })
    }

    fn destroy(buffer: ClientIoBuffer) {
        let ClientIoBuffer { bid, map, file } = buffer;
        drop(map);
        drop(file);
        // SAFETY: the mapping and fd are gone, so the buffer memory is unused.
        if !unsafe { ffi::synap_destroy_io_buffer(bid) } {
            warn!("Failed to destroy io buffer bid {}", bid);
        }
    }
}

impl Drop for NativeDriver {
    fn drop(&mut self) {
        if self.initialized.load(Ordering::Acquire) {
            self.deinit();
        }
    }
}

// SAFETY (all calls below): the `synap_*` functions take plain integer
// handles and report unknown handles through their return value. Pointer
// arguments are valid for the duration of each call.
impl Driver for NativeDriver {
    fn name(&self) -> &'static str {
        "native"
    }

    fn init(&self) -> bool {
        if self.initialized.load(Ordering::Acquire) {
            error!("native driver already initialized");
            return false;
        }
        if NATIVE_ACTIVE.swap(true, Ordering::AcqRel) {
            error!("a native session is already open in this process");
            return false;
        }
        if !unsafe { ffi::synap_init() } {
            NATIVE_ACTIVE.store(false, Ordering::Release);
            return false;
        }
        self.initialized.store(true, Ordering::Release);
        true
    }

    fn deinit(&self) {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        self.destroy_all();
        if !unsafe { ffi::synap_deinit() } {
            warn!("synap_deinit reported failure");
        }
        NATIVE_ACTIVE.store(false, Ordering::Release);
    }

    fn create_network(&self, model: &[u8]) -> Option<RawNetwork> {
        let mut network: ffi::NetworkId = 0;
        let ok = unsafe {
            ffi::synap_prepare_network(model.as_ptr().cast(), model.len(), &mut network)
        };
        if ok {
            Some(network)
        } else {
            error!("error while creating network");
            None
        }
    }

    fn release_network(&self, network: RawNetwork) {
        if !unsafe { ffi::synap_release_network(network) } {
            warn!("Failed to release network {}", network);
        }
    }

    fn attach_buffer(&self, network: RawNetwork, buffer: RawBuffer) -> Option<RawAttachment> {
        let bid = self.buffers.lock().get(&buffer)?.bid;
        debug!("Attaching io buffer with bid {}", bid);

        let mut attachment: ffi::AttachmentId = 0;
        if unsafe { ffi::synap_attach_io_buffer(network, bid, &mut attachment) } {
            Some(attachment)
        } else {
            error!("Failed to attach bid: {}", bid);
            None
        }
    }

    fn run_network(&self, network: RawNetwork) -> bool {
        unsafe { ffi::synap_run_network(network) }
    }

    fn release_attachment(&self, network: RawNetwork, attachment: RawAttachment) {
        if !unsafe { ffi::synap_detach_io_buffer(network, attachment) } {
            warn!("Failed to detach io buffer {}", attachment);
        }
    }

    fn use_attachment_as_input(
        &self,
        network: RawNetwork,
        attachment: RawAttachment,
        index: u32,
    ) -> bool {
        unsafe { ffi::synap_set_input(network, attachment, index) }
    }

    fn use_attachment_as_output(
        &self,
        network: RawNetwork,
        attachment: RawAttachment,
        index: u32,
    ) -> bool {
        unsafe { ffi::synap_set_output(network, attachment, index) }
    }

    fn create_io_buffer(&self, size: usize) -> Option<RawBuffer> {
        if size == 0 {
            error!("Unable to map an empty io buffer");
            return None;
        }
        let buffer = self.allocate(size)?;
        let handle = self.next_buffer.fetch_add(1, Ordering::Relaxed);
        self.buffers.lock().insert(handle, buffer);
        Some(handle)
    }

    fn release_io_buffer(&self, buffer: RawBuffer) {
        let removed = self.buffers.lock().remove(&buffer);
        if let Some(buffer) = removed {
            Self::destroy(buffer);
        }
    }

    fn copy_from_io_buffer(
        &self,
        buffer: RawBuffer,
        dest: &mut [u8],
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> bool {
        let mut buffers = self.buffers.lock();
        let Some(client) = buffers.get_mut(&buffer) else {
            return false;
        };
        let Some((src, dst)) =
            copy_ranges(client.map.len(), dest.len(), src_offset, dst_offset, count)
        else {
            return false;
        };
        client.with_cpu_access(|mem| dest[dst].copy_from_slice(&mem[src]))
    }

    fn copy_to_io_buffer(
        &self,
        buffer: RawBuffer,
        src: &[u8],
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> bool {
        let mut buffers = self.buffers.lock();
        let Some(client) = buffers.get_mut(&buffer) else {
            return false;
        };
        let Some((from, to)) =
            copy_ranges(src.len(), client.map.len(), src_offset, dst_offset, count)
        else {
            return false;
        };
        client.with_cpu_access(|mem| mem[to].copy_from_slice(&src[from]))
    }

    fn lock_npu(&self) -> bool {
        unsafe { ffi::synap_lock_npu() }
    }

    fn unlock_npu(&self) -> bool {
        unsafe { ffi::synap_unlock_npu() }
    }
}
