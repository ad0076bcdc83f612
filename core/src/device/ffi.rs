//! FFI declarations for the `synap_device` C library.
//!
//! This module contains the raw FFI bindings. Use the safe wrappers
//! in the `inference` module instead of calling these directly.

use std::ffi::c_void;
use std::os::raw::c_int;

/// Driver-side network identifier.
pub type NetworkId = u32;

/// Driver-side attachment identifier.
pub type AttachmentId = u32;

/// Driver-side buffer identifier (`bid`).
pub type BufferId = u32;

// Linked by build.rs (`cargo:rustc-link-lib=synap_device`).
extern "C" {
    // Driver lifecycle
    pub fn synap_init() -> bool;
    pub fn synap_deinit() -> bool;

    // Networks
    pub fn synap_prepare_network(
        data: *const c_void,
        size: usize,
        network: *mut NetworkId,
    ) -> bool;
    pub fn synap_release_network(network: NetworkId) -> bool;
    pub fn synap_run_network(network: NetworkId) -> bool;

    // Attachments
    pub fn synap_attach_io_buffer(
        network: NetworkId,
        bid: BufferId,
        attachment: *mut AttachmentId,
    ) -> bool;
    pub fn synap_detach_io_buffer(network: NetworkId, attachment: AttachmentId) -> bool;
    pub fn synap_set_input(network: NetworkId, attachment: AttachmentId, index: u32) -> bool;
    pub fn synap_set_output(network: NetworkId, attachment: AttachmentId, index: u32) -> bool;

    // Io buffers
    pub fn synap_allocate_io_buffer(
        size: usize,
        bid: *mut BufferId,
        mem_id: *mut u32,
        fd: *mut u32,
    ) -> bool;
    pub fn synap_destroy_io_buffer(bid: BufferId) -> bool;
    pub fn synap_lock_io_buffer(fd: c_int) -> bool;
    pub fn synap_unlock_io_buffer(fd: c_int) -> bool;

    // Inference lock
    pub fn synap_lock_npu() -> bool;
    pub fn synap_unlock_npu() -> bool;
}
