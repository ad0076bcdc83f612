//! Buffer-to-slot bindings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::session::Connection;
use super::NotSync;
use crate::device::{RawAttachment, RawNetwork};
use crate::error::{Result, SynapError};

/// Slot an attachment is currently bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    /// Network input with the given index.
    Input(u32),
    /// Network output with the given index.
    Output(u32),
}

/// An io buffer attached to a network.
///
/// Created by [`super::Network::attach_io_buffer`]. Binding it with
/// [`Attachment::use_as_input`] or [`Attachment::use_as_output`] decides
/// which slot the buffer feeds on the next run. Calling the other method
/// later moves the attachment to the new slot.
pub struct Attachment {
    conn: Arc<Connection>,
    network: RawNetwork,
    network_live: Arc<AtomicBool>,
    buffer_live: Arc<AtomicBool>,
    handle: RawAttachment,
    released: bool,
    role: Option<SlotRole>,
    _not_sync: NotSync,
}

impl Attachment {
    pub(crate) fn new(
        conn: Arc<Connection>,
        network: RawNetwork,
        network_live: Arc<AtomicBool>,
        buffer_live: Arc<AtomicBool>,
        handle: RawAttachment,
    ) -> Self {
        debug!("Created attachment {} on network {}", handle, network);
        Self {
            conn,
            network,
            network_live,
            buffer_live,
            handle,
            released: false,
            role: None,
            _not_sync: NotSync::default(),
        }
    }

    /// Current slot binding, if any.
    pub fn role(&self) -> Option<SlotRole> {
        self.role
    }

    /// Whether the attachment was released, directly or with its network.
    pub fn is_released(&self) -> bool {
        self.released || !self.network_live.load(Ordering::Acquire)
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.released {
            Err(SynapError::Released("Attachment"))
        } else if !self.network_live.load(Ordering::Acquire) {
            Err(SynapError::Released("Network"))
        } else if !self.buffer_live.load(Ordering::Acquire) {
            Err(SynapError::Released("IoBuffer"))
        } else {
            Ok(())
        }
    }

    /// Use the attached buffer as input `index` of the network.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::SlotBinding`] if the driver rejects the binding,
    /// for instance on an invalid index or a size mismatch.
    pub fn use_as_input(&mut self, index: u32) -> Result<()> {
        self.bind(SlotRole::Input(index))
    }

    /// Use the attached buffer as output `index` of the network.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::SlotBinding`] if the driver rejects the binding,
    /// for instance on an invalid index or a size mismatch.
    pub fn use_as_output(&mut self, index: u32) -> Result<()> {
        self.bind(SlotRole::Output(index))
    }

    fn bind(&mut self, role: SlotRole) -> Result<()> {
        self.ensure_usable()?;
        let driver = self.conn.driver();
        let accepted = match role {
            SlotRole::Input(index) => {
                driver.use_attachment_as_input(self.network, self.handle, index)
            }
            SlotRole::Output(index) => {
                driver.use_attachment_as_output(self.network, self.handle, index)
            }
        };
        if !accepted {
            return Err(SynapError::slot_binding(match role {
                SlotRole::Input(index) => format!("Unable to use attachment as input {}", index),
                SlotRole::Output(index) => format!("Unable to use attachment as output {}", index),
            }));
        }
        if let Some(previous) = self.role.replace(role) {
            if previous != role {
                debug!(
                    "Attachment {} moved from {:?} to {:?}",
                    self.handle, previous, role
                );
            }
        }
        Ok(())
    }

    /// Detach the buffer from the network. The buffer itself stays allocated.
    ///
    /// Calling this more than once, or after the network was released, has
    /// no effect.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.role = None;
        if self.network_live.load(Ordering::Acquire) {
            debug!("Releasing attachment {}", self.handle);
            self.conn
                .driver()
                .release_attachment(self.network, self.handle);
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{SimulatedDriver, SimulatedModel};
    use crate::inference::{IoBuffer, Network, Session};

    struct Fixture {
        driver: Arc<SimulatedDriver>,
        network: Network,
        buffer: IoBuffer,
        _session: Session,
    }

    fn fixture() -> Fixture {
        let driver = Arc::new(SimulatedDriver::new());
        let session = Session::with_driver(driver.clone()).unwrap();
        let network = session
            .create_network(&SimulatedModel::new(vec![4], vec![4]).to_bytes())
            .unwrap();
        let buffer = session.create_io_buffer(4).unwrap();
        Fixture {
            driver,
            network,
            buffer,
            _session: session,
        }
    }

    #[test]
    fn test_bind_records_role() {
        let f = fixture();
        let mut attachment = f.network.attach_io_buffer(&f.buffer).unwrap();
        assert_eq!(attachment.role(), None);

        attachment.use_as_input(0).unwrap();
        assert_eq!(attachment.role(), Some(SlotRole::Input(0)));

        attachment.use_as_output(0).unwrap();
        assert_eq!(attachment.role(), Some(SlotRole::Output(0)));
    }

    #[test]
    fn test_invalid_index_is_slot_binding_error() {
        let f = fixture();
        let mut attachment = f.network.attach_io_buffer(&f.buffer).unwrap();
        assert!(matches!(
            attachment.use_as_input(3),
            Err(SynapError::SlotBinding(_))
        ));
        assert!(matches!(
            attachment.use_as_output(1),
            Err(SynapError::SlotBinding(_))
        ));
        assert_eq!(attachment.role(), None);
    }

    #[test]
    fn test_release_is_idempotent_and_keeps_buffer() {
        let f = fixture();
        let mut attachment = f.network.attach_io_buffer(&f.buffer).unwrap();
        attachment.release();
        let once = f.driver.stats();
        attachment.release();

        assert_eq!(f.driver.stats(), once);
        assert_eq!(once.live_attachments, 0);
        assert_eq!(once.live_buffers, 1);
        assert!(!f.buffer.is_released());
    }

    #[test]
    fn test_network_release_invalidates_attachment() {
        let mut f = fixture();
        let mut attachment = f.network.attach_io_buffer(&f.buffer).unwrap();
        attachment.use_as_input(0).unwrap();

        f.network.release();
        assert!(attachment.is_released());
        assert!(matches!(
            attachment.use_as_input(0),
            Err(SynapError::Released("Network"))
        ));
        assert!(matches!(
            attachment.use_as_output(0),
            Err(SynapError::Released("Network"))
        ));

        // Cascaded release: dropping the attachment must not touch the driver.
        attachment.release();
        assert_eq!(f.driver.stats().live_attachments, 0);
    }

    #[test]
    fn test_released_buffer_invalidates_attachment() {
        let mut f = fixture();
        let mut attachment = f.network.attach_io_buffer(&f.buffer).unwrap();
        f.buffer.release();
        assert!(matches!(
            attachment.use_as_input(0),
            Err(SynapError::Released("IoBuffer"))
        ));
    }

    #[test]
    fn test_use_after_release_fails() {
        let f = fixture();
        let mut attachment = f.network.attach_io_buffer(&f.buffer).unwrap();
        attachment.release();
        assert!(matches!(
            attachment.use_as_input(0),
            Err(SynapError::Released("Attachment"))
        ));
    }
}
