//! Loaded networks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::session::Connection;
use super::{Attachment, IoBuffer, NotSync};
use crate::device::RawNetwork;
use crate::error::{Result, SynapError};

/// A model prepared by the driver.
///
/// Buffers are attached with [`Network::attach_io_buffer`] and bound to
/// slots through the returned [`Attachment`]s before calling
/// [`Network::run`]. Releasing the network releases its attachments.
pub struct Network {
    conn: Arc<Connection>,
    handle: RawNetwork,
    live: Arc<AtomicBool>,
    _not_sync: NotSync,
}

impl Network {
    pub(crate) fn new(conn: Arc<Connection>, handle: RawNetwork) -> Self {
        debug!("Created network {}", handle);
        Self {
            conn,
            handle,
            live: Arc::new(AtomicBool::new(true)),
            _not_sync: NotSync::default(),
        }
    }

    /// Whether [`Network::release`] has been called.
    pub fn is_released(&self) -> bool {
        !self.live.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            Err(SynapError::Released("Network"))
        } else {
            Ok(())
        }
    }

    /// Attach `buffer` to this network.
    ///
    /// The attachment is not bound to any slot yet. Both the attachment and
    /// the buffer must be kept alive while the network uses them.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::Attachment`] if the driver refuses the buffer or
    /// the buffer belongs to another session, and [`SynapError::Released`]
    /// if the network or the buffer was released.
    pub fn attach_io_buffer(&self, buffer: &IoBuffer) -> Result<Attachment> {
        self.ensure_live()?;
        let raw_buffer = buffer.raw()?;
        if !Arc::ptr_eq(&self.conn, buffer.connection()) {
            return Err(SynapError::attachment(
                "IoBuffer belongs to a different session",
            ));
        }

        match self.conn.driver().attach_buffer(self.handle, raw_buffer) {
            Some(handle) => Ok(Attachment::new(
                Arc::clone(&self.conn),
                self.handle,
                Arc::clone(&self.live),
                buffer.liveness(),
                handle,
            )),
            None => Err(SynapError::attachment("Unable to attach buffer")),
        }
    }

    /// Run the network on the currently bound buffers.
    ///
    /// Blocks until the driver returns. On success every output buffer has
    /// been written.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::Execution`] if the driver fails, including when
    /// a slot has no buffer bound.
    pub fn run(&self) -> Result<()> {
        self.ensure_live()?;
        debug!("Running network {}", self.handle);
        if self.conn.driver().run_network(self.handle) {
            Ok(())
        } else {
            Err(SynapError::execution("Run network failed"))
        }
    }

    /// Release the network and all of its attachments. Calling this more
    /// than once has no effect.
    pub fn release(&mut self) {
        if self.live.swap(false, Ordering::AcqRel) {
            debug!("Releasing network {}", self.handle);
            self.conn.driver().release_network(self.handle);
        }
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{SimulatedDriver, SimulatedModel};
    use crate::inference::Session;

    fn setup(inputs: Vec<usize>, outputs: Vec<usize>) -> (Arc<SimulatedDriver>, Session, Network) {
        let driver = Arc::new(SimulatedDriver::new());
        let session = Session::with_driver(driver.clone()).unwrap();
        let network = session
            .create_network(&SimulatedModel::new(inputs, outputs).to_bytes())
            .unwrap();
        (driver, session, network)
    }

    #[test]
    fn test_release_is_idempotent() {
        let (driver, _session, mut network) = setup(vec![1], vec![1]);
        network.release();
        let once = driver.stats();
        network.release();
        assert_eq!(driver.stats(), once);
        assert_eq!(once.live_networks, 0);
        assert!(network.is_released());
    }

    #[test]
    fn test_run_before_binding_fails() {
        let (driver, session, network) = setup(vec![4], vec![4]);
        let input = session.create_io_buffer(4).unwrap();
        let _attachment = network.attach_io_buffer(&input).unwrap();

        assert!(matches!(network.run(), Err(SynapError::Execution(_))));
        assert_eq!(driver.stats().runs, 1);
    }

    #[test]
    fn test_operations_after_release_fail() {
        let (driver, session, mut network) = setup(vec![4], vec![4]);
        let buffer = session.create_io_buffer(4).unwrap();
        network.release();

        assert!(matches!(network.run(), Err(SynapError::Released("Network"))));
        assert!(matches!(
            network.attach_io_buffer(&buffer),
            Err(SynapError::Released("Network"))
        ));
        assert_eq!(driver.stats().runs, 0);
    }

    #[test]
    fn test_attach_released_buffer_fails() {
        let (_, session, network) = setup(vec![4], vec![4]);
        let mut buffer = session.create_io_buffer(4).unwrap();
        buffer.release();
        assert!(matches!(
            network.attach_io_buffer(&buffer),
            Err(SynapError::Released("IoBuffer"))
        ));
    }

    #[test]
    fn test_attach_buffer_from_other_session_fails() {
        let (_, _session, network) = setup(vec![4], vec![4]);
        let other = Session::open(crate::device::Backend::Simulated).unwrap();
        let foreign = other.create_io_buffer(4).unwrap();
        assert!(matches!(
            network.attach_io_buffer(&foreign),
            Err(SynapError::Attachment(_))
        ));
    }
}
