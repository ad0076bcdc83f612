//! Driver connection and resource factory.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{IoBuffer, Network, NotSync};
use crate::device::{self, Backend, Driver};
use crate::error::{Result, SynapError};

/// Initialized driver shared by a session and everything created from it.
///
/// The driver is deinitialized when the last owner goes away, so networks
/// and buffers that outlive their [`Session`] value stay valid.
pub(crate) struct Connection {
    driver: Arc<dyn Driver>,
}

impl Connection {
    pub(crate) fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!("Closing {} NPU driver", self.driver.name());
        self.driver.deinit();
    }
}

/// Connection to the NPU driver.
///
/// A session is an explicit context: open it once, then create networks and
/// io buffers from it.
///
/// # Example
///
/// ```
/// use synap_rs::{Backend, Session};
/// use synap_rs::device::SimulatedModel;
///
/// let session = Session::open(Backend::Simulated)?;
/// let model = SimulatedModel::new(vec![4], vec![4]).to_bytes();
/// let network = session.create_network(&model)?;
/// let buffer = session.create_io_buffer(4)?;
/// let mut attachment = network.attach_io_buffer(&buffer)?;
/// attachment.use_as_input(0)?;
/// # Ok::<(), synap_rs::SynapError>(())
/// ```
pub struct Session {
    conn: Arc<Connection>,
}

impl Session {
    /// Open and initialize the driver for `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::Connection`] if the backend is not available or
    /// the driver fails to initialize.
    pub fn open(backend: Backend) -> Result<Self> {
        let driver = device::open_driver(backend)?;
        Self::with_driver(driver)
    }

    /// Initialize `driver` and wrap it in a session.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::Connection`] if the driver fails to initialize,
    /// including when it already backs another session.
    pub fn with_driver(driver: Arc<dyn Driver>) -> Result<Self> {
        if !driver.init() {
            return Err(SynapError::connection(format!(
                "Error connecting to {} NPU device",
                driver.name()
            )));
        }
        info!("Connected to {} NPU driver", driver.name());
        Ok(Self {
            conn: Arc::new(Connection { driver }),
        })
    }

    /// Name of the underlying driver.
    pub fn driver_name(&self) -> &'static str {
        self.conn.driver().name()
    }

    /// Prepare a network from compiled model bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::NetworkCreation`] if the driver rejects the model.
    pub fn create_network(&self, model: &[u8]) -> Result<Network> {
        debug!("Preparing network, model size: {}", model.len());
        match self.conn.driver().create_network(model) {
            Some(handle) => Ok(Network::new(Arc::clone(&self.conn), handle)),
            None => Err(SynapError::network_creation("Error while creating network")),
        }
    }

    /// Read a model file and prepare a network from it.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::FileNotFound`] for a missing file, otherwise
    /// the errors of [`Session::create_network`].
    pub fn load_network(&self, path: impl AsRef<Path>) -> Result<Network> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SynapError::FileNotFound(path.to_path_buf()));
        }
        let model = std::fs::read(path)?;
        self.create_network(&model)
    }

    /// Allocate an io buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::BufferCreation`] if the driver cannot allocate it.
    pub fn create_io_buffer(&self, size: usize) -> Result<IoBuffer> {
        match self.conn.driver().create_io_buffer(size) {
            Some(handle) => Ok(IoBuffer::new(Arc::clone(&self.conn), handle, size)),
            None => Err(SynapError::buffer_creation(format!(
                "Error while creating IoBuffer of {} bytes",
                size
            ))),
        }
    }

    /// Take the exclusive NPU inference lock.
    ///
    /// The lock is held until the returned guard is dropped or unlocked.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::Lock`] if the NPU is already locked.
    pub fn lock_npu(&self) -> Result<NpuLock> {
        if !self.conn.driver().lock_npu() {
            return Err(SynapError::lock("NPU lock failed"));
        }
        debug!("NPU locked");
        Ok(NpuLock {
            conn: Arc::clone(&self.conn),
            locked: true,
            _not_sync: NotSync::default(),
        })
    }
}

/// Guard holding the NPU inference lock.
pub struct NpuLock {
    conn: Arc<Connection>,
    locked: bool,
    _not_sync: NotSync,
}

impl NpuLock {
    /// Give the lock back.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::Lock`] if the driver refuses to unlock.
    pub fn unlock(mut self) -> Result<()> {
        self.locked = false;
        if self.conn.driver().unlock_npu() {
            debug!("NPU unlocked");
            Ok(())
        } else {
            Err(SynapError::lock("NPU unlock failed"))
        }
    }
}

impl Drop for NpuLock {
    fn drop(&mut self) {
        if self.locked && !self.conn.driver().unlock_npu() {
            warn!("Failed to unlock NPU");
        }
    }
}
