//! Error types for synap-rs.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for synap-rs operations.
pub type Result<T> = std::result::Result<T, SynapError>;

/// Errors that can occur while driving the NPU.
///
/// Each driver variant is the translation of one native sentinel failure
/// value. The native layer reports no diagnostics, so the payload is only
/// a short description of the call that failed.
#[derive(Debug, Error)]
pub enum SynapError {
    /// Driver initialization failed or no connection is available.
    #[error("Connection to NPU driver failed: {0}")]
    Connection(String),

    /// The driver rejected the model.
    #[error("Network creation failed: {0}")]
    NetworkCreation(String),

    /// The driver could not allocate an io buffer.
    #[error("IoBuffer creation failed: {0}")]
    BufferCreation(String),

    /// The driver could not attach a buffer to a network.
    #[error("Buffer attachment failed: {0}")]
    Attachment(String),

    /// The driver rejected an input/output slot binding.
    #[error("Slot binding failed: {0}")]
    SlotBinding(String),

    /// A copy to or from an io buffer failed.
    #[error("IoBuffer copy failed: {0}")]
    Copy(String),

    /// Network execution failed.
    #[error("Network execution failed: {0}")]
    Execution(String),

    /// The NPU inference lock could not be acquired or released.
    #[error("NPU lock failed: {0}")]
    Lock(String),

    /// Operation on a handle that was already released.
    #[error("{0} has already been released")]
    Released(&'static str),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl SynapError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a network creation error.
    pub fn network_creation(msg: impl Into<String>) -> Self {
        Self::NetworkCreation(msg.into())
    }

    /// Create a buffer creation error.
    pub fn buffer_creation(msg: impl Into<String>) -> Self {
        Self::BufferCreation(msg.into())
    }

    /// Create an attachment error.
    pub fn attachment(msg: impl Into<String>) -> Self {
        Self::Attachment(msg.into())
    }

    /// Create a slot binding error.
    pub fn slot_binding(msg: impl Into<String>) -> Self {
        Self::SlotBinding(msg.into())
    }

    /// Create a copy error.
    pub fn copy(msg: impl Into<String>) -> Self {
        Self::Copy(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a lock error.
    pub fn lock(msg: impl Into<String>) -> Self {
        Self::Lock(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SynapError::network_creation("driver rejected model");
        assert_eq!(
            format!("{}", err),
            "Network creation failed: driver rejected model"
        );

        let err = SynapError::Released("Network");
        assert_eq!(format!("{}", err), "Network has already been released");

        let err = SynapError::FileNotFound(PathBuf::from("/path/to/model.synap"));
        assert_eq!(format!("{}", err), "File not found: /path/to/model.synap");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SynapError = io.into();
        assert!(matches!(err, SynapError::Io(_)));
    }
}
