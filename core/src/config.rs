//! Configuration types for synap-rs.

use serde::Deserialize;

use crate::device::Backend;
use crate::error::Result;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Driver configuration.
    #[serde(default)]
    pub driver: DriverConfig,

    /// Inference configuration.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Output configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Driver configuration.
#[derive(Debug, Deserialize)]
pub struct DriverConfig {
    /// Driver backend (native, simulated).
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

impl DriverConfig {
    /// Parse the configured backend.
    pub fn backend(&self) -> Result<Backend> {
        self.backend.parse()
    }
}

/// Inference configuration.
#[derive(Debug, Deserialize)]
pub struct InferenceConfig {
    /// Number of inferences to run.
    #[serde(default = "default_repeat")]
    pub repeat: usize,

    /// Hold the NPU inference lock while running.
    #[serde(default)]
    pub lock_npu: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            repeat: default_repeat(),
            lock_npu: false,
        }
    }
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Save raw outputs to `output_raw_<n>.dat`.
    #[serde(default)]
    pub dump_raw: bool,

    /// Directory raw outputs are written to.
    #[serde(default = "default_directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dump_raw: false,
            directory: default_directory(),
        }
    }
}

fn default_backend() -> String {
    if cfg!(feature = "native") {
        "native".to_string()
    } else {
        "simulated".to_string()
    }
}

fn default_repeat() -> usize {
    1
}

fn default_directory() -> String {
    ".".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}
