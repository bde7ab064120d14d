//! Application-owned backend state

use std::path::Path;

use tracing::debug;

use crate::backend::NdBackend;
use crate::config::BackendConfig;
use crate::dtype::DType;
use crate::error::Result;
use crate::tensor::TensorHandle;

/// Owns the configuration and the backend built from it.
///
/// Create one per application and pass it by reference to the code that needs
/// a backend. Nothing in the crate keeps a global instance.
#[derive(Debug)]
pub struct BackendContext {
    config: BackendConfig,
    backend: NdBackend,
}

impl BackendContext {
    /// Validates `config` and builds the backend
    pub fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            default_dtype = %config.default_dtype,
            allow_broadcast = config.allow_broadcast,
            seeded = config.seed.is_some(),
            "creating backend context"
        );
        let backend = NdBackend::from_config(&config);
        Ok(Self { config, backend })
    }

    /// Loads configuration from a TOML file and builds the backend
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(BackendConfig::from_file(path)?)
    }

    /// The backend
    pub fn backend(&self) -> &NdBackend {
        &self.backend
    }

    /// The configuration the backend was built from
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Element type used when a caller does not name one
    pub fn default_dtype(&self) -> DType {
        self.config.default_dtype
    }

    /// Renders `tensor` with the configured display settings
    pub fn render(&self, tensor: &TensorHandle) -> String {
        tensor.render(&self.config.display)
    }
}

impl Default for BackendContext {
    fn default() -> Self {
        let config = BackendConfig::default();
        let backend = NdBackend::from_config(&config);
        Self { config, backend }
    }
}
