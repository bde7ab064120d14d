//! Configuration for the ndarray backend

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dtype::DType;
use crate::error::{Result, TensorError};

/// Largest precision that still distinguishes every `f64`
const MAX_PRECISION: usize = 17;

/// Main configuration for the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Element type used when a caller does not name one
    pub default_dtype: DType,
    /// Seed for the random generator; entropy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Whether binary operators broadcast operands of different shapes
    pub allow_broadcast: bool,
    /// Rendering settings
    pub display: DisplayConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            default_dtype: DType::F32,
            seed: None,
            allow_broadcast: true,
            display: DisplayConfig::default(),
        }
    }
}

/// How tensors are rendered as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Tensors with more elements render as a one-line summary
    pub max_elements: usize,
    /// Digits after the decimal point for floating point elements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<usize>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_elements: 1000,
            precision: None,
        }
    }
}

impl BackendConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TensorError::config(
                "CONFIG_READ_FAILED",
                format!("Failed to read {}: {}", path.display(), e),
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TensorError::config("CONFIG_PARSE_FAILED", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| TensorError::config("CONFIG_SERIALIZE_FAILED", e.to_string()))?;
        std::fs::write(path, content).map_err(|e| {
            TensorError::config(
                "CONFIG_WRITE_FAILED",
                format!("Failed to write {}: {}", path.display(), e),
            )
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.display.max_elements == 0 {
            return Err(TensorError::config(
                "CONFIG_INVALID",
                "display.max_elements must be greater than 0",
            ));
        }

        if let Some(precision) = self.display.precision {
            if precision > MAX_PRECISION {
                return Err(TensorError::config(
                    "CONFIG_INVALID",
                    format!("display.precision must be at most {}, got {}", MAX_PRECISION, precision),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BackendConfig::default();
        assert_eq!(config.default_dtype, DType::F32);
        assert!(config.allow_broadcast);
        assert_eq!(config.display.max_elements, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = BackendConfig::from_toml_str(
            r#"
            default_dtype = "int32"
            seed = 42

            [display]
            precision = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.default_dtype, DType::I32);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.display.precision, Some(3));
        assert_eq!(config.display.max_elements, 1000);
    }

    #[test]
    fn test_invalid_config() {
        let err = BackendConfig::from_toml_str("[display]\nmax_elements = 0").unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");

        let err = BackendConfig::from_toml_str("[display]\nprecision = 40").unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");

        let err = BackendConfig::from_toml_str("default_dtype = \"float16\"").unwrap_err();
        assert_eq!(err.code(), "CONFIG_PARSE_FAILED");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BackendConfig {
            seed: Some(7),
            allow_broadcast: false,
            ..Default::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("float32"));
        assert_eq!(BackendConfig::from_toml_str(&text).unwrap(), config);
    }
}
