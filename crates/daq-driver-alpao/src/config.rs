//! Mirror configuration.
//!
//! The SDK locates a mirror's calibration files relative to the working
//! directory, so the configuration directory is resolved here once and
//! handed to [`crate::DeformableMirror::open_with_config`] as part of the
//! identifier.
//!
//! # Example Configuration
//!
//! ```toml
//! identifier = "BOL143"
//! config_dir = "/opt/alpao/config"
//! sync_mode = "synchronous"
//! ack_timeout_ms = 1000
//! log_print_level = 2
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AlpaoError, Result};
use crate::parameter::SyncMode;

/// Configuration for one deformable mirror.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlpaoConfig {
    /// Serial name (e.g. "BOL143") or path to it
    pub identifier: String,

    /// Directory holding the mirror's configuration files
    #[serde(default)]
    pub config_dir: Option<PathBuf>,

    /// Blocking behaviour of sends
    #[serde(default)]
    pub sync_mode: Option<SyncMode>,

    /// Synchronous-mode acknowledge timeout in milliseconds
    #[serde(default)]
    pub ack_timeout_ms: Option<u64>,

    /// SDK diagnostic verbosity (0-4)
    #[serde(default)]
    pub log_print_level: Option<u8>,

    /// SDK error signalling mode
    #[serde(default)]
    pub use_exception: Option<bool>,
}

impl AlpaoConfig {
    /// Configuration that only names the mirror.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            config_dir: None,
            sync_mode: None,
            ack_timeout_ms: None,
            log_print_level: None,
            use_exception: None,
        }
    }

    /// Set the configuration directory.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| AlpaoError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AlpaoError::Config {
            message: format!("cannot read '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&text)
    }

    /// Structural checks. Parameter values are left to the SDK.
    pub fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() {
            return Err(AlpaoError::Config {
                message: "identifier must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Acknowledge timeout as a duration.
    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout_ms.map(Duration::from_millis)
    }

    /// Identifier passed to the lifecycle manager.
    ///
    /// A bare serial name is joined onto `config_dir`; an identifier that
    /// already names a directory is used unchanged.
    pub fn resolved_identifier(&self) -> Result<String> {
        let has_dir = self.identifier.chars().any(std::path::is_separator);
        match &self.config_dir {
            Some(dir) if !has_dir => dir
                .join(&self.identifier)
                .to_str()
                .map(str::to_string)
                .ok_or_else(|| AlpaoError::Config {
                    message: format!("config_dir '{}' is not valid UTF-8", dir.display()),
                }),
            _ => Ok(self.identifier.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = AlpaoConfig::from_toml_str(r#"identifier = "BOL143""#).unwrap();
        assert_eq!(config, AlpaoConfig::new("BOL143"));
        assert_eq!(config.resolved_identifier().unwrap(), "BOL143");
    }

    #[test]
    fn test_full_config() {
        let config = AlpaoConfig::from_toml_str(
            r#"
            identifier = "BOL143"
            config_dir = "/opt/alpao/config"
            sync_mode = "asynchronous"
            ack_timeout_ms = 250
            log_print_level = 4
            use_exception = false
            "#,
        )
        .unwrap();

        assert_eq!(config.sync_mode, Some(SyncMode::Asynchronous));
        assert_eq!(config.ack_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.log_print_level, Some(4));
        assert_eq!(
            PathBuf::from(config.resolved_identifier().unwrap()),
            Path::new("/opt/alpao/config").join("BOL143")
        );
    }

    #[test]
    fn test_path_identifier_ignores_config_dir() {
        let config = AlpaoConfig::new("lab/BOL143").with_config_dir("/opt/alpao/config");
        assert_eq!(config.resolved_identifier().unwrap(), "lab/BOL143");
    }

    #[test]
    fn test_rejects_empty_identifier() {
        let err = AlpaoConfig::from_toml_str(r#"identifier = "  ""#).unwrap_err();
        assert!(matches!(err, AlpaoError::Config { .. }));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(AlpaoConfig::from_toml_str("identifier = \"BOL143\"\nbogus = 1").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dm.toml");
        std::fs::write(&path, "identifier = \"BOL143\"\nsync_mode = \"synchronous\"\n").unwrap();

        let config = AlpaoConfig::from_file(&path).unwrap();
        assert_eq!(config.sync_mode, Some(SyncMode::Synchronous));

        assert!(AlpaoConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}
