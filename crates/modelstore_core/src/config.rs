//! Engine configuration loaded from a JSON file.
//!
//! Every field is optional in the file; missing fields take the defaults
//! below. Values are validated when the file is loaded, so a loaded config
//! always converts into components without further checks.
//!
//! ```json
//! {
//!   "dialect": "postgres",
//!   "signing_key": "c2VjcmV0LWtleQ==",
//!   "graph_collection": "containment",
//!   "sequence_backend": "database",
//!   "log_level": "info",
//!   "log_dir": "/var/log/modelstore"
//! }
//! ```

use crate::dialect::Dialect;
use crate::signing::IdentifierSigner;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Read { path: String, message: String },
    Parse { path: String, message: String },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, message } => {
                write!(f, "failed to read config file `{path}`: {message}")
            }
            Self::Parse { path, message } => {
                write!(f, "failed to parse config file `{path}`: {message}")
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphCollection {
    #[default]
    Containment,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceBackend {
    #[default]
    Memory,
    Database,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Dialect tag: `postgres`, `h2`, `sqlite` or `mysql`.
    pub dialect: String,
    /// Base64 HMAC key. `None` generates a per-process key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
    pub graph_collection: GraphCollection,
    pub sequence_backend: SequenceBackend,
    pub log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Sqlite.as_str().to_string(),
            signing_key: None,
            graph_collection: GraphCollection::default(),
            sequence_backend: SequenceBackend::default(),
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn dialect(&self) -> ConfigResult<Dialect> {
        self.dialect
            .parse()
            .map_err(|err| ConfigError::Invalid(format!("{err}")))
    }

    /// Signer from `signing_key`, or a freshly generated one.
    pub fn signer(&self) -> ConfigResult<IdentifierSigner> {
        match self.signing_key.as_deref() {
            Some(encoded) => IdentifierSigner::from_base64(encoded)
                .map_err(|err| ConfigError::Invalid(err.to_string())),
            None => Ok(IdentifierSigner::generate()),
        }
    }

    /// Checks every field that is stored unparsed.
    pub fn validate(&self) -> ConfigResult<()> {
        self.dialect()?;
        if let Some(encoded) = self.signing_key.as_deref() {
            IdentifierSigner::from_base64(encoded)
                .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        crate::logging::normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

/// Reads, parses and validates a JSON config file.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<EngineConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    let config: EngineConfig = serde_json::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{load_config, ConfigError, EngineConfig, GraphCollection, SequenceBackend};
    use crate::dialect::Dialect;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dialect().unwrap(), Dialect::Sqlite);
        assert_eq!(config.graph_collection, GraphCollection::Containment);
        assert_eq!(config.sequence_backend, SequenceBackend::Memory);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"dialect": "PostgreSQL", "sequence_backend": "database"}"#)
            .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.dialect().unwrap(), Dialect::Postgres);
        assert_eq!(config.sequence_backend, SequenceBackend::Database);
        assert_eq!(config.signing_key, None);
    }

    #[test]
    fn invalid_values_fail_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        std::fs::write(&path, r#"{"dialect": "oracle"}"#).unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, r#"{"signing_key": "***"}"#).unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, r#"{"graph_collection": "recursive"}"#).unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
