//! Engine options, loadable from JSON.
//!
//! ```json
//! { "default_algorithm": "argon2", "salt_size": 10, "lanes": 4 }
//! ```
//!
//! Every field is optional; missing fields take the values of
//! [`EngineOptions::default`].

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algorithm::argon::ARGON2_ID;
use crate::algorithm::HashError;

/// Random salt bytes per record, excluding the leading length byte.
pub const DEFAULT_SALT_SIZE: usize = 10;
/// Algorithm used for new records.
pub const DEFAULT_ALGORITHM: &str = ARGON2_ID;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid option `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("Default algorithm '{0}' is not registered")]
    UnregisteredDefault(String),
    /// `lanes` disagrees with the registered default algorithm, so records
    /// from this engine would not verify on one built with the same options.
    #[error("Option `lanes` is {configured} but the registered algorithm runs {registered}")]
    LanesMismatch { configured: u32, registered: u32 },
    #[error("Registry construction failed: {0}")]
    Registry(#[from] HashError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOptions {
    /// Identifier new records are created with; also the reference point for
    /// rehash decisions.
    pub default_algorithm: String,
    /// Salt length for new records and the minimum below which an old record
    /// counts as weak.
    pub salt_size: usize,
    /// Argon2 lane count.  `None` derives it from the core count.
    pub lanes: Option<u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_algorithm: DEFAULT_ALGORITHM.to_string(),
            salt_size:         DEFAULT_SALT_SIZE,
            lanes:             None,
        }
    }
}

impl EngineOptions {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let opts: Self = serde_json::from_slice(bytes)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_algorithm.is_empty() || self.default_algorithm.contains('$') {
            return Err(ConfigError::Invalid {
                field:  "default_algorithm",
                reason: "must be non-empty and must not contain '$'".into(),
            });
        }
        if self.salt_size == 0 {
            return Err(ConfigError::Invalid {
                field:  "salt_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.lanes == Some(0) {
            return Err(ConfigError::Invalid {
                field:  "lanes",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
