//! Configuration errors

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid YAML: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("!secret {0} is not defined in secrets.yaml")]
    MissingSecret(String),

    #[error("!env_var {0} is not set and has no default")]
    MissingEnvVar(String),

    #[error("{tag}: {reason}")]
    BadTag { tag: String, reason: String },

    /// An entry option failed validation
    #[error("{field} {reason}")]
    InvalidOption { field: String, reason: String },

    #[error("two entries share the id {0}")]
    DuplicateEntry(String),
}

impl ConfigError {
    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn yaml(path: &Path, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn bad_tag(tag: impl Into<String>, reason: &str) -> Self {
        Self::BadTag {
            tag: tag.into(),
            reason: reason.to_string(),
        }
    }
}
