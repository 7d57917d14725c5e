//! YAML loader with `!secret` and `!env_var` tag support

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader that resolves custom tags into plain values
pub struct YamlLoader {
    secrets: Secrets,
}

impl YamlLoader {
    /// Create a loader reading `secrets.yaml` from `config_dir`
    pub fn new(config_dir: &Path) -> ConfigResult<Self> {
        Ok(Self {
            secrets: Secrets::load(config_dir)?,
        })
    }

    pub fn with_secrets(secrets: Secrets) -> Self {
        Self { secrets }
    }

    /// Load and process a YAML file
    pub fn load_file(&self, path: &Path) -> ConfigResult<Value> {
        debug!("Loading YAML file: {:?}", path);
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        self.load_str(&content, path)
    }

    /// Load and process YAML from a string; `source_path` is used in errors
    pub fn load_str(&self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::yaml(source_path, e))?;
        self.process_value(value)
    }

    fn process_value(&self, value: Value) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    result.insert(self.process_value(k)?, self.process_value(v)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            _ => Ok(value),
        }
    }

    fn process_tagged(&self, tagged: serde_yaml::value::TaggedValue) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!("Processing tag '{}'", tag);

        match tag.as_str() {
            "!secret" => self.process_secret(tagged.value),
            "!env_var" => self.process_env_var(tagged.value),
            _ => Err(ConfigError::bad_tag(tag, "unsupported YAML tag")),
        }
    }

    fn process_secret(&self, value: Value) -> ConfigResult<Value> {
        let Value::String(key) = value else {
            return Err(ConfigError::bad_tag("!secret", "key must be a string"));
        };

        let secret = self.secrets.get(&key)?;
        debug!("Substituted secret: {}", key);
        Ok(Value::String(secret.to_string()))
    }

    /// `!env_var NAME` or `!env_var NAME fallback`
    fn process_env_var(&self, value: Value) -> ConfigResult<Value> {
        let Value::String(spec) = value else {
            return Err(ConfigError::bad_tag("!env_var", "variable name must be a string"));
        };

        let (name, fallback) = match spec.trim().split_once(char::is_whitespace) {
            Some((name, fallback)) => (name.to_string(), Some(fallback.trim().to_string())),
            None => (spec.trim().to_string(), None),
        };

        match (std::env::var(&name), fallback) {
            (Ok(v), _) => {
                debug!("Substituted env var: {}", name);
                Ok(Value::String(v))
            }
            (Err(_), Some(fallback)) => Ok(Value::String(fallback)),
            (Err(_), None) => Err(ConfigError::MissingEnvVar(name)),
        }
    }
}

/// Directory holding `path`, used to locate `secrets.yaml`
pub(crate) fn config_dir_of(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
