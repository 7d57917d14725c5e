//! `secrets.yaml`: values referenced by `!secret` tags

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

pub const SECRETS_FILE: &str = "secrets.yaml";

#[derive(Debug, Clone, Default)]
pub struct Secrets {
    values: HashMap<String, String>,
}

/// API keys are sometimes written unquoted and parse as numbers
fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

impl Secrets {
    /// Read `secrets.yaml` in `config_dir`; no file means no secrets
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join(SECRETS_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No {} in {:?}", SECRETS_FILE, config_dir);
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::read(&path, e)),
        };

        let raw: HashMap<String, Value> =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::yaml(&path, e))?;
        let values: HashMap<String, String> = raw
            .into_iter()
            .map(|(key, value)| (key, scalar_to_string(value)))
            .collect();

        debug!("Loaded {} secrets", values.len());
        Ok(Self { values })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> ConfigResult<&str> {
        match self.values.get(key) {
            Some(value) => Ok(value.as_str()),
            None => Err(ConfigError::MissingSecret(key.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_secrets_stringifies_scalars() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("secrets.yaml"),
            "tautulli_api_key: abc123\nnumeric_key: 8181\nflag: true\n",
        )
        .unwrap();

        let secrets = Secrets::load(dir.path()).unwrap();
        assert_eq!(secrets.get("tautulli_api_key").unwrap(), "abc123");
        assert_eq!(secrets.get("numeric_key").unwrap(), "8181");
        assert_eq!(secrets.get("flag").unwrap(), "true");
        assert_eq!(secrets.len(), 3);
    }

    #[test]
    fn test_missing_secret_and_file() {
        let dir = TempDir::new().unwrap();
        let secrets = Secrets::load(dir.path()).unwrap();
        assert!(secrets.is_empty());
        assert!(matches!(
            secrets.get("nope"),
            Err(ConfigError::MissingSecret(_))
        ));
    }
}
