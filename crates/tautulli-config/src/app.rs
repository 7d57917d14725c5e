//! Top-level configuration file

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::entry::{
    ConnectionData, SlotAssignment, StreamOptions, TautulliEntry, DEFAULT_NUM_SENSORS,
    DEFAULT_SESSION_INTERVAL, DEFAULT_VERIFY_SSL,
};
use crate::error::{ConfigError, ConfigResult};
use crate::loader::{config_dir_of, YamlLoader};

/// Contents of `tautulli.yaml`
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Default tracing filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

/// REST API listener
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One Tautulli server as written in YAML
#[derive(Debug, Clone, Deserialize)]
pub struct EntryConfig {
    /// Stable id; derived from the title when omitted
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    #[serde(default = "default_session_interval")]
    pub session_interval: u64,
    #[serde(default = "default_num_sensors")]
    pub num_sensors: usize,
    #[serde(default)]
    pub advanced_attributes: bool,
    #[serde(default)]
    pub slot_assignment: SlotAssignment,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8123
}

fn default_verify_ssl() -> bool {
    DEFAULT_VERIFY_SSL
}

fn default_session_interval() -> u64 {
    DEFAULT_SESSION_INTERVAL
}

fn default_num_sensors() -> usize {
    DEFAULT_NUM_SENSORS
}

impl AppConfig {
    /// Validate every entry; entry ids must be unique
    pub fn entries(&self) -> ConfigResult<Vec<TautulliEntry>> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(self.entries.len());

        for raw in &self.entries {
            let title = raw.title.clone().unwrap_or_default();
            let entry_id = raw
                .id
                .clone()
                .unwrap_or_else(|| id_from_title(&title));

            if !seen.insert(entry_id.clone()) {
                return Err(ConfigError::DuplicateEntry(entry_id));
            }

            let entry = TautulliEntry::new(
                entry_id,
                title,
                ConnectionData {
                    url: raw.url.clone(),
                    api_key: raw.api_key.clone(),
                    verify_ssl: raw.verify_ssl,
                },
                StreamOptions {
                    session_interval: raw.session_interval,
                    num_sensors: raw.num_sensors,
                    advanced_attributes: raw.advanced_attributes,
                    slot_assignment: raw.slot_assignment,
                },
            )?;
            entries.push(entry);
        }

        Ok(entries)
    }
}

fn id_from_title(title: &str) -> String {
    let id: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let id = id.trim_matches('_');
    if id.is_empty() {
        "tautulli".to_string()
    } else {
        id.to_string()
    }
}

/// Load the configuration file at `path`, resolving `!secret` against the
/// `secrets.yaml` in the same directory
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    let path = path.as_ref();
    let loader = YamlLoader::new(&config_dir_of(path))?;
    let value = loader.load_file(path)?;
    let config: AppConfig =
        serde_yaml::from_value(value).map_err(|e| ConfigError::yaml(path, e))?;
    info!(
        "Loaded configuration from {:?} with {} entries",
        path,
        config.entries.len()
    );
    Ok(config)
}

/// Parse configuration from a string with the given loader
pub fn load_config_str(loader: &YamlLoader, content: &str) -> ConfigResult<AppConfig> {
    let source = Path::new("<string>");
    let value = loader.load_str(content, source)?;
    serde_yaml::from_value(value).map_err(|e| ConfigError::yaml(source, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::Secrets;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_applied() {
        let loader = YamlLoader::with_secrets(Secrets::default());
        let config = load_config_str(
            &loader,
            "entries:\n  - title: Home Plex\n    url: tautulli.local:8181\n    api_key: k\n",
        )
        .unwrap();

        assert_eq!(config.server.bind_addr(), "0.0.0.0:8123");
        assert_eq!(config.log_level, "info");

        let entries = config.entries().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.entry_id, "home_plex");
        assert_eq!(entry.data.url, "http://tautulli.local:8181");
        assert!(entry.data.verify_ssl);
        assert_eq!(entry.options.session_interval, 10);
        assert_eq!(entry.options.num_sensors, 5);
        assert!(!entry.options.advanced_attributes);
        assert_eq!(entry.options.slot_assignment, SlotAssignment::Positional);
    }

    #[test]
    fn test_duplicate_entry_ids_rejected() {
        let loader = YamlLoader::with_secrets(Secrets::default());
        let config = load_config_str(
            &loader,
            "entries:\n  - {title: Plex, url: a, api_key: k}\n  - {title: plex, url: b, api_key: k}\n",
        )
        .unwrap();
        assert!(matches!(
            config.entries(),
            Err(ConfigError::DuplicateEntry(id)) if id == "plex"
        ));
    }

    #[test]
    fn test_load_config_file_with_secret() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secrets.yaml"), "tautulli_api_key: s3cr3t\n").unwrap();
        let path = dir.path().join("tautulli.yaml");
        fs::write(
            &path,
            r#"
server:
  port: 9000
log_level: debug
entries:
  - id: main
    title: Plex
    url: https://tautulli.example.com/
    api_key: !secret tautulli_api_key
    verify_ssl: false
    session_interval: 4
    num_sensors: 3
    advanced_attributes: true
    slot_assignment: sticky
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.log_level, "debug");

        let entry = config.entries().unwrap().remove(0);
        assert_eq!(entry.entry_id, "main");
        assert_eq!(entry.data.api_key, "s3cr3t");
        assert_eq!(entry.data.url, "https://tautulli.example.com");
        assert!(!entry.data.verify_ssl);
        assert_eq!(entry.options.session_interval, 4);
        assert_eq!(entry.options.num_sensors, 3);
        assert!(entry.options.advanced_attributes);
        assert_eq!(entry.options.slot_assignment, SlotAssignment::Sticky);
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/tautulli.yaml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
