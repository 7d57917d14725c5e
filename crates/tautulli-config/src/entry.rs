//! Config entries
//!
//! A [`TautulliEntry`] is one validated, ready-to-load Tautulli server
//! configuration: connection data that identifies the server plus options
//! that shape the sensors. Changing either requires reloading the entry.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Default poll interval in seconds
pub const DEFAULT_SESSION_INTERVAL: u64 = 10;
/// Longest accepted poll interval in seconds (one day)
pub const MAX_SESSION_INTERVAL: u64 = 86_400;
/// Default number of session slots
pub const DEFAULT_NUM_SENSORS: usize = 5;
pub const DEFAULT_VERIFY_SSL: bool = true;

/// How sessions are mapped onto sensor slots between polls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotAssignment {
    /// Slot i shows the i-th session of the latest response
    #[default]
    Positional,
    /// A session keeps its slot while it stays active; new sessions backfill
    Sticky,
}

/// How to reach a Tautulli server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionData {
    /// Base URL, normalized: scheme present, no trailing slash
    pub url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub verify_ssl: bool,
}

/// User-tunable behaviour of an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Seconds between polls
    pub session_interval: u64,
    /// Number of `sensor.plex_session_*` slots
    pub num_sensors: usize,
    /// Copy every field Tautulli reports into slot attributes
    pub advanced_attributes: bool,
    pub slot_assignment: SlotAssignment,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            session_interval: DEFAULT_SESSION_INTERVAL,
            num_sensors: DEFAULT_NUM_SENSORS,
            advanced_attributes: false,
            slot_assignment: SlotAssignment::Positional,
        }
    }
}

/// A validated Tautulli config entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TautulliEntry {
    pub entry_id: String,
    pub title: String,
    pub data: ConnectionData,
    pub options: StreamOptions,
}

impl TautulliEntry {
    /// Validate and normalize raw values into an entry
    pub fn new(
        entry_id: impl Into<String>,
        title: impl Into<String>,
        data: ConnectionData,
        options: StreamOptions,
    ) -> ConfigResult<Self> {
        let entry_id = entry_id.into();
        if entry_id.trim().is_empty() {
            return Err(invalid("id", "must not be empty"));
        }
        if data.api_key.trim().is_empty() {
            return Err(invalid("api_key", "must not be empty"));
        }
        if options.num_sensors == 0 {
            return Err(invalid("num_sensors", "must be at least 1"));
        }
        if options.session_interval == 0 {
            return Err(invalid("session_interval", "must be at least 1 second"));
        }
        if options.session_interval > MAX_SESSION_INTERVAL {
            return Err(invalid("session_interval", "must be at most 86400 seconds"));
        }

        let data = ConnectionData {
            url: normalize_url(&data.url)?,
            api_key: data.api_key.trim().to_string(),
            verify_ssl: data.verify_ssl,
        };

        let title = title.into();
        let title = if title.trim().is_empty() {
            "Tautulli".to_string()
        } else {
            title.trim().to_string()
        };

        Ok(Self {
            entry_id,
            title,
            data,
            options,
        })
    }

    /// Whether switching from `self` to `other` changes anything the running
    /// entry depends on
    pub fn needs_reload(&self, other: &TautulliEntry) -> bool {
        self.data != other.data || self.options != other.options || self.title != other.title
    }
}

/// Trim, default the scheme to `http://`, and drop trailing slashes
pub fn normalize_url(raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("url", "must not be empty"));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let (scheme, rest) = with_scheme
        .split_once("://")
        .ok_or_else(|| invalid("url", "missing scheme"))?;
    if scheme != "http" && scheme != "https" {
        return Err(invalid("url", "scheme must be http or https"));
    }

    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Err(invalid("url", "missing host"));
    }

    Ok(format!("{}://{}", scheme, rest))
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidOption {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(url: &str, key: &str) -> ConnectionData {
        ConnectionData {
            url: url.to_string(),
            api_key: key.to_string(),
            verify_ssl: true,
        }
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("tautulli.local:8181").unwrap(), "http://tautulli.local:8181");
        assert_eq!(
            normalize_url(" https://host/tautulli/ ").unwrap(),
            "https://host/tautulli"
        );
        assert!(normalize_url("").is_err());
        assert!(normalize_url("ftp://host").is_err());
        assert!(normalize_url("http:///").is_err());
    }

    #[test]
    fn test_entry_validation() {
        let ok = TautulliEntry::new("e1", "", data("host", "key"), StreamOptions::default()).unwrap();
        assert_eq!(ok.title, "Tautulli");
        assert_eq!(ok.data.url, "http://host");

        assert!(TautulliEntry::new("e1", "x", data("host", " "), StreamOptions::default()).is_err());

        let zero_sensors = StreamOptions {
            num_sensors: 0,
            ..StreamOptions::default()
        };
        assert!(TautulliEntry::new("e1", "x", data("host", "k"), zero_sensors).is_err());

        let zero_interval = StreamOptions {
            session_interval: 0,
            ..StreamOptions::default()
        };
        assert!(TautulliEntry::new("e1", "x", data("host", "k"), zero_interval).is_err());
    }

    #[test]
    fn test_session_interval_upper_bound() {
        let options = |session_interval| StreamOptions {
            session_interval,
            ..StreamOptions::default()
        };

        let day = TautulliEntry::new("e1", "x", data("host", "k"), options(MAX_SESSION_INTERVAL));
        assert_eq!(day.unwrap().options.session_interval, 86_400);

        for huge in [MAX_SESSION_INTERVAL + 1, u64::MAX / 2, u64::MAX] {
            match TautulliEntry::new("e1", "x", data("host", "k"), options(huge)) {
                Err(ConfigError::InvalidOption { field, .. }) => {
                    assert_eq!(field, "session_interval")
                }
                other => panic!("expected invalid session_interval, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_api_key_not_serialized() {
        let entry =
            TautulliEntry::new("e1", "Plex", data("host", "supersecret"), StreamOptions::default())
                .unwrap();
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("supersecret"));
    }

    #[test]
    fn test_needs_reload() {
        let a = TautulliEntry::new("e1", "Plex", data("host", "k"), StreamOptions::default()).unwrap();
        let mut b = a.clone();
        assert!(!a.needs_reload(&b));
        b.options.num_sensors = 3;
        assert!(a.needs_reload(&b));
    }
}
