//! Configuration for Tautulli Active Streams
//!
//! Configuration is a single YAML file (`tautulli.yaml` by default) with
//! support for two custom tags:
//!
//! - `!secret key` - Substitute from `secrets.yaml` next to the config file
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! Each item under `entries:` describes one Tautulli server and becomes a
//! [`TautulliEntry`] after validation.
//!
//! # Example
//!
//! ```ignore
//! use tautulli_config::load_config;
//!
//! let config = load_config("/config/tautulli.yaml")?;
//! for entry in config.entries()? {
//!     println!("{} -> {}", entry.title, entry.data.url);
//! }
//! ```

mod app;
mod entry;
mod error;
mod loader;
mod secrets;

pub use app::{load_config, load_config_str, AppConfig, EntryConfig, ServerConfig};
pub use entry::{
    normalize_url, ConnectionData, SlotAssignment, StreamOptions, TautulliEntry,
    DEFAULT_NUM_SENSORS, DEFAULT_SESSION_INTERVAL, DEFAULT_VERIFY_SSL, MAX_SESSION_INTERVAL,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::YamlLoader;
pub use secrets::Secrets;
