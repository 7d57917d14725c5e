//! Async client for the Tautulli v2 JSON API
//!
//! Only the three commands the active-streams component needs are covered:
//! `get_activity`, `terminate_session` and `pms_image_proxy`. Every request
//! carries the API key in its query string, so nothing in this crate ever
//! logs or returns a request URL; reqwest errors are stripped of their URL
//! before they are turned into [`TautulliError`].

mod client;
mod de;
mod error;
mod image;
mod redact;
mod types;

pub use client::{TautulliApi, TautulliClient, REQUEST_TIMEOUT};
pub use error::{ErrorClass, TautulliError};
pub use image::{ImageData, ImageRequest, IMAGE_PROXY_PATH};
pub use redact::{redact_secret, REDACTED};
pub use types::{Activity, PlaybackState, Session};
