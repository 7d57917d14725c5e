//! Error types for Tautulli requests

use serde::Serialize;
use thiserror::Error;

/// Errors returned by the Tautulli client
///
/// Messages never contain request URLs, since those carry the API key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TautulliError {
    #[error("could not connect to Tautulli: {0}")]
    Connection(String),

    #[error("request to Tautulli timed out")]
    Timeout,

    #[error("Tautulli rejected the API key (HTTP {status:?}): {message}")]
    Auth {
        status: Option<u16>,
        message: String,
    },

    #[error("Tautulli returned HTTP {status}")]
    Status { status: u16 },

    #[error("malformed response from Tautulli: {0}")]
    Malformed(String),

    #[error("Tautulli reported an error: {0}")]
    Api(String),

    #[error("invalid client configuration: {0}")]
    Configuration(String),
}

/// Coarse classification used for logging and snapshot status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Network failure or timeout
    Connectivity,
    /// Missing or wrong API key
    Authentication,
    /// Unexpected status code or body
    MalformedResponse,
    /// A well-formed `result: error` reply, e.g. unknown session id
    Rejected,
    Configuration,
}

impl TautulliError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TautulliError::Connection(_) | TautulliError::Timeout => ErrorClass::Connectivity,
            TautulliError::Auth { .. } => ErrorClass::Authentication,
            TautulliError::Status { .. } | TautulliError::Malformed(_) => {
                ErrorClass::MalformedResponse
            }
            TautulliError::Api(_) => ErrorClass::Rejected,
            TautulliError::Configuration(_) => ErrorClass::Configuration,
        }
    }

    /// Convert a transport error, dropping the URL it carries
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            TautulliError::Timeout
        } else if err.is_decode() {
            TautulliError::Malformed(err.to_string())
        } else if err.is_builder() {
            TautulliError::Configuration(err.to_string())
        } else {
            TautulliError::Connection(err.to_string())
        }
    }
}
