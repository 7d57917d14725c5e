//! HTTP client for the Tautulli v2 API

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::TautulliError;
use crate::image::{ImageData, ImageRequest};
use crate::types::{Activity, Envelope};

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

/// The Tautulli commands used by the active-streams component
#[async_trait]
pub trait TautulliApi: Send + Sync {
    /// Current sessions and stream counters
    async fn get_activity(&self) -> Result<Activity, TautulliError>;

    /// Stop a playback session, showing `message` to the viewer
    async fn terminate_session(&self, session_id: &str, message: &str)
        -> Result<(), TautulliError>;

    /// Fetch artwork through Tautulli's image proxy
    async fn fetch_image(&self, request: &ImageRequest) -> Result<ImageData, TautulliError>;
}

/// reqwest-backed [`TautulliApi`]
#[derive(Clone)]
pub struct TautulliClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for TautulliClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TautulliClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl TautulliClient {
    /// Create a client for the Tautulli instance at `base_url`
    ///
    /// `base_url` is the server root (`http://host:8181`); `/api/v2` is
    /// appended here.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        verify_ssl: bool,
    ) -> Result<Self, TautulliError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(TautulliError::from_reqwest)?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/v2", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        method: Method,
        cmd: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, TautulliError> {
        debug!(cmd, endpoint = %self.endpoint, "Sending Tautulli request");
        self.http
            .request(method, &self.endpoint)
            .query(&[("apikey", self.api_key.as_str()), ("cmd", cmd)])
            .query(params)
            .send()
            .await
            .map_err(TautulliError::from_reqwest)
    }

    /// Run a JSON command and return the envelope's `data`
    async fn command(
        &self,
        method: Method,
        cmd: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, TautulliError> {
        let response = self.send(method, cmd, params).await?;
        let status = response.status();
        let body = response.text().await.map_err(TautulliError::from_reqwest)?;

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(TautulliError::Auth {
                status: Some(status.as_u16()),
                message: envelope_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }
        if !status.is_success() {
            return Err(TautulliError::Status {
                status: status.as_u16(),
            });
        }

        let envelope: Envelope =
            serde_json::from_str(&body).map_err(|e| TautulliError::Malformed(e.to_string()))?;
        let response = envelope.response;

        if response.result != "success" {
            let message = response
                .message
                .unwrap_or_else(|| format!("result was {:?}", response.result));
            if message.to_ascii_lowercase().contains("apikey") {
                return Err(TautulliError::Auth {
                    status: None,
                    message,
                });
            }
            return Err(TautulliError::Api(message));
        }

        Ok(response.data)
    }
}

fn envelope_message(body: &str) -> Option<String> {
    serde_json::from_str::<Envelope>(body)
        .ok()
        .and_then(|envelope| envelope.response.message)
}

#[async_trait]
impl TautulliApi for TautulliClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn get_activity(&self) -> Result<Activity, TautulliError> {
        let data = self.command(Method::GET, "get_activity", &[]).await?;
        if !data.is_object() {
            return Err(TautulliError::Malformed(
                "get_activity data is not an object".to_string(),
            ));
        }
        serde_json::from_value(data).map_err(|e| TautulliError::Malformed(e.to_string()))
    }

    #[instrument(skip(self, message), fields(endpoint = %self.endpoint))]
    async fn terminate_session(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<(), TautulliError> {
        self.command(
            Method::POST,
            "terminate_session",
            &[("session_id", session_id), ("message", message)],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_image(&self, request: &ImageRequest) -> Result<ImageData, TautulliError> {
        let width = request.width.to_string();
        let height = request.height.to_string();
        let refresh = request.refresh.to_string();
        let response = self
            .send(
                Method::GET,
                "pms_image_proxy",
                &[
                    ("img", request.img.as_str()),
                    ("width", width.as_str()),
                    ("height", height.as_str()),
                    ("fallback", request.fallback.as_str()),
                    ("refresh", refresh.as_str()),
                ],
            )
            .await?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(TautulliError::Auth {
                status: Some(status.as_u16()),
                message: status.to_string(),
            });
        }
        if !status.is_success() {
            return Err(TautulliError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_IMAGE_TYPE)
            .to_string();
        let bytes = response.bytes().await.map_err(TautulliError::from_reqwest)?;

        Ok(ImageData {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
