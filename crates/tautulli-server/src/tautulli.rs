//! Tautulli-specific routes: artwork proxy and config reload

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tautulli_api::{ImageRequest, TautulliError};
use tautulli_config::load_config;
use tracing::{info, warn};

use crate::{api_error, ApiError, AppState};

/// Query of `GET /api/tautulli/image`
///
/// `entry_id` and `img` are optional here so their absence maps to a 400
/// with a message instead of a bare query rejection.
#[derive(Debug, Deserialize)]
pub(crate) struct ImageQuery {
    entry_id: Option<String>,
    img: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fallback: Option<String>,
    refresh: Option<bool>,
}

impl ImageQuery {
    fn into_request(self) -> Result<(String, ImageRequest), ApiError> {
        let entry_id = self
            .entry_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing entry_id"))?;
        let img = self
            .img
            .filter(|img| !img.is_empty())
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing img"))?;

        let mut request = ImageRequest::new(img);
        if let Some(width) = self.width {
            request.width = width;
        }
        if let Some(height) = self.height {
            request.height = height;
        }
        if let Some(fallback) = self.fallback {
            request.fallback = fallback;
        }
        if let Some(refresh) = self.refresh {
            request.refresh = refresh;
        }
        Ok((entry_id, request))
    }
}

/// Upstream failures keep Tautulli's status where there is one
fn upstream_status(e: &TautulliError) -> StatusCode {
    let status = match e {
        TautulliError::Status { status } => Some(*status),
        TautulliError::Auth {
            status: Some(status),
            ..
        } => Some(*status),
        _ => None,
    };
    status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

/// GET /api/tautulli/image - proxy `pms_image_proxy` without exposing the key
pub(crate) async fn image_proxy(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    let (entry_id, request) = query.into_request()?;
    let api = state.streams.api(&entry_id).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown Tautulli entry: {}", entry_id),
        )
    })?;

    match api.fetch_image(&request).await {
        Ok(image) => Ok((
            [(header::CONTENT_TYPE, image.content_type)],
            image.bytes,
        )
            .into_response()),
        Err(e) => {
            warn!(entry_id = %entry_id, img = %request.img, "Image proxy failed: {}", e);
            Err(api_error(upstream_status(&e), e.to_string()))
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReloadResult {
    entry_id: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// POST /api/tautulli/reload - re-read the config file and sync entries
///
/// Entries whose settings are unchanged keep running and are not listed.
pub(crate) async fn reload(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReloadResult>>, ApiError> {
    let path = state.config_path.clone().ok_or_else(|| {
        api_error(StatusCode::NOT_FOUND, "Server was started without a config file")
    })?;

    let entries = load_config(&path)
        .and_then(|config| config.entries())
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let results: Vec<ReloadResult> = state
        .streams
        .sync_entries(entries)
        .await
        .into_iter()
        .map(|(entry_id, result)| ReloadResult {
            entry_id,
            success: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        })
        .collect();

    info!(
        "Reloaded {:?}: {} entries changed, {} loaded",
        path,
        results.len(),
        state.streams.entry_ids().len()
    );
    Ok(Json(results))
}
