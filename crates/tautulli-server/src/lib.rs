//! REST API for Tautulli Active Streams
//!
//! Exposes the hub (states, services, notifications) over HTTP, plus the
//! artwork proxy that session `image_url`s point at and a config reload
//! endpoint.

mod tautulli;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::PathBuf;
use tautulli_core::Context;
use tautulli_hub::{Hub, Notification, ServiceDescription, ServiceError};
use tautulli_streams::TautulliStreams;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Config file read when no path is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "tautulli.yaml";

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub streams: TautulliStreams,
    /// Re-read by `POST /api/tautulli/reload`
    pub config_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(streams: TautulliStreams, config_path: Option<PathBuf>) -> Self {
        Self {
            hub: streams.hub().clone(),
            streams,
            config_path,
        }
    }
}

#[derive(Serialize)]
struct ApiStatus {
    message: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub message: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
        }),
    )
}

#[derive(Serialize)]
struct ServiceDomain {
    domain: String,
    services: BTreeMap<String, ServiceDescription>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/", get(api_status))
        .route("/api/health", get(health_check))
        .route("/api/states", get(get_states))
        .route("/api/states/:entity_id", get(get_state))
        .route("/api/services", get(get_services))
        .route("/api/services/:domain/:service", post(call_service))
        .route("/api/persistent_notification", get(get_notifications))
        .route("/api/tautulli/image", get(tautulli::image_proxy))
        .route("/api/tautulli/reload", post(tautulli::reload))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` resolves
pub async fn start_server(
    state: AppState,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

// ==================== Handlers ====================

/// GET /api/
async fn api_status() -> Json<ApiStatus> {
    Json(ApiStatus {
        message: "API running.",
    })
}

/// GET /api/health
async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/states
async fn get_states(State(state): State<AppState>) -> Json<Vec<tautulli_core::State>> {
    Json(state.hub.states.all())
}

/// GET /api/states/{entity_id}
async fn get_state(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<tautulli_core::State>, ApiError> {
    state
        .hub
        .states
        .get(&entity_id)
        .map(Json)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("Entity not found: {}", entity_id),
            )
        })
}

/// GET /api/services - services grouped by domain
async fn get_services(State(state): State<AppState>) -> Json<Vec<ServiceDomain>> {
    let domains = state
        .hub
        .services
        .all_services()
        .into_iter()
        .map(|(domain, descriptions)| ServiceDomain {
            domain,
            services: descriptions
                .into_iter()
                .map(|desc| (desc.service.clone(), desc))
                .collect(),
        })
        .collect();
    Json(domains)
}

/// POST /api/services/{domain}/{service}[?return_response]
///
/// The body is the service data; an empty body means `{}`.
async fn call_service(
    State(state): State<AppState>,
    Path((domain, service)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let service_data: Value = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Invalid JSON body: {}", e),
            )
        })?
    };
    let return_response = params.contains_key("return_response");
    debug!("HTTP call to {}.{}", domain, service);

    let response = state
        .hub
        .services
        .call(&domain, &service, service_data, Context::new(), return_response)
        .await
        .map_err(service_error)?;

    if return_response {
        Ok(Json(json!({
            "changed_states": [],
            "service_response": response.unwrap_or(Value::Null),
        }))
        .into_response())
    } else {
        Ok(Json(Vec::<Value>::new()).into_response())
    }
}

fn service_error(e: ServiceError) -> ApiError {
    let status = match &e {
        ServiceError::NotFound { .. }
        | ServiceError::InvalidData(_)
        | ServiceError::ResponseNotSupported => StatusCode::BAD_REQUEST,
        ServiceError::CallFailed(_) | ServiceError::InvalidSchema { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, format!("Service call failed: {}", e))
}

/// GET /api/persistent_notification
async fn get_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.hub.notifications.list())
}
