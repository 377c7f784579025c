use crate::config::AppConfig;
use crate::error::SearchError;
use crate::presets::{self, Preset};
use crate::search::SearchService;
use crate::types::{ColumnsResult, SearchResult};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

pub type AppState = Arc<SearchService>;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    filters: Vec<String>,
}

/// Error body: `{ "ok": false, "error": { "code": …, "message": … } }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorResponse,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    ok: bool,
    error: ApiErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorResponse {
                ok: false,
                error: ApiErrorBody {
                    code,
                    message: message.into(),
                },
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        if err.is_client_fault() {
            return Self::bad_request(err.to_string());
        }
        // Backend details stay in the log.
        error!("search failed: {err}");
        Self::internal("Failed to search establishments")
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/search", post(search_handler))
        .route("/api/columns", get(columns_handler))
        .route("/api/presets", get(presets_handler))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };
    app.layer(CorsLayer::permissive())
}

pub async fn start_server(config: AppConfig, service: SearchService) -> Result<()> {
    info!("Preparing {} backend...", service.backend_name());
    service
        .preload()
        .await
        .context("Failed to load the sample dataset")?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let app = router(Arc::new(service), config.server.static_dir.as_deref());

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.backend_name(),
    }))
}

async fn search_handler(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResult>, ApiError> {
    let Json(request) = payload?;
    let result = state
        .run_search(request.geometry.as_ref(), request.filters.as_slice())
        .await?;
    Ok(Json(result))
}

async fn columns_handler(State(state): State<AppState>) -> Result<Json<ColumnsResult>, ApiError> {
    Ok(Json(state.columns().await?))
}

async fn presets_handler() -> Json<&'static [Preset]> {
    Json(presets::PRESETS)
}
