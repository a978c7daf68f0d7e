use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use search_core::persist::IndexPaths;
use search_core::{IndexStatus, QueryError, ScoredResult, SearchService, DEFAULT_K};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

pub const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    /// Parsed by the handler so a bad value gets the JSON error shape.
    pub k: Option<String>,
}

fn parse_k(raw: Option<&str>) -> Result<usize, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_K),
        Some(v) => v
            .parse::<usize>()
            .map(|k| k.min(MAX_K))
            .map_err(|_| api_error(StatusCode::UNPROCESSABLE_ENTITY, format!("k must be a non-negative integer, got {v:?}"))),
    }
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ScoredResult>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

impl From<QueryError> for ErrorResponse {
    fn from(e: QueryError) -> Self {
        Self { error: e.to_string() }
    }
}

fn query_error(e: QueryError) -> ApiError {
    let status = match e {
        QueryError::InvalidQuery => StatusCode::UNPROCESSABLE_ENTITY,
        QueryError::IndexUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(e.into()))
}

pub struct AppState {
    pub index_root: PathBuf,
    pub service: SearchService,
    pub admin_token: Option<String>,
}

/// Load the index under `index_dir` and build the router. Never fails: a
/// missing or broken index leaves the service in degraded mode.
pub fn build_app(index_dir: impl Into<PathBuf>) -> Router {
    let index_root = index_dir.into();
    let service = SearchService::open(&IndexPaths::new(&index_root));
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    router(Arc::new(AppState { index_root, service, admin_token }))
}

pub fn router(state: Arc<AppState>) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let k = parse_k(params.k.as_deref())?;
    let query = params.query.unwrap_or_default();

    let results = state.service.search(&query, k).map_err(query_error)?;
    tracing::debug!(%query, hits = results.len(), took_ms = start.elapsed().as_millis() as u64, "search");
    Ok(Json(SearchResponse { query, results }))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<IndexStatus> {
    Json(state.service.status())
}

async fn reload_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<IndexStatus>, ApiError> {
    authorize(&state, &headers)?;
    let worker = state.clone();
    let reloaded = tokio::task::spawn_blocking(move || worker.service.reload(&IndexPaths::new(&worker.index_root)))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    match reloaded {
        Ok(status) => Ok(Json(status)),
        Err(e) => {
            tracing::warn!(error = %e, "reload failed, keeping current index");
            Err(query_error(e))
        }
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(api_error(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "invalid admin token"))
    }
}
