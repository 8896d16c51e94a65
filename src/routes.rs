use crate::model::{ShortenUrlData, ShortenUrlResult, VisitErrorCode, VisitOutcome, VisitRequest};
use crate::storage::UrlCoreService;
use crate::utils::{error_response, internal_error, parse_url, with_timeout};
use crate::visit::UrlVisitService;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// every redirect has to reach the visit counter
const CACHE_CONTROL_HEADER_VALUE: &str = "no-store";
const DEFAULT_TIMEOUT: u64 = 3000;

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<UrlCoreService>,
    pub visits: Arc<UrlVisitService>,
}

impl AppState {
    pub fn new(core: UrlCoreService) -> Self {
        let core = Arc::new(core);
        Self {
            visits: Arc::new(UrlVisitService::new(core.clone())),
            core,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/urls", post(create_url))
        .route("/api/urls/:path/visit", post(visit))
        .route("/health", get(health))
        .route("/:path", get(redirect))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn create_url(
    State(state): State<AppState>,
    Json(data): Json<ShortenUrlData>,
) -> Result<Json<ShortenUrlResult>, (StatusCode, String)> {
    let result = with_timeout(DEFAULT_TIMEOUT, state.core.shorten_url(data))
        .await?
        .map_err(error_response)?;
    Ok(Json(result))
}

pub async fn visit(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<Json<VisitOutcome>, (StatusCode, String)> {
    let password = parse_visit_request(&body)?.password;
    let outcome = with_timeout(
        DEFAULT_TIMEOUT,
        state.visits.attempt_visit(&path, password.as_deref()),
    )
    .await?
    .map_err(error_response)?;
    Ok(Json(outcome))
}

pub async fn redirect(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let outcome = with_timeout(DEFAULT_TIMEOUT, state.visits.attempt_visit(&path, None))
        .await?
        .map_err(error_response)?;
    match outcome {
        VisitOutcome::Success { endpoint, .. } => {
            let location = parse_url(&endpoint).map_err(internal_error)?;
            Response::builder()
                .status(StatusCode::TEMPORARY_REDIRECT)
                .header(header::LOCATION, location.as_str())
                .header(header::CACHE_CONTROL, CACHE_CONTROL_HEADER_VALUE)
                .body(Body::empty())
                .map_err(internal_error)
        }
        VisitOutcome::Error { code } => Err((visit_error_status(code), code.as_str().into())),
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// An empty body is a visit without password; anything else has to be a
/// valid [`VisitRequest`].
fn parse_visit_request(body: &[u8]) -> Result<VisitRequest, (StatusCode, String)> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(VisitRequest::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        tracing::debug!("Rejected visit body: {}", err);
        (StatusCode::BAD_REQUEST, format!("Invalid visit request: {err}"))
    })
}

fn visit_error_status(code: VisitErrorCode) -> StatusCode {
    match code {
        VisitErrorCode::NotFound => StatusCode::NOT_FOUND,
        VisitErrorCode::WrongPassword => StatusCode::UNAUTHORIZED,
        VisitErrorCode::Expired => StatusCode::GONE,
        VisitErrorCode::EndpointError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
