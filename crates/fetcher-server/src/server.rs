use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use fetcher_store::posts::{PostRepo, PostSummary};
use fetcher_store::schema::POST;
use fetcher_store::{Database, StoreError};
use serde::Deserialize;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::view;

/// Upper bound on `limit` accepted from the query string.
pub const MAX_RESULT_LIMIT: u32 = 100;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Title substring used when the request carries no `q`.
    pub search_term: String,
    pub result_limit: u32,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            search_term: "Django".into(),
            result_limit: 10,
            request_timeout_secs: 30,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub posts: Arc<PostRepo>,
    pub search_term: Arc<str>,
    pub result_limit: u32,
}

impl AppState {
    pub fn new(db: Database, config: &ServerConfig) -> Self {
        Self {
            posts: Arc::new(PostRepo::new(db.clone())),
            db,
            search_term: Arc::from(config.search_term.as_str()),
            result_limit: config.result_limit.min(MAX_RESULT_LIMIT),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/posts/{id}", get(post_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// Bind and start serving. The returned handle keeps the server task alive.
pub async fn start(config: ServerConfig, db: Database) -> Result<ServerHandle, std::io::Error> {
    let state = AppState::new(db, &config);
    let router = build_router(state, Duration::from_secs(config.request_timeout_secs));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(%local_addr, "fetcher server started");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "server exited");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
    })
}

/// Handle returned by [`start`].
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

#[derive(Debug, Deserialize)]
struct IndexParams {
    q: Option<String>,
    limit: Option<u32>,
}

/// Store failures rendered with a JSON body: 404 for missing records,
/// 500 for everything else.
struct AppError(StoreError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => {
                tracing::error!(error = %self.0, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

/// Lists posts whose title contains the search term.
async fn index_handler(
    State(state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<Html<String>, AppError> {
    let term = params
        .q
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| state.search_term.to_string());
    let limit = params
        .limit
        .unwrap_or(state.result_limit)
        .min(MAX_RESULT_LIMIT);

    let posts = state.posts.search_titles(&term, limit)?;
    if let Some(first) = posts.first() {
        tracing::debug!(id = first.id, title = ?first.title, "first matching post");
    }
    Ok(Html(view::render_index(&term, &posts)))
}

async fn post_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostSummary>, AppError> {
    Ok(Json(state.posts.get(id)?))
}

async fn health_handler(State(state): State<AppState>) -> Response {
    match state.db.count(&POST) {
        Ok(posts) => Json(serde_json::json!({
            "status": "healthy",
            "posts": posts,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}
