//! HTTP search service.
//!
//! `POST /search` takes `{"query": "..."}` and answers with ranked videos.
//! Videos themselves are served as static files under the playback base.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use vidseek_core::types::VideoSearchResult;
use vidseek_core::Error;
use vidseek_hybrid::RetrievalAggregator;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<RetrievalAggregator>,
    pub top_k: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug)]
pub struct HttpError(pub Error);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "search failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<VideoSearchResult>>, HttpError> {
    let Json(request) = payload.map_err(|rejection| HttpError(Error::Validation(rejection.body_text())))?;
    let results = state.aggregator.search(&request.query, state.top_k).await.map_err(HttpError)?;
    tracing::info!(videos = results.len(), "search served");
    Ok(Json(results))
}

async fn health() -> &'static str {
    "ok"
}

/// Routes for the search service. `videos` is mounted at the playback base
/// when that base is a local path.
pub fn router(state: AppState, videos: Option<&Path>) -> Router {
    let mut app = Router::new().route("/search", post(search)).route("/health", get(health));

    let base = state.aggregator.urls().base().to_string();
    match videos {
        Some(dir) if base.len() > 1 && base.starts_with('/') => {
            tracing::info!(base = %base, dir = %dir.display(), "serving videos");
            app = app.nest_service(&base, ServeDir::new(dir));
        }
        Some(_) => tracing::info!(base = %base, "playback base is not a local path; videos not served"),
        None => {}
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

pub async fn serve(state: AppState, videos: Option<&Path>, addr: &str) -> anyhow::Result<()> {
    let app = router(state, videos);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
