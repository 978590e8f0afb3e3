use crate::{
    bookmarks::{self, Bookmark, BookmarkCreate, BookmarkStore, MemoryStore},
    metadata::{BookmarkMetadata, MetadataExtractor},
    scrape::headless::Renderer,
};
use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("bookmark not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct SharedState {
    pub store: Arc<MemoryStore>,
    pub extractor: Arc<MetadataExtractor<Renderer>>,
}

impl SharedState {
    pub fn new(extractor: MetadataExtractor<Renderer>) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            extractor: Arc::new(extractor),
        }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/metadata", post(metadata))
        .route("/api/bookmarks/create", post(create))
        .route("/api/bookmarks/get", post(get))
        .route("/api/bookmarks/delete", post(delete))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(Arc::new(state))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::warn!("shutting down");
}

async fn start_app(listen_addr: &str, state: SharedState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    log::info!("listening on {listen_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(listen_addr: &str, extractor: MetadataExtractor<Renderer>) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(listen_addr, SharedState::new(extractor)))
}

#[derive(Debug)]
pub struct HttpError(ApiError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            ApiError::NotFound => axum::http::StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ApiError::Other(_) => {
                log::error!("{self:?}");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<ApiError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MetadataRequest {
    pub url: String,
}

async fn metadata(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<MetadataRequest>,
) -> Result<Json<BookmarkMetadata>, HttpError> {
    log::debug!("payload: {payload:?}");
    Ok(Json(state.extractor.extract(&payload.url).await))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BookmarkCreateRequest {
    pub title: Option<String>,
    pub url: String,
}

async fn create(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<BookmarkCreateRequest>,
) -> Result<Json<Bookmark>, HttpError> {
    log::debug!("payload: {payload:?}");

    if payload.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url is required".into()).into());
    }

    let bmark_create = BookmarkCreate {
        title: payload.title,
        url: payload.url,
    };
    let bmark =
        bookmarks::create_bookmark(state.store.as_ref(), state.extractor.as_ref(), bmark_create)
            .await?;

    Ok(Json(bmark))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BookmarkIdRequest {
    pub id: u64,
}

async fn get(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<BookmarkIdRequest>,
) -> Result<Json<Bookmark>, HttpError> {
    log::debug!("payload: {payload:?}");

    state
        .store
        .get(payload.id)?
        .map(Json)
        .ok_or(ApiError::NotFound.into())
}

async fn delete(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<BookmarkIdRequest>,
) -> Result<(), HttpError> {
    log::debug!("payload: {payload:?}");

    match state.store.delete(payload.id)? {
        true => Ok(()),
        false => Err(ApiError::NotFound.into()),
    }
}
