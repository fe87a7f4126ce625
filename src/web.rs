use crate::{
    app::AppError,
    config::Config,
    semantic::{DeleteOutcome, SearchHit, SemanticSearchService},
};
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{PathRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    service: Arc<SemanticSearchService>,
}

/// Build the HTTP API around `service`.
pub fn router(service: Arc<SemanticSearchService>, upload_limit_bytes: usize) -> Router {
    let shared_state = Arc::new(SharedState { service });

    Router::new()
        .route("/list_pdfs", get(list_pdfs))
        .route("/upload_pdf", post(upload_pdf))
        .route("/delete_pdf/:name", delete(delete_pdf))
        .route("/reset", post(reset))
        .route("/search", get(search))
        .layer(DefaultBodyLimit::max(upload_limit_bytes))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn start_app(config: Config, service: Arc<SemanticSearchService>) -> anyhow::Result<()> {
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
                Ok(mut stream) => {
                    stream.recv().await;
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

    let app = router(service, config.upload_limit_bytes());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    log::info!("listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(config: Config, service: Arc<SemanticSearchService>) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(config, service).await })
}

#[derive(Debug)]
struct HttpError(AppError);

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AppError::BadRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::Semantic(err) if err.is_input_error() => {
                axum::http::StatusCode::BAD_REQUEST
            }
            _ => {
                log::error!("{self:?}");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListResponse {
    pub pdfs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub top_k: Option<usize>,
    pub pdf: Option<String>,
}

async fn list_pdfs(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<ListResponse>, HttpError> {
    let service = state.service.clone();

    tokio::task::block_in_place(move || {
        let pdfs = service.list()?;
        Ok(ListResponse { pdfs }.into())
    })
}

async fn upload_pdf(
    State(state): State<Arc<SharedState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<StatusResponse>, HttpError> {
    let mut multipart = multipart.map_err(|rej| AppError::BadRequest(rej.body_text()))?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("file field has no file name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(err.body_text()))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("missing multipart field 'file'".to_string()))?;

    log::debug!("upload: {file_name:?} ({} bytes)", bytes.len());

    let service = state.service.clone();

    tokio::task::block_in_place(move || {
        service.ingest_pdf(&file_name, &bytes)?;
        Ok(StatusResponse::success(format!("Uploaded and indexed {file_name}")).into())
    })
}

async fn delete_pdf(
    State(state): State<Arc<SharedState>>,
    name: Result<Path<String>, PathRejection>,
) -> Result<Json<StatusResponse>, HttpError> {
    let Path(name) = name.map_err(|rej| AppError::BadRequest(rej.body_text()))?;
    let service = state.service.clone();

    tokio::task::block_in_place(move || {
        let message = match service.delete(&name)? {
            DeleteOutcome::Removed => format!("{name} deleted from memory and disk."),
            DeleteOutcome::NotFound => format!("{name} was not indexed; nothing to delete."),
        };
        Ok(StatusResponse::success(message).into())
    })
}

async fn reset(State(state): State<Arc<SharedState>>) -> Result<Json<StatusResponse>, HttpError> {
    let service = state.service.clone();

    tokio::task::block_in_place(move || {
        service.reset()?;
        Ok(StatusResponse::success("All PDFs and embeddings have been cleared.").into())
    })
}

async fn search(
    State(state): State<Arc<SharedState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, HttpError> {
    let Query(params) = params.map_err(|rej| AppError::BadRequest(rej.body_text()))?;
    log::debug!("search: {params:?}");

    let service = state.service.clone();
    let scope = params.pdf.filter(|pdf| !pdf.is_empty());

    tokio::task::block_in_place(move || {
        let outcome = service.search(&params.query, params.top_k, scope.as_deref())?;
        Ok(SearchResponse {
            message: outcome.message(scope.as_deref()),
            query: params.query,
            results: outcome.hits,
        }
        .into())
    })
}
