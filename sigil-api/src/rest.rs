//! REST endpoints.
//!
//! - `POST /add` - submit an entry; sequences it, folds pending entries
//!   into the tree, publishes a fresh signed checkpoint, and responds
//!   with `<decimal seq>\n<base64 leaf hash>\n`
//! - `GET /{path}` - serve a raw log object (checkpoint, tile, entry,
//!   leaf mapping) by its store path

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tracing::{debug, warn};

use sigil_core::checkpoint::{parse_checkpoint, Checkpoint};
use sigil_core::error::Error;
use sigil_core::hash::leaf_hash;
use sigil_log::integrate;
use sigil_storage::{LogStorage, ObjectStore};

use crate::server::ApiState;

/// REST API error response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotExist { key } => ApiError::NotFound(key),
            Error::Malformed { message } => ApiError::BadRequest(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Create the API router.
pub fn create_router<B: ObjectStore + 'static>() -> Router<Arc<ApiState<B>>> {
    Router::new()
        .route("/add", post(add_entry::<B>))
        .route("/{*path}", get(get_object::<B>))
}

/// `POST /add`: sequence the entry and publish an updated checkpoint.
async fn add_entry<B: ObjectStore>(
    State(state): State<Arc<ApiState<B>>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("entry must not be empty".to_string()));
    }
    let hash = leaf_hash(&body);

    let mut log = state.log.lock().await;
    let seq = match log.sequence(hash, &body).await {
        Ok(seq) => seq,
        Err(Error::DupeLeaf { seq }) => {
            debug!(seq, "duplicate entry submitted");
            seq
        }
        Err(e) => return Err(e.into()),
    };

    // Fold everything pending into the tree so readers can prove the new
    // entry against a published checkpoint.
    let raw = log.read_checkpoint().await?;
    let checkpoint = parse_checkpoint(&raw, &state.origin, &state.verifier)?;
    if let Some(head) = integrate(checkpoint.size, &mut *log).await? {
        let new_checkpoint = Checkpoint::new(&state.origin, head.size, head.root);
        let signed = state.signer.sign_note(&new_checkpoint.marshal())?;
        if let Err(e) = log.write_checkpoint(signed.as_bytes()).await {
            warn!("failed to publish checkpoint: {e}");
            return Err(e.into());
        }
    }

    let body = format!("{seq}\n{}\n", hash.to_base64());
    Ok(([(header::CONTENT_TYPE, "text/plain")], body).into_response())
}

/// `GET /{path}`: serve a raw log object.
async fn get_object<B: ObjectStore>(
    State(state): State<Arc<ApiState<B>>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    if path.is_empty()
        || path.starts_with('/')
        || path.split('/').any(|c| c.is_empty() || c == "." || c == "..")
    {
        return Err(ApiError::BadRequest(format!("invalid object path {path:?}")));
    }

    let log = state.log.lock().await;
    let (data, _) = log.backend().read(&path).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        data,
    )
        .into_response())
}
