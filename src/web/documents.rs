use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::DBError;
use crate::models::documents::{Document, NewDocument};
use crate::web::requests::{DocumentProcessed, DocumentUpload};
use crate::web::{load_active_user, ValidatedJson};
use crate::{ApiError, AppState};

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route(
            "/v1/users/:user_id/documents",
            get(list_documents).post(upload_document),
        )
        .route(
            "/v1/users/:user_id/documents/:document_id/processed",
            post(mark_processed),
        )
        .with_state(app_state)
}

/// Records the metadata of an uploaded file. The bytes themselves are
/// written by the ingestion pipeline to the returned `file_path`.
async fn upload_document(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<DocumentUpload>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    load_active_user(&state, user_id)?;

    let new_doc = NewDocument::new(
        user_id,
        &body.filename,
        body.file_size,
        body.mime_type,
        body.language,
        &state.config.document_storage_root,
    )
    .map_err(DBError::from)?;
    debug!("Storing document for user {} at {}", user_id, new_doc.file_path);

    let document = state.db.create_document(new_doc)?;
    info!("Registered document {} for user {}", document.id, user_id);
    Ok((StatusCode::CREATED, Json(document)))
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<Document>>, ApiError> {
    load_active_user(&state, user_id)?;
    Ok(Json(state.db.get_documents_for_user(user_id)?))
}

async fn mark_processed(
    State(state): State<Arc<AppState>>,
    Path((user_id, document_id)): Path<(i32, i32)>,
    ValidatedJson(body): ValidatedJson<DocumentProcessed>,
) -> Result<Json<Document>, ApiError> {
    load_active_user(&state, user_id)?;

    if let Some(err) = body.processing_error.as_deref() {
        warn!("Document {} failed processing: {}", document_id, err);
    }
    let document =
        state
            .db
            .mark_document_processed(document_id, user_id, body.processing_error.as_deref())?;
    Ok(Json(document))
}
