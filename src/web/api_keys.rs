use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::DBError;
use crate::models::api_keys::{generate_api_key, ApiKey, NewApiKey};
use crate::web::requests::APIKeyCreate;
use crate::web::{load_active_user, ValidatedJson};
use crate::{ApiError, AppState};

/// Returned once at creation; the plaintext key is never retrievable again.
#[derive(Serialize)]
pub struct CreatedApiKey {
    pub key: String,
    #[serde(flatten)]
    pub api_key: ApiKey,
}

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route(
            "/v1/users/:user_id/api-keys",
            get(list_api_keys).post(create_api_key),
        )
        .route(
            "/v1/users/:user_id/api-keys/:key_id",
            delete(deactivate_api_key),
        )
        .with_state(app_state)
}

async fn create_api_key(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<APIKeyCreate>,
) -> Result<(StatusCode, Json<CreatedApiKey>), ApiError> {
    let user = load_active_user(&state, user_id)?;
    if !user.can_generate_api_keys {
        debug!("User {} may not generate API keys", user_id);
        return Err(ApiError::Forbidden);
    }

    let plaintext = generate_api_key().map_err(DBError::from)?;
    let new_key = NewApiKey::new(
        &plaintext,
        body.name,
        user.id,
        user.organization_id,
        body.expires_at,
    );
    let api_key = state.db.create_api_key(new_key)?;
    info!("Issued API key {} for user {}", api_key.id, user.id);

    Ok((
        StatusCode::CREATED,
        Json(CreatedApiKey {
            key: plaintext,
            api_key,
        }),
    ))
}

async fn list_api_keys(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<ApiKey>>, ApiError> {
    load_active_user(&state, user_id)?;
    Ok(Json(state.db.get_api_keys_for_user(user_id)?))
}

async fn deactivate_api_key(
    State(state): State<Arc<AppState>>,
    Path((user_id, key_id)): Path<(i32, i32)>,
) -> Result<StatusCode, ApiError> {
    load_active_user(&state, user_id)?;
    state.db.deactivate_api_key(key_id, user_id)?;
    info!("Deactivated API key {} for user {}", key_id, user_id);
    Ok(StatusCode::NO_CONTENT)
}
