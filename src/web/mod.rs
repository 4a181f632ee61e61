use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::models::users::User;
use crate::{ApiError, AppState};

pub mod api_keys;
pub mod billing;
pub mod chat;
pub mod documents;
pub mod requests;
pub mod subscriptions;
pub mod users;
pub mod validated;

#[cfg(test)]
pub(crate) mod test_support;

pub use validated::ValidatedJson;

/// Default and ceiling for history list endpoints.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 100;

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route("/health", get(health))
        .merge(users::router(app_state.clone()))
        .merge(api_keys::router(app_state.clone()))
        .merge(subscriptions::router(app_state.clone()))
        .merge(billing::router(app_state.clone()))
        .merge(documents::router(app_state.clone()))
        .merge(chat::router(app_state))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Loads the path user and refuses deactivated accounts.
pub(crate) fn load_active_user(state: &AppState, user_id: i32) -> Result<User, ApiError> {
    let user = state.db.get_user_by_id(user_id)?;
    if !user.is_active {
        debug!("Refusing request for inactive user {}", user_id);
        return Err(ApiError::AccountInactive);
    }
    Ok(user)
}

pub(crate) fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}
