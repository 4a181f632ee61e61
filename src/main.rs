use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::db::{setup_db, DBConnection, DBError};
use crate::models::api_keys::ApiKeyError;
use crate::models::chat_sessions::ChatSessionError;
use crate::models::documents::DocumentError;
use crate::models::organizations::OrganizationError;
use crate::models::queries::QueryError;
use crate::models::subscriptions::SubscriptionError;
use crate::models::token_usages::TokenUsageError;
use crate::models::user_contexts::UserContextError;
use crate::models::users::UserError;

mod config;
mod db;
mod models;
mod web;

pub struct AppState {
    pub db: Arc<dyn DBConnection>,
    pub config: AppConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalServerError,

    #[error("Bad Request")]
    BadRequest,

    #[error("Request failed validation")]
    ValidationFailed,

    #[error("Forbidden")]
    Forbidden,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("User not found")]
    UserNotFound,

    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Resource already exists")]
    Conflict,

    #[error("Usage limit reached")]
    UsageLimitReached,

    #[error("Subscription is inactive or expired")]
    SubscriptionUnavailable,

    #[error("Resource not found")]
    NotFound,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::AccountInactive => StatusCode::FORBIDDEN,
            ApiError::UserNotFound => StatusCode::NOT_FOUND,
            ApiError::EmailAlreadyExists => StatusCode::CONFLICT,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::UsageLimitReached => StatusCode::FORBIDDEN,
            ApiError::SubscriptionUnavailable => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        (
            status,
            Json(ErrorResponse {
                status: status.as_u16(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<DBError> for ApiError {
    fn from(err: DBError) -> Self {
        let mapped = match err {
            DBError::UserError(UserError::NotFound) => ApiError::UserNotFound,
            DBError::UserError(UserError::EmailAlreadyExists) => ApiError::EmailAlreadyExists,
            DBError::OrganizationError(OrganizationError::NotFound)
            | DBError::UserContextError(UserContextError::NotFound)
            | DBError::ApiKeyError(ApiKeyError::NotFound)
            | DBError::SubscriptionError(SubscriptionError::NotFound)
            | DBError::DocumentError(DocumentError::NotFound)
            | DBError::ChatSessionError(ChatSessionError::NotFound)
            | DBError::QueryError(QueryError::NotFound) => ApiError::NotFound,
            DBError::UserContextError(UserContextError::AlreadyExists)
            | DBError::TokenUsageError(TokenUsageError::AlreadyRecorded)
            | DBError::UserError(UserError::OrganizationNameReserved)
            | DBError::OrganizationError(OrganizationError::NameTaken)
            | DBError::AlreadyInOrganization => ApiError::Conflict,
            DBError::SubscriptionError(SubscriptionError::AllowanceExceeded { .. }) => {
                ApiError::UsageLimitReached
            }
            DBError::SubscriptionError(SubscriptionError::Inactive)
            | DBError::SubscriptionError(SubscriptionError::Expired) => {
                ApiError::SubscriptionUnavailable
            }
            DBError::SubscriptionError(SubscriptionError::NegativeTokens)
            | DBError::ChatSessionError(ChatSessionError::Closed)
            | DBError::DocumentError(DocumentError::PathTooLong)
            | DBError::OrganizationNameMismatch => ApiError::BadRequest,
            DBError::NotOrganizationMaster => ApiError::Forbidden,
            ref other => {
                error!("Database error: {:?}", other);
                return ApiError::InternalServerError;
            }
        };
        debug!("Request rejected: {}", err);
        mapped
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!("Starting in {:?} mode", config.app_mode);
    debug!("Configuration: {:?}", config);

    let db = setup_db(&config.database_url, config.db_pool_size)?;

    let cors = if config.cors_allow_any {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    let bind_addr = config.bind_addr;
    let app_state = Arc::new(AppState {
        db: Arc::new(db),
        config,
    });
    let app = web::router(app_state).layer(cors);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
