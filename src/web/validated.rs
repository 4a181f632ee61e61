use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;
use validator::Validate;

use crate::ApiError;

/// JSON body that has been parsed and then checked with `validator`.
///
/// Malformed bodies, missing fields and unknown enum values are rejected with
/// `ApiError::BadRequest`; bodies that parse but break a field rule with
/// `ApiError::ValidationFailed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            debug!("Rejected request body: {}", rejection.body_text());
            ApiError::BadRequest
        })?;

        value.validate().map_err(|errors| {
            debug!("Request failed validation: {}", errors);
            ApiError::ValidationFailed
        })?;

        Ok(ValidatedJson(value))
    }
}
