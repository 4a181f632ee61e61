use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::info;

use crate::models::billing_records::{BillingRecord, NewBillingRecord};
use crate::web::requests::BillingRecordCreate;
use crate::web::{load_active_user, ValidatedJson};
use crate::{ApiError, AppState};

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route(
            "/v1/users/:user_id/billing-records",
            get(list_billing_records).post(create_billing_record),
        )
        .with_state(app_state)
}

async fn create_billing_record(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<BillingRecordCreate>,
) -> Result<(StatusCode, Json<BillingRecord>), ApiError> {
    load_active_user(&state, user_id)?;

    let record = state.db.create_billing_record(NewBillingRecord {
        user_id,
        subscription_id: body.subscription_id,
        billing_period_start: body.billing_period_start,
        billing_period_end: body.billing_period_end,
        total_tokens: body.total_tokens,
        total_cost: body.total_cost,
        currency: body.currency,
    })?;
    info!(
        "Billing record {} for subscription {}",
        record.id, record.subscription_id
    );
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_billing_records(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<BillingRecord>>, ApiError> {
    load_active_user(&state, user_id)?;
    Ok(Json(state.db.get_billing_records_for_user(user_id)?))
}
