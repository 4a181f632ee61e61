use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::subscriptions::{NewSubscription, Subscription, SubscriptionView};
use crate::web::requests::SubscriptionCreate;
use crate::web::{load_active_user, ValidatedJson};
use crate::{ApiError, AppState};

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route(
            "/v1/users/:user_id/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .with_state(app_state)
}

fn to_view(subscription: &Subscription) -> Result<SubscriptionView, ApiError> {
    subscription.view().map_err(|e| {
        error!("Subscription {} has unreadable terms: {:?}", subscription.id, e);
        ApiError::InternalServerError
    })
}

async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<SubscriptionCreate>,
) -> Result<(StatusCode, Json<SubscriptionView>), ApiError> {
    load_active_user(&state, user_id)?;

    let terms = body.into_terms(Utc::now(), state.config.bestprice_price_per_1k.clone());
    let subscription = state
        .db
        .create_subscription(NewSubscription::from_terms(user_id, terms))?;
    info!(
        "User {} subscribed to {:?} ({})",
        user_id, subscription.pricing_plan, subscription.id
    );
    Ok((StatusCode::CREATED, Json(to_view(&subscription)?)))
}

async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<SubscriptionView>>, ApiError> {
    load_active_user(&state, user_id)?;
    let views = state
        .db
        .get_subscriptions_for_user(user_id)?
        .iter()
        .map(to_view)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(views))
}
