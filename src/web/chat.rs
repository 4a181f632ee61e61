use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::chat_sessions::{ChatSession, NewChatSession};
use crate::models::queries::{HistoryCursor, NewQuery, Query, QueryOutcome};
use crate::models::subscriptions::SubscriptionView;
use crate::models::token_usages::TokenUsage;
use crate::web::requests::{ChatSessionCreate, JsonObject, QueryCompletion, QueryCreate};
use crate::web::{clamp_limit, load_active_user, ValidatedJson};
use crate::{ApiError, AppState};

#[derive(Serialize)]
pub struct ChatSessionResponse {
    #[serde(flatten)]
    pub session: ChatSession,
    pub document_ids: Vec<i32>,
}

#[derive(Serialize)]
pub struct QueryWithUsage {
    #[serde(flatten)]
    pub query: Query,
    pub token_usage: Option<TokenUsage>,
}

#[derive(Serialize)]
pub struct CompletedQuery {
    #[serde(flatten)]
    pub query: Query,
    pub token_usage: TokenUsage,
    pub subscription: SubscriptionView,
}

/// A window of session history, oldest first.
#[derive(Serialize)]
pub struct QueryPage {
    pub data: Vec<Query>,
    pub has_more: bool,
    pub first_id: Option<i32>,
    pub last_id: Option<i32>,
}

/// `before` pages back from an id, `after` forward; neither gives the
/// latest window.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub before: Option<i32>,
    pub after: Option<i32>,
}

impl HistoryParams {
    fn cursor(&self) -> Result<HistoryCursor, ApiError> {
        match (self.before, self.after) {
            (None, None) => Ok(HistoryCursor::Latest),
            (Some(id), None) => Ok(HistoryCursor::Before(id)),
            (None, Some(id)) => Ok(HistoryCursor::After(id)),
            (Some(_), Some(_)) => Err(ApiError::BadRequest),
        }
    }
}

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route(
            "/v1/users/:user_id/chat-sessions",
            get(list_sessions).post(create_session),
        )
        .route(
            "/v1/users/:user_id/chat-sessions/:session_id",
            get(get_session),
        )
        .route(
            "/v1/users/:user_id/chat-sessions/:session_id/queries",
            get(list_session_queries),
        )
        .route("/v1/users/:user_id/queries", post(create_query))
        .route("/v1/users/:user_id/queries/:query_id", get(get_query))
        .route(
            "/v1/users/:user_id/queries/:query_id/completion",
            post(complete_query),
        )
        .with_state(app_state)
}

fn user_context_snapshot(state: &AppState, user_id: i32) -> Result<Value, ApiError> {
    Ok(state
        .db
        .get_user_context(user_id)?
        .map(|context| context.snapshot())
        .unwrap_or_else(|| json!({})))
}

fn objects_to_value(items: Vec<JsonObject>) -> Value {
    Value::Array(items.into_iter().map(Value::Object).collect())
}

/// POST /v1/users/{user_id}/chat-sessions
///
/// The session freezes the user's context as it is now so later profile edits
/// don't change how earlier conversations are answered.
async fn create_session(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<ChatSessionCreate>,
) -> Result<(StatusCode, Json<ChatSessionResponse>), ApiError> {
    load_active_user(&state, user_id)?;

    let new_session = NewChatSession {
        user_id,
        title: body.title,
        query_type: body.query_type,
        language: body.language,
        session_context: user_context_snapshot(&state, user_id)?,
    };
    let (session, document_ids) = state
        .db
        .create_chat_session(new_session, &body.document_ids)?;
    info!(
        "Opened {} chat session {} for user {}",
        session.language, session.id, user_id
    );

    Ok((
        StatusCode::CREATED,
        Json(ChatSessionResponse {
            session,
            document_ids,
        }),
    ))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<ChatSession>>, ApiError> {
    load_active_user(&state, user_id)?;
    Ok(Json(state.db.get_chat_sessions_for_user(user_id)?))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path((user_id, session_id)): Path<(i32, i32)>,
) -> Result<Json<ChatSessionResponse>, ApiError> {
    load_active_user(&state, user_id)?;
    let (session, document_ids) = state
        .db
        .get_chat_session_with_documents(session_id, user_id)?;
    Ok(Json(ChatSessionResponse {
        session,
        document_ids,
    }))
}

async fn list_session_queries(
    State(state): State<Arc<AppState>>,
    Path((user_id, session_id)): Path<(i32, i32)>,
    QueryParams(params): QueryParams<HistoryParams>,
) -> Result<Json<QueryPage>, ApiError> {
    load_active_user(&state, user_id)?;
    let cursor = params.cursor()?;
    let limit = clamp_limit(params.limit);
    debug!(
        "Listing up to {} queries of session {} from {:?}",
        limit, session_id, cursor
    );

    let (data, has_more) = state
        .db
        .get_session_queries(session_id, user_id, cursor, limit)?;
    Ok(Json(QueryPage {
        first_id: data.first().map(|q| q.id),
        last_id: data.last().map(|q| q.id),
        data,
        has_more,
    }))
}

async fn create_query(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<QueryCreate>,
) -> Result<(StatusCode, Json<Query>), ApiError> {
    load_active_user(&state, user_id)?;

    let context_used = match body.chat_session_id {
        Some(session_id) => state.db.get_chat_session(session_id, user_id)?.session_context,
        None => user_context_snapshot(&state, user_id)?,
    };
    let query = state.db.create_query(NewQuery {
        user_id,
        chat_session_id: body.chat_session_id,
        query_type: body.query_type,
        query_text: body.query_text,
        language: body.language,
        context_used,
    })?;
    debug!("Accepted {:?} query {} for user {}", query.query_type, query.id, user_id);
    Ok((StatusCode::CREATED, Json(query)))
}

async fn get_query(
    State(state): State<Arc<AppState>>,
    Path((user_id, query_id)): Path<(i32, i32)>,
) -> Result<Json<QueryWithUsage>, ApiError> {
    load_active_user(&state, user_id)?;
    let (query, token_usage) = state.db.get_query_with_usage(query_id, user_id)?;
    Ok(Json(QueryWithUsage { query, token_usage }))
}

/// POST /v1/users/{user_id}/queries/{query_id}/completion
///
/// Stores the answer and charges its tokens to the given subscription in one
/// transaction. A query can be charged only once.
async fn complete_query(
    State(state): State<Arc<AppState>>,
    Path((user_id, query_id)): Path<(i32, i32)>,
    ValidatedJson(body): ValidatedJson<QueryCompletion>,
) -> Result<Json<CompletedQuery>, ApiError> {
    load_active_user(&state, user_id)?;

    let outcome = QueryOutcome {
        response_text: body.response_text,
        tokens_consumed: body.tokens_consumed,
        processing_time_ms: body.processing_time_ms,
        sources: objects_to_value(body.sources),
        chunks: objects_to_value(body.chunks),
    };
    let (query, token_usage, subscription) =
        state
            .db
            .complete_query(query_id, user_id, outcome, body.subscription_id, body.cost)?;
    info!(
        "Query {} consumed {} tokens on subscription {}",
        query.id, token_usage.tokens_consumed, subscription.id
    );

    let subscription = subscription
        .view()
        .map_err(|_| ApiError::InternalServerError)?;
    Ok(Json(CompletedQuery {
        query,
        token_usage,
        subscription,
    }))
}
