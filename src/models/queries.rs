use crate::models::enums::{Language, QueryType};
use crate::models::schema::queries;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Query not found")]
    NotFound,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = queries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Query {
    pub id: i32,
    pub user_id: i32,
    pub chat_session_id: Option<i32>,
    pub query_type: QueryType,
    pub query_text: String,
    pub response_text: String,
    pub language: Language,
    pub tokens_consumed: i64,
    pub processing_time_ms: Option<i32>,
    pub sources: Value,
    pub chunks: Value,
    pub context_used: Value,
    pub created_at: DateTime<Utc>,
}

impl Query {
    pub fn get_by_id_for_user(
        conn: &mut PgConnection,
        lookup_id: i32,
        lookup_user_id: i32,
    ) -> Result<Self, QueryError> {
        queries::table
            .filter(queries::id.eq(lookup_id))
            .filter(queries::user_id.eq(lookup_user_id))
            .first::<Query>(conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => QueryError::NotFound,
                _ => QueryError::DatabaseError(e),
            })
    }

    /// One page of session history, fetching `limit + 1` rows so the caller
    /// can tell whether more remain. Rows come back in fetch order; see
    /// [`HistoryCursor::arrange`].
    pub fn get_page_for_session(
        conn: &mut PgConnection,
        lookup_session_id: i32,
        cursor: HistoryCursor,
        limit: i64,
    ) -> Result<Vec<Self>, QueryError> {
        let mut select = queries::table
            .filter(queries::chat_session_id.eq(lookup_session_id))
            .into_boxed();
        select = match cursor {
            HistoryCursor::Latest => select.order(queries::id.desc()),
            HistoryCursor::Before(id) => select
                .filter(queries::id.lt(id))
                .order(queries::id.desc()),
            HistoryCursor::After(id) => select
                .filter(queries::id.gt(id))
                .order(queries::id.asc()),
        };
        select
            .limit(limit + 1)
            .load::<Query>(conn)
            .map_err(QueryError::DatabaseError)
    }
}

/// Position in a session's history. `Latest` and `Before` walk back in time,
/// `After` walks forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCursor {
    Latest,
    Before(i32),
    After(i32),
}

impl HistoryCursor {
    /// Trims rows fetched by `get_page_for_session` to `limit` and returns
    /// them oldest first, with whether more rows lie in the walk direction.
    pub fn arrange<T>(&self, mut rows: Vec<T>, limit: i64) -> (Vec<T>, bool) {
        let limit = limit.max(0) as usize;
        let has_more = rows.len() > limit;
        if has_more {
            rows.truncate(limit);
        }
        if !matches!(self, HistoryCursor::After(_)) {
            rows.reverse();
        }
        (rows, has_more)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = queries)]
pub struct NewQuery {
    pub user_id: i32,
    pub chat_session_id: Option<i32>,
    pub query_type: QueryType,
    pub query_text: String,
    pub language: Language,
    pub context_used: Value,
}

impl NewQuery {
    pub fn insert(&self, conn: &mut PgConnection) -> Result<Query, QueryError> {
        diesel::insert_into(queries::table)
            .values(self)
            .get_result::<Query>(conn)
            .map_err(QueryError::DatabaseError)
    }
}

/// Outcome of an answered query, produced outside this service.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = queries)]
pub struct QueryOutcome {
    pub response_text: String,
    pub tokens_consumed: i64,
    pub processing_time_ms: Option<i32>,
    pub sources: Value,
    pub chunks: Value,
}

impl QueryOutcome {
    pub fn apply(
        &self,
        conn: &mut PgConnection,
        lookup_id: i32,
        lookup_user_id: i32,
    ) -> Result<Query, QueryError> {
        diesel::update(
            queries::table
                .filter(queries::id.eq(lookup_id))
                .filter(queries::user_id.eq(lookup_user_id)),
        )
        .set(self)
        .get_result::<Query>(conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => QueryError::NotFound,
            _ => QueryError::DatabaseError(e),
        })
    }
}
