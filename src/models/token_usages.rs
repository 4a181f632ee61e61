use crate::models::schema::token_usages;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenUsageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Token usage already recorded for this query")]
    AlreadyRecorded,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = token_usages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TokenUsage {
    pub id: i32,
    pub subscription_id: i32,
    pub query_id: Option<i32>,
    pub tokens_consumed: i64,
    pub cost: BigDecimal,
    pub timestamp: DateTime<Utc>,
}

impl TokenUsage {
    pub fn get_for_query(
        conn: &mut PgConnection,
        lookup_query_id: i32,
    ) -> Result<Option<Self>, TokenUsageError> {
        token_usages::table
            .filter(token_usages::query_id.eq(lookup_query_id))
            .first::<TokenUsage>(conn)
            .optional()
            .map_err(TokenUsageError::DatabaseError)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = token_usages)]
pub struct NewTokenUsage {
    pub subscription_id: i32,
    pub query_id: Option<i32>,
    pub tokens_consumed: i64,
    pub cost: BigDecimal,
}

impl NewTokenUsage {
    pub fn insert(&self, conn: &mut PgConnection) -> Result<TokenUsage, TokenUsageError> {
        diesel::insert_into(token_usages::table)
            .values(self)
            .get_result::<TokenUsage>(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    ref info,
                ) if info.constraint_name() == Some("token_usages_query_id_key") => {
                    TokenUsageError::AlreadyRecorded
                }
                _ => TokenUsageError::DatabaseError(e),
            })
    }
}
