use crate::models::enums::Language;
use crate::models::schema::user_contexts;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserContextError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("User context not found")]
    NotFound,
    #[error("User context already exists")]
    AlreadyExists,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = user_contexts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserContext {
    pub id: i32,
    pub user_id: i32,
    pub user_type_context: String,
    pub home_location: String,
    pub preferred_language: Language,
    pub profession: String,
    pub personal_notes: String,
    pub context_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserContext {
    pub fn get_by_user_id(
        conn: &mut PgConnection,
        lookup_user_id: i32,
    ) -> Result<Option<Self>, UserContextError> {
        user_contexts::table
            .filter(user_contexts::user_id.eq(lookup_user_id))
            .first::<UserContext>(conn)
            .optional()
            .map_err(UserContextError::DatabaseError)
    }

    /// Frozen copy of the context as it applies to a chat session or query.
    pub fn snapshot(&self) -> Value {
        json!({
            "user_type_context": self.user_type_context,
            "home_location": self.home_location,
            "preferred_language": self.preferred_language,
            "profession": self.profession,
            "personal_notes": self.personal_notes,
            "context_data": self.context_data,
        })
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = user_contexts)]
pub struct NewUserContext {
    pub user_id: i32,
    pub user_type_context: String,
    pub home_location: String,
    pub preferred_language: Language,
    pub profession: String,
    pub personal_notes: String,
    pub context_data: Value,
}

impl NewUserContext {
    pub fn insert(&self, conn: &mut PgConnection) -> Result<UserContext, UserContextError> {
        diesel::insert_into(user_contexts::table)
            .values(self)
            .get_result::<UserContext>(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => UserContextError::AlreadyExists,
                _ => UserContextError::DatabaseError(e),
            })
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = user_contexts)]
pub struct UserContextChanges {
    pub user_type_context: Option<String>,
    pub home_location: Option<String>,
    pub preferred_language: Option<Language>,
    pub profession: Option<String>,
    pub personal_notes: Option<String>,
    pub context_data: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl UserContextChanges {
    pub fn apply(
        &self,
        conn: &mut PgConnection,
        lookup_user_id: i32,
    ) -> Result<UserContext, UserContextError> {
        diesel::update(user_contexts::table.filter(user_contexts::user_id.eq(lookup_user_id)))
            .set(self)
            .get_result::<UserContext>(conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserContextError::NotFound,
                _ => UserContextError::DatabaseError(e),
            })
    }
}
