use crate::models::enums::{Language, QueryType};
use crate::models::schema::{chat_session_documents, chat_sessions};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatSessionError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Chat session not found")]
    NotFound,
    #[error("Chat session is closed")]
    Closed,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = chat_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChatSession {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub query_type: QueryType,
    pub language: Language,
    pub is_active: bool,
    pub session_context: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn get_by_id_for_user(
        conn: &mut PgConnection,
        lookup_id: i32,
        lookup_user_id: i32,
    ) -> Result<Self, ChatSessionError> {
        chat_sessions::table
            .filter(chat_sessions::id.eq(lookup_id))
            .filter(chat_sessions::user_id.eq(lookup_user_id))
            .first::<ChatSession>(conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => ChatSessionError::NotFound,
                _ => ChatSessionError::DatabaseError(e),
            })
    }

    pub fn get_all_for_user(
        conn: &mut PgConnection,
        lookup_user_id: i32,
    ) -> Result<Vec<Self>, ChatSessionError> {
        chat_sessions::table
            .filter(chat_sessions::user_id.eq(lookup_user_id))
            .order(chat_sessions::updated_at.desc())
            .load::<ChatSession>(conn)
            .map_err(ChatSessionError::DatabaseError)
    }

    pub fn document_ids(&self, conn: &mut PgConnection) -> Result<Vec<i32>, ChatSessionError> {
        chat_session_documents::table
            .filter(chat_session_documents::chat_session_id.eq(self.id))
            .order(chat_session_documents::added_at.asc())
            .select(chat_session_documents::document_id)
            .load::<i32>(conn)
            .map_err(ChatSessionError::DatabaseError)
    }

    /// Bumps `updated_at` so recently used sessions list first.
    pub fn touch(&self, conn: &mut PgConnection) -> Result<(), ChatSessionError> {
        diesel::update(chat_sessions::table.filter(chat_sessions::id.eq(self.id)))
            .set(chat_sessions::updated_at.eq(Utc::now()))
            .execute(conn)
            .map(|_| ())
            .map_err(ChatSessionError::DatabaseError)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = chat_sessions)]
pub struct NewChatSession {
    pub user_id: i32,
    pub title: String,
    pub query_type: QueryType,
    pub language: Language,
    pub session_context: Value,
}

impl NewChatSession {
    pub fn insert(&self, conn: &mut PgConnection) -> Result<ChatSession, ChatSessionError> {
        diesel::insert_into(chat_sessions::table)
            .values(self)
            .get_result::<ChatSession>(conn)
            .map_err(ChatSessionError::DatabaseError)
    }
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = chat_session_documents)]
#[diesel(primary_key(chat_session_id, document_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChatSessionDocument {
    pub chat_session_id: i32,
    pub document_id: i32,
    pub added_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone, Copy)]
#[diesel(table_name = chat_session_documents)]
pub struct NewChatSessionDocument {
    pub chat_session_id: i32,
    pub document_id: i32,
}

impl NewChatSessionDocument {
    /// Links every document in `document_ids` to the session; repeated ids
    /// collapse into one link.
    pub fn link_all(
        conn: &mut PgConnection,
        chat_session_id: i32,
        document_ids: &[i32],
    ) -> Result<Vec<ChatSessionDocument>, ChatSessionError> {
        let links: Vec<NewChatSessionDocument> = dedup_ids(document_ids)
            .into_iter()
            .map(|document_id| NewChatSessionDocument {
                chat_session_id,
                document_id,
            })
            .collect();
        if links.is_empty() {
            return Ok(Vec::new());
        }

        diesel::insert_into(chat_session_documents::table)
            .values(&links)
            .on_conflict_do_nothing()
            .get_results::<ChatSessionDocument>(conn)
            .map_err(ChatSessionError::DatabaseError)
    }
}

/// Order-preserving de-duplication.
pub fn dedup_ids(ids: &[i32]) -> Vec<i32> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
