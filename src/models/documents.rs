use crate::models::enums::Language;
use crate::models::schema::documents;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const MAX_PROCESSING_ERROR_CHARS: usize = 1000;
pub const MAX_FILE_PATH_CHARS: usize = 500;
/// Longer extensions are dropped from the stored name.
pub const MAX_EXTENSION_CHARS: usize = 16;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Document not found")]
    NotFound,
    #[error("Storage path exceeds 500 characters")]
    PathTooLong,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Document {
    pub id: i32,
    pub user_id: i32,
    pub filename: String,
    pub original_filename: String,
    pub file_size: i64,
    pub mime_type: String,
    pub file_path: String,
    pub language: Option<Language>,
    pub processed: bool,
    pub processing_error: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn get_all_for_user(
        conn: &mut PgConnection,
        lookup_user_id: i32,
    ) -> Result<Vec<Self>, DocumentError> {
        documents::table
            .filter(documents::user_id.eq(lookup_user_id))
            .order(documents::uploaded_at.desc())
            .load::<Document>(conn)
            .map_err(DocumentError::DatabaseError)
    }

    /// Subset of `ids` owned by `lookup_user_id`.
    pub fn owned_ids(
        conn: &mut PgConnection,
        lookup_user_id: i32,
        ids: &[i32],
    ) -> Result<Vec<i32>, DocumentError> {
        documents::table
            .filter(documents::user_id.eq(lookup_user_id))
            .filter(documents::id.eq_any(ids))
            .select(documents::id)
            .load::<i32>(conn)
            .map_err(DocumentError::DatabaseError)
    }

    /// Records the ingestion outcome. A present `error` leaves the
    /// document unprocessed.
    pub fn mark_processed(
        conn: &mut PgConnection,
        lookup_id: i32,
        lookup_user_id: i32,
        error: Option<&str>,
    ) -> Result<Document, DocumentError> {
        let error = error.map(truncate_processing_error);
        diesel::update(
            documents::table
                .filter(documents::id.eq(lookup_id))
                .filter(documents::user_id.eq(lookup_user_id)),
        )
        .set((
            documents::processed.eq(error.is_none()),
            documents::processing_error.eq(error),
            documents::processed_at.eq(Some(Utc::now())),
        ))
        .get_result::<Document>(conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => DocumentError::NotFound,
            _ => DocumentError::DatabaseError(e),
        })
    }
}

pub fn truncate_processing_error(message: &str) -> String {
    message.chars().take(MAX_PROCESSING_ERROR_CHARS).collect()
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub user_id: i32,
    pub filename: String,
    pub original_filename: String,
    pub file_size: i64,
    pub mime_type: String,
    pub file_path: String,
    pub language: Option<Language>,
}

impl NewDocument {
    /// Assigns a collision-free stored name under `storage_root/<user_id>/`,
    /// keeping the extension of the uploaded file.
    pub fn new(
        user_id: i32,
        original_filename: &str,
        file_size: i64,
        mime_type: String,
        language: Option<Language>,
        storage_root: &str,
    ) -> Result<Self, DocumentError> {
        let stored_name = match extension_of(original_filename) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let file_path = format!(
            "{}/{}/{}",
            storage_root.trim_end_matches('/'),
            user_id,
            stored_name
        );
        if file_path.chars().count() > MAX_FILE_PATH_CHARS {
            return Err(DocumentError::PathTooLong);
        }

        Ok(NewDocument {
            user_id,
            filename: stored_name,
            original_filename: original_filename.to_string(),
            file_size,
            mime_type,
            file_path,
            language,
        })
    }

    pub fn insert(&self, conn: &mut PgConnection) -> Result<Document, DocumentError> {
        diesel::insert_into(documents::table)
            .values(self)
            .get_result::<Document>(conn)
            .map_err(DocumentError::DatabaseError)
    }
}

fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_CHARS
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
