use crate::models::schema::api_keys;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Prefix carried by every plaintext key handed out to users.
pub const API_KEY_PREFIX: &str = "rk_";
const API_KEY_RANDOM_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum ApiKeyError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("API key not found")]
    NotFound,
    #[error("Failed to generate API key")]
    GenerationFailed,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone)]
#[diesel(table_name = api_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ApiKey {
    pub id: i32,
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    pub name: String,
    pub user_id: i32,
    pub organization_id: Option<i32>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("key_hash", &"<redacted>")
            .field("name", &self.name)
            .field("user_id", &self.user_id)
            .field("organization_id", &self.organization_id)
            .field("is_active", &self.is_active)
            .field("last_used_at", &self.last_used_at)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl ApiKey {
    pub fn get_all_for_user(
        conn: &mut PgConnection,
        lookup_user_id: i32,
    ) -> Result<Vec<Self>, ApiKeyError> {
        api_keys::table
            .filter(api_keys::user_id.eq(lookup_user_id))
            .order(api_keys::created_at.desc())
            .load::<Self>(conn)
            .map_err(ApiKeyError::DatabaseError)
    }

    pub fn deactivate(
        conn: &mut PgConnection,
        lookup_id: i32,
        lookup_user_id: i32,
    ) -> Result<(), ApiKeyError> {
        let rows_affected = diesel::update(
            api_keys::table
                .filter(api_keys::id.eq(lookup_id))
                .filter(api_keys::user_id.eq(lookup_user_id)),
        )
        .set(api_keys::is_active.eq(false))
        .execute(conn)
        .map_err(ApiKeyError::DatabaseError)?;

        if rows_affected == 0 {
            Err(ApiKeyError::NotFound)
        } else {
            Ok(())
        }
    }
}

/// Generates a fresh plaintext key. Only its hash is ever persisted.
pub fn generate_api_key() -> Result<String, ApiKeyError> {
    let mut bytes = [0u8; API_KEY_RANDOM_BYTES];
    getrandom::getrandom(&mut bytes).map_err(|_| ApiKeyError::GenerationFailed)?;
    Ok(format!("{}{}", API_KEY_PREFIX, hex::encode(bytes)))
}

pub fn hash_api_key(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

#[derive(Insertable)]
#[diesel(table_name = api_keys)]
pub struct NewApiKey {
    pub key_hash: String,
    pub name: String,
    pub user_id: i32,
    pub organization_id: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for NewApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewApiKey")
            .field("key_hash", &"<redacted>")
            .field("name", &self.name)
            .field("user_id", &self.user_id)
            .field("organization_id", &self.organization_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl NewApiKey {
    pub fn new(
        plaintext: &str,
        name: String,
        user_id: i32,
        organization_id: Option<i32>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            key_hash: hash_api_key(plaintext),
            name,
            user_id,
            organization_id,
            expires_at,
        }
    }

    pub fn insert(&self, conn: &mut PgConnection) -> Result<ApiKey, ApiKeyError> {
        diesel::insert_into(api_keys::table)
            .values(self)
            .get_result(conn)
            .map_err(ApiKeyError::DatabaseError)
    }
}
