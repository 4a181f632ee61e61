//! In-memory `DBConnection` for exercising handlers without Postgres.

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use crate::config::{AppConfig, AppMode};
use crate::db::{check_organization_claim, DBConnection, DBError};
use crate::models::api_keys::{ApiKey, ApiKeyError, NewApiKey};
use crate::models::billing_records::{BillingRecord, NewBillingRecord};
use crate::models::chat_sessions::{dedup_ids, ChatSession, ChatSessionError, NewChatSession};
use crate::models::documents::{truncate_processing_error, Document, DocumentError, NewDocument};
use crate::models::enums::{AccountType, Language, QueryType, UserType};
use crate::models::organizations::{NewOrganization, Organization, OrganizationError};
use crate::models::queries::{HistoryCursor, NewQuery, Query, QueryError, QueryOutcome};
use crate::models::subscriptions::{NewSubscription, Subscription, SubscriptionError};
use crate::models::token_usages::{TokenUsage, TokenUsageError};
use crate::models::user_contexts::{
    NewUserContext, UserContext, UserContextChanges, UserContextError,
};
use crate::models::users::{NewUser, User, UserError};
use crate::AppState;

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: Vec<User>,
    organizations: Vec<Organization>,
    user_contexts: Vec<UserContext>,
    api_keys: Vec<ApiKey>,
    subscriptions: Vec<Subscription>,
    documents: Vec<Document>,
    chat_sessions: Vec<ChatSession>,
    session_documents: Vec<(i32, i32)>,
    queries: Vec<Query>,
    token_usages: Vec<TokenUsage>,
    billing_records: Vec<BillingRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, user_id: i32) -> Result<&User, DBError> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(DBError::UserError(UserError::NotFound))
    }

    fn session(&self, session_id: i32, user_id: i32) -> Result<&ChatSession, DBError> {
        self.chat_sessions
            .iter()
            .find(|s| s.id == session_id && s.user_id == user_id)
            .ok_or(DBError::ChatSessionError(ChatSessionError::NotFound))
    }

    fn session_document_ids(&self, session_id: i32) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .session_documents
            .iter()
            .filter(|(s, _)| *s == session_id)
            .map(|(_, d)| *d)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Rows live in plain vectors behind one lock, so every call behaves like
/// a single transaction.
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user row directly, bypassing password hashing.
    pub fn add_user(
        &self,
        user_type: UserType,
        account_type: Option<AccountType>,
        organization_id: Option<i32>,
    ) -> User {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        let now = Utc::now();
        let user = User {
            id,
            email: format!("user{}@example.eu", id),
            password_hash: String::new(),
            user_type,
            account_type,
            organization_id,
            is_active: true,
            can_generate_api_keys: account_type == Some(AccountType::Master),
            created_at: now,
            updated_at: now,
            reserved_organization_name: None,
        };
        t.users.push(user.clone());
        user
    }

    pub fn deactivate_user(&self, user_id: i32) {
        let mut t = self.tables.lock().unwrap();
        if let Some(user) = t.users.iter_mut().find(|u| u.id == user_id) {
            user.is_active = false;
        }
    }

    pub fn add_document(&self, user_id: i32, filename: &str) -> Document {
        let new_doc = NewDocument::new(
            user_id,
            filename,
            2048,
            "application/pdf".to_string(),
            Some(Language::De),
            "/srv/documents",
        )
        .unwrap();
        self.create_document(new_doc).unwrap()
    }

    pub fn add_query(&self, user_id: i32, chat_session_id: Option<i32>) -> Query {
        self.create_query(NewQuery {
            user_id,
            chat_session_id,
            query_type: QueryType::Light,
            query_text: "Welche Frist gilt?".to_string(),
            language: Language::De,
            context_used: json!({}),
        })
        .unwrap()
    }

    pub fn usage_count(&self) -> usize {
        self.tables.lock().unwrap().token_usages.len()
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        app_mode: AppMode::Local,
        database_url: "postgres://localhost/ragchat_test".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        db_pool_size: 1,
        document_storage_root: "/srv/documents".to_string(),
        bestprice_price_per_1k: None,
        cors_allow_any: true,
    }
}

pub fn app_state(db: Arc<MemoryDb>) -> Arc<AppState> {
    Arc::new(AppState {
        db,
        config: test_config(),
    })
}

impl DBConnection for MemoryDb {
    fn create_user(&self, new_user: NewUser) -> Result<User, DBError> {
        let mut t = self.tables.lock().unwrap();
        if t.users.iter().any(|u| u.email == new_user.email) {
            return Err(UserError::EmailAlreadyExists.into());
        }
        if let Some(name) = new_user.reserved_organization_name.as_deref() {
            let reserved = t
                .users
                .iter()
                .any(|u| u.reserved_organization_name.as_deref() == Some(name));
            if reserved {
                return Err(UserError::OrganizationNameReserved.into());
            }
        }
        let id = t.next_id();
        let now = Utc::now();
        let user = User {
            id,
            email: new_user.email,
            password_hash: new_user.password_hash,
            user_type: new_user.user_type,
            account_type: new_user.account_type,
            organization_id: new_user.organization_id,
            is_active: true,
            can_generate_api_keys: new_user.can_generate_api_keys,
            created_at: now,
            updated_at: now,
            reserved_organization_name: new_user.reserved_organization_name,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    fn get_user_by_id(&self, user_id: i32) -> Result<User, DBError> {
        let t = self.tables.lock().unwrap();
        t.user(user_id).cloned()
    }

    fn get_organization_by_id(&self, org_id: i32) -> Result<Organization, DBError> {
        let t = self.tables.lock().unwrap();
        t.organizations
            .iter()
            .find(|o| o.id == org_id)
            .cloned()
            .ok_or(DBError::OrganizationError(OrganizationError::NotFound))
    }

    fn get_organization_by_name(&self, name: &str) -> Result<Option<Organization>, DBError> {
        let t = self.tables.lock().unwrap();
        Ok(t.organizations.iter().find(|o| o.name == name.trim()).cloned())
    }

    fn create_organization_for_master(
        &self,
        master_user_id: i32,
        new_org: NewOrganization,
    ) -> Result<(Organization, User), DBError> {
        let mut t = self.tables.lock().unwrap();
        let master = t.user(master_user_id)?.clone();
        let holder = t
            .users
            .iter()
            .find(|u| u.reserved_organization_name.as_deref() == Some(new_org.name.as_str()))
            .map(|u| u.id);
        check_organization_claim(&master, &new_org.name, holder)?;
        if t.organizations.iter().any(|o| o.name == new_org.name) {
            return Err(OrganizationError::NameTaken.into());
        }

        let id = t.next_id();
        let now = Utc::now();
        let org = Organization {
            id,
            name: new_org.name,
            company_type: new_org.company_type,
            company_size: new_org.company_size,
            headquarters_location: new_org.headquarters_location,
            subsidiary_locations: new_org.subsidiary_locations,
            sso_enabled: new_org.sso_enabled,
            sso_config: new_org.sso_config,
            created_at: now,
            updated_at: now,
        };
        t.organizations.push(org.clone());

        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == master_user_id)
            .ok_or(DBError::UserError(UserError::NotFound))?;
        user.organization_id = Some(id);
        user.reserved_organization_name = None;
        user.updated_at = now;
        Ok((org, user.clone()))
    }

    fn get_user_context(&self, user_id: i32) -> Result<Option<UserContext>, DBError> {
        let t = self.tables.lock().unwrap();
        Ok(t.user_contexts.iter().find(|c| c.user_id == user_id).cloned())
    }

    fn create_user_context(&self, new_context: NewUserContext) -> Result<UserContext, DBError> {
        let mut t = self.tables.lock().unwrap();
        if t.user_contexts.iter().any(|c| c.user_id == new_context.user_id) {
            return Err(UserContextError::AlreadyExists.into());
        }
        let id = t.next_id();
        let now = Utc::now();
        let context = UserContext {
            id,
            user_id: new_context.user_id,
            user_type_context: new_context.user_type_context,
            home_location: new_context.home_location,
            preferred_language: new_context.preferred_language,
            profession: new_context.profession,
            personal_notes: new_context.personal_notes,
            context_data: new_context.context_data,
            created_at: now,
            updated_at: now,
        };
        t.user_contexts.push(context.clone());
        Ok(context)
    }

    fn update_user_context(
        &self,
        user_id: i32,
        changes: UserContextChanges,
    ) -> Result<UserContext, DBError> {
        let mut t = self.tables.lock().unwrap();
        let context = t
            .user_contexts
            .iter_mut()
            .find(|c| c.user_id == user_id)
            .ok_or(DBError::UserContextError(UserContextError::NotFound))?;
        if let Some(v) = changes.user_type_context {
            context.user_type_context = v;
        }
        if let Some(v) = changes.home_location {
            context.home_location = v;
        }
        if let Some(v) = changes.preferred_language {
            context.preferred_language = v;
        }
        if let Some(v) = changes.profession {
            context.profession = v;
        }
        if let Some(v) = changes.personal_notes {
            context.personal_notes = v;
        }
        if let Some(v) = changes.context_data {
            context.context_data = v;
        }
        context.updated_at = changes.updated_at;
        Ok(context.clone())
    }

    fn create_api_key(&self, new_key: NewApiKey) -> Result<ApiKey, DBError> {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        let api_key = ApiKey {
            id,
            key_hash: new_key.key_hash,
            name: new_key.name,
            user_id: new_key.user_id,
            organization_id: new_key.organization_id,
            is_active: true,
            last_used_at: None,
            expires_at: new_key.expires_at,
            created_at: Utc::now(),
        };
        t.api_keys.push(api_key.clone());
        Ok(api_key)
    }

    fn get_api_keys_for_user(&self, user_id: i32) -> Result<Vec<ApiKey>, DBError> {
        let t = self.tables.lock().unwrap();
        Ok(t.api_keys
            .iter()
            .filter(|k| k.user_id == user_id)
            .cloned()
            .collect())
    }

    fn deactivate_api_key(&self, key_id: i32, user_id: i32) -> Result<(), DBError> {
        let mut t = self.tables.lock().unwrap();
        let key = t
            .api_keys
            .iter_mut()
            .find(|k| k.id == key_id && k.user_id == user_id)
            .ok_or(DBError::ApiKeyError(ApiKeyError::NotFound))?;
        key.is_active = false;
        Ok(())
    }

    fn create_subscription(&self, new_sub: NewSubscription) -> Result<Subscription, DBError> {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        let now = Utc::now();
        let subscription = Subscription {
            id,
            user_id: new_sub.user_id,
            pricing_plan: new_sub.pricing_plan,
            is_active: true,
            token_allowance: new_sub.token_allowance,
            tokens_used: new_sub.tokens_used,
            week_pass_expires_at: new_sub.week_pass_expires_at,
            week_pass_price: new_sub.week_pass_price,
            current_price_per_1k_tokens: new_sub.current_price_per_1k_tokens,
            total_tokens_consumed: new_sub.total_tokens_consumed,
            created_at: now,
            updated_at: now,
        };
        t.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    fn get_subscriptions_for_user(&self, user_id: i32) -> Result<Vec<Subscription>, DBError> {
        let t = self.tables.lock().unwrap();
        Ok(t.subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    fn create_document(&self, new_doc: NewDocument) -> Result<Document, DBError> {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        let document = Document {
            id,
            user_id: new_doc.user_id,
            filename: new_doc.filename,
            original_filename: new_doc.original_filename,
            file_size: new_doc.file_size,
            mime_type: new_doc.mime_type,
            file_path: new_doc.file_path,
            language: new_doc.language,
            processed: false,
            processing_error: None,
            uploaded_at: Utc::now(),
            processed_at: None,
        };
        t.documents.push(document.clone());
        Ok(document)
    }

    fn get_documents_for_user(&self, user_id: i32) -> Result<Vec<Document>, DBError> {
        let t = self.tables.lock().unwrap();
        Ok(t.documents
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    fn mark_document_processed(
        &self,
        document_id: i32,
        user_id: i32,
        error: Option<&str>,
    ) -> Result<Document, DBError> {
        let mut t = self.tables.lock().unwrap();
        let document = t
            .documents
            .iter_mut()
            .find(|d| d.id == document_id && d.user_id == user_id)
            .ok_or(DBError::DocumentError(DocumentError::NotFound))?;
        document.processed = error.is_none();
        document.processing_error = error.map(truncate_processing_error);
        document.processed_at = Some(Utc::now());
        Ok(document.clone())
    }

    fn create_chat_session(
        &self,
        new_session: NewChatSession,
        document_ids: &[i32],
    ) -> Result<(ChatSession, Vec<i32>), DBError> {
        let requested = dedup_ids(document_ids);
        let mut t = self.tables.lock().unwrap();
        let owned = requested.iter().all(|id| {
            t.documents
                .iter()
                .any(|d| d.id == *id && d.user_id == new_session.user_id)
        });
        if !owned {
            return Err(DocumentError::NotFound.into());
        }
        let id = t.next_id();
        let now = Utc::now();
        let session = ChatSession {
            id,
            user_id: new_session.user_id,
            title: new_session.title,
            query_type: new_session.query_type,
            language: new_session.language,
            is_active: true,
            session_context: new_session.session_context,
            created_at: now,
            updated_at: now,
        };
        t.chat_sessions.push(session.clone());
        t.session_documents
            .extend(requested.iter().map(|doc_id| (id, *doc_id)));
        Ok((session, requested))
    }

    fn get_chat_session(&self, session_id: i32, user_id: i32) -> Result<ChatSession, DBError> {
        let t = self.tables.lock().unwrap();
        t.session(session_id, user_id).cloned()
    }

    fn get_chat_session_with_documents(
        &self,
        session_id: i32,
        user_id: i32,
    ) -> Result<(ChatSession, Vec<i32>), DBError> {
        let t = self.tables.lock().unwrap();
        let session = t.session(session_id, user_id)?.clone();
        let document_ids = t.session_document_ids(session.id);
        Ok((session, document_ids))
    }

    fn get_chat_sessions_for_user(&self, user_id: i32) -> Result<Vec<ChatSession>, DBError> {
        let t = self.tables.lock().unwrap();
        Ok(t.chat_sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    fn get_session_queries(
        &self,
        session_id: i32,
        user_id: i32,
        cursor: HistoryCursor,
        limit: i64,
    ) -> Result<(Vec<Query>, bool), DBError> {
        let t = self.tables.lock().unwrap();
        t.session(session_id, user_id)?;
        let in_session = t
            .queries
            .iter()
            .filter(|q| q.chat_session_id == Some(session_id));
        let fetch = usize::try_from(limit + 1).unwrap_or(usize::MAX);
        let rows: Vec<Query> = match cursor {
            HistoryCursor::Latest => in_session.rev().take(fetch).cloned().collect(),
            HistoryCursor::Before(id) => in_session
                .rev()
                .filter(|q| q.id < id)
                .take(fetch)
                .cloned()
                .collect(),
            HistoryCursor::After(id) => in_session
                .filter(|q| q.id > id)
                .take(fetch)
                .cloned()
                .collect(),
        };
        Ok(cursor.arrange(rows, limit))
    }

    fn create_query(&self, new_query: NewQuery) -> Result<Query, DBError> {
        let mut t = self.tables.lock().unwrap();
        if let Some(session_id) = new_query.chat_session_id {
            if !t.session(session_id, new_query.user_id)?.is_active {
                return Err(ChatSessionError::Closed.into());
            }
        }
        let id = t.next_id();
        let query = Query {
            id,
            user_id: new_query.user_id,
            chat_session_id: new_query.chat_session_id,
            query_type: new_query.query_type,
            query_text: new_query.query_text,
            response_text: String::new(),
            language: new_query.language,
            tokens_consumed: 0,
            processing_time_ms: None,
            sources: json!([]),
            chunks: json!([]),
            context_used: new_query.context_used,
            created_at: Utc::now(),
        };
        t.queries.push(query.clone());
        Ok(query)
    }

    fn get_query_with_usage(
        &self,
        query_id: i32,
        user_id: i32,
    ) -> Result<(Query, Option<TokenUsage>), DBError> {
        let t = self.tables.lock().unwrap();
        let query = t
            .queries
            .iter()
            .find(|q| q.id == query_id && q.user_id == user_id)
            .cloned()
            .ok_or(DBError::QueryError(QueryError::NotFound))?;
        let usage = t
            .token_usages
            .iter()
            .find(|u| u.query_id == Some(query.id))
            .cloned();
        Ok((query, usage))
    }

    fn complete_query(
        &self,
        query_id: i32,
        user_id: i32,
        outcome: QueryOutcome,
        subscription_id: i32,
        cost: BigDecimal,
    ) -> Result<(Query, TokenUsage, Subscription), DBError> {
        let mut t = self.tables.lock().unwrap();
        let sub_index = t
            .subscriptions
            .iter()
            .position(|s| s.id == subscription_id && s.user_id == user_id)
            .ok_or(DBError::SubscriptionError(SubscriptionError::NotFound))?;
        if !t.subscriptions[sub_index].is_active {
            return Err(SubscriptionError::Inactive.into());
        }
        let charged = t.subscriptions[sub_index]
            .terms()?
            .consume(outcome.tokens_consumed, Utc::now())?;
        let query_index = t
            .queries
            .iter()
            .position(|q| q.id == query_id && q.user_id == user_id)
            .ok_or(DBError::QueryError(QueryError::NotFound))?;
        if t.token_usages.iter().any(|u| u.query_id == Some(query_id)) {
            return Err(TokenUsageError::AlreadyRecorded.into());
        }

        let usage_id = t.next_id();
        let now = Utc::now();
        let usage = TokenUsage {
            id: usage_id,
            subscription_id,
            query_id: Some(query_id),
            tokens_consumed: outcome.tokens_consumed,
            cost,
            timestamp: now,
        };
        t.token_usages.push(usage.clone());

        let query = &mut t.queries[query_index];
        query.response_text = outcome.response_text;
        query.tokens_consumed = outcome.tokens_consumed;
        query.processing_time_ms = outcome.processing_time_ms;
        query.sources = outcome.sources;
        query.chunks = outcome.chunks;
        let query = query.clone();

        let stored = NewSubscription::from_terms(user_id, charged);
        let subscription = &mut t.subscriptions[sub_index];
        subscription.tokens_used = stored.tokens_used;
        subscription.total_tokens_consumed = stored.total_tokens_consumed;
        subscription.updated_at = now;
        Ok((query, usage, subscription.clone()))
    }

    fn create_billing_record(&self, record: NewBillingRecord) -> Result<BillingRecord, DBError> {
        let mut t = self.tables.lock().unwrap();
        let owned = t
            .subscriptions
            .iter()
            .any(|s| s.id == record.subscription_id && s.user_id == record.user_id);
        if !owned {
            return Err(SubscriptionError::NotFound.into());
        }
        let id = t.next_id();
        let billing_record = BillingRecord {
            id,
            user_id: record.user_id,
            subscription_id: record.subscription_id,
            billing_period_start: record.billing_period_start,
            billing_period_end: record.billing_period_end,
            total_tokens: record.total_tokens,
            total_cost: record.total_cost,
            currency: record.currency,
            created_at: Utc::now(),
        };
        t.billing_records.push(billing_record.clone());
        Ok(billing_record)
    }

    fn get_billing_records_for_user(&self, user_id: i32) -> Result<Vec<BillingRecord>, DBError> {
        let t = self.tables.lock().unwrap();
        Ok(t.billing_records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
