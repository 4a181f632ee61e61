use crate::models::api_keys::{ApiKey, ApiKeyError, NewApiKey};
use crate::models::billing_records::{BillingRecord, BillingRecordError, NewBillingRecord};
use crate::models::chat_sessions::{
    dedup_ids, ChatSession, ChatSessionError, NewChatSession, NewChatSessionDocument,
};
use crate::models::documents::{Document, DocumentError, NewDocument};
use crate::models::organizations::{NewOrganization, Organization, OrganizationError};
use crate::models::queries::{HistoryCursor, NewQuery, Query, QueryError, QueryOutcome};
use crate::models::subscriptions::{NewSubscription, Subscription, SubscriptionError};
use crate::models::token_usages::{NewTokenUsage, TokenUsage, TokenUsageError};
use crate::models::user_contexts::{
    NewUserContext, UserContext, UserContextChanges, UserContextError,
};
use crate::models::users::{NewUser, User, UserError};
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use thiserror::Error;
use tracing::{debug, info};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Error, Debug)]
pub enum DBError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Connection pool error: {0}")]
    PoolError(#[from] diesel::r2d2::PoolError),
    #[error("User error: {0}")]
    UserError(#[from] UserError),
    #[error("Organization error: {0}")]
    OrganizationError(#[from] OrganizationError),
    #[error("User context error: {0}")]
    UserContextError(#[from] UserContextError),
    #[error("API key error: {0}")]
    ApiKeyError(#[from] ApiKeyError),
    #[error("Subscription error: {0}")]
    SubscriptionError(#[from] SubscriptionError),
    #[error("Token usage error: {0}")]
    TokenUsageError(#[from] TokenUsageError),
    #[error("Document error: {0}")]
    DocumentError(#[from] DocumentError),
    #[error("Chat session error: {0}")]
    ChatSessionError(#[from] ChatSessionError),
    #[error("Query error: {0}")]
    QueryError(#[from] QueryError),
    #[error("Billing record error: {0}")]
    BillingRecordError(#[from] BillingRecordError),
    #[error("Only the master account may create the organization")]
    NotOrganizationMaster,
    #[error("User already belongs to an organization")]
    AlreadyInOrganization,
    #[error("Organization name differs from the one reserved at signup")]
    OrganizationNameMismatch,
}

/// Checks that `master` may found an organization called `name`.
/// `holder` is the account currently reserving that name, if any.
pub fn check_organization_claim(
    master: &User,
    name: &str,
    holder: Option<i32>,
) -> Result<(), DBError> {
    if !master.is_master() {
        return Err(DBError::NotOrganizationMaster);
    }
    if master.organization_id.is_some() {
        return Err(DBError::AlreadyInOrganization);
    }
    if let Some(reserved) = master.reserved_organization_name.as_deref() {
        if reserved != name {
            return Err(DBError::OrganizationNameMismatch);
        }
    }
    match holder {
        Some(holder_id) if holder_id != master.id => {
            Err(OrganizationError::NameTaken.into())
        }
        _ => Ok(()),
    }
}

pub trait DBConnection: Send + Sync {
    fn create_user(&self, new_user: NewUser) -> Result<User, DBError>;
    fn get_user_by_id(&self, user_id: i32) -> Result<User, DBError>;

    fn get_organization_by_id(&self, org_id: i32) -> Result<Organization, DBError>;
    fn get_organization_by_name(&self, name: &str) -> Result<Option<Organization>, DBError>;
    fn create_organization_for_master(
        &self,
        master_user_id: i32,
        new_org: NewOrganization,
    ) -> Result<(Organization, User), DBError>;

    fn get_user_context(&self, user_id: i32) -> Result<Option<UserContext>, DBError>;
    fn create_user_context(&self, new_context: NewUserContext) -> Result<UserContext, DBError>;
    fn update_user_context(
        &self,
        user_id: i32,
        changes: UserContextChanges,
    ) -> Result<UserContext, DBError>;

    fn create_api_key(&self, new_key: NewApiKey) -> Result<ApiKey, DBError>;
    fn get_api_keys_for_user(&self, user_id: i32) -> Result<Vec<ApiKey>, DBError>;
    fn deactivate_api_key(&self, key_id: i32, user_id: i32) -> Result<(), DBError>;

    fn create_subscription(&self, new_sub: NewSubscription) -> Result<Subscription, DBError>;
    fn get_subscriptions_for_user(&self, user_id: i32) -> Result<Vec<Subscription>, DBError>;

    fn create_document(&self, new_doc: NewDocument) -> Result<Document, DBError>;
    fn get_documents_for_user(&self, user_id: i32) -> Result<Vec<Document>, DBError>;
    fn mark_document_processed(
        &self,
        document_id: i32,
        user_id: i32,
        error: Option<&str>,
    ) -> Result<Document, DBError>;

    fn create_chat_session(
        &self,
        new_session: NewChatSession,
        document_ids: &[i32],
    ) -> Result<(ChatSession, Vec<i32>), DBError>;
    fn get_chat_session(&self, session_id: i32, user_id: i32) -> Result<ChatSession, DBError>;
    fn get_chat_session_with_documents(
        &self,
        session_id: i32,
        user_id: i32,
    ) -> Result<(ChatSession, Vec<i32>), DBError>;
    fn get_chat_sessions_for_user(&self, user_id: i32) -> Result<Vec<ChatSession>, DBError>;
    /// A page of session history, oldest first, and whether more rows lie
    /// in the direction of `cursor`.
    fn get_session_queries(
        &self,
        session_id: i32,
        user_id: i32,
        cursor: HistoryCursor,
        limit: i64,
    ) -> Result<(Vec<Query>, bool), DBError>;

    fn create_query(&self, new_query: NewQuery) -> Result<Query, DBError>;
    fn get_query_with_usage(
        &self,
        query_id: i32,
        user_id: i32,
    ) -> Result<(Query, Option<TokenUsage>), DBError>;
    fn complete_query(
        &self,
        query_id: i32,
        user_id: i32,
        outcome: QueryOutcome,
        subscription_id: i32,
        cost: BigDecimal,
    ) -> Result<(Query, TokenUsage, Subscription), DBError>;

    fn create_billing_record(&self, record: NewBillingRecord) -> Result<BillingRecord, DBError>;
    fn get_billing_records_for_user(&self, user_id: i32) -> Result<Vec<BillingRecord>, DBError>;
}

pub struct PostgresConnection {
    pool: PgPool,
}

impl PostgresConnection {
    fn conn(&self) -> Result<PgPooledConnection, DBError> {
        Ok(self.pool.get()?)
    }
}

pub fn setup_db(database_url: &str, pool_size: u32) -> Result<PostgresConnection, DBError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder().max_size(pool_size).build(manager)?;
    info!("Database pool ready with up to {} connections", pool_size);
    Ok(PostgresConnection { pool })
}

impl DBConnection for PostgresConnection {
    fn create_user(&self, new_user: NewUser) -> Result<User, DBError> {
        debug!("Creating user of type {:?}", new_user.user_type);
        let mut conn = self.conn()?;
        Ok(new_user.insert(&mut conn)?)
    }

    fn get_user_by_id(&self, user_id: i32) -> Result<User, DBError> {
        let mut conn = self.conn()?;
        Ok(User::get_by_id(&mut conn, user_id)?)
    }

    fn get_organization_by_id(&self, org_id: i32) -> Result<Organization, DBError> {
        let mut conn = self.conn()?;
        Ok(Organization::get_by_id(&mut conn, org_id)?)
    }

    fn get_organization_by_name(&self, name: &str) -> Result<Option<Organization>, DBError> {
        let mut conn = self.conn()?;
        Ok(Organization::get_by_name(&mut conn, name)?)
    }

    fn create_organization_for_master(
        &self,
        master_user_id: i32,
        new_org: NewOrganization,
    ) -> Result<(Organization, User), DBError> {
        let mut conn = self.conn()?;
        conn.transaction::<_, DBError, _>(|conn| {
            let master = User::get_by_id(conn, master_user_id)?;
            let holder = User::reservation_holder(conn, &new_org.name)?;
            check_organization_claim(&master, &new_org.name, holder)?;
            let org = new_org.insert(conn)?;
            let master = master.set_organization(conn, org.id)?;
            Ok((org, master))
        })
    }

    fn get_user_context(&self, user_id: i32) -> Result<Option<UserContext>, DBError> {
        let mut conn = self.conn()?;
        Ok(UserContext::get_by_user_id(&mut conn, user_id)?)
    }

    fn create_user_context(&self, new_context: NewUserContext) -> Result<UserContext, DBError> {
        let mut conn = self.conn()?;
        Ok(new_context.insert(&mut conn)?)
    }

    fn update_user_context(
        &self,
        user_id: i32,
        changes: UserContextChanges,
    ) -> Result<UserContext, DBError> {
        let mut conn = self.conn()?;
        Ok(changes.apply(&mut conn, user_id)?)
    }

    fn create_api_key(&self, new_key: NewApiKey) -> Result<ApiKey, DBError> {
        debug!("Creating API key for user {}", new_key.user_id);
        let mut conn = self.conn()?;
        Ok(new_key.insert(&mut conn)?)
    }

    fn get_api_keys_for_user(&self, user_id: i32) -> Result<Vec<ApiKey>, DBError> {
        let mut conn = self.conn()?;
        Ok(ApiKey::get_all_for_user(&mut conn, user_id)?)
    }

    fn deactivate_api_key(&self, key_id: i32, user_id: i32) -> Result<(), DBError> {
        let mut conn = self.conn()?;
        Ok(ApiKey::deactivate(&mut conn, key_id, user_id)?)
    }

    fn create_subscription(&self, new_sub: NewSubscription) -> Result<Subscription, DBError> {
        debug!(
            "Creating {:?} subscription for user {}",
            new_sub.pricing_plan, new_sub.user_id
        );
        let mut conn = self.conn()?;
        Ok(new_sub.insert(&mut conn)?)
    }

    fn get_subscriptions_for_user(&self, user_id: i32) -> Result<Vec<Subscription>, DBError> {
        let mut conn = self.conn()?;
        Ok(Subscription::get_all_for_user(&mut conn, user_id)?)
    }

    fn create_document(&self, new_doc: NewDocument) -> Result<Document, DBError> {
        let mut conn = self.conn()?;
        Ok(new_doc.insert(&mut conn)?)
    }

    fn get_documents_for_user(&self, user_id: i32) -> Result<Vec<Document>, DBError> {
        let mut conn = self.conn()?;
        Ok(Document::get_all_for_user(&mut conn, user_id)?)
    }

    fn mark_document_processed(
        &self,
        document_id: i32,
        user_id: i32,
        error: Option<&str>,
    ) -> Result<Document, DBError> {
        let mut conn = self.conn()?;
        Ok(Document::mark_processed(
            &mut conn,
            document_id,
            user_id,
            error,
        )?)
    }

    fn create_chat_session(
        &self,
        new_session: NewChatSession,
        document_ids: &[i32],
    ) -> Result<(ChatSession, Vec<i32>), DBError> {
        let requested = dedup_ids(document_ids);
        let mut conn = self.conn()?;
        conn.transaction::<_, DBError, _>(|conn| {
            let owned = Document::owned_ids(conn, new_session.user_id, &requested)?;
            if owned.len() != requested.len() {
                return Err(DBError::DocumentError(DocumentError::NotFound));
            }
            let session = new_session.insert(conn)?;
            let links = NewChatSessionDocument::link_all(conn, session.id, &requested)?;
            debug!(
                "Created chat session {} with {} documents",
                session.id,
                links.len()
            );
            Ok((session, requested))
        })
    }

    fn get_chat_session(&self, session_id: i32, user_id: i32) -> Result<ChatSession, DBError> {
        let mut conn = self.conn()?;
        Ok(ChatSession::get_by_id_for_user(
            &mut conn, session_id, user_id,
        )?)
    }

    fn get_chat_session_with_documents(
        &self,
        session_id: i32,
        user_id: i32,
    ) -> Result<(ChatSession, Vec<i32>), DBError> {
        let mut conn = self.conn()?;
        let session = ChatSession::get_by_id_for_user(&mut conn, session_id, user_id)?;
        let document_ids = session.document_ids(&mut conn)?;
        Ok((session, document_ids))
    }

    fn get_chat_sessions_for_user(&self, user_id: i32) -> Result<Vec<ChatSession>, DBError> {
        let mut conn = self.conn()?;
        Ok(ChatSession::get_all_for_user(&mut conn, user_id)?)
    }

    fn get_session_queries(
        &self,
        session_id: i32,
        user_id: i32,
        cursor: HistoryCursor,
        limit: i64,
    ) -> Result<(Vec<Query>, bool), DBError> {
        let mut conn = self.conn()?;
        let session = ChatSession::get_by_id_for_user(&mut conn, session_id, user_id)?;
        let rows = Query::get_page_for_session(&mut conn, session.id, cursor, limit)?;
        Ok(cursor.arrange(rows, limit))
    }

    fn create_query(&self, new_query: NewQuery) -> Result<Query, DBError> {
        let mut conn = self.conn()?;
        conn.transaction::<_, DBError, _>(|conn| {
            if let Some(session_id) = new_query.chat_session_id {
                let session = ChatSession::get_by_id_for_user(conn, session_id, new_query.user_id)?;
                if !session.is_active {
                    return Err(DBError::ChatSessionError(ChatSessionError::Closed));
                }
                session.touch(conn)?;
            }
            Ok(new_query.insert(conn)?)
        })
    }

    fn get_query_with_usage(
        &self,
        query_id: i32,
        user_id: i32,
    ) -> Result<(Query, Option<TokenUsage>), DBError> {
        let mut conn = self.conn()?;
        let query = Query::get_by_id_for_user(&mut conn, query_id, user_id)?;
        let usage = TokenUsage::get_for_query(&mut conn, query.id)?;
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
        let mut conn = self.conn()?;
        conn.transaction::<_, DBError, _>(|conn| {
            let subscription = Subscription::lock_for_update(conn, subscription_id, user_id)?;
            if !subscription.is_active {
                return Err(DBError::SubscriptionError(SubscriptionError::Inactive));
            }
            let charged = subscription
                .terms()?
                .consume(outcome.tokens_consumed, Utc::now())?;

            let query = outcome.apply(conn, query_id, user_id)?;
            let usage = NewTokenUsage {
                subscription_id: subscription.id,
                query_id: Some(query.id),
                tokens_consumed: outcome.tokens_consumed,
                cost,
            }
            .insert(conn)?;
            let subscription = subscription.store_counters(conn, &charged)?;

            debug!(
                "Recorded {} tokens for query {} on subscription {}",
                usage.tokens_consumed, query.id, subscription.id
            );
            Ok((query, usage, subscription))
        })
    }

    fn create_billing_record(&self, record: NewBillingRecord) -> Result<BillingRecord, DBError> {
        let mut conn = self.conn()?;
        conn.transaction::<_, DBError, _>(|conn| {
            Subscription::get_by_id_for_user(conn, record.subscription_id, record.user_id)?;
            Ok(record.insert(conn)?)
        })
    }

    fn get_billing_records_for_user(&self, user_id: i32) -> Result<Vec<BillingRecord>, DBError> {
        let mut conn = self.conn()?;
        Ok(BillingRecord::get_all_for_user(&mut conn, user_id)?)
    }
}
