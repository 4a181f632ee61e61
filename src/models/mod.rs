pub mod api_keys;
pub mod billing_records;
pub mod chat_sessions;
pub mod documents;
pub mod enums;
pub mod organizations;
pub mod queries;
pub mod schema;
pub mod subscriptions;
pub mod token_usages;
pub mod user_contexts;
pub mod users;
