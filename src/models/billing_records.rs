use crate::models::schema::billing_records;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CURRENCY: &str = "EUR";

#[derive(Error, Debug)]
pub enum BillingRecordError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = billing_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BillingRecord {
    pub id: i32,
    pub user_id: i32,
    pub subscription_id: i32,
    pub billing_period_start: DateTime<Utc>,
    pub billing_period_end: DateTime<Utc>,
    pub total_tokens: i64,
    pub total_cost: BigDecimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl BillingRecord {
    pub fn get_all_for_user(
        conn: &mut PgConnection,
        lookup_user_id: i32,
    ) -> Result<Vec<Self>, BillingRecordError> {
        billing_records::table
            .filter(billing_records::user_id.eq(lookup_user_id))
            .order(billing_records::billing_period_start.desc())
            .load::<BillingRecord>(conn)
            .map_err(BillingRecordError::DatabaseError)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = billing_records)]
pub struct NewBillingRecord {
    pub user_id: i32,
    pub subscription_id: i32,
    pub billing_period_start: DateTime<Utc>,
    pub billing_period_end: DateTime<Utc>,
    pub total_tokens: i64,
    pub total_cost: BigDecimal,
    pub currency: String,
}

impl NewBillingRecord {
    pub fn insert(&self, conn: &mut PgConnection) -> Result<BillingRecord, BillingRecordError> {
        diesel::insert_into(billing_records::table)
            .values(self)
            .get_result::<BillingRecord>(conn)
            .map_err(BillingRecordError::DatabaseError)
    }
}
