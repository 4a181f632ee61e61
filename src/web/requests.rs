//! Input contracts accepted by the HTTP routes.
//!
//! Field presence and enum membership are enforced by serde while the body is
//! parsed; length limits, numeric precision and cross-field rules by
//! `validator` once it is.

use crate::models::billing_records::DEFAULT_CURRENCY;
use crate::models::enums::{CompanySize, CompanyType, Language, PricingPlan, QueryType, UserType};
use crate::models::subscriptions::PlanTerms;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use validator::{Validate, ValidationError};

pub type JsonObject = Map<String, Value>;

lazy_static! {
    static ref CURRENCY_CODE: Regex = Regex::new(r"^[A-Z]{3}$").expect("valid currency regex");
}

/// True if `value` fits a `NUMERIC(precision, scale)` column without rounding.
pub fn fits_numeric(value: &BigDecimal, precision: i64, scale: i64) -> bool {
    let (_, exponent) = value.normalized().as_bigint_and_exponent();
    if exponent > scale {
        return false;
    }
    match BigDecimal::from_str(&format!("1e{}", precision - scale)) {
        Ok(limit) => value.abs() < limit,
        Err(_) => false,
    }
}

fn non_negative_money(value: &BigDecimal, code: &'static str, scale: i64) -> Result<(), ValidationError> {
    if *value < BigDecimal::from(0) {
        return Err(ValidationError::new("negative_amount"));
    }
    if !fits_numeric(value, 10, scale) {
        return Err(ValidationError::new(code));
    }
    Ok(())
}

fn validate_price_2dp(value: &BigDecimal) -> Result<(), ValidationError> {
    non_negative_money(value, "numeric_10_2", 2)
}

fn validate_price_4dp(value: &BigDecimal) -> Result<(), ValidationError> {
    non_negative_money(value, "numeric_10_4", 4)
}

fn validate_currency(value: &String) -> Result<(), ValidationError> {
    if CURRENCY_CODE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("currency_code"))
    }
}

fn validate_locations(locations: &Vec<String>) -> Result<(), ValidationError> {
    let valid = locations
        .iter()
        .all(|l| !l.trim().is_empty() && l.chars().count() <= 100);
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("location"))
    }
}

fn validate_organization_name(name: &String) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::new("blank_name"))
    } else {
        Ok(())
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Deserialize, Validate)]
#[validate(schema(function = "validate_user_create"))]
pub struct UserCreate {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub user_type: UserType,
    #[validate(length(min = 1, max = 200), custom(function = "validate_organization_name"))]
    pub organization_name: Option<String>,
}

impl std::fmt::Debug for UserCreate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCreate")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("user_type", &self.user_type)
            .field("organization_name", &self.organization_name)
            .finish()
    }
}

fn validate_user_create(value: &UserCreate) -> Result<(), ValidationError> {
    if value.user_type == UserType::B2c && value.organization_name.is_some() {
        return Err(ValidationError::new("b2c_with_organization"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserContextCreate {
    #[validate(length(min = 1, max = 50))]
    pub user_type_context: String,
    #[validate(length(max = 100))]
    pub home_location: String,
    pub preferred_language: Language,
    #[validate(length(max = 100))]
    pub profession: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub personal_notes: String,
    #[serde(default)]
    pub context_data: JsonObject,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_user_context_update"))]
pub struct UserContextUpdate {
    #[validate(length(min = 1, max = 50))]
    pub user_type_context: Option<String>,
    #[validate(length(max = 100))]
    pub home_location: Option<String>,
    pub preferred_language: Option<Language>,
    #[validate(length(max = 100))]
    pub profession: Option<String>,
    #[validate(length(max = 2000))]
    pub personal_notes: Option<String>,
    pub context_data: Option<JsonObject>,
}

fn validate_user_context_update(value: &UserContextUpdate) -> Result<(), ValidationError> {
    let any_field = value.user_type_context.is_some()
        || value.home_location.is_some()
        || value.preferred_language.is_some()
        || value.profession.is_some()
        || value.personal_notes.is_some()
        || value.context_data.is_some();
    if any_field {
        Ok(())
    } else {
        Err(ValidationError::new("empty_update"))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct OrganizationCreate {
    #[validate(length(min = 1, max = 200), custom(function = "validate_organization_name"))]
    pub name: String,
    pub company_type: CompanyType,
    pub company_size: CompanySize,
    #[validate(length(max = 100))]
    pub headquarters_location: String,
    #[serde(default)]
    #[validate(custom(function = "validate_locations"))]
    pub subsidiary_locations: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QueryCreate {
    #[validate(length(min = 1, max = 5000))]
    pub query_text: String,
    pub query_type: QueryType,
    pub language: Language,
    pub chat_session_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_subscription_create"))]
pub struct SubscriptionCreate {
    pub pricing_plan: PricingPlan,
    #[validate(range(min = 1))]
    pub token_allowance: Option<i64>,
    #[validate(custom(function = "validate_price_2dp"))]
    pub week_pass_price: Option<BigDecimal>,
}

fn validate_subscription_create(value: &SubscriptionCreate) -> Result<(), ValidationError> {
    match value.pricing_plan {
        PricingPlan::WeekPass if value.token_allowance.is_none() => {
            Err(ValidationError::new("week_pass_requires_allowance"))
        }
        PricingPlan::Bestprice
            if value.token_allowance.is_some() || value.week_pass_price.is_some() =>
        {
            Err(ValidationError::new("bestprice_with_week_pass_fields"))
        }
        _ => Ok(()),
    }
}

impl SubscriptionCreate {
    /// Terms for a validated request. `bestprice_price_per_1k` is the
    /// currently configured metered rate.
    pub fn into_terms(
        self,
        now: DateTime<Utc>,
        bestprice_price_per_1k: Option<BigDecimal>,
    ) -> PlanTerms {
        match self.pricing_plan {
            PricingPlan::WeekPass => {
                PlanTerms::week_pass(self.token_allowance.unwrap_or(0), self.week_pass_price, now)
            }
            PricingPlan::Bestprice => PlanTerms::bestprice(bestprice_price_per_1k),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_api_key_create"))]
pub struct APIKeyCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

fn validate_api_key_create(value: &APIKeyCreate) -> Result<(), ValidationError> {
    match value.expires_at {
        Some(expires_at) if expires_at <= Utc::now() => {
            Err(ValidationError::new("expiry_in_past"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct DocumentUpload {
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    #[validate(range(min = 1))]
    pub file_size: i64,
    #[validate(length(min = 1, max = 100))]
    pub mime_type: String,
    pub language: Option<Language>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DocumentProcessed {
    #[validate(length(max = 1000))]
    pub processing_error: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatSessionCreate {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub query_type: QueryType,
    pub language: Language,
    #[serde(default)]
    pub document_ids: Vec<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QueryCompletion {
    pub subscription_id: i32,
    #[serde(default)]
    pub response_text: String,
    #[validate(range(min = 0))]
    pub tokens_consumed: i64,
    #[validate(range(min = 0))]
    pub processing_time_ms: Option<i32>,
    #[serde(default)]
    pub sources: Vec<JsonObject>,
    #[serde(default)]
    pub chunks: Vec<JsonObject>,
    #[validate(custom(function = "validate_price_4dp"))]
    pub cost: BigDecimal,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_billing_record_create"))]
pub struct BillingRecordCreate {
    pub subscription_id: i32,
    pub billing_period_start: DateTime<Utc>,
    pub billing_period_end: DateTime<Utc>,
    #[validate(range(min = 0))]
    pub total_tokens: i64,
    #[validate(custom(function = "validate_price_2dp"))]
    pub total_cost: BigDecimal,
    #[serde(default = "default_currency")]
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

fn validate_billing_record_create(value: &BillingRecordCreate) -> Result<(), ValidationError> {
    if value.billing_period_start < value.billing_period_end {
        Ok(())
    } else {
        Err(ValidationError::new("empty_billing_period"))
    }
}
