//! Subscriptions and their pricing terms.
//!
//! The table keeps week-pass and bestprice columns side by side. Rust code
//! never touches those columns directly: rows are built from, and read back
//! into, [`PlanTerms`], so a subscription carries exactly one field group.

use crate::models::enums::PricingPlan;
use crate::models::schema::subscriptions;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifetime of a week pass, counted from purchase.
pub const WEEK_PASS_DAYS: i64 = 7;

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Subscription not found")]
    NotFound,
    #[error("Subscription is not active")]
    Inactive,
    #[error("Week pass has expired")]
    Expired,
    #[error("Token allowance exceeded: {requested} requested, {remaining} remaining")]
    AllowanceExceeded { requested: i64, remaining: i64 },
    #[error("Token count must not be negative")]
    NegativeTokens,
    #[error("Subscription {0} mixes week pass and bestprice fields")]
    InconsistentPlan(i32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pricing_plan", rename_all = "snake_case")]
pub enum PlanTerms {
    WeekPass {
        token_allowance: i64,
        tokens_used: i64,
        expires_at: Option<DateTime<Utc>>,
        price: Option<BigDecimal>,
    },
    Bestprice {
        price_per_1k_tokens: Option<BigDecimal>,
        total_tokens_consumed: i64,
    },
}

impl PlanTerms {
    /// A fresh week pass starting at `now`.
    pub fn week_pass(token_allowance: i64, price: Option<BigDecimal>, now: DateTime<Utc>) -> Self {
        PlanTerms::WeekPass {
            token_allowance,
            tokens_used: 0,
            expires_at: Some(now + Duration::days(WEEK_PASS_DAYS)),
            price,
        }
    }

    pub fn bestprice(price_per_1k_tokens: Option<BigDecimal>) -> Self {
        PlanTerms::Bestprice {
            price_per_1k_tokens,
            total_tokens_consumed: 0,
        }
    }

    pub fn plan(&self) -> PricingPlan {
        match self {
            PlanTerms::WeekPass { .. } => PricingPlan::WeekPass,
            PlanTerms::Bestprice { .. } => PricingPlan::Bestprice,
        }
    }

    /// Tokens left on a week pass; `None` for metered plans.
    pub fn remaining_tokens(&self) -> Option<i64> {
        match self {
            PlanTerms::WeekPass {
                token_allowance,
                tokens_used,
                ..
            } => Some((token_allowance - tokens_used).max(0)),
            PlanTerms::Bestprice { .. } => None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            PlanTerms::WeekPass {
                expires_at: Some(expires_at),
                ..
            } => now >= *expires_at,
            _ => false,
        }
    }

    pub fn can_consume(&self, tokens: i64, now: DateTime<Utc>) -> bool {
        self.consume(tokens, now).is_ok()
    }

    /// Terms after charging `tokens`. Week passes must stay within their
    /// allowance and before expiry; bestprice plans only accumulate.
    pub fn consume(&self, tokens: i64, now: DateTime<Utc>) -> Result<PlanTerms, SubscriptionError> {
        if tokens < 0 {
            return Err(SubscriptionError::NegativeTokens);
        }
        match self {
            PlanTerms::WeekPass {
                token_allowance,
                tokens_used,
                expires_at,
                price,
            } => {
                if self.is_expired(now) {
                    return Err(SubscriptionError::Expired);
                }
                let remaining = (token_allowance - tokens_used).max(0);
                match tokens_used.checked_add(tokens) {
                    Some(total) if total <= *token_allowance => Ok(PlanTerms::WeekPass {
                        token_allowance: *token_allowance,
                        tokens_used: total,
                        expires_at: *expires_at,
                        price: price.clone(),
                    }),
                    _ => Err(SubscriptionError::AllowanceExceeded {
                        requested: tokens,
                        remaining,
                    }),
                }
            }
            PlanTerms::Bestprice {
                price_per_1k_tokens,
                total_tokens_consumed,
            } => Ok(PlanTerms::Bestprice {
                price_per_1k_tokens: price_per_1k_tokens.clone(),
                total_tokens_consumed: total_tokens_consumed.saturating_add(tokens),
            }),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub id: i32,
    pub user_id: i32,
    pub pricing_plan: PricingPlan,
    pub is_active: bool,
    pub token_allowance: Option<i64>,
    pub tokens_used: i64,
    pub week_pass_expires_at: Option<DateTime<Utc>>,
    pub week_pass_price: Option<BigDecimal>,
    pub current_price_per_1k_tokens: Option<BigDecimal>,
    pub total_tokens_consumed: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outward shape of a subscription with its terms as a tagged union.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub id: i32,
    pub user_id: i32,
    pub is_active: bool,
    #[serde(flatten)]
    pub terms: PlanTerms,
    pub remaining_tokens: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn terms(&self) -> Result<PlanTerms, SubscriptionError> {
        let inconsistent = SubscriptionError::InconsistentPlan(self.id);
        match self.pricing_plan {
            PricingPlan::WeekPass => {
                if self.current_price_per_1k_tokens.is_some() || self.total_tokens_consumed != 0 {
                    return Err(inconsistent);
                }
                let token_allowance = self.token_allowance.ok_or(inconsistent)?;
                Ok(PlanTerms::WeekPass {
                    token_allowance,
                    tokens_used: self.tokens_used,
                    expires_at: self.week_pass_expires_at,
                    price: self.week_pass_price.clone(),
                })
            }
            PricingPlan::Bestprice => {
                if self.token_allowance.is_some()
                    || self.week_pass_expires_at.is_some()
                    || self.week_pass_price.is_some()
                    || self.tokens_used != 0
                {
                    return Err(inconsistent);
                }
                Ok(PlanTerms::Bestprice {
                    price_per_1k_tokens: self.current_price_per_1k_tokens.clone(),
                    total_tokens_consumed: self.total_tokens_consumed,
                })
            }
        }
    }

    pub fn view(&self) -> Result<SubscriptionView, SubscriptionError> {
        let terms = self.terms()?;
        Ok(SubscriptionView {
            id: self.id,
            user_id: self.user_id,
            is_active: self.is_active,
            remaining_tokens: terms.remaining_tokens(),
            terms,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    pub fn get_by_id_for_user(
        conn: &mut PgConnection,
        lookup_id: i32,
        lookup_user_id: i32,
    ) -> Result<Self, SubscriptionError> {
        subscriptions::table
            .filter(subscriptions::id.eq(lookup_id))
            .filter(subscriptions::user_id.eq(lookup_user_id))
            .first::<Subscription>(conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => SubscriptionError::NotFound,
                _ => SubscriptionError::DatabaseError(e),
            })
    }

    pub fn get_all_for_user(
        conn: &mut PgConnection,
        lookup_user_id: i32,
    ) -> Result<Vec<Self>, SubscriptionError> {
        subscriptions::table
            .filter(subscriptions::user_id.eq(lookup_user_id))
            .order(subscriptions::created_at.desc())
            .load::<Subscription>(conn)
            .map_err(SubscriptionError::DatabaseError)
    }

    /// Row lock held until the surrounding transaction ends.
    pub fn lock_for_update(
        conn: &mut PgConnection,
        lookup_id: i32,
        lookup_user_id: i32,
    ) -> Result<Self, SubscriptionError> {
        subscriptions::table
            .filter(subscriptions::id.eq(lookup_id))
            .filter(subscriptions::user_id.eq(lookup_user_id))
            .for_update()
            .first::<Subscription>(conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => SubscriptionError::NotFound,
                _ => SubscriptionError::DatabaseError(e),
            })
    }

    /// Writes the usage counters of `terms` back to this row.
    pub fn store_counters(
        &self,
        conn: &mut PgConnection,
        terms: &PlanTerms,
    ) -> Result<Subscription, SubscriptionError> {
        let target = subscriptions::table.filter(subscriptions::id.eq(self.id));
        let now = Utc::now();
        let updated = match terms {
            PlanTerms::WeekPass { tokens_used, .. } => diesel::update(target)
                .set((
                    subscriptions::tokens_used.eq(*tokens_used),
                    subscriptions::updated_at.eq(now),
                ))
                .get_result::<Subscription>(conn),
            PlanTerms::Bestprice {
                total_tokens_consumed,
                ..
            } => diesel::update(target)
                .set((
                    subscriptions::total_tokens_consumed.eq(*total_tokens_consumed),
                    subscriptions::updated_at.eq(now),
                ))
                .get_result::<Subscription>(conn),
        };
        updated.map_err(SubscriptionError::DatabaseError)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = subscriptions)]
pub struct NewSubscription {
    pub user_id: i32,
    pub pricing_plan: PricingPlan,
    pub token_allowance: Option<i64>,
    pub tokens_used: i64,
    pub week_pass_expires_at: Option<DateTime<Utc>>,
    pub week_pass_price: Option<BigDecimal>,
    pub current_price_per_1k_tokens: Option<BigDecimal>,
    pub total_tokens_consumed: i64,
}

impl NewSubscription {
    pub fn from_terms(user_id: i32, terms: PlanTerms) -> Self {
        let pricing_plan = terms.plan();
        match terms {
            PlanTerms::WeekPass {
                token_allowance,
                tokens_used,
                expires_at,
                price,
            } => NewSubscription {
                user_id,
                pricing_plan,
                token_allowance: Some(token_allowance),
                tokens_used,
                week_pass_expires_at: expires_at,
                week_pass_price: price,
                current_price_per_1k_tokens: None,
                total_tokens_consumed: 0,
            },
            PlanTerms::Bestprice {
                price_per_1k_tokens,
                total_tokens_consumed,
            } => NewSubscription {
                user_id,
                pricing_plan,
                token_allowance: None,
                tokens_used: 0,
                week_pass_expires_at: None,
                week_pass_price: None,
                current_price_per_1k_tokens: price_per_1k_tokens,
                total_tokens_consumed,
            },
        }
    }

    pub fn insert(&self, conn: &mut PgConnection) -> Result<Subscription, SubscriptionError> {
        diesel::insert_into(subscriptions::table)
            .values(self)
            .get_result::<Subscription>(conn)
            .map_err(SubscriptionError::DatabaseError)
    }
}
