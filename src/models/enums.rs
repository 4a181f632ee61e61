//! Closed value sets shared by the persisted records and the input shapes.
//!
//! Each enum maps onto a PostgreSQL enum type declared in the migrations and
//! serializes as the same snake_case string, so a value outside the set is
//! rejected both at the JSON boundary and by the database.

use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::models::schema::sql_types::UserType"]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    B2c,
    B2b,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::models::schema::sql_types::AccountType"]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Master,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::models::schema::sql_types::CompanyType"]
#[serde(rename_all = "snake_case")]
pub enum CompanyType {
    Startup,
    Sme,
    Corporation,
    NonProfit,
    Government,
    Other,
}

/// Headcount bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::models::schema::sql_types::CompanySize"]
#[serde(rename_all = "snake_case")]
pub enum CompanySize {
    /// 1-9 employees
    Micro,
    /// 10-49 employees
    Small,
    /// 50-249 employees
    Medium,
    /// 250+ employees
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::models::schema::sql_types::PricingPlan"]
#[serde(rename_all = "snake_case")]
pub enum PricingPlan {
    WeekPass,
    Bestprice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::models::schema::sql_types::QueryType"]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Light,
    Main,
}

/// Official EU languages supported for documents, sessions and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::models::schema::sql_types::Language"]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Bg,
    Cs,
    Da,
    De,
    El,
    En,
    Es,
    Et,
    Fi,
    Fr,
    Ga,
    Hr,
    Hu,
    It,
    Lt,
    Lv,
    Mt,
    Nl,
    Pl,
    Pt,
    Ro,
    Sk,
    Sl,
    Sv,
}

impl Language {
    /// ISO 639-1 code as stored in the database.
    pub fn code(&self) -> &'static str {
        match self {
            Language::Bg => "bg",
            Language::Cs => "cs",
            Language::Da => "da",
            Language::De => "de",
            Language::El => "el",
            Language::En => "en",
            Language::Es => "es",
            Language::Et => "et",
            Language::Fi => "fi",
            Language::Fr => "fr",
            Language::Ga => "ga",
            Language::Hr => "hr",
            Language::Hu => "hu",
            Language::It => "it",
            Language::Lt => "lt",
            Language::Lv => "lv",
            Language::Mt => "mt",
            Language::Nl => "nl",
            Language::Pl => "pl",
            Language::Pt => "pt",
            Language::Ro => "ro",
            Language::Sk => "sk",
            Language::Sl => "sl",
            Language::Sv => "sv",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
