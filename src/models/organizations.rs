use crate::models::enums::{CompanySize, CompanyType};
use crate::models::schema::organizations;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrganizationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("Organization not found")]
    NotFound,
    #[error("Organization name already taken")]
    NameTaken,
}

/// Organization names are stored and looked up without surrounding whitespace.
pub fn normalize_organization_name(name: &str) -> String {
    name.trim().to_string()
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = organizations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Organization {
    pub id: i32,
    pub name: String,
    pub company_type: CompanyType,
    pub company_size: CompanySize,
    pub headquarters_location: String,
    pub subsidiary_locations: Value,
    pub sso_enabled: bool,
    pub sso_config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn get_by_id(conn: &mut PgConnection, lookup_id: i32) -> Result<Self, OrganizationError> {
        organizations::table
            .filter(organizations::id.eq(lookup_id))
            .first::<Organization>(conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => OrganizationError::NotFound,
                _ => OrganizationError::DatabaseError(e),
            })
    }

    pub fn get_by_name(
        conn: &mut PgConnection,
        lookup_name: &str,
    ) -> Result<Option<Self>, OrganizationError> {
        organizations::table
            .filter(organizations::name.eq(normalize_organization_name(lookup_name)))
            .first::<Organization>(conn)
            .optional()
            .map_err(OrganizationError::DatabaseError)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = organizations)]
pub struct NewOrganization {
    pub name: String,
    pub company_type: CompanyType,
    pub company_size: CompanySize,
    pub headquarters_location: String,
    pub subsidiary_locations: Value,
    pub sso_enabled: bool,
    pub sso_config: Value,
}

impl NewOrganization {
    pub fn new(
        name: String,
        company_type: CompanyType,
        company_size: CompanySize,
        headquarters_location: String,
        subsidiary_locations: Vec<String>,
    ) -> Self {
        NewOrganization {
            name: normalize_organization_name(&name),
            company_type,
            company_size,
            headquarters_location,
            subsidiary_locations: json!(subsidiary_locations),
            sso_enabled: false,
            sso_config: json!({}),
        }
    }

    pub fn insert(&self, conn: &mut PgConnection) -> Result<Organization, OrganizationError> {
        diesel::insert_into(organizations::table)
            .values(self)
            .get_result::<Organization>(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    ref info,
                ) if info.constraint_name() == Some("organizations_name_key") => {
                    OrganizationError::NameTaken
                }
                _ => OrganizationError::DatabaseError(e),
            })
    }
}
