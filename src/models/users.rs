use crate::models::enums::{AccountType, UserType};
use crate::models::organizations::normalize_organization_name;
use crate::models::schema::users;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("User not found")]
    NotFound,
    #[error("Email already registered")]
    EmailAlreadyExists,
    #[error("Organization name is reserved by another account")]
    OrganizationNameReserved,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub user_type: UserType,
    pub account_type: Option<AccountType>,
    pub organization_id: Option<i32>,
    pub is_active: bool,
    pub can_generate_api_keys: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reserved_organization_name: Option<String>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("user_type", &self.user_type)
            .field("account_type", &self.account_type)
            .field("organization_id", &self.organization_id)
            .field("is_active", &self.is_active)
            .field("can_generate_api_keys", &self.can_generate_api_keys)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("reserved_organization_name", &self.reserved_organization_name)
            .finish()
    }
}

impl User {
    pub fn get_by_id(conn: &mut PgConnection, lookup_id: i32) -> Result<Self, UserError> {
        users::table
            .filter(users::id.eq(lookup_id))
            .first::<User>(conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::DatabaseError(e),
            })
    }

    /// Id of the account holding `name` as its reserved organization name.
    pub fn reservation_holder(
        conn: &mut PgConnection,
        name: &str,
    ) -> Result<Option<i32>, UserError> {
        users::table
            .filter(users::reserved_organization_name.eq(name))
            .select(users::id)
            .first::<i32>(conn)
            .optional()
            .map_err(UserError::DatabaseError)
    }

    pub fn is_master(&self) -> bool {
        self.user_type == UserType::B2b && self.account_type == Some(AccountType::Master)
    }

    pub fn set_organization(
        &self,
        conn: &mut PgConnection,
        new_organization_id: i32,
    ) -> Result<User, UserError> {
        diesel::update(users::table.filter(users::id.eq(self.id)))
            .set((
                users::organization_id.eq(Some(new_organization_id)),
                users::reserved_organization_name.eq(None::<String>),
                users::updated_at.eq(Utc::now()),
            ))
            .get_result::<User>(conn)
            .map_err(UserError::DatabaseError)
    }
}

/// Where a new account lands inside the tenant structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPlacement {
    pub account_type: Option<AccountType>,
    pub organization_id: Option<i32>,
    pub can_generate_api_keys: bool,
    pub reserved_organization_name: Option<String>,
}

impl AccountPlacement {
    /// B2C accounts stand alone. A B2B account joins `existing_organization`
    /// as a member, or becomes the master of an organization yet to be
    /// created, reserving `organization_name` for it when one was given.
    pub fn resolve(
        user_type: UserType,
        organization_name: Option<&str>,
        existing_organization: Option<i32>,
    ) -> Self {
        match (user_type, existing_organization) {
            (UserType::B2c, _) => AccountPlacement {
                account_type: None,
                organization_id: None,
                can_generate_api_keys: false,
                reserved_organization_name: None,
            },
            (UserType::B2b, Some(org_id)) => AccountPlacement {
                account_type: Some(AccountType::Member),
                organization_id: Some(org_id),
                can_generate_api_keys: false,
                reserved_organization_name: None,
            },
            (UserType::B2b, None) => AccountPlacement {
                account_type: Some(AccountType::Master),
                organization_id: None,
                can_generate_api_keys: true,
                reserved_organization_name: organization_name
                    .map(normalize_organization_name)
                    .filter(|name| !name.is_empty()),
            },
        }
    }
}

#[derive(Insertable, Clone)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub user_type: UserType,
    pub account_type: Option<AccountType>,
    pub organization_id: Option<i32>,
    pub can_generate_api_keys: bool,
    pub reserved_organization_name: Option<String>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("user_type", &self.user_type)
            .field("account_type", &self.account_type)
            .field("organization_id", &self.organization_id)
            .field("can_generate_api_keys", &self.can_generate_api_keys)
            .field("reserved_organization_name", &self.reserved_organization_name)
            .finish()
    }
}

impl NewUser {
    /// Hashes `password` and places the account according to `placement`.
    pub fn new(
        email: String,
        password: &str,
        user_type: UserType,
        placement: AccountPlacement,
    ) -> Self {
        NewUser {
            email: email.trim().to_lowercase(),
            password_hash: password_auth::generate_hash(password),
            user_type,
            account_type: placement.account_type,
            organization_id: placement.organization_id,
            can_generate_api_keys: placement.can_generate_api_keys,
            reserved_organization_name: placement.reserved_organization_name,
        }
    }

    pub fn insert(&self, conn: &mut PgConnection) -> Result<User, UserError> {
        diesel::insert_into(users::table)
            .values(self)
            .get_result::<User>(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    ref info,
                ) if info.constraint_name() == Some("users_email_key") => {
                    UserError::EmailAlreadyExists
                }
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    ref info,
                ) if info.constraint_name() == Some("users_reserved_organization_name_key") => {
                    UserError::OrganizationNameReserved
                }
                _ => UserError::DatabaseError(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_b2c_placement_has_no_account_type() {
        let placement = AccountPlacement::resolve(UserType::B2c, None, Some(4));
        assert_eq!(placement.account_type, None);
        assert_eq!(placement.organization_id, None);
        assert!(!placement.can_generate_api_keys);
    }

    #[test]
    fn test_b2b_placement_always_has_account_type() {
        let master = AccountPlacement::resolve(UserType::B2b, None, None);
        assert_eq!(master.account_type, Some(AccountType::Master));
        assert!(master.can_generate_api_keys);
        assert_eq!(master.reserved_organization_name, None);

        let member = AccountPlacement::resolve(UserType::B2b, Some("Acme"), Some(9));
        assert_eq!(member.account_type, Some(AccountType::Member));
        assert_eq!(member.organization_id, Some(9));
        assert!(!member.can_generate_api_keys);
        assert_eq!(member.reserved_organization_name, None);
    }

    #[test]
    fn test_master_reserves_trimmed_signup_name() {
        let master = AccountPlacement::resolve(UserType::B2b, Some("  Acme GmbH "), None);
        assert_eq!(master.account_type, Some(AccountType::Master));
        assert_eq!(master.reserved_organization_name.as_deref(), Some("Acme GmbH"));

        let blank = AccountPlacement::resolve(UserType::B2b, Some("   "), None);
        assert_eq!(blank.reserved_organization_name, None);
    }

    #[test]
    fn test_new_user_hashes_password_and_normalizes_email() {
        let placement = AccountPlacement::resolve(UserType::B2c, None, None);
        let user = NewUser::new(
            " Alice@Example.COM ".to_string(),
            "correct horse",
            UserType::B2c,
            placement,
        );
        assert_eq!(user.email, "alice@example.com");
        assert_ne!(user.password_hash, "correct horse");
        assert!(password_auth::verify_password("correct horse", &user.password_hash).is_ok());
        assert!(password_auth::verify_password("wrong horse", &user.password_hash).is_err());
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let placement = AccountPlacement::resolve(UserType::B2b, Some("Acme"), None);
        let user = NewUser::new("a@b.eu".to_string(), "password1", UserType::B2b, placement);
        let rendered = format!("{:?}", user);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&user.password_hash));
    }

    #[test]
    fn test_user_serialization_omits_password_hash() {
        let now = Utc::now();
        let user = User {
            id: 3,
            email: "a@b.eu".to_string(),
            password_hash: "secret-hash".to_string(),
            user_type: UserType::B2b,
            account_type: Some(AccountType::Master),
            organization_id: None,
            is_active: true,
            can_generate_api_keys: true,
            created_at: now,
            updated_at: now,
            reserved_organization_name: Some("Acme".to_string()),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["account_type"], "master");
        assert!(user.is_master());
    }
}
