use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::models::enums::UserType;
use crate::models::organizations::{NewOrganization, Organization};
use crate::models::user_contexts::{NewUserContext, UserContext, UserContextChanges};
use crate::models::users::{AccountPlacement, NewUser, User};
use crate::web::requests::{OrganizationCreate, UserContextCreate, UserContextUpdate, UserCreate};
use crate::web::{load_active_user, ValidatedJson};
use crate::{ApiError, AppState};

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route("/v1/users", post(create_user))
        .route("/v1/users/:user_id", get(get_user))
        .route("/v1/users/:user_id/organization", post(create_organization))
        .route("/v1/organizations/:org_id", get(get_organization))
        .route(
            "/v1/users/:user_id/context",
            get(get_user_context)
                .put(create_user_context)
                .patch(update_user_context),
        )
        .with_state(app_state)
}

/// POST /v1/users - Register an account
async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<UserCreate>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    debug!("Registering {:?} account", body.user_type);

    let existing_org = match (body.user_type, body.organization_name.as_deref()) {
        (UserType::B2b, Some(name)) => state
            .db
            .get_organization_by_name(name)?
            .map(|org| org.id),
        _ => None,
    };
    let placement = AccountPlacement::resolve(
        body.user_type,
        body.organization_name.as_deref(),
        existing_org,
    );

    let UserCreate {
        email,
        password,
        user_type,
        ..
    } = body;
    let new_user =
        tokio::task::spawn_blocking(move || NewUser::new(email, &password, user_type, placement))
            .await
            .map_err(|e| {
                error!("Password hashing task failed: {:?}", e);
                ApiError::InternalServerError
            })?;

    let user = state.db.create_user(new_user)?;
    info!(
        "Created user {} ({:?}, {:?})",
        user.id, user.user_type, user.account_type
    );
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /v1/users/{user_id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.db.get_user_by_id(user_id)?))
}

/// POST /v1/users/{user_id}/organization - Master account founds its organization
async fn create_organization(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<OrganizationCreate>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
    load_active_user(&state, user_id)?;

    let new_org = NewOrganization::new(
        body.name,
        body.company_type,
        body.company_size,
        body.headquarters_location,
        body.subsidiary_locations,
    );
    let (org, _master) = state.db.create_organization_for_master(user_id, new_org)?;
    info!("User {} created organization {}", user_id, org.id);
    Ok((StatusCode::CREATED, Json(org)))
}

/// GET /v1/organizations/{org_id}
async fn get_organization(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<i32>,
) -> Result<Json<Organization>, ApiError> {
    Ok(Json(state.db.get_organization_by_id(org_id)?))
}

/// GET /v1/users/{user_id}/context
async fn get_user_context(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<UserContext>, ApiError> {
    state.db.get_user_by_id(user_id)?;
    state
        .db
        .get_user_context(user_id)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// PUT /v1/users/{user_id}/context - Create the one context a user may have
async fn create_user_context(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UserContextCreate>,
) -> Result<(StatusCode, Json<UserContext>), ApiError> {
    load_active_user(&state, user_id)?;

    let new_context = NewUserContext {
        user_id,
        user_type_context: body.user_type_context,
        home_location: body.home_location,
        preferred_language: body.preferred_language,
        profession: body.profession,
        personal_notes: body.personal_notes,
        context_data: Value::Object(body.context_data),
    };
    let context = state.db.create_user_context(new_context)?;
    Ok((StatusCode::CREATED, Json(context)))
}

/// PATCH /v1/users/{user_id}/context - Change only the fields provided
async fn update_user_context(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UserContextUpdate>,
) -> Result<Json<UserContext>, ApiError> {
    load_active_user(&state, user_id)?;

    let changes = UserContextChanges {
        user_type_context: body.user_type_context,
        home_location: body.home_location,
        preferred_language: body.preferred_language,
        profession: body.profession,
        personal_notes: body.personal_notes,
        context_data: body.context_data.map(Value::Object),
        updated_at: Utc::now(),
    };
    Ok(Json(state.db.update_user_context(user_id, changes)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DBConnection;
    use crate::models::enums::AccountType;
    use crate::web::test_support::{app_state, MemoryDb};
    use serde_json::json;

    fn signup(email: &str, organization_name: Option<&str>) -> ValidatedJson<UserCreate> {
        ValidatedJson(
            serde_json::from_value(json!({
                "email": email,
                "password": "correct horse battery",
                "user_type": "b2b",
                "organization_name": organization_name,
            }))
            .unwrap(),
        )
    }

    fn founding(name: &str) -> ValidatedJson<OrganizationCreate> {
        ValidatedJson(
            serde_json::from_value(json!({
                "name": name,
                "company_type": "sme",
                "company_size": "small",
                "headquarters_location": "Vienna",
            }))
            .unwrap(),
        )
    }

    async fn register(
        state: &Arc<AppState>,
        email: &str,
        organization_name: Option<&str>,
    ) -> Result<User, ApiError> {
        create_user(State(state.clone()), signup(email, organization_name))
            .await
            .map(|(_, Json(user))| user)
    }

    #[tokio::test]
    async fn test_b2b_signup_places_master_then_member() {
        let db = Arc::new(MemoryDb::new());
        let state = app_state(db.clone());

        let master = register(&state, "Lead@Acme.eu", Some(" Acme ")).await.unwrap();
        assert_eq!(master.email, "lead@acme.eu");
        assert_eq!(master.account_type, Some(AccountType::Master));
        assert_eq!(master.organization_id, None);
        assert!(master.can_generate_api_keys);
        assert_eq!(master.reserved_organization_name.as_deref(), Some("Acme"));

        let (status, Json(org)) =
            create_organization(State(state.clone()), Path(master.id), founding("Acme  "))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(org.name, "Acme");
        let master = db.get_user_by_id(master.id).unwrap();
        assert_eq!(master.organization_id, Some(org.id));
        assert_eq!(master.reserved_organization_name, None);

        let member = register(&state, "dev@acme.eu", Some("Acme")).await.unwrap();
        assert_eq!(member.account_type, Some(AccountType::Member));
        assert_eq!(member.organization_id, Some(org.id));
        assert!(!member.can_generate_api_keys);
        assert_eq!(member.reserved_organization_name, None);
    }

    #[tokio::test]
    async fn test_reserved_organization_name_is_exclusive() {
        let db = Arc::new(MemoryDb::new());
        let state = app_state(db);

        let first = register(&state, "a@acme.eu", Some("Acme")).await.unwrap();
        let second = register(&state, "b@acme.eu", Some("Acme")).await;
        assert!(matches!(second, Err(ApiError::Conflict)));

        let other = register(&state, "c@globex.eu", None).await.unwrap();
        let stolen = create_organization(State(state.clone()), Path(other.id), founding("Acme")).await;
        assert!(matches!(stolen, Err(ApiError::Conflict)));

        let renamed = create_organization(State(state), Path(first.id), founding("Acme Labs")).await;
        assert!(matches!(renamed, Err(ApiError::BadRequest)));
    }

    #[tokio::test]
    async fn test_member_cannot_found_organization() {
        let db = Arc::new(MemoryDb::new());
        let member = db.add_user(UserType::B2b, Some(AccountType::Member), None);
        let state = app_state(db);

        let result = create_organization(State(state), Path(member.id), founding("Initech")).await;
        assert!(matches!(result, Err(ApiError::Forbidden)));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let db = Arc::new(MemoryDb::new());
        let state = app_state(db);

        register(&state, "ops@acme.eu", None).await.unwrap();
        let again = register(&state, " OPS@acme.eu", None).await;
        assert!(matches!(again, Err(ApiError::EmailAlreadyExists)));
    }
}
