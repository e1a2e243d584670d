use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::record_audit,
    config::AppConfig,
    dto::auth::{
        AdminLoginRequest, AdminSession, Claims, LoginRequest, Principal, Role, SignupRequest,
        UserSession,
    },
    entity::{
        admins::{ActiveModel as AdminActive, Column as AdminCol, Entity as Admins, Model as AdminModel},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::Identity,
    models::{Admin, User},
    response::ApiResponse,
    state::AppState,
};

pub async fn signup(
    state: &AppState,
    payload: SignupRequest,
) -> AppResult<ApiResponse<UserSession>> {
    payload.validate()?;
    let SignupRequest {
        name,
        email,
        phone,
        password,
    } = payload;

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.trim().to_string()),
        email: Set(email.trim().to_lowercase()),
        phone: Set(phone.filter(|p| !p.trim().is_empty())),
        password_hash: Set(hash_secret(&password)?),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let token = issue_token(&state.config, user.id, Role::User)?;

    record_audit(
        &state.orm,
        Some(user.id),
        "user_signup",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await;

    Ok(ApiResponse::success(UserSession {
        token,
        user: user_from_entity(user),
    }))
}

pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<UserSession>> {
    let (Some(email), Some(password)) = (non_blank(payload.email), non_blank(payload.password))
    else {
        return Err(AppError::BadRequest(
            "Please provide email and password!".into(),
        ));
    };

    let user = Users::find()
        .filter(UserCol::Email.eq(email.to_lowercase()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) if verify_secret(&password, &u.password_hash) => u,
        _ => {
            return Err(AppError::Unauthorized(
                "Incorrect email or password".into(),
            ));
        }
    };

    let token = issue_token(&state.config, user.id, Role::User)?;

    record_audit(
        &state.orm,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await;

    Ok(ApiResponse::success(UserSession {
        token,
        user: user_from_entity(user),
    }))
}

pub async fn admin_login(
    state: &AppState,
    payload: AdminLoginRequest,
) -> AppResult<ApiResponse<AdminSession>> {
    let (Some(email), Some(password), Some(admin_key)) = (
        non_blank(payload.email),
        non_blank(payload.password),
        non_blank(payload.admin_key),
    ) else {
        return Err(AppError::BadRequest(
            "Please provide email, password and admin key!".into(),
        ));
    };

    let admin = Admins::find()
        .filter(AdminCol::Email.eq(email.to_lowercase()))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("No admin found with that email".into()))?;

    if !verify_secret(&password, &admin.password_hash) {
        return Err(AppError::Unauthorized("Incorrect password".into()));
    }
    if !verify_secret(&admin_key, &admin.admin_key_hash) {
        return Err(AppError::Unauthorized("Incorrect admin key".into()));
    }

    let token = issue_token(&state.config, admin.id, Role::Admin)?;

    record_audit(
        &state.orm,
        Some(admin.id),
        "admin_login",
        Some("admins"),
        Some(serde_json::json!({ "admin_id": admin.id })),
    )
    .await;

    Ok(ApiResponse::success(AdminSession {
        token,
        admin: admin_from_entity(admin),
    }))
}

pub fn me(identity: &Identity) -> ApiResponse<Principal> {
    let principal = match identity {
        Identity::Customer(customer) => Principal {
            role: Role::User,
            id: customer.user_id,
            name: customer.name.clone(),
            email: customer.email.clone(),
        },
        Identity::Admin(admin) => Principal {
            role: Role::Admin,
            id: admin.admin_id,
            name: admin.name.clone(),
            email: admin.email.clone(),
        },
    };
    ApiResponse::success(principal)
}

/// Create an admin account. Admins are provisioned out of band (see the
/// `seed` binary), never through a public route.
pub async fn create_admin(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
    admin_key: &str,
) -> AppResult<Admin> {
    if !is_valid_admin_key(admin_key) {
        return Err(AppError::Validation(vec![format!(
            "{admin_key} is not a valid 12-digit admin key!"
        )]));
    }
    if password.len() < 8 {
        return Err(AppError::Validation(vec![
            "Password must be at least 8 characters".into(),
        ]));
    }

    let admin = AdminActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.trim().to_string()),
        email: Set(email.trim().to_lowercase()),
        password_hash: Set(hash_secret(password)?),
        admin_key_hash: Set(hash_secret(admin_key)?),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(admin_from_entity(admin))
}

pub fn issue_token(config: &AppConfig, subject: Uuid, role: Role) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.jwt_expires_in_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: subject.to_string(),
        role,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn is_valid_admin_key(key: &str) -> bool {
    key.len() == 12 && key.bytes().all(|b| b.is_ascii_digit())
}

fn hash_secret(secret: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn verify_secret(candidate: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn admin_from_entity(model: AdminModel) -> Admin {
    Admin {
        id: model.id,
        name: model.name,
        email: model.email,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::{CustomerIdentity, decode_claims};

    fn config(hours: i64) -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".into(),
            host: "127.0.0.1".into(),
            port: 3000,
            jwt_secret: "test-secret".into(),
            jwt_expires_in_hours: hours,
        }
    }

    #[test]
    fn issued_tokens_carry_subject_and_role() {
        let id = Uuid::new_v4();
        let token = issue_token(&config(24), id, Role::Admin).unwrap();
        let claims = decode_claims("test-secret", &token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_invalid() {
        let token = issue_token(&config(24), Uuid::new_v4(), Role::User).unwrap();
        let err = decode_claims("other-secret", &token).unwrap_err();
        assert_eq!(err.to_string(), "Invalid token. Please log in again!");
    }

    #[test]
    fn expired_tokens_ask_to_log_in_again() {
        let token = issue_token(&config(-2), Uuid::new_v4(), Role::User).unwrap();
        let err = decode_claims("test-secret", &token).unwrap_err();
        assert_eq!(err.to_string(), "Token expired. Please log in again!");
    }

    #[test]
    fn secrets_verify_only_against_their_own_hash() {
        let hash = hash_secret("correct horse").unwrap();
        assert!(verify_secret("correct horse", &hash));
        assert!(!verify_secret("battery staple", &hash));
        assert!(!verify_secret("correct horse", "not-a-hash"));
    }

    #[test]
    fn admin_keys_are_exactly_twelve_digits() {
        assert!(is_valid_admin_key("123456789012"));
        assert!(!is_valid_admin_key("12345678901"));
        assert!(!is_valid_admin_key("12345678901a"));
    }

    #[test]
    fn me_reports_the_role_of_the_caller() {
        let id = Uuid::new_v4();
        let resp = me(&Identity::Customer(CustomerIdentity {
            user_id: id,
            name: "Ada".into(),
            email: "ada@example.com".into(),
        }));
        let principal = resp.data.unwrap();
        assert_eq!(principal.role, Role::User);
        assert_eq!(principal.id, id);
    }
}
