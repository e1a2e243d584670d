use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    dto::auth::{Claims, Role},
    entity::{Admins, Users},
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerIdentity {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub admin_id: Uuid,
    pub name: String,
    pub email: String,
}

/// Authenticated caller. Handlers ask for a capability instead of comparing
/// role strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Customer(CustomerIdentity),
    Admin(AdminIdentity),
}

impl Identity {
    pub fn require_customer(&self) -> AppResult<&CustomerIdentity> {
        match self {
            Identity::Customer(customer) => Ok(customer),
            Identity::Admin(_) => Err(AppError::Forbidden),
        }
    }

    pub fn require_admin(&self) -> AppResult<&AdminIdentity> {
        match self {
            Identity::Admin(admin) => Ok(admin),
            Identity::Customer(_) => Err(AppError::Forbidden),
        }
    }

    /// Admins see every order, customers only their own.
    pub fn can_access_order(&self, owner: Uuid) -> bool {
        match self {
            Identity::Admin(_) => true,
            Identity::Customer(customer) => customer.user_id == owner,
        }
    }

    pub fn actor_id(&self) -> Uuid {
        match self {
            Identity::Customer(customer) => customer.user_id,
            Identity::Admin(admin) => admin.admin_id,
        }
    }
}

pub fn decode_claims(secret: &str, token: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired. Please log in again!".into())
        }
        _ => AppError::Unauthorized("Invalid token. Please log in again!".into()),
    })
}

fn bearer_token(parts: &axum::http::request::Parts) -> AppResult<&str> {
    let not_logged_in =
        || AppError::Unauthorized("You are not logged in! Please log in to get access.".into());

    let auth_str = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(not_logged_in)?
        .to_str()
        .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(not_logged_in)?;
    Ok(token)
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = decode_claims(&state.config.jwt_secret, token)?;

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid token. Please log in again!".into()))?;
        let gone = || {
            AppError::Unauthorized("The user belonging to this token no longer exists.".into())
        };

        let identity = match claims.role {
            Role::User => {
                let user = Users::find_by_id(id).one(&state.orm).await?.ok_or_else(gone)?;
                Identity::Customer(CustomerIdentity {
                    user_id: user.id,
                    name: user.name,
                    email: user.email,
                })
            }
            Role::Admin => {
                let admin = Admins::find_by_id(id).one(&state.orm).await?.ok_or_else(gone)?;
                Identity::Admin(AdminIdentity {
                    admin_id: admin.id,
                    name: admin.name,
                    email: admin.email,
                })
            }
        };

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(id: Uuid) -> Identity {
        Identity::Customer(CustomerIdentity {
            user_id: id,
            name: "Ada".into(),
            email: "ada@example.com".into(),
        })
    }

    fn admin() -> Identity {
        Identity::Admin(AdminIdentity {
            admin_id: Uuid::new_v4(),
            name: "Root".into(),
            email: "root@example.com".into(),
        })
    }

    #[test]
    fn customers_cannot_use_admin_capabilities() {
        let user = customer(Uuid::new_v4());
        assert!(user.require_customer().is_ok());
        assert!(matches!(user.require_admin(), Err(AppError::Forbidden)));
    }

    #[test]
    fn admins_cannot_place_orders_as_customers() {
        let admin = admin();
        assert!(admin.require_admin().is_ok());
        assert!(matches!(admin.require_customer(), Err(AppError::Forbidden)));
    }

    #[test]
    fn order_access_follows_ownership() {
        let owner = Uuid::new_v4();
        assert!(customer(owner).can_access_order(owner));
        assert!(!customer(Uuid::new_v4()).can_access_order(owner));
        assert!(admin().can_access_order(owner));
    }

    #[test]
    fn missing_or_foreign_schemes_mean_not_logged_in() {
        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Basic abc")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        let err = bearer_token(&parts).unwrap_err();
        assert_eq!(
            err.to_string(),
            "You are not logged in! Please log in to get access."
        );

        let (parts, _) = axum::http::Request::builder()
            .body(())
            .unwrap()
            .into_parts();
        assert!(matches!(bearer_token(&parts), Err(AppError::Unauthorized(_))));

        let (parts, _) = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Bearer  abc.def ")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts).unwrap(), "abc.def");
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let err = decode_claims("secret", "not-a-jwt").unwrap_err();
        assert_eq!(err.to_string(), "Invalid token. Please log in again!");
    }
}
