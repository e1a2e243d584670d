use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::auth::{AdminLoginRequest, AdminSession, LoginRequest, Principal, SignupRequest, UserSession},
    error::AppResult,
    extract::AppJson,
    middleware::auth::Identity,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/admin/login", post(admin_login))
        .route("/me", get(me))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Customer account created", body = ApiResponse<UserSession>),
        (status = 400, description = "Validation failed or email already used")
    ),
    tag = "Auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserSession>>)> {
    let resp = auth_service::signup(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Customer login", body = ApiResponse<UserSession>),
        (status = 401, description = "Incorrect email or password")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<UserSession>>> {
    let resp = auth_service::login(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Admin login", body = ApiResponse<AdminSession>),
        (status = 401, description = "Incorrect password or admin key"),
        (status = 404, description = "No admin found with that email")
    ),
    tag = "Auth"
)]
pub async fn admin_login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<AdminLoginRequest>,
) -> AppResult<Json<ApiResponse<AdminSession>>> {
    let resp = auth_service::admin_login(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current principal", body = ApiResponse<Principal>),
        (status = 401, description = "Not logged in")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(identity: Identity) -> Json<ApiResponse<Principal>> {
    Json(auth_service::me(&identity))
}
