use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, OrderEnvelope, OrderList, PayOrderRequest, UpdateDeliveryRequest},
    error::AppResult,
    extract::{AppJson, AppPath},
    middleware::auth::Identity,
    response::ApiResponse,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_orders).post(create_order))
        .route("/myorders", get(my_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/pay", put(pay_order))
        .route("/{id}/deliver", put(update_delivery))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderEnvelope>),
        (status = 400, description = "No items, invalid body or product out of stock"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    identity: Identity,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderEnvelope>>)> {
    let resp = order_service::create_order(&state, &identity, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/myorders",
    responses(
        (status = 200, description = "Orders placed by the caller", body = ApiResponse<OrderList>),
        (status = 401, description = "Not logged in"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_mine(&state, &identity).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "All orders with their owners (admin only)", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_all(&state, &identity).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with owner", body = ApiResponse<OrderEnvelope>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    identity: Identity,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<OrderEnvelope>>> {
    let resp = order_service::get_order(&state, &identity, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/pay",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = PayOrderRequest,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<OrderEnvelope>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn pay_order(
    State(state): State<AppState>,
    identity: Identity,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<PayOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderEnvelope>>> {
    let resp = order_service::mark_paid(&state, &identity, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/deliver",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateDeliveryRequest,
    responses(
        (status = 200, description = "Status and payment updated", body = ApiResponse<OrderEnvelope>),
        (status = 400, description = "Payment status can only be updated for delivered orders"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_delivery(
    State(state): State<AppState>,
    identity: Identity,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateDeliveryRequest>,
) -> AppResult<Json<ApiResponse<OrderEnvelope>>> {
    let resp = order_service::update_delivery_and_payment(&state, &identity, id, payload).await?;
    Ok(Json(resp))
}
