use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::record_audit,
    dto::orders::{
        CreateOrderRequest, OrderEnvelope, OrderItemInput, OrderList, PayOrderRequest,
        UpdateDeliveryRequest,
    },
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
        users::{Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::Identity,
    models::{Order, OrderItem, OrderOwner, ShippingAddress},
    response::ApiResponse,
    services::order_state::OrderLifecycle,
    state::AppState,
};

const ORDER_NOT_FOUND: &str = "Order not found";

/// Check out. Products are row-locked, and the order, its lines and the
/// stock decrements commit together or not at all.
pub async fn create_order(
    state: &AppState,
    identity: &Identity,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderEnvelope>> {
    let customer = identity.require_customer()?;

    if payload.order_items.is_empty() {
        return Err(AppError::InvalidState("No order items".into()));
    }
    payload.validate()?;

    let txn = state.orm.begin().await?;

    let mut products: Vec<ProductModel> = Vec::with_capacity(payload.order_items.len());
    for item in &payload.order_items {
        let product = Products::find_by_id(item.product)
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        products.push(reserve_line(item, product)?);
    }

    let CreateOrderRequest {
        order_items,
        shipping_address,
        payment_method,
        items_price,
        tax_price,
        shipping_price,
        total_price,
        payment_result,
    } = payload;

    let mut active = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(customer.user_id),
        user_email: Set(customer.email.clone()),
        shipping_address: Set(shipping_address.address.trim().to_string()),
        shipping_city: Set(shipping_address.city.trim().to_string()),
        shipping_postal_code: Set(shipping_address.postal_code.trim().to_string()),
        shipping_country: Set(shipping_address.country.trim().to_string()),
        payment_method: Set(payment_method),
        items_price: Set(items_price),
        tax_price: Set(tax_price),
        shipping_price: Set(shipping_price),
        total_price: Set(total_price),
        ..Default::default()
    };
    OrderLifecycle::default().write_to(&mut active);
    // Whatever the client already holds from the provider is kept as-is.
    active.payment_result = Set(payment_result);
    let order = active.insert(&txn).await?;

    let mut items = Vec::with_capacity(order_items.len());
    for (position, (item, product)) in order_items.iter().zip(&products).enumerate() {
        let line = snapshot_line(order.id, position as i32, item, product)
            .insert(&txn)
            .await?;
        items.push(line);

        Products::update_many()
            .col_expr(
                ProdCol::CountInStock,
                Expr::col(ProdCol::CountInStock).sub(item.quantity),
            )
            .filter(ProdCol::Id.eq(item.product))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    tracing::info!(order_id = %order.id, user_id = %customer.user_id, lines = items.len(), "order created");

    record_audit(
        &state.orm,
        Some(customer.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_price": order.total_price })),
    )
    .await;

    Ok(ApiResponse::success(OrderEnvelope {
        order: order_from_entity(order, items, None),
    }))
}

/// Payment confirmation. Owners and admins may call it on any order they can see.
pub async fn mark_paid(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
    payload: PayOrderRequest,
) -> AppResult<ApiResponse<OrderEnvelope>> {
    let txn = state.orm.begin().await?;
    let order = find_for_update(&txn, identity, id).await?;

    let now = Utc::now();
    let mut lifecycle = OrderLifecycle::from(&order);
    lifecycle.mark_paid(payload.into(), now);
    let order = save_lifecycle(&txn, order, lifecycle).await?;
    let items = load_items(&txn, order.id).await?;

    txn.commit().await?;

    record_audit(
        &state.orm,
        Some(identity.actor_id()),
        "order_paid",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await;

    Ok(ApiResponse::success(OrderEnvelope {
        order: order_from_entity(order, items, None),
    }))
}

/// Admin status/payment update. A status change is saved even when the
/// payment part of the same request is rejected by the delivery gate.
pub async fn update_delivery_and_payment(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
    payload: UpdateDeliveryRequest,
) -> AppResult<ApiResponse<OrderEnvelope>> {
    let admin = identity.require_admin()?;

    let txn = state.orm.begin().await?;
    let order = find_for_update(&txn, identity, id).await?;

    let now = Utc::now();
    let mut lifecycle = OrderLifecycle::from(&order);
    let outcome = lifecycle.apply_admin_update(payload.status, payload.is_paid, now);

    if let Err(err) = outcome {
        if payload.status.is_some() {
            let order = save_lifecycle(&txn, order, lifecycle).await?;
            txn.commit().await?;
            tracing::info!(order_id = %id, "status saved, payment update rejected");
            record_audit(
                &state.orm,
                Some(admin.admin_id),
                "order_status_update",
                Some("orders"),
                Some(serde_json::json!({
                    "order_id": order.id,
                    "status": order.order_status,
                    "is_paid": order.is_paid,
                    "payment_rejected": true,
                })),
            )
            .await;
        }
        return Err(err.into());
    }

    let order = save_lifecycle(&txn, order, lifecycle).await?;
    let items = load_items(&txn, order.id).await?;
    txn.commit().await?;

    record_audit(
        &state.orm,
        Some(admin.admin_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "status": order.order_status,
            "is_paid": order.is_paid,
        })),
    )
    .await;

    Ok(ApiResponse::success(OrderEnvelope {
        order: order_from_entity(order, items, None),
    }))
}

pub async fn list_mine(state: &AppState, identity: &Identity) -> AppResult<ApiResponse<OrderList>> {
    let customer = identity.require_customer()?;

    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(customer.user_id))
        .order_by_asc(OrderCol::CreatedAt)
        .order_by_asc(OrderCol::Id)
        .all(&state.orm)
        .await?;

    let mut items = load_items_for(&state.orm, orders.iter().map(|o| o.id).collect()).await?;
    let orders: Vec<Order> = orders
        .into_iter()
        .map(|order| {
            let lines = items.remove(&order.id).unwrap_or_default();
            order_from_entity(order, lines, None)
        })
        .collect();

    let results = orders.len();
    Ok(ApiResponse::success(OrderList { orders }).with_results(results))
}

pub async fn list_all(state: &AppState, identity: &Identity) -> AppResult<ApiResponse<OrderList>> {
    identity.require_admin()?;

    let rows = Orders::find()
        .find_also_related(Users)
        .order_by_asc(OrderCol::CreatedAt)
        .order_by_asc(OrderCol::Id)
        .all(&state.orm)
        .await?;

    let mut items = load_items_for(&state.orm, rows.iter().map(|(o, _)| o.id).collect()).await?;
    let orders: Vec<Order> = rows
        .into_iter()
        .map(|(order, owner)| {
            let lines = items.remove(&order.id).unwrap_or_default();
            order_from_entity(order, lines, owner)
        })
        .collect();

    let results = orders.len();
    Ok(ApiResponse::success(OrderList { orders }).with_results(results))
}

pub async fn get_order(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
) -> AppResult<ApiResponse<OrderEnvelope>> {
    let (order, owner) = Orders::find_by_id(id)
        .find_also_related(Users)
        .one(&state.orm)
        .await?
        .filter(|(order, _)| identity.can_access_order(order.user_id))
        .ok_or_else(|| AppError::NotFound(ORDER_NOT_FOUND.into()))?;

    let items = load_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(OrderEnvelope {
        order: order_from_entity(order, items, owner),
    }))
}

/// Gate one checkout line against its product. Only the `in_stock` flag is
/// checked; the count is decremented regardless and may go negative.
fn reserve_line(item: &OrderItemInput, product: Option<ProductModel>) -> AppResult<ProductModel> {
    let product = product
        .ok_or_else(|| AppError::NotFound(format!("Product not found: {}", item.product)))?;
    if !product.in_stock {
        return Err(AppError::InvalidState(format!(
            "Product {} is out of stock",
            product.name
        )));
    }
    Ok(product)
}

fn snapshot_line(
    order_id: Uuid,
    position: i32,
    item: &OrderItemInput,
    product: &ProductModel,
) -> OrderItemActive {
    let name = item
        .name
        .as_ref()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| product.name.clone());

    OrderItemActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        product_id: Set(product.id),
        name: Set(name),
        image: Set(item.image.clone().or_else(|| Some(product.image.clone()))),
        price: Set(item.price.unwrap_or(product.price)),
        quantity: Set(item.quantity),
        position: Set(position),
        ..Default::default()
    }
}

async fn find_for_update(
    txn: &DatabaseTransaction,
    identity: &Identity,
    id: Uuid,
) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .filter(|order| identity.can_access_order(order.user_id))
        .ok_or_else(|| AppError::NotFound(ORDER_NOT_FOUND.into()))
}

async fn save_lifecycle(
    txn: &DatabaseTransaction,
    order: OrderModel,
    lifecycle: OrderLifecycle,
) -> AppResult<OrderModel> {
    let mut active: OrderActive = order.into();
    lifecycle.write_to(&mut active);
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(txn).await?)
}

async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItemModel>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::Position)
        .all(conn)
        .await?)
}

async fn load_items_for<C: ConnectionTrait>(
    conn: &C,
    order_ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, Vec<OrderItemModel>>> {
    let mut grouped: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .order_by_asc(OrderItemCol::Position)
        .all(conn)
        .await?;
    for row in rows {
        grouped.entry(row.order_id).or_default().push(row);
    }
    Ok(grouped)
}

fn order_from_entity(
    model: OrderModel,
    items: Vec<OrderItemModel>,
    owner: Option<UserModel>,
) -> Order {
    Order {
        id: model.id,
        user: model.user_id,
        owner: owner.map(|u| OrderOwner {
            id: u.id,
            name: u.name,
            email: u.email,
        }),
        user_email: model.user_email,
        order_items: items.into_iter().map(order_item_from_entity).collect(),
        shipping_address: ShippingAddress {
            address: model.shipping_address,
            city: model.shipping_city,
            postal_code: model.shipping_postal_code,
            country: model.shipping_country,
        },
        payment_method: model.payment_method,
        payment_result: model.payment_result,
        items_price: model.items_price,
        tax_price: model.tax_price,
        shipping_price: model.shipping_price,
        total_price: model.total_price,
        order_status: model.order_status,
        is_paid: model.is_paid,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        is_delivered: model.is_delivered,
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        product: model.product_id,
        name: model.name,
        image: model.image,
        price: model.price,
        quantity: model.quantity,
    }
}
