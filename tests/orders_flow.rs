use jewelry_order_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
    dto::orders::{
        CreateOrderRequest, OrderItemInput, PayOrderRequest, Payer, ShippingAddressInput,
        UpdateDeliveryRequest,
    },
    entity::{
        admins::ActiveModel as AdminActive,
        audit_logs::{Column as AuditCol, Entity as AuditLogs},
        orders::{Column as OrderCol, Entity as Orders},
        products::{ActiveModel as ProductActive, Entity as Products},
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::{AdminIdentity, CustomerIdentity, Identity},
    models::{Category, Order, OrderStatus, PaymentMethod, PaymentResult},
    services::order_service,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use tokio::sync::OnceCell;
use uuid::Uuid;

// Tests share one database and run in parallel, so every test works on its own
// users and products and never truncates.
static MIGRATED: OnceCell<()> = OnceCell::const_new();

async fn setup() -> anyhow::Result<Option<AppState>> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run order flow tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    let orm = orm_from_pool(&pool);
    let orm_ref = &orm;
    MIGRATED
        .get_or_try_init(|| async move { run_migrations(orm_ref).await })
        .await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        jwt_expires_in_hours: 1,
    };
    Ok(Some(AppState::new(orm, config)))
}

async fn create_customer(state: &AppState, name: &str) -> anyhow::Result<Identity> {
    let id = Uuid::new_v4();
    let email = format!("{id}@example.com");
    UserActive {
        id: Set(id),
        name: Set(name.to_string()),
        email: Set(email.clone()),
        phone: Set(None),
        password_hash: Set("dummy".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(Identity::Customer(CustomerIdentity {
        user_id: id,
        name: name.to_string(),
        email,
    }))
}

async fn create_admin(state: &AppState) -> anyhow::Result<Identity> {
    let id = Uuid::new_v4();
    let email = format!("admin-{id}@example.com");
    AdminActive {
        id: Set(id),
        name: Set("Store Admin".into()),
        email: Set(email.clone()),
        password_hash: Set("dummy".into()),
        admin_key_hash: Set("dummy".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(Identity::Admin(AdminIdentity {
        admin_id: id,
        name: "Store Admin".into(),
        email,
    }))
}

async fn create_product(
    state: &AppState,
    price: f64,
    count_in_stock: i32,
    in_stock: bool,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set("Halo Ring".into()),
        price: Set(price),
        in_stock: Set(in_stock),
        count_in_stock: Set(count_in_stock),
        image: Set("halo-ring.jpg".into()),
        description: Set("Cushion-cut centre stone with a pavé halo".into()),
        category: Set(Category::Rings),
        rating: Set(4.5),
        num_reviews: Set(0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product vanished"))?;
    Ok(product.count_in_stock)
}

async fn orders_of(state: &AppState, identity: &Identity) -> anyhow::Result<u64> {
    let count = Orders::find()
        .filter(OrderCol::UserId.eq(identity.actor_id()))
        .count(&state.orm)
        .await?;
    Ok(count)
}

fn checkout(lines: &[(Uuid, i32)], items_price: f64) -> CreateOrderRequest {
    CreateOrderRequest {
        order_items: lines
            .iter()
            .map(|(product, quantity)| OrderItemInput {
                product: *product,
                name: None,
                image: None,
                price: None,
                quantity: *quantity,
            })
            .collect(),
        shipping_address: ShippingAddressInput {
            address: "12 Rue de la Paix".into(),
            city: "Paris".into(),
            postal_code: "75002".into(),
            country: "France".into(),
        },
        payment_method: PaymentMethod::Cash,
        items_price,
        tax_price: 0.0,
        shipping_price: 0.0,
        total_price: items_price,
        payment_result: None,
    }
}

async fn place_order(
    state: &AppState,
    customer: &Identity,
    lines: &[(Uuid, i32)],
    items_price: f64,
) -> anyhow::Result<Order> {
    let resp = order_service::create_order(state, customer, checkout(lines, items_price)).await?;
    Ok(resp.data.expect("order payload").order)
}

fn delivery(status: Option<OrderStatus>, is_paid: Option<bool>) -> UpdateDeliveryRequest {
    UpdateDeliveryRequest { status, is_paid }
}

#[tokio::test]
async fn creating_an_order_snapshots_lines_and_decrements_stock() -> anyhow::Result<()> {
    let Some(state) = setup().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "Ada").await?;
    let product = create_product(&state, 100.0, 10, true).await?;

    let order = place_order(&state, &customer, &[(product, 2)], 200.0).await?;

    assert_eq!(order.order_status, OrderStatus::Processing);
    assert!(!order.is_paid && !order.is_delivered);
    assert_eq!(order.user, customer.actor_id());
    assert_eq!(order.user_email, format!("{}@example.com", customer.actor_id()));
    assert_eq!(order.order_items.len(), 1);
    assert_eq!(order.order_items[0].name, "Halo Ring");
    assert_eq!(order.order_items[0].price, 100.0);
    assert_eq!(order.order_items[0].quantity, 2);
    assert_eq!(order.total_price, 200.0);
    assert_eq!(stock_of(&state, product).await?, 8);

    let entry = AuditLogs::find()
        .filter(AuditCol::ActorId.eq(customer.actor_id()))
        .filter(AuditCol::Action.eq("order_create"))
        .one(&state.orm)
        .await?
        .expect("audit entry written");
    assert_eq!(entry.resource.as_deref(), Some("orders"));

    Ok(())
}

#[tokio::test]
async fn out_of_stock_products_reject_the_whole_order() -> anyhow::Result<()> {
    let Some(state) = setup().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "Grace").await?;
    let available = create_product(&state, 50.0, 5, true).await?;
    let sold_out = create_product(&state, 75.0, 5, false).await?;

    let err = order_service::create_order(
        &state,
        &customer,
        checkout(&[(available, 1), (sold_out, 1)], 125.0),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)), "got {err:?}");
    assert_eq!(orders_of(&state, &customer).await?, 0);
    assert_eq!(stock_of(&state, available).await?, 5);

    Ok(())
}

#[tokio::test]
async fn unknown_products_are_not_found_and_nothing_is_saved() -> anyhow::Result<()> {
    let Some(state) = setup().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "Linus").await?;
    let product = create_product(&state, 50.0, 5, true).await?;

    let err = order_service::create_order(
        &state,
        &customer,
        checkout(&[(product, 1), (Uuid::new_v4(), 1)], 100.0),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)), "got {err:?}");
    assert_eq!(orders_of(&state, &customer).await?, 0);
    assert_eq!(stock_of(&state, product).await?, 5);

    Ok(())
}

#[tokio::test]
async fn empty_orders_and_admin_checkouts_are_refused() -> anyhow::Result<()> {
    let Some(state) = setup().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "Barbara").await?;
    let admin = create_admin(&state).await?;

    let err = order_service::create_order(&state, &customer, checkout(&[], 0.0))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No order items");

    let product = create_product(&state, 10.0, 1, true).await?;
    let err = order_service::create_order(&state, &admin, checkout(&[(product, 1)], 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn payment_gate_blocks_undelivered_orders_but_keeps_status() -> anyhow::Result<()> {
    let Some(state) = setup().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "Edsger").await?;
    let admin = create_admin(&state).await?;
    let product = create_product(&state, 100.0, 3, true).await?;
    let order = place_order(&state, &customer, &[(product, 1)], 100.0).await?;

    let err = order_service::update_delivery_and_payment(
        &state,
        &admin,
        order.id,
        delivery(None, Some(true)),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Payment status can only be updated for delivered orders"
    );

    let err = order_service::update_delivery_and_payment(
        &state,
        &admin,
        order.id,
        delivery(Some(OrderStatus::Shipped), Some(true)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let stored = order_service::get_order(&state, &admin, order.id)
        .await?
        .data
        .expect("order payload")
        .order;
    assert_eq!(stored.order_status, OrderStatus::Shipped);
    assert!(!stored.is_paid);
    assert!(stored.paid_at.is_none());

    let entry = AuditLogs::find()
        .filter(AuditCol::ActorId.eq(admin.actor_id()))
        .filter(AuditCol::Action.eq("order_status_update"))
        .one(&state.orm)
        .await?
        .expect("status change audited");
    let metadata = entry.metadata.expect("audit metadata");
    assert_eq!(metadata["status"], "Shipped");
    assert_eq!(metadata["payment_rejected"], true);

    Ok(())
}

#[tokio::test]
async fn deliver_pay_then_unpay_round_trip() -> anyhow::Result<()> {
    let Some(state) = setup().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "Margaret").await?;
    let admin = create_admin(&state).await?;
    let product = create_product(&state, 100.0, 5, true).await?;
    let order = place_order(&state, &customer, &[(product, 2)], 200.0).await?;

    let paid = order_service::update_delivery_and_payment(
        &state,
        &admin,
        order.id,
        delivery(Some(OrderStatus::Delivered), Some(true)),
    )
    .await?
    .data
    .expect("order payload")
    .order;
    assert!(paid.is_delivered && paid.is_paid);
    assert!(paid.delivered_at.is_some());
    let first_paid_at = paid.paid_at.expect("paid_at set");

    let reconfirmed = order_service::update_delivery_and_payment(
        &state,
        &admin,
        order.id,
        delivery(None, Some(true)),
    )
    .await?
    .data
    .expect("order payload")
    .order;
    assert_eq!(reconfirmed.paid_at, Some(first_paid_at));

    let unpaid = order_service::update_delivery_and_payment(
        &state,
        &admin,
        order.id,
        delivery(None, Some(false)),
    )
    .await?
    .data
    .expect("order payload")
    .order;
    assert!(!unpaid.is_paid);
    assert!(unpaid.paid_at.is_none());
    assert!(unpaid.payment_result.is_none());
    assert_eq!(unpaid.order_status, OrderStatus::Delivered);

    Ok(())
}

#[tokio::test]
async fn payment_callback_records_the_provider_result() -> anyhow::Result<()> {
    let Some(state) = setup().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "Alan").await?;
    let stranger = create_customer(&state, "Eve").await?;
    let product = create_product(&state, 40.0, 5, true).await?;
    let order = place_order(&state, &customer, &[(product, 1)], 40.0).await?;

    let confirmation = PayOrderRequest {
        id: Some("PAY-42".into()),
        status: Some("COMPLETED".into()),
        update_time: Some("2025-03-01T12:00:00Z".into()),
        payer: Some(Payer {
            email_address: Some("alan@example.com".into()),
        }),
    };

    let err = order_service::mark_paid(&state, &stranger, order.id, PayOrderRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let paid = order_service::mark_paid(&state, &customer, order.id, confirmation)
        .await?
        .data
        .expect("order payload")
        .order;
    assert!(paid.is_paid);
    assert!(paid.paid_at.is_some());
    assert!(!paid.is_delivered);
    assert_eq!(
        paid.payment_result,
        Some(PaymentResult {
            id: Some("PAY-42".into()),
            status: Some("COMPLETED".into()),
            update_time: Some("2025-03-01T12:00:00Z".into()),
            email_address: Some("alan@example.com".into()),
        })
    );

    Ok(())
}

#[tokio::test]
async fn listings_respect_ownership_and_roles() -> anyhow::Result<()> {
    let Some(state) = setup().await? else {
        return Ok(());
    };
    let alice = create_customer(&state, "Alice").await?;
    let bob = create_customer(&state, "Bob").await?;
    let admin = create_admin(&state).await?;
    let product = create_product(&state, 20.0, 10, true).await?;

    let first = place_order(&state, &alice, &[(product, 1)], 20.0).await?;
    let second = place_order(&state, &alice, &[(product, 2)], 40.0).await?;
    let bobs = place_order(&state, &bob, &[(product, 1)], 20.0).await?;

    let mine = order_service::list_mine(&state, &alice).await?;
    assert_eq!(mine.results, Some(2));
    let ids: Vec<Uuid> = mine.data.expect("orders").orders.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    let err = order_service::get_order(&state, &alice, bobs.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = order_service::list_all(&state, &alice).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let all = order_service::list_all(&state, &admin)
        .await?
        .data
        .expect("orders")
        .orders;
    let bob_view = all
        .iter()
        .find(|o| o.id == bobs.id)
        .expect("admin sees bob's order");
    let owner = bob_view.owner.as_ref().expect("owner attached");
    assert_eq!(owner.name, "Bob");
    assert_eq!(owner.id, bob.actor_id());

    assert_eq!(stock_of(&state, product).await?, 6);

    Ok(())
}

#[tokio::test]
async fn in_stock_products_sell_past_their_count() -> anyhow::Result<()> {
    let Some(state) = setup().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "Katherine").await?;
    let product = create_product(&state, 100.0, 0, true).await?;

    let order = place_order(&state, &customer, &[(product, 2), (product, 1)], 300.0).await?;

    assert_eq!(order.order_items.len(), 2);
    assert_eq!(stock_of(&state, product).await?, -3);

    Ok(())
}
