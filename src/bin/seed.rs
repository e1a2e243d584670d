use jewelry_order_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool},
    dto::auth::SignupRequest,
    error::AppError,
    services::auth_service,
    state::AppState,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_key = std::env::var("SEED_ADMIN_KEY").unwrap_or_else(|_| "123456789012".into());
    let state = AppState::new(orm_from_pool(&pool), config);

    match auth_service::create_admin(&state, "Store Admin", "admin@example.com", "admin12345", &admin_key)
        .await
    {
        Ok(admin) => println!("Created admin {} ({})", admin.email, admin.id),
        Err(AppError::DuplicateKey(_)) => println!("Admin admin@example.com already exists"),
        Err(err) => return Err(anyhow::anyhow!(err.to_string())),
    }

    let customer = SignupRequest {
        name: "Demo Customer".into(),
        email: "user@example.com".into(),
        phone: None,
        password: "user12345".into(),
    };
    match auth_service::signup(&state, customer).await {
        Ok(_) => println!("Created customer user@example.com"),
        Err(AppError::DuplicateKey(_)) => println!("Customer user@example.com already exists"),
        Err(err) => return Err(anyhow::anyhow!(err.to_string())),
    }

    seed_products(&pool).await?;

    println!("Seed completed");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = [
        ("Solitaire Diamond Ring", 1299.0, 8, "solitaire-ring.jpg", "rings", "Round brilliant diamond set in 18k white gold."),
        ("Eternity Band", 899.0, 12, "eternity-band.jpg", "rings", "Channel-set diamonds all the way around."),
        ("Pearl Drop Necklace", 459.0, 15, "pearl-necklace.jpg", "necklaces", "Freshwater pearl on a fine gold chain."),
        ("Sapphire Pendant", 749.0, 6, "sapphire-pendant.jpg", "necklaces", "Oval sapphire framed by a diamond halo."),
        ("Gold Hoop Earrings", 249.0, 25, "gold-hoops.jpg", "earrings", "Classic 14k gold hoops."),
        ("Emerald Studs", 529.0, 10, "emerald-studs.jpg", "earrings", "Square-cut emeralds in a four-prong setting."),
        ("Tennis Bracelet", 1599.0, 4, "tennis-bracelet.jpg", "bracelets", "A continuous line of matched diamonds."),
        ("Charm Bracelet", 189.0, 30, "charm-bracelet.jpg", "bracelets", "Sterling silver with three starter charms."),
        ("Heritage Automatic Watch", 2499.0, 3, "heritage-watch.jpg", "watches", "Swiss automatic movement, sapphire crystal."),
        ("Rose Gold Dress Watch", 899.0, 7, "rose-gold-watch.jpg", "watches", "Slim case with a mother-of-pearl dial."),
    ];

    for (name, price, count, image, category, description) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, in_stock, count_in_stock, image, description, category)
            SELECT $1, $2, $3, TRUE, $4, $5, $6, $7
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(price)
        .bind(count)
        .bind(image)
        .bind(description)
        .bind(category)
        .execute(pool)
        .await?;
    }

    println!("Seeded {} catalog products", products.len());
    Ok(())
}
