use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::products::{CreateProductRequest, ProductEnvelope, ProductList, UpdateProductRequest};
use crate::{
    audit::record_audit,
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::Identity,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

const DEFAULT_RATING: f64 = 4.5;

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = contains_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category) = query.category {
        condition = condition.add(Column::Category.eq(category));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if let Some(in_stock) = query.in_stock {
        condition = condition.add(Column::InStock.eq(in_stock));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Rating => Column::Rating,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let products: Vec<Product> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let results = products.len();
    Ok(ApiResponse::success(ProductList { products })
        .with_results(results)
        .with_meta(Meta::new(page, limit, total)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductEnvelope>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity)
        .ok_or_else(|| AppError::NotFound("No product found with that ID".into()))?;
    Ok(ApiResponse::success(ProductEnvelope { product }))
}

pub async fn create_product(
    state: &AppState,
    identity: &Identity,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductEnvelope>> {
    let admin = identity.require_admin()?;
    payload.validate()?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        price: Set(payload.price),
        in_stock: Set(payload.in_stock.unwrap_or(true)),
        count_in_stock: Set(payload.count_in_stock.unwrap_or(0)),
        image: Set(payload.image),
        description: Set(payload.description.trim().to_string()),
        category: Set(payload.category),
        rating: Set(payload.rating.unwrap_or(DEFAULT_RATING)),
        num_reviews: Set(0),
        created_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    record_audit(
        &state.orm,
        Some(admin.admin_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(ProductEnvelope {
        product: product_from_entity(product),
    }))
}

pub async fn update_product(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<ProductEnvelope>> {
    let admin = identity.require_admin()?;
    payload.validate()?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("No product found with that ID".into()))?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(in_stock) = payload.in_stock {
        active.in_stock = Set(in_stock);
    }
    if let Some(count) = payload.count_in_stock {
        active.count_in_stock = Set(count);
    }
    if let Some(image) = payload.image {
        active.image = Set(image);
    }
    if let Some(description) = payload.description {
        active.description = Set(description.trim().to_string());
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(rating) = payload.rating {
        active.rating = Set(rating);
    }

    let product = active.update(&state.orm).await?;

    record_audit(
        &state.orm,
        Some(admin.admin_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(ProductEnvelope {
        product: product_from_entity(product),
    }))
}

pub async fn delete_product(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let admin = identity.require_admin()?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound("No product found with that ID".into()));
    }

    record_audit(
        &state.orm,
        Some(admin.admin_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await;

    Ok(ApiResponse::success(serde_json::Value::Null))
}

// `%` and `_` in the search text match literally.
fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        price: model.price,
        in_stock: model.in_stock,
        count_in_stock: model.count_in_stock,
        image: model.image,
        description: model.description,
        category: model.category,
        rating: model.rating,
        num_reviews: model.num_reviews,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
