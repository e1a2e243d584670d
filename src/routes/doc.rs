use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{auth as auth_dto, orders as order_dto, products as product_dto},
    models::{
        Admin, Category, Order, OrderItem, OrderOwner, OrderStatus, PaymentMethod, PaymentResult,
        Product, ShippingAddress, User,
    },
    response::{ApiResponse, Meta, ResponseStatus},
    routes::{auth, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::signup,
        auth::login,
        auth::admin_login,
        auth::me,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::create_order,
        orders::my_orders,
        orders::list_all_orders,
        orders::get_order,
        orders::pay_order,
        orders::update_delivery
    ),
    components(
        schemas(
            User,
            Admin,
            Product,
            Category,
            Order,
            OrderItem,
            OrderOwner,
            OrderStatus,
            PaymentMethod,
            PaymentResult,
            ShippingAddress,
            auth_dto::Role,
            auth_dto::SignupRequest,
            auth_dto::LoginRequest,
            auth_dto::AdminLoginRequest,
            auth_dto::UserSession,
            auth_dto::AdminSession,
            auth_dto::Principal,
            order_dto::OrderItemInput,
            order_dto::ShippingAddressInput,
            order_dto::CreateOrderRequest,
            order_dto::Payer,
            order_dto::PayOrderRequest,
            order_dto::UpdateDeliveryRequest,
            order_dto::OrderEnvelope,
            order_dto::OrderList,
            product_dto::CreateProductRequest,
            product_dto::UpdateProductRequest,
            product_dto::ProductEnvelope,
            product_dto::ProductList,
            params::ProductSortBy,
            params::SortOrder,
            Meta,
            ResponseStatus,
            ApiResponse<order_dto::OrderEnvelope>,
            ApiResponse<order_dto::OrderList>,
            ApiResponse<product_dto::ProductEnvelope>,
            ApiResponse<product_dto::ProductList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Customer and admin authentication"),
        (name = "Products", description = "Jewelry catalog"),
        (name = "Orders", description = "Checkout, payment and delivery"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
