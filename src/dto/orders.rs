use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Order, OrderStatus, PaymentMethod, PaymentResult};

fn default_quantity() -> i32 {
    1
}

/// One checkout line. Name, price and image default to the live product
/// when the client leaves them out.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub product: Uuid,
    pub name: Option<String>,
    #[serde(alias = "imageId")]
    pub image: Option<String>,
    #[validate(range(min = 0.0, message = "Item price cannot be negative"))]
    pub price: Option<f64>,
    #[serde(default = "default_quantity", alias = "qty")]
    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10000"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ShippingAddressInput {
    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "Shipping city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Shipping postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, message = "Shipping country is required"))]
    pub country: String,
}

/// Prices are stored as sent; the server does not recompute totals.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    #[validate(nested)]
    pub order_items: Vec<OrderItemInput>,
    #[serde(default)]
    #[validate(nested)]
    pub shipping_address: ShippingAddressInput,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Items price cannot be negative"))]
    pub items_price: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Tax price cannot be negative"))]
    pub tax_price: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Shipping price cannot be negative"))]
    pub shipping_price: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Total price cannot be negative"))]
    pub total_price: f64,
    pub payment_result: Option<PaymentResult>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct Payer {
    pub email_address: Option<String>,
}

/// Body of the payment-provider confirmation.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PayOrderRequest {
    pub id: Option<String>,
    pub status: Option<String>,
    pub update_time: Option<String>,
    pub payer: Option<Payer>,
}

impl From<PayOrderRequest> for PaymentResult {
    fn from(req: PayOrderRequest) -> Self {
        PaymentResult {
            id: req.id,
            status: req.status,
            update_time: req.update_time,
            email_address: req.payer.and_then(|p| p.email_address),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeliveryRequest {
    pub status: Option<OrderStatus>,
    pub is_paid: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderEnvelope {
    pub order: Order,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub orders: Vec<Order>,
}
