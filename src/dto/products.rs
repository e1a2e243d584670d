use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Category, Product};

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 100, message = "Product name must be 1 to 100 characters"))]
    pub name: String,
    #[validate(range(min = 0.0, message = "Price must be a positive number"))]
    pub price: f64,
    pub in_stock: Option<bool>,
    #[validate(range(min = 0, message = "Stock count cannot be negative"))]
    pub count_in_stock: Option<i32>,
    #[validate(length(min = 1, message = "A product must have an image"))]
    pub image: String,
    #[validate(length(min = 1, message = "A product must have a description"))]
    pub description: String,
    pub category: Category,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: Option<f64>,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 100, message = "Product name must be 1 to 100 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 0.0, message = "Price must be a positive number"))]
    pub price: Option<f64>,
    pub in_stock: Option<bool>,
    #[validate(range(min = 0, message = "Stock count cannot be negative"))]
    pub count_in_stock: Option<i32>,
    #[validate(length(min = 1, message = "A product must have an image"))]
    pub image: Option<String>,
    #[validate(length(min = 1, message = "A product must have a description"))]
    pub description: Option<String>,
    pub category: Option<Category>,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductEnvelope {
    pub product: Product,
}
