use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::{coerce, sale_items::SaleItemWithProduct},
    models::{CustomerSummary, Sale},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaleItemRequest {
    #[serde(deserialize_with = "coerce::int_from_any")]
    #[schema(value_type = i32)]
    pub product_id: i32,
    #[serde(deserialize_with = "coerce::int_from_any")]
    #[schema(value_type = i32)]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSaleRequest {
    /// ISO-8601; defaults to now when omitted.
    pub sale_date: Option<String>,
    /// Unresolvable customer ids degrade to a walk-in sale.
    #[serde(default, deserialize_with = "coerce::lenient_opt_int")]
    #[schema(value_type = Option<i32>)]
    pub customer_id: Option<i32>,
    #[serde(default)]
    pub items: Vec<SaleItemRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSaleRequest {
    pub sale_date: Option<String>,
    pub total: Option<i64>,
    /// Explicit null (or empty string) clears the customer reference.
    #[serde(default, deserialize_with = "coerce::opt_nullable_int")]
    #[schema(value_type = Option<i32>)]
    pub customer_id: Option<Option<i32>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub customer: Option<CustomerSummary>,
    pub items: Vec<SaleItemWithProduct>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleList {
    pub items: Vec<SaleWithItems>,
}
