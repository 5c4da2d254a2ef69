use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::coerce,
    models::{ProductSummary, SaleItem},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSaleItemRequest {
    #[serde(deserialize_with = "coerce::int_from_any")]
    #[schema(value_type = i32)]
    pub sale_id: i32,
    #[serde(deserialize_with = "coerce::int_from_any")]
    #[schema(value_type = i32)]
    pub product_id: i32,
    #[serde(deserialize_with = "coerce::int_from_any")]
    #[schema(value_type = i32)]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSaleItemRequest {
    #[serde(default, deserialize_with = "coerce::opt_int_from_any")]
    #[schema(value_type = Option<i32>)]
    pub product_id: Option<i32>,
    #[serde(default, deserialize_with = "coerce::opt_int_from_any")]
    #[schema(value_type = Option<i32>)]
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleItemWithProduct {
    pub item: SaleItem,
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleItemList {
    pub items: Vec<SaleItemWithProduct>,
}
