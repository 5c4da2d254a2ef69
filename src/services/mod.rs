pub mod auth_service;
pub mod customer_service;
pub mod product_service;
pub mod sale_item_service;
pub mod sale_service;
pub mod stock;
