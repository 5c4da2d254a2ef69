pub mod auth;
pub mod coerce;
pub mod customers;
pub mod products;
pub mod sale_items;
pub mod sales;
