pub mod customers;
pub mod products;
pub mod sale_items;
pub mod sales;

pub use customers::Entity as Customers;
pub use products::Entity as Products;
pub use sale_items::Entity as SaleItems;
pub use sales::Entity as Sales;
