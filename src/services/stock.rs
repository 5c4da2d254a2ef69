//! Stock ledger: every mutation of product stock goes through here, inside
//! the caller's transaction. The product row is read under `FOR UPDATE`, so
//! check-then-act on stock is serialized across concurrent sales.

use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QuerySelect, Set};

use crate::{
    entity::products::{ActiveModel as ProductActive, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
};

/// Fetch a product row locked for the remainder of the transaction.
pub async fn lock<C: ConnectionTrait>(conn: &C, product_id: i32) -> AppResult<ProductModel> {
    Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

/// Decrease stock by `quantity`, failing without any write when the product
/// does not have that much available.
pub async fn reserve<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    quantity: i32,
) -> AppResult<ProductModel> {
    let product = lock(conn, product_id).await?;
    if product.stock < quantity {
        return Err(AppError::InsufficientStock {
            name: product.name,
            available: product.stock,
            requested: quantity,
        });
    }
    let new_stock = product.stock - quantity;
    store_stock(conn, product, new_stock).await
}

/// Increase stock by `quantity`, unconditionally. Used when line items are
/// deleted or shrunk and on cascade deletion of a sale.
pub async fn release<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    quantity: i32,
) -> AppResult<ProductModel> {
    let product = lock(conn, product_id).await?;
    let new_stock = product.stock + quantity;
    store_stock(conn, product, new_stock).await
}

/// Apply a signed stock delta: a positive delta needs that much stock
/// available (the error reports the delta as the requested amount), a
/// negative delta releases, zero just resolves the product.
pub async fn adjust<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    delta: i32,
) -> AppResult<ProductModel> {
    if delta > 0 {
        reserve(conn, product_id, delta).await
    } else if delta < 0 {
        release(conn, product_id, -delta).await
    } else {
        lock(conn, product_id).await
    }
}

async fn store_stock<C: ConnectionTrait>(
    conn: &C,
    product: ProductModel,
    new_stock: i32,
) -> AppResult<ProductModel> {
    let mut active: ProductActive = product.into();
    active.stock = Set(new_stock);
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(conn).await?)
}
