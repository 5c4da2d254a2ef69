use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

use crate::{
    audit::log_audit,
    dto::sale_items::{
        CreateSaleItemRequest, SaleItemList, SaleItemWithProduct, UpdateSaleItemRequest,
    },
    entity::{
        products::Model as ProductModel,
        sale_items::{
            ActiveModel as SaleItemActive, Column as SaleItemCol, Entity as SaleItems,
            Model as SaleItemModel,
        },
        sales::{ActiveModel as SaleActive, Entity as Sales},
        Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ProductSummary, SaleItem},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::stock,
    state::AppState,
};

use chrono::Utc;

/// Add a line item to an existing sale: reserves stock, prices the item at
/// the product's current unit price and bumps the sale total, all in one
/// transaction.
pub async fn create_sale_item(
    state: &AppState,
    user: &AuthUser,
    payload: CreateSaleItemRequest,
) -> AppResult<ApiResponse<SaleItemWithProduct>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "Quantity must be a positive integer".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    // Lock the sale header first; stock locks always come second so that
    // concurrent item mutations acquire rows in the same order.
    let sale = Sales::find_by_id(payload.sale_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Sale"))?;

    let product = stock::reserve(&txn, payload.product_id, payload.quantity).await?;
    let subtotal = product.price * payload.quantity as i64;

    let item = SaleItemActive {
        id: NotSet,
        sale_id: Set(sale.id),
        product_id: Set(product.id),
        quantity: Set(payload.quantity),
        subtotal: Set(subtotal),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let new_total = sale.total + subtotal;
    let mut sale_active: SaleActive = sale.into();
    sale_active.total = Set(new_total);
    sale_active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "sale_item_create",
        Some("sale_items"),
        Some(serde_json::json!({ "sale_item_id": item.id, "sale_id": item.sale_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Sale item created",
        SaleItemWithProduct {
            item: sale_item_from_entity(item),
            product: Some(product_summary(&product)),
        },
        Some(Meta::empty()),
    ))
}

/// Change a line item's product and/or quantity.
///
/// A product swap always releases the old product by the old quantity and
/// reserves the new product for the effective quantity. A pure quantity
/// change adjusts the same product by the difference; when more stock is
/// needed, the availability check (and any failure report) uses the
/// difference, not the full new quantity. The subtotal is repriced from the
/// effective product's current unit price whenever either field changes.
pub async fn update_sale_item(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: UpdateSaleItemRequest,
) -> AppResult<ApiResponse<SaleItemWithProduct>> {
    if payload.product_id.is_none() && payload.quantity.is_none() {
        return Err(AppError::BadRequest(
            "At least one field is required to update".into(),
        ));
    }
    if let Some(quantity) = payload.quantity {
        if quantity <= 0 {
            return Err(AppError::BadRequest(
                "Quantity must be a positive integer".into(),
            ));
        }
    }

    let txn = state.orm.begin().await?;

    let item = SaleItems::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Sale item"))?;

    let sale = Sales::find_by_id(item.sale_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Sale"))?;

    let new_quantity = payload.quantity.unwrap_or(item.quantity);
    let product_changed = payload
        .product_id
        .is_some_and(|product_id| product_id != item.product_id);

    let product = if let Some(new_product_id) = payload.product_id.filter(|_| product_changed) {
        stock::release(&txn, item.product_id, item.quantity).await?;
        stock::reserve(&txn, new_product_id, new_quantity).await?
    } else {
        stock::adjust(&txn, item.product_id, new_quantity - item.quantity).await?
    };

    let new_subtotal = if product_changed || payload.quantity.is_some() {
        product.price * new_quantity as i64
    } else {
        item.subtotal
    };

    let old_subtotal = item.subtotal;
    let mut item_active: SaleItemActive = item.into();
    item_active.product_id = Set(product.id);
    item_active.quantity = Set(new_quantity);
    item_active.subtotal = Set(new_subtotal);
    let updated = item_active.update(&txn).await?;

    let new_total = sale.total + (new_subtotal - old_subtotal);
    let mut sale_active: SaleActive = sale.into();
    sale_active.total = Set(new_total);
    sale_active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "sale_item_update",
        Some("sale_items"),
        Some(serde_json::json!({ "sale_item_id": updated.id, "sale_id": updated.sale_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Sale item updated",
        SaleItemWithProduct {
            item: sale_item_from_entity(updated),
            product: Some(product_summary(&product)),
        },
        Some(Meta::empty()),
    ))
}

/// Remove a line item, returning its quantity to stock and subtracting its
/// subtotal from the sale total. Deleting an item that is already gone is a
/// plain not-found with no state change.
pub async fn delete_sale_item(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;

    let item = SaleItems::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Sale item"))?;

    let sale = Sales::find_by_id(item.sale_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Sale"))?;

    stock::release(&txn, item.product_id, item.quantity).await?;

    let new_total = sale.total - item.subtotal;
    let mut sale_active: SaleActive = sale.into();
    sale_active.total = Set(new_total);
    sale_active.update(&txn).await?;

    let item_id = item.id;
    let sale_id = item.sale_id;
    SaleItems::delete_by_id(item_id).exec(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "sale_item_delete",
        Some("sale_items"),
        Some(serde_json::json!({ "sale_item_id": item_id, "sale_id": sale_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Sale item deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_sale_items(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<SaleItemList>> {
    let (page, limit, offset) = pagination.normalize();

    let total = SaleItems::find().count(&state.orm).await? as i64;

    let rows = SaleItems::find()
        .order_by_desc(SaleItemCol::CreatedAt)
        .limit(limit as u64)
        .offset(offset as u64)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let items = rows.into_iter().map(with_product_from_row).collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Sale items",
        SaleItemList { items },
        Some(meta),
    ))
}

pub async fn get_sale_item(
    state: &AppState,
    id: i32,
) -> AppResult<ApiResponse<SaleItemWithProduct>> {
    let row = SaleItems::find_by_id(id)
        .find_also_related(Products)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Sale item"))?;

    Ok(ApiResponse::success(
        "Sale item",
        with_product_from_row(row),
        Some(Meta::empty()),
    ))
}

/// Items of one sale; an unknown sale id yields an empty list, not an error.
pub async fn list_sale_items_by_sale(
    state: &AppState,
    sale_id: i32,
) -> AppResult<ApiResponse<SaleItemList>> {
    let rows = SaleItems::find()
        .filter(SaleItemCol::SaleId.eq(sale_id))
        .order_by_desc(SaleItemCol::CreatedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let items = rows.into_iter().map(with_product_from_row).collect();

    Ok(ApiResponse::success(
        "Sale items",
        SaleItemList { items },
        Some(Meta::empty()),
    ))
}

fn with_product_from_row(row: (SaleItemModel, Option<ProductModel>)) -> SaleItemWithProduct {
    let (item, product) = row;
    SaleItemWithProduct {
        item: sale_item_from_entity(item),
        product: product.as_ref().map(product_summary),
    }
}

fn sale_item_from_entity(model: SaleItemModel) -> SaleItem {
    SaleItem {
        id: model.id,
        sale_id: model.sale_id,
        product_id: model.product_id,
        quantity: model.quantity,
        subtotal: model.subtotal,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn product_summary(model: &ProductModel) -> ProductSummary {
    ProductSummary {
        id: model.id,
        name: model.name.clone(),
        price: model.price,
    }
}
