use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;

use crate::{
    audit::log_audit,
    dto::{
        sale_items::SaleItemWithProduct,
        sales::{CreateSaleRequest, SaleList, SaleWithItems, UpdateSaleRequest},
    },
    entity::{
        customers::{Entity as Customers, Model as CustomerModel},
        products::Model as ProductModel,
        sale_items::{
            ActiveModel as SaleItemActive, Column as SaleItemCol, Entity as SaleItems,
            Model as SaleItemModel,
        },
        sales::{ActiveModel as SaleActive, Column as SaleCol, Entity as Sales, Model as SaleModel},
        Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CustomerSummary, ProductSummary, Sale, SaleItem},
    response::{ApiResponse, Meta},
    routes::params::{SaleListQuery, SortOrder},
    services::stock,
    state::AppState,
};

/// Create a sale with its line items.
///
/// Every product row the sale touches is locked and validated first, in the
/// order the items were supplied; the header, the items and the stock
/// decrements then commit as one transaction. A failure at any point leaves
/// no trace of the sale.
pub async fn create_sale(
    state: &AppState,
    user: &AuthUser,
    payload: CreateSaleRequest,
) -> AppResult<ApiResponse<SaleWithItems>> {
    let sale_date = match payload.sale_date.as_deref().map(str::trim) {
        None | Some("") => Utc::now(),
        Some(raw) => parse_iso_date(raw)?,
    };

    if payload.items.is_empty() {
        return Err(AppError::BadRequest(
            "Sale items are required and must be a non-empty list".into(),
        ));
    }
    for item in &payload.items {
        if item.product_id <= 0 {
            return Err(AppError::BadRequest(
                "Product ID must be a positive integer".into(),
            ));
        }
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(
                "Quantity must be a positive integer".into(),
            ));
        }
    }

    let txn = state.orm.begin().await?;

    // Lenient customer resolution: an id that does not resolve means a
    // walk-in sale, never an error.
    let customer = match payload.customer_id {
        Some(customer_id) => Customers::find_by_id(customer_id).one(&txn).await?,
        None => None,
    };

    // Pass one: lock and validate every product in list order, pricing each
    // item from the current unit price.
    let mut total: i64 = 0;
    let mut priced: Vec<(i32, i32, i64)> = Vec::with_capacity(payload.items.len());
    for request in &payload.items {
        let product = stock::lock(&txn, request.product_id).await?;
        if product.stock < request.quantity {
            return Err(AppError::InsufficientStock {
                name: product.name,
                available: product.stock,
                requested: request.quantity,
            });
        }
        let subtotal = product.price * request.quantity as i64;
        total += subtotal;
        priced.push((product.id, request.quantity, subtotal));
    }

    let sale = SaleActive {
        id: NotSet,
        sale_date: Set(sale_date.into()),
        total: Set(total),
        customer_id: Set(customer.as_ref().map(|c| c.id)),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    // Pass two: persist the items and take the stock, still per item in
    // list order. The reserve re-checks under the lock already held, which
    // also catches a list naming the same product twice.
    for (product_id, quantity, subtotal) in &priced {
        SaleItemActive {
            id: NotSet,
            sale_id: Set(sale.id),
            product_id: Set(*product_id),
            quantity: Set(*quantity),
            subtotal: Set(*subtotal),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        stock::reserve(&txn, *product_id, *quantity).await?;
    }

    let item_rows = SaleItems::find()
        .filter(SaleItemCol::SaleId.eq(sale.id))
        .find_also_related(Products)
        .all(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "sale_create",
        Some("sales"),
        Some(serde_json::json!({ "sale_id": sale.id, "total": sale.total })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Sale created",
        SaleWithItems {
            sale: sale_from_entity(sale),
            customer: customer.as_ref().map(customer_summary),
            items: item_rows.into_iter().map(with_product_from_row).collect(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_sales(
    state: &AppState,
    query: SaleListQuery,
) -> AppResult<ApiResponse<SaleList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Sales::find();
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(SaleCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(SaleCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let sale_rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .find_also_related(Customers)
        .all(&state.orm)
        .await?;

    let sale_ids: Vec<i32> = sale_rows.iter().map(|(sale, _)| sale.id).collect();
    let mut items_by_sale: HashMap<i32, Vec<SaleItemWithProduct>> = HashMap::new();
    if !sale_ids.is_empty() {
        let item_rows = SaleItems::find()
            .filter(SaleItemCol::SaleId.is_in(sale_ids))
            .find_also_related(Products)
            .all(&state.orm)
            .await?;
        for row in item_rows {
            items_by_sale
                .entry(row.0.sale_id)
                .or_default()
                .push(with_product_from_row(row));
        }
    }

    let items = sale_rows
        .into_iter()
        .map(|(sale, customer)| {
            let items = items_by_sale.remove(&sale.id).unwrap_or_default();
            SaleWithItems {
                customer: customer.as_ref().map(customer_summary),
                sale: sale_from_entity(sale),
                items,
            }
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Sales", SaleList { items }, Some(meta)))
}

pub async fn get_sale(state: &AppState, id: i32) -> AppResult<ApiResponse<SaleWithItems>> {
    let (sale, customer) = Sales::find_by_id(id)
        .find_also_related(Customers)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Sale"))?;

    let item_rows = SaleItems::find()
        .filter(SaleItemCol::SaleId.eq(sale.id))
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Sale",
        SaleWithItems {
            customer: customer.as_ref().map(customer_summary),
            sale: sale_from_entity(sale),
            items: item_rows.into_iter().map(with_product_from_row).collect(),
        },
        Some(Meta::empty()),
    ))
}

/// Header-only update; line items are managed through their own endpoints.
pub async fn update_sale(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: UpdateSaleRequest,
) -> AppResult<ApiResponse<SaleWithItems>> {
    let existing = Sales::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Sale"))?;

    let sale_date = payload
        .sale_date
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if sale_date.is_none() && payload.total.is_none() && payload.customer_id.is_none() {
        return Err(AppError::BadRequest(
            "At least one field is required to update".into(),
        ));
    }

    let mut active: SaleActive = existing.into();
    if let Some(raw) = sale_date {
        active.sale_date = Set(parse_iso_date(raw)?.into());
    }
    if let Some(total) = payload.total {
        if total < 0 {
            return Err(AppError::BadRequest(
                "Total must be a non-negative number".into(),
            ));
        }
        active.total = Set(total);
    }
    if let Some(customer_id) = payload.customer_id {
        match customer_id {
            None => active.customer_id = Set(None),
            Some(customer_id) => {
                Customers::find_by_id(customer_id)
                    .one(&state.orm)
                    .await?
                    .ok_or(AppError::NotFound("Customer"))?;
                active.customer_id = Set(Some(customer_id));
            }
        }
    }

    let sale = active.update(&state.orm).await?;

    let customer = match sale.customer_id {
        Some(customer_id) => Customers::find_by_id(customer_id).one(&state.orm).await?,
        None => None,
    };
    let item_rows = SaleItems::find()
        .filter(SaleItemCol::SaleId.eq(sale.id))
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "sale_update",
        Some("sales"),
        Some(serde_json::json!({ "sale_id": sale.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Sale updated",
        SaleWithItems {
            customer: customer.as_ref().map(customer_summary),
            sale: sale_from_entity(sale),
            items: item_rows.into_iter().map(with_product_from_row).collect(),
        },
        Some(Meta::empty()),
    ))
}

/// Cascade delete: each line item's quantity is released back to its
/// product (same as deleting the item on its own), then the items and the
/// header go, all in one transaction.
pub async fn delete_sale(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;

    let sale = Sales::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Sale"))?;

    let items = SaleItems::find()
        .filter(SaleItemCol::SaleId.eq(sale.id))
        .all(&txn)
        .await?;

    for item in &items {
        stock::release(&txn, item.product_id, item.quantity).await?;
    }

    SaleItems::delete_many()
        .filter(SaleItemCol::SaleId.eq(sale.id))
        .exec(&txn)
        .await?;
    Sales::delete_by_id(sale.id).exec(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "sale_delete",
        Some("sales"),
        Some(serde_json::json!({ "sale_id": id, "items_removed": items.len() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Sale deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Accepts RFC 3339 or a bare calendar date; rejects everything else before
/// any mutation happens.
fn parse_iso_date(raw: &str) -> AppResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = date.and_time(NaiveTime::MIN);
        return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    Err(AppError::BadRequest(
        "Invalid sale date. Use ISO 8601 format (e.g. 2024-12-27T10:00:00Z)".into(),
    ))
}

fn with_product_from_row(row: (SaleItemModel, Option<ProductModel>)) -> SaleItemWithProduct {
    let (item, product) = row;
    SaleItemWithProduct {
        item: SaleItem {
            id: item.id,
            sale_id: item.sale_id,
            product_id: item.product_id,
            quantity: item.quantity,
            subtotal: item.subtotal,
            created_at: item.created_at.with_timezone(&Utc),
        },
        product: product.map(|p| ProductSummary {
            id: p.id,
            name: p.name,
            price: p.price,
        }),
    }
}

fn sale_from_entity(model: SaleModel) -> Sale {
    Sale {
        id: model.id,
        sale_date: model.sale_date.with_timezone(&Utc),
        total: model.total,
        customer_id: model.customer_id,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn customer_summary(model: &CustomerModel) -> CustomerSummary {
    CustomerSummary {
        id: model.id,
        name: model.name.clone(),
        address: model.address.clone(),
        phone: model.phone.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_iso_date;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_rfc3339_timestamps() {
        let parsed = parse_iso_date("2024-12-27T10:00:00Z").unwrap();
        assert_eq!(parsed.year(), 2024);
        assert_eq!(parsed.hour(), 10);
    }

    #[test]
    fn parses_bare_dates_at_midnight() {
        let parsed = parse_iso_date("2024-12-27").unwrap();
        assert_eq!(parsed.day(), 27);
        assert_eq!(parsed.hour(), 0);
    }

    #[test]
    fn normalizes_offsets_to_utc() {
        let parsed = parse_iso_date("2024-12-27T10:00:00+07:00").unwrap();
        assert_eq!(parsed.hour(), 3);
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_iso_date("27-12-2024").is_err());
        assert!(parse_iso_date("next tuesday").is_err());
    }
}
