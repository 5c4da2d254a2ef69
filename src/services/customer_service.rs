use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::{
    audit::log_audit,
    dto::customers::{CreateCustomerRequest, CustomerList, UpdateCustomerRequest},
    entity::{
        customers::{ActiveModel, Column, Entity as Customers, Model as CustomerModel},
        sales::{Column as SaleCol, Entity as Sales},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Customer,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_customers(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<CustomerList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Customers::find().order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(customer_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Customers",
        CustomerList { items },
        Some(meta),
    ))
}

pub async fn get_customer(state: &AppState, id: i32) -> AppResult<ApiResponse<Customer>> {
    let customer = Customers::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(customer_from_entity)
        .ok_or(AppError::NotFound("Customer"))?;
    Ok(ApiResponse::success("Customer", customer, None))
}

pub async fn create_customer(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest(
            "Customer name must be a non-empty string".into(),
        ));
    }

    let active = ActiveModel {
        id: NotSet,
        name: Set(name),
        address: Set(payload
            .address
            .map(|a| a.trim().to_string())
            .unwrap_or_default()),
        phone: Set(payload
            .phone
            .map(|p| p.trim().to_string())
            .unwrap_or_default()),
        created_at: NotSet,
    };
    let customer = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "customer_create",
        Some("customers"),
        Some(serde_json::json!({ "customer_id": customer.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Customer created",
        customer_from_entity(customer),
        Some(Meta::empty()),
    ))
}

pub async fn update_customer(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    if payload.name.is_none() && payload.address.is_none() && payload.phone.is_none() {
        return Err(AppError::BadRequest(
            "At least one field is required to update".into(),
        ));
    }

    let existing = Customers::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Customer"))?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest(
                "Customer name must be a non-empty string".into(),
            ));
        }
        active.name = Set(name);
    }
    if let Some(address) = payload.address {
        active.address = Set(address.trim().to_string());
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(phone.trim().to_string());
    }

    let customer = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "customer_update",
        Some("customers"),
        Some(serde_json::json!({ "customer_id": customer.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Customer updated",
        customer_from_entity(customer),
        Some(Meta::empty()),
    ))
}

pub async fn delete_customer(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let referenced = Sales::find()
        .filter(SaleCol::CustomerId.eq(id))
        .count(&state.orm)
        .await?;
    if referenced > 0 {
        return Err(AppError::Conflict(
            "Cannot delete customer: they have existing sales".into(),
        ));
    }

    let result = Customers::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Customer"));
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "customer_delete",
        Some("customers"),
        Some(serde_json::json!({ "customer_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Customer deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn customer_from_entity(model: CustomerModel) -> Customer {
    Customer {
        id: model.id,
        name: model.name,
        address: model.address,
        phone: model.phone,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
