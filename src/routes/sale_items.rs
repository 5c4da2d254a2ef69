use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};

use crate::{
    dto::sale_items::{
        CreateSaleItemRequest, SaleItemList, SaleItemWithProduct, UpdateSaleItemRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::Pagination,
    services::sale_item_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_sale_item))
        .route("/", get(list_sale_items))
        .route("/{id}", get(get_sale_item))
        .route("/{id}", put(update_sale_item))
        .route("/{id}", delete(delete_sale_item))
        .route("/sale/{sale_id}", get(list_sale_items_by_sale))
}

#[utoipa::path(
    post,
    path = "/api/sale-items",
    request_body = CreateSaleItemRequest,
    responses(
        (status = 201, description = "Sale item created", body = ApiResponse<SaleItemWithProduct>),
        (status = 400, description = "Invalid quantity or insufficient stock"),
        (status = 404, description = "Sale or product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sale items"
)]
pub async fn create_sale_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateSaleItemRequest>,
) -> AppResult<Json<ApiResponse<SaleItemWithProduct>>> {
    let resp = sale_item_service::create_sale_item(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/sale-items",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "List sale items", body = ApiResponse<SaleItemList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Sale items"
)]
pub async fn list_sale_items(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<SaleItemList>>> {
    let resp = sale_item_service::list_sale_items(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/sale-items/{id}",
    params(
        ("id" = i32, Path, description = "Sale item ID")
    ),
    responses(
        (status = 200, description = "Get sale item", body = ApiResponse<SaleItemWithProduct>),
        (status = 404, description = "Sale item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sale items"
)]
pub async fn get_sale_item(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<SaleItemWithProduct>>> {
    let resp = sale_item_service::get_sale_item(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/sale-items/sale/{sale_id}",
    params(
        ("sale_id" = i32, Path, description = "Sale ID")
    ),
    responses(
        (status = 200, description = "Items belonging to one sale", body = ApiResponse<SaleItemList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Sale items"
)]
pub async fn list_sale_items_by_sale(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(sale_id): Path<i32>,
) -> AppResult<Json<ApiResponse<SaleItemList>>> {
    let resp = sale_item_service::list_sale_items_by_sale(&state, sale_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/sale-items/{id}",
    params(
        ("id" = i32, Path, description = "Sale item ID")
    ),
    request_body = UpdateSaleItemRequest,
    responses(
        (status = 200, description = "Updated sale item", body = ApiResponse<SaleItemWithProduct>),
        (status = 400, description = "Invalid payload or insufficient stock"),
        (status = 404, description = "Sale item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sale items"
)]
pub async fn update_sale_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateSaleItemRequest>,
) -> AppResult<Json<ApiResponse<SaleItemWithProduct>>> {
    let resp = sale_item_service::update_sale_item(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/sale-items/{id}",
    params(
        ("id" = i32, Path, description = "Sale item ID")
    ),
    responses(
        (status = 200, description = "Sale item deleted, stock restored"),
        (status = 404, description = "Sale item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sale items"
)]
pub async fn delete_sale_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = sale_item_service::delete_sale_item(&state, &user, id).await?;
    Ok(Json(resp))
}
