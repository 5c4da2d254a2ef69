use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};

use crate::{
    dto::sales::{CreateSaleRequest, SaleList, SaleWithItems, UpdateSaleRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::SaleListQuery,
    services::sale_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_sale))
        .route("/", get(list_sales))
        .route("/{id}", get(get_sale))
        .route("/{id}", put(update_sale))
        .route("/{id}", delete(delete_sale))
}

#[utoipa::path(
    post,
    path = "/api/sales",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Sale created with its items", body = ApiResponse<SaleWithItems>),
        (status = 400, description = "Invalid payload or insufficient stock"),
        (status = 404, description = "A referenced product does not exist"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sales"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateSaleRequest>,
) -> AppResult<Json<ApiResponse<SaleWithItems>>> {
    let resp = sale_service::create_sale(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/sales",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc"),
    ),
    responses(
        (status = 200, description = "List sales", body = ApiResponse<SaleList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<SaleListQuery>,
) -> AppResult<Json<ApiResponse<SaleList>>> {
    let resp = sale_service::list_sales(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/sales/{id}",
    params(
        ("id" = i32, Path, description = "Sale ID")
    ),
    responses(
        (status = 200, description = "Get sale with items", body = ApiResponse<SaleWithItems>),
        (status = 404, description = "Sale not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<SaleWithItems>>> {
    let resp = sale_service::get_sale(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/sales/{id}",
    params(
        ("id" = i32, Path, description = "Sale ID")
    ),
    request_body = UpdateSaleRequest,
    responses(
        (status = 200, description = "Updated sale header", body = ApiResponse<SaleWithItems>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Sale not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sales"
)]
pub async fn update_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateSaleRequest>,
) -> AppResult<Json<ApiResponse<SaleWithItems>>> {
    let resp = sale_service::update_sale(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/sales/{id}",
    params(
        ("id" = i32, Path, description = "Sale ID")
    ),
    responses(
        (status = 200, description = "Sale deleted, stock restored"),
        (status = 404, description = "Sale not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sales"
)]
pub async fn delete_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = sale_service::delete_sale(&state, &user, id).await?;
    Ok(Json(resp))
}
