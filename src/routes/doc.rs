use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RegisterRequest,
            TokenPair, UpdateUserRequest, UserList, UserSummary,
        },
        customers::{CreateCustomerRequest, CustomerList, UpdateCustomerRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        sale_items::{
            CreateSaleItemRequest, SaleItemList, SaleItemWithProduct, UpdateSaleItemRequest,
        },
        sales::{CreateSaleRequest, SaleItemRequest, SaleList, SaleWithItems, UpdateSaleRequest},
    },
    models::{Customer, CustomerSummary, Product, ProductSummary, Sale, SaleItem, User},
    response::{ApiResponse, Meta},
    routes::{auth, customers, health, params, products, sale_items, sales},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::list_users,
        auth::get_user,
        auth::update_user,
        auth::delete_user,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        customers::list_customers,
        customers::get_customer,
        customers::create_customer,
        customers::update_customer,
        customers::delete_customer,
        sales::create_sale,
        sales::list_sales,
        sales::get_sale,
        sales::update_sale,
        sales::delete_sale,
        sale_items::create_sale_item,
        sale_items::list_sale_items,
        sale_items::get_sale_item,
        sale_items::list_sale_items_by_sale,
        sale_items::update_sale_item,
        sale_items::delete_sale_item,
    ),
    components(
        schemas(
            User,
            Product,
            Customer,
            Sale,
            SaleItem,
            ProductSummary,
            CustomerSummary,
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            LogoutRequest,
            UpdateUserRequest,
            LoginResponse,
            TokenPair,
            UserSummary,
            UserList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateCustomerRequest,
            UpdateCustomerRequest,
            CustomerList,
            CreateSaleRequest,
            UpdateSaleRequest,
            SaleItemRequest,
            SaleWithItems,
            SaleList,
            CreateSaleItemRequest,
            UpdateSaleItemRequest,
            SaleItemWithProduct,
            SaleItemList,
            params::Pagination,
            params::ProductQuery,
            params::SaleListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Customer>,
            ApiResponse<CustomerList>,
            ApiResponse<SaleWithItems>,
            ApiResponse<SaleList>,
            ApiResponse<SaleItemWithProduct>,
            ApiResponse<SaleItemList>,
            ApiResponse<LoginResponse>,
            ApiResponse<TokenPair>,
            ApiResponse<UserList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication and user management"),
        (name = "Products", description = "Product endpoints"),
        (name = "Customers", description = "Customer endpoints"),
        (name = "Sales", description = "Sale transaction endpoints"),
        (name = "Sale items", description = "Sale line-item endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
