use kasir_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::sales::{CreateSaleRequest, SaleItemRequest},
    entity::products::ActiveModel as ProductActive,
    error::AppError,
    middleware::auth::AuthUser,
    services::sale_service,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, PaginatorTrait, Set, Statement};

// Two concurrent sales race for the last unit of stock: the row lock inside
// the transaction serializes them, so exactly one commits and the other is
// told the stock is gone.
#[tokio::test]
async fn concurrent_sales_cannot_oversell_the_last_unit() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE sale_items, sales, customers, products, refresh_tokens, users, audit_logs RESTART IDENTITY CASCADE",
    ))
    .await?;

    let state = AppState { pool, orm };

    let product = ProductActive {
        id: NotSet,
        name: Set("Last Unit".to_string()),
        price: Set(10_000),
        stock: Set(1),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let request = |product_id: i32| CreateSaleRequest {
        sale_date: None,
        customer_id: None,
        items: vec![SaleItemRequest {
            product_id,
            quantity: 1,
        }],
    };

    let first = {
        let state = state.clone();
        let payload = request(product.id);
        let user = AuthUser {
            user_id: 1,
            role: "staff".into(),
        };
        tokio::spawn(async move { sale_service::create_sale(&state, &user, payload).await })
    };
    let second = {
        let state = state.clone();
        let payload = request(product.id);
        let user = AuthUser {
            user_id: 2,
            role: "staff".into(),
        };
        tokio::spawn(async move { sale_service::create_sale(&state, &user, payload).await })
    };

    let outcomes = [first.await?, second.await?];

    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one sale may take the last unit");

    let loser = outcomes.into_iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser,
        Err(AppError::InsufficientStock {
            available: 0,
            requested: 1,
            ..
        })
    ));

    let remaining = kasir_api::entity::Products::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .expect("seeded product")
        .stock;
    assert_eq!(remaining, 0);

    let sales = kasir_api::entity::Sales::find().count(&state.orm).await?;
    assert_eq!(sales, 1);

    Ok(())
}
