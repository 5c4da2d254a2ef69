use kasir_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::auth::{LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest},
    error::AppError,
    middleware::auth::AuthUser,
    services::auth_service,
};
use sea_orm::{ConnectionTrait, Statement};

// Login, register, refresh rotation and idempotent logout against a real
// database.
#[tokio::test]
async fn token_lifecycle_and_user_management() -> anyhow::Result<()> {
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

    if std::env::var("JWT_SECRET").is_err() {
        unsafe { std::env::set_var("JWT_SECRET", "test-secret") };
    }
    if std::env::var("JWT_REFRESH_SECRET").is_err() {
        unsafe { std::env::set_var("JWT_REFRESH_SECRET", "test-refresh-secret") };
    }

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE sale_items, sales, customers, products, refresh_tokens, users, audit_logs RESTART IDENTITY CASCADE",
    ))
    .await?;

    // Seed the first administrator directly; registration itself is
    // administrator-only.
    let password_hash = auth_service::hash_password("passwordkuat123")
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let (admin_id,): (i32,) = sqlx::query_as(
        "INSERT INTO users (username, password_hash, role) VALUES ('admin', $1, 'administrator') RETURNING id",
    )
    .bind(password_hash)
    .fetch_one(&pool)
    .await?;

    let login = auth_service::login_user(
        &pool,
        LoginRequest {
            username: "admin".into(),
            password: "passwordkuat123".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(login.user.role, "administrator");
    assert_eq!(login.user.id, admin_id);

    let wrong_password = auth_service::login_user(
        &pool,
        LoginRequest {
            username: "admin".into(),
            password: "nope".into(),
        },
    )
    .await;
    assert!(matches!(wrong_password, Err(AppError::Unauthorized(_))));

    let admin = AuthUser {
        user_id: admin_id,
        role: "administrator".into(),
    };
    let staff_auth = AuthUser {
        user_id: 999,
        role: "staff".into(),
    };

    // Only administrators can register accounts.
    let forbidden = auth_service::register_user(
        &pool,
        &staff_auth,
        RegisterRequest {
            username: "petugas1".into(),
            password: "password123".into(),
            role: None,
        },
    )
    .await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let registered = auth_service::register_user(
        &pool,
        &admin,
        RegisterRequest {
            username: "petugas1".into(),
            password: "password123".into(),
            role: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(registered.user.role, "staff");

    let duplicate = auth_service::register_user(
        &pool,
        &admin,
        RegisterRequest {
            username: "petugas1".into(),
            password: "password123".into(),
            role: None,
        },
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let invalid_role = auth_service::register_user(
        &pool,
        &admin,
        RegisterRequest {
            username: "petugas2".into(),
            password: "password123".into(),
            role: Some("superuser".into()),
        },
    )
    .await;
    assert!(matches!(invalid_role, Err(AppError::BadRequest(_))));

    // Refresh rotates: the old token is revoked as the new pair is issued.
    let first_refresh_token = registered.tokens.refresh_token.clone();
    let rotated = auth_service::refresh_session(
        &pool,
        RefreshRequest {
            refresh_token: first_refresh_token.clone(),
        },
    )
    .await?
    .data
    .unwrap();

    let replay = auth_service::refresh_session(
        &pool,
        RefreshRequest {
            refresh_token: first_refresh_token,
        },
    )
    .await;
    assert!(matches!(replay, Err(AppError::Unauthorized(_))));

    // Logout succeeds no matter how often it is repeated.
    auth_service::logout_user(
        &pool,
        LogoutRequest {
            refresh_token: rotated.refresh_token.clone(),
        },
    )
    .await?;
    auth_service::logout_user(
        &pool,
        LogoutRequest {
            refresh_token: rotated.refresh_token.clone(),
        },
    )
    .await?;

    let after_logout = auth_service::refresh_session(
        &pool,
        RefreshRequest {
            refresh_token: rotated.refresh_token,
        },
    )
    .await;
    assert!(matches!(after_logout, Err(AppError::Unauthorized(_))));

    // Administrators cannot delete themselves; deleting others works.
    let self_delete = auth_service::delete_user(&pool, &admin, admin_id).await;
    assert!(matches!(self_delete, Err(AppError::BadRequest(_))));

    auth_service::delete_user(&pool, &admin, registered.user.id).await?;
    let gone = auth_service::get_user(&pool, &admin, registered.user.id).await;
    assert!(matches!(gone, Err(AppError::NotFound("User"))));

    Ok(())
}
