use kasir_api::{config::AppConfig, db::create_pool, services::auth_service::hash_password};

// Bootstrap the first administrator account so /api/auth/register (which is
// administrator-only) can be reached at all.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;

    let username = std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

    let password_hash = hash_password(&password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let row: Option<(i32,)> = sqlx::query_as(
        r#"
        INSERT INTO users (username, password_hash, role)
        VALUES ($1, $2, 'administrator')
        ON CONFLICT (username) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(username.as_str())
    .bind(password_hash)
    .fetch_optional(&pool)
    .await?;

    match row {
        Some((id,)) => println!("Administrator '{username}' created with id {id}"),
        None => println!("Administrator '{username}' already exists, nothing to do"),
    }
    println!("Change the password after the first login.");

    Ok(())
}
