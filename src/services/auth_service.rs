use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::auth::{
        Claims, LoginRequest, LoginResponse, LogoutRequest, RefreshClaims, RefreshRequest,
        RegisterRequest, TokenPair, UpdateUserRequest, UserList, UserSummary,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_STAFF, ensure_admin},
    models::User,
    response::{ApiResponse, Meta},
};

/// Register a new account. Only administrators can create users; the role
/// defaults to staff.
pub async fn register_user(
    pool: &DbPool,
    admin: &AuthUser,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    ensure_admin(admin)?;

    let username = payload.username.trim().to_string();
    if username.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".into(),
        ));
    }
    let role = payload.role.unwrap_or_else(|| ROLE_STAFF.to_string());
    validate_role(&role)?;

    let exist: Option<(i32,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(username.as_str())
        .fetch_optional(pool)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Username already exists".into()));
    }

    let password_hash = hash_password(&payload.password)?;

    let user: User = sqlx::query_as(
        "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(username.as_str())
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(admin.user_id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id, "role": user.role })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let tokens = issue_tokens(pool, &user).await?;
    Ok(ApiResponse::success(
        "User registered",
        LoginResponse {
            tokens,
            user: user_summary(&user),
        },
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    pool: &DbPool,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let username = payload.username.trim();
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    // One message for both failure modes; do not reveal which was wrong.
    let user = match user {
        Some(u) => u,
        None => {
            return Err(AppError::Unauthorized(
                "Invalid username or password".into(),
            ));
        }
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthorized(
            "Invalid username or password".into(),
        ));
    }

    let tokens = issue_tokens(pool, &user).await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            tokens,
            user: user_summary(&user),
        },
        Some(Meta::empty()),
    ))
}

/// Exchange a refresh token for a fresh pair. The presented token must both
/// verify and still exist in the store; it is rotated on use.
pub async fn refresh_session(
    pool: &DbPool,
    payload: RefreshRequest,
) -> AppResult<ApiResponse<TokenPair>> {
    let secret = std::env::var("JWT_REFRESH_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_REFRESH_SECRET is not set")))?;

    let decoded = decode::<RefreshClaims>(
        &payload.refresh_token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired refresh token".into()))?;

    let stored: Option<(i32,)> = sqlx::query_as("SELECT id FROM refresh_tokens WHERE token = $1")
        .bind(payload.refresh_token.as_str())
        .fetch_optional(pool)
        .await?;
    if stored.is_none() {
        return Err(AppError::Unauthorized("Refresh token is not active".into()));
    }

    let user_id = decoded
        .claims
        .sub
        .parse::<i32>()
        .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized("User no longer exists".into())),
    };

    sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
        .bind(payload.refresh_token.as_str())
        .execute(pool)
        .await?;

    let tokens = issue_tokens(pool, &user).await?;
    Ok(ApiResponse::success(
        "Token refreshed",
        tokens,
        Some(Meta::empty()),
    ))
}

/// Invalidate a refresh token. Succeeds whether or not the token was
/// active, so callers cannot probe token validity here.
pub async fn logout_user(
    pool: &DbPool,
    payload: LogoutRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
        .bind(payload.refresh_token.as_str())
        .execute(pool)
        .await?;

    Ok(ApiResponse::success(
        "Logged out",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_users(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let items: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::empty()),
    ))
}

pub async fn get_user(pool: &DbPool, user: &AuthUser, id: i32) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let found: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    match found {
        Some(u) => Ok(ApiResponse::success("User", u, None)),
        None => Err(AppError::NotFound("User")),
    }
}

pub async fn update_user(
    pool: &DbPool,
    user: &AuthUser,
    id: i32,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;

    if payload.username.is_none() && payload.password.is_none() && payload.role.is_none() {
        return Err(AppError::BadRequest(
            "At least one field is required to update".into(),
        ));
    }

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound("User")),
    };

    let username = match payload.username {
        Some(username) => {
            let username = username.trim().to_string();
            if username.is_empty() {
                return Err(AppError::BadRequest(
                    "Username must be a non-empty string".into(),
                ));
            }
            let taken: Option<(i32,)> =
                sqlx::query_as("SELECT id FROM users WHERE username = $1 AND id <> $2")
                    .bind(username.as_str())
                    .bind(id)
                    .fetch_optional(pool)
                    .await?;
            if taken.is_some() {
                return Err(AppError::Conflict("Username already exists".into()));
            }
            username
        }
        None => existing.username,
    };

    let password_hash = match payload.password {
        Some(password) => hash_password(&password)?,
        None => existing.password_hash,
    };

    let role = match payload.role {
        Some(role) => {
            validate_role(&role)?;
            role
        }
        None => existing.role,
    };

    let updated: User = sqlx::query_as(
        r#"
        UPDATE users
        SET username = $2, password_hash = $3, role = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "user_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": updated.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User updated",
        updated,
        Some(Meta::empty()),
    ))
}

pub async fn delete_user(
    pool: &DbPool,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if user.user_id == id {
        return Err(AppError::BadRequest(
            "Cannot delete your own account".into(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User"));
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "user_delete",
        Some("users"),
        Some(serde_json::json!({ "user_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn validate_role(role: &str) -> AppResult<()> {
    if role != ROLE_ADMIN && role != ROLE_STAFF {
        return Err(AppError::BadRequest(
            "Invalid role. Role must be 'administrator' or 'staff'".into(),
        ));
    }
    Ok(())
}

/// Sign an access/refresh pair and persist the refresh token.
async fn issue_tokens(pool: &DbPool, user: &User) -> AppResult<TokenPair> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;
    let refresh_secret = std::env::var("JWT_REFRESH_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_REFRESH_SECRET is not set")))?;

    let access_exp = Utc::now()
        .checked_add_signed(Duration::hours(1))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;
    let refresh_exp = Utc::now()
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: access_exp.timestamp() as usize,
    };
    let access_token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    let refresh_claims = RefreshClaims {
        sub: user.id.to_string(),
        exp: refresh_exp.timestamp() as usize,
    };
    let refresh_token = encode(
        &Header::default(),
        &refresh_claims,
        &EncodingKey::from_secret(refresh_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    sqlx::query("INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)")
        .bind(user.id)
        .bind(refresh_token.as_str())
        .bind(refresh_exp)
        .execute(pool)
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

fn user_summary(user: &User) -> UserSummary {
    UserSummary {
        id: user.id,
        username: user.username.clone(),
        role: user.role.clone(),
    }
}
