// src/services/auth.rs

//! Identity issuance and verification on top of the token and hash primitives.
//!
//! Every operation takes the caller's connection (usually a request-scoped
//! transaction) and never commits on its own.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    models::{refresh_token::RefreshToken, user::TokenResponse, user::User},
    utils::{
        hash::{hash_password, hash_token, verify_password},
        jwt::{Claims, TokenType, decode_token, issue_access_token, issue_refresh_token},
    },
};

fn invalid_credentials() -> AppError {
    AppError::Unauthenticated("Invalid credentials".to_string())
}

fn invalid_token() -> AppError {
    AppError::Unauthenticated("Invalid token".to_string())
}

fn invalid_refresh_token() -> AppError {
    AppError::Unauthenticated("Invalid refresh token".to_string())
}

/// Parses the `sub` claim as a user id.
fn subject(claims: &Claims) -> Result<Uuid, AppError> {
    Uuid::parse_str(&claims.sub).map_err(|_| invalid_token())
}

pub async fn find_user_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, hashed_password, created_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(user)
}

pub async fn find_user_by_id(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, hashed_password, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(user)
}

/// Inserts a user with an Argon2-hashed password. Duplicate email -> `Conflict`.
pub async fn create_user(
    conn: &mut PgConnection,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let hashed_password = hash_password(password)?;

    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, hashed_password)
        VALUES ($1, $2, $3)
        RETURNING id, email, hashed_password, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(hashed_password)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Email already registered".to_string())
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::from(e)
        }
    })
}

/// Persists the digest of a freshly issued refresh token.
pub async fn store_refresh_token(
    conn: &mut PgConnection,
    user_id: Uuid,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<RefreshToken, AppError> {
    let row = sqlx::query_as::<_, RefreshToken>(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, token_hash, expires_at, revoked_at, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(hash_token(token))
    .bind(expires_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

/// Looks a raw refresh token up by its digest.
pub async fn find_refresh_token(
    conn: &mut PgConnection,
    token: &str,
) -> Result<Option<RefreshToken>, AppError> {
    let row = sqlx::query_as::<_, RefreshToken>(
        r#"
        SELECT id, user_id, token_hash, expires_at, revoked_at, created_at
        FROM refresh_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(hash_token(token))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

/// Issues an access token plus a stored refresh token for `user_id`.
pub async fn issue_token_pair(
    conn: &mut PgConnection,
    config: &Config,
    user_id: Uuid,
) -> Result<TokenResponse, AppError> {
    let access = issue_access_token(user_id, config.jwt_access_minutes, &config.jwt_secret)?;
    let (refresh, expires_at) =
        issue_refresh_token(user_id, config.jwt_refresh_days, &config.jwt_secret)?;

    store_refresh_token(conn, user_id, &refresh, expires_at).await?;

    Ok(TokenResponse::bearer(access, refresh))
}

/// Creates the account and signs the new user in.
pub async fn register(
    conn: &mut PgConnection,
    config: &Config,
    email: &str,
    password: &str,
) -> Result<TokenResponse, AppError> {
    if find_user_by_email(conn, email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let user = create_user(conn, email, password).await?;
    tracing::info!("Registered user {}", user.id);

    issue_token_pair(conn, config, user.id).await
}

/// Verifies credentials. Unknown email and wrong password fail identically.
pub async fn login(
    conn: &mut PgConnection,
    config: &Config,
    email: &str,
    password: &str,
) -> Result<TokenResponse, AppError> {
    let user = find_user_by_email(conn, email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(password, &user.hashed_password)? {
        return Err(invalid_credentials());
    }

    issue_token_pair(conn, config, user.id).await
}

/// Mints a new access token from a stored, unrevoked, unexpired refresh token.
///
/// The presented refresh token is returned unchanged (no rotation).
pub async fn refresh(
    conn: &mut PgConnection,
    config: &Config,
    refresh_token: &str,
) -> Result<TokenResponse, AppError> {
    let claims = decode_token(refresh_token, &config.jwt_secret)
        .map_err(|_| invalid_refresh_token())?;

    if claims.token_type != TokenType::Refresh {
        return Err(invalid_refresh_token());
    }
    let user_id = subject(&claims).map_err(|_| invalid_refresh_token())?;

    let stored = find_refresh_token(conn, refresh_token)
        .await?
        .ok_or_else(invalid_refresh_token)?;

    if stored.user_id != user_id || !stored.is_active(Utc::now()) {
        tracing::debug!("Refresh token {} rejected (revoked or expired)", stored.id);
        return Err(invalid_refresh_token());
    }

    let access = issue_access_token(user_id, config.jwt_access_minutes, &config.jwt_secret)?;

    Ok(TokenResponse::bearer(access, refresh_token.to_string()))
}

/// Stamps `revoked_at` on the stored token. Returns whether a live row was revoked.
pub async fn revoke(conn: &mut PgConnection, refresh_token: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
    )
    .bind(hash_token(refresh_token))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Validates an access token without touching the database and returns its subject.
pub fn access_subject(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let claims = decode_token(token, secret)?;
    if claims.token_type != TokenType::Access {
        return Err(invalid_token());
    }
    subject(&claims)
}

/// Resolves a token subject to an existing user; an unknown subject is unauthenticated.
pub async fn load_principal(conn: &mut PgConnection, user_id: Uuid) -> Result<User, AppError> {
    find_user_by_id(conn, user_id)
        .await?
        .ok_or_else(invalid_token)
}
