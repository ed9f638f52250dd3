// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, RefreshRequest, RegisterRequest},
    services::auth,
};

/// Registers a new user and signs them in.
///
/// Returns 201 Created with an access/refresh token pair. Duplicate email -> 409.
pub async fn register(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut tx = pool.begin().await?;
    let tokens = auth::register(&mut tx, &config, &payload.email, &payload.password).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(tokens)))
}

/// Authenticates a user and returns a fresh token pair.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut tx = pool.begin().await?;
    let tokens = auth::login(&mut tx, &config, &payload.email, &payload.password).await?;
    tx.commit().await?;

    Ok(Json(tokens))
}

/// Exchanges a live refresh token for a new access token.
pub async fn refresh(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Unauthenticated(e.to_string()))?;

    let mut conn = pool.acquire().await?;
    let tokens = auth::refresh(&mut conn, &config, &payload.refresh_token).await?;

    Ok(Json(tokens))
}

/// Revokes a refresh token. Always 204, whether or not the token was known.
pub async fn logout(
    State(pool): State<PgPool>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    if auth::revoke(&mut conn, &payload.refresh_token).await? {
        tracing::info!("Refresh token revoked");
    }

    Ok(StatusCode::NO_CONTENT)
}
