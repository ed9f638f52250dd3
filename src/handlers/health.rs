use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::error::AppError;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Round-trips `SELECT 1` through the pool.
pub async fn health_db(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(Json(json!({ "status": "ok" })))
}
