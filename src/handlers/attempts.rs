// src/handlers/attempts.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::attempt::{AnswerUpsertRequest, AttemptStartResponse},
    services::attempt,
    utils::jwt::CurrentUser,
};

/// Starts (or resumes) the caller's attempt on a test.
pub async fn start_attempt(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Path((org_id, test_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let started = attempt::start_attempt(&mut tx, org_id, test_id, user.id).await?;

    tx.commit().await?;

    Ok(Json(AttemptStartResponse {
        attempt_id: started.id,
    }))
}

/// Saves the caller's selection for one question of an open attempt.
pub async fn upsert_answer(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Path((org_id, attempt_id, question_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<AnswerUpsertRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    attempt::upsert_answer(
        &mut tx,
        org_id,
        attempt_id,
        question_id,
        payload.selected_option_id,
        user.id,
    )
    .await?;

    tx.commit().await?;

    Ok(Json(json!({ "status": "ok" })))
}

/// Grades the caller's attempt and returns `{score, total}`.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(user): Extension<CurrentUser>,
    Path((org_id, attempt_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let score = attempt::submit_attempt(&mut tx, org_id, attempt_id, user.id).await?;

    tx.commit().await?;

    Ok(Json(score))
}
