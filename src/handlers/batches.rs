// src/handlers/batches.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::{
        batch::{
            AddBatchMemberRequest, AddBatchMemberResponse, Batch, BatchListItem, BatchMember,
            CreateBatchRequest, CreateBatchResponse,
        },
        role::{ANY_MEMBER, MANAGERS},
    },
    services::{
        access::{self, RoleRegistry},
        auth,
    },
    utils::jwt::CurrentUser,
};

/// Creates a batch. Names are unique per organization (409 otherwise).
/// Admin or teacher.
pub async fn create_batch(
    State(pool): State<PgPool>,
    State(roles): State<Arc<RoleRegistry>>,
    Extension(user): Extension<CurrentUser>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    access::require_org_role(&mut tx, &roles, user.id, org_id, MANAGERS).await?;

    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let batch = sqlx::query_as::<_, Batch>(
        r#"
        INSERT INTO batches (id, organization_id, name)
        VALUES ($1, $2, $3)
        RETURNING id, organization_id, name, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(payload.name.trim())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Batch name already exists".to_string())
        } else {
            tracing::error!("Failed to create batch: {:?}", e);
            AppError::from(e)
        }
    })?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBatchResponse { batch_id: batch.id }),
    ))
}

/// Lists the organization's batches by name. Any member.
pub async fn list_batches(
    State(pool): State<PgPool>,
    State(roles): State<Arc<RoleRegistry>>,
    Extension(user): Extension<CurrentUser>,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    access::require_org_role(&mut conn, &roles, user.id, org_id, ANY_MEMBER).await?;

    let items = sqlx::query_as::<_, BatchListItem>(
        "SELECT id, name FROM batches WHERE organization_id = $1 ORDER BY name",
    )
    .bind(org_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Json(serde_json::json!({ "items": items })))
}

/// Adds an existing organization member to a batch. Idempotent.
/// Admin or teacher.
pub async fn add_batch_member(
    State(pool): State<PgPool>,
    State(roles): State<Arc<RoleRegistry>>,
    Extension(user): Extension<CurrentUser>,
    Path((org_id, batch_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AddBatchMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    access::require_org_role(&mut tx, &roles, user.id, org_id, MANAGERS).await?;

    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let batch = access::find_batch(&mut tx, org_id, batch_id).await?;

    let member = auth::find_user_by_email(&mut tx, &payload.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if access::resolve_org_role(&mut tx, &roles, member.id, org_id)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest("User is not in org".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO batch_members (id, batch_id, user_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (batch_id, user_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(batch.id)
    .bind(member.id)
    .execute(&mut *tx)
    .await?;

    let batch_member = sqlx::query_as::<_, BatchMember>(
        "SELECT id, batch_id, user_id, created_at FROM batch_members WHERE batch_id = $1 AND user_id = $2",
    )
    .bind(batch.id)
    .bind(member.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(AddBatchMemberResponse {
        batch_member_id: batch_member.id,
        user_id: member.id,
    }))
}
