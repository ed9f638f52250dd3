// src/handlers/orgs.rs

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
        organization::{
            AddMemberRequest, AddMemberResponse, CreateOrgRequest, CreateOrgResponse,
            MeInOrgResponse, Membership, Organization,
        },
        role::{ADMIN_ONLY, Role},
    },
    services::{
        access::{self, RoleRegistry},
        auth,
    },
    utils::jwt::CurrentUser,
};

/// Creates an organization and makes the caller its admin.
pub async fn create_org(
    State(pool): State<PgPool>,
    State(roles): State<Arc<RoleRegistry>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateOrgRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let admin_role = roles.role_id(Role::Admin)?;

    let mut tx = pool.begin().await?;

    let org = sqlx::query_as::<_, Organization>(
        r#"
        INSERT INTO organizations (id, name)
        VALUES ($1, $2)
        RETURNING id, name, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.name.trim())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Organization name already exists".to_string())
        } else {
            tracing::error!("Failed to create organization: {:?}", e);
            AppError::from(e)
        }
    })?;

    sqlx::query(
        "INSERT INTO memberships (id, organization_id, user_id, role_id) VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(org.id)
    .bind(user.id)
    .bind(admin_role)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("User {} created organization {}", user.id, org.id);

    Ok((
        StatusCode::CREATED,
        Json(CreateOrgResponse {
            organization_id: org.id,
        }),
    ))
}

/// Adds a member to the organization, creating the user account if needed.
/// An existing membership gets its role replaced.
/// Admin only.
pub async fn add_member(
    State(pool): State<PgPool>,
    State(roles): State<Arc<RoleRegistry>>,
    Extension(user): Extension<CurrentUser>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    access::require_org_role(&mut tx, &roles, user.id, org_id, ADMIN_ONLY).await?;

    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let org_exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM organizations WHERE id = $1")
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?;
    if org_exists.is_none() {
        return Err(AppError::NotFound("Organization not found".to_string()));
    }

    let role_id = roles.role_id(payload.role)?;

    let member = match auth::find_user_by_email(&mut tx, &payload.email).await? {
        Some(existing) => existing,
        None => {
            let password = payload.password.as_deref().ok_or_else(|| {
                AppError::BadRequest("Password required when creating a new user".to_string())
            })?;
            auth::create_user(&mut tx, &payload.email, password).await?
        }
    };

    let membership = sqlx::query_as::<_, Membership>(
        r#"
        INSERT INTO memberships (id, organization_id, user_id, role_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (organization_id, user_id) DO UPDATE SET role_id = EXCLUDED.role_id
        RETURNING id, organization_id, user_id, role_id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(member.id)
    .bind(role_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(
        "User {} is now '{}' in organization {}",
        member.id,
        payload.role,
        org_id
    );

    Ok(Json(AddMemberResponse {
        user_id: member.id,
        membership_id: membership.id,
    }))
}

/// The caller's role in the organization.
pub async fn me_in_org(
    State(pool): State<PgPool>,
    State(roles): State<Arc<RoleRegistry>>,
    Extension(user): Extension<CurrentUser>,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let membership = access::resolve_org_role(&mut conn, &roles, user.id, org_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Membership not found".to_string()))?;

    Ok(Json(MeInOrgResponse {
        user_id: user.id,
        organization_id: org_id,
        role: membership.role,
    }))
}
