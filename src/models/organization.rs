// src/models/organization.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::role::Role;

/// Represents the 'organizations' table (a tenant).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'memberships' table: one role per (organization, user).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Membership {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A membership whose `role_id` has been resolved against the role registry.
#[derive(Debug, Clone)]
pub struct OrgMembership {
    pub membership: Membership,
    pub role: Role,
}

/// DTO for creating an organization.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrgRequest {
    #[validate(length(
        min = 2,
        max = 255,
        message = "Organization name length must be between 2 and 255 characters."
    ))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrgResponse {
    pub organization_id: Uuid,
}

/// DTO for adding (or re-roling) a member. `password` is required only
/// when no user with `email` exists yet.
#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    pub role: Role,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddMemberResponse {
    pub user_id: Uuid,
    pub membership_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MeInOrgResponse {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}
