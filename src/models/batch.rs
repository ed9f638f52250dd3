// src/models/batch.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'batches' table. Name is unique within an organization.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Batch {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'batch_members' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BatchMember {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub user_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateBatchResponse {
    pub batch_id: Uuid,
}

#[derive(Debug, Serialize, FromRow)]
pub struct BatchListItem {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddBatchMemberRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AddBatchMemberResponse {
    pub batch_member_id: Uuid,
    pub user_id: Uuid,
}
