// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Represents the 'attempts' table: at most one row per (test, user).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attempt {
    pub id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Attempt {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

/// Represents the 'attempt_answers' table: one row per (attempt, question).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttemptAnswer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub selected_option_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of grading: correct answers out of the test's question count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub score: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct AttemptStartResponse {
    pub attempt_id: Uuid,
}

/// `selected_option_id: null` clears the selection for that question.
#[derive(Debug, Deserialize)]
pub struct AnswerUpsertRequest {
    pub selected_option_id: Option<Uuid>,
}
