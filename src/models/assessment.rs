// src/models/assessment.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'tests' table.
/// A missing bound of the time window means unbounded on that side.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Test {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub batch_id: Uuid,
    pub title: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'questions' table. Position is unique per test.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: Uuid,
    pub test_id: Uuid,
    pub prompt: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'question_options' table. Position is unique per question.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub position: i32,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
}

/// DTO for creating a test inside a batch.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTestRequest {
    pub batch_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl CreateTestRequest {
    /// False only when both bounds are present and do not form a window.
    pub fn window_is_ordered(&self) -> bool {
        match (self.starts_at, self.ends_at) {
            (Some(start), Some(end)) => start < end,
            _ => true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTestResponse {
    pub test_id: Uuid,
}

#[derive(Debug, Serialize, FromRow)]
pub struct TestListItem {
    pub id: Uuid,
    pub title: String,
    pub batch_id: Uuid,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptionInput {
    pub text: String,
    pub position: i32,
}

/// DTO for authoring a question. Exactly the option at `correct_position`
/// is stored as correct.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 4000))]
    pub prompt: String,
    #[validate(range(min = 1))]
    pub position: i32,
    #[validate(custom(function = validate_options))]
    pub options: Vec<OptionInput>,
    pub correct_position: i32,
}

impl CreateQuestionRequest {
    pub fn has_correct_option(&self) -> bool {
        self.options
            .iter()
            .any(|o| o.position == self.correct_position)
    }
}

fn validate_options(options: &[OptionInput]) -> Result<(), validator::ValidationError> {
    if options.is_empty() {
        return Err(validator::ValidationError::new("options_cannot_be_empty"));
    }
    let mut positions = HashSet::new();
    for opt in options {
        if opt.text.is_empty() || opt.text.len() > 1000 {
            return Err(validator::ValidationError::new("option_text_length"));
        }
        if opt.position < 1 {
            return Err(validator::ValidationError::new("option_position_invalid"));
        }
        if !positions.insert(opt.position) {
            return Err(validator::ValidationError::new("option_position_duplicated"));
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CreateQuestionResponse {
    pub question_id: Uuid,
}

/// Option as shown to test takers (no `is_correct`).
#[derive(Debug, Serialize, FromRow)]
pub struct PublicOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub position: i32,
}

/// Question as shown to test takers.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub prompt: String,
    pub position: i32,
    pub options: Vec<PublicOption>,
}
