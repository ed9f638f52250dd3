// src/services/attempt.rs

//! Test-taking lifecycle: NotStarted -> InProgress -> Submitted.
//!
//! Concurrency is delegated to the unique constraints on `attempts(test_id, user_id)`
//! and `attempt_answers(attempt_id, question_id)`; nothing here takes an
//! application-level lock.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use uuid::Uuid;

use crate::{
    error::{AppError, unique_constraint},
    models::{
        assessment::{Question, Test},
        attempt::{Attempt, AttemptAnswer, Score},
    },
    services::access,
};

/// Unique constraint guarding one attempt per user per test.
const ATTEMPT_PER_USER: &str = "uq_attempts_test_user";

/// An answer joined with the correctness of its selected option.
/// `is_correct` is `None` when the selection was cleared.
#[derive(Debug, Clone, FromRow)]
pub struct GradedAnswer {
    pub question_id: Uuid,
    pub is_correct: Option<bool>,
}

/// Loads a test, reporting tests of other organizations as missing.
pub async fn find_test(
    conn: &mut PgConnection,
    org_id: Uuid,
    test_id: Uuid,
) -> Result<Test, AppError> {
    let test = sqlx::query_as::<_, Test>(
        r#"
        SELECT id, organization_id, batch_id, title, starts_at, ends_at, created_at
        FROM tests
        WHERE id = $1
        "#,
    )
    .bind(test_id)
    .fetch_optional(&mut *conn)
    .await?;

    match test {
        Some(test) if test.organization_id == org_id => Ok(test),
        _ => Err(AppError::NotFound("Test not found".to_string())),
    }
}

/// Fails with `Forbidden` when `now` lies outside `[starts_at, ends_at]`.
pub fn check_window(test: &Test, now: DateTime<Utc>) -> Result<(), AppError> {
    if let Some(starts_at) = test.starts_at {
        if now < starts_at {
            return Err(AppError::Forbidden("Test not started".to_string()));
        }
    }
    if let Some(ends_at) = test.ends_at {
        if now > ends_at {
            return Err(AppError::Forbidden("Test ended".to_string()));
        }
    }
    Ok(())
}

/// Counts answers whose selected option is correct, restricted to `question_ids`.
pub fn calculate_score(question_ids: &[Uuid], answers: &[GradedAnswer]) -> Score {
    let questions: HashSet<Uuid> = question_ids.iter().copied().collect();

    let correct: HashSet<Uuid> = answers
        .iter()
        .filter(|a| a.is_correct == Some(true) && questions.contains(&a.question_id))
        .map(|a| a.question_id)
        .collect();

    Score {
        score: correct.len() as i64,
        total: questions.len() as i64,
    }
}

async fn find_attempt_for(
    conn: &mut PgConnection,
    test_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Attempt>, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(
        r#"
        SELECT id, test_id, user_id, submitted_at, score, created_at
        FROM attempts
        WHERE test_id = $1 AND user_id = $2
        "#,
    )
    .bind(test_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(attempt)
}

/// Loads and row-locks the caller's attempt together with its test.
///
/// Someone else's attempt is reported as `NotFound`, never `Forbidden`.
async fn find_owned_attempt(
    conn: &mut PgConnection,
    org_id: Uuid,
    attempt_id: Uuid,
    caller: Uuid,
) -> Result<(Attempt, Test), AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(
        r#"
        SELECT id, test_id, user_id, submitted_at, score, created_at
        FROM attempts
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(attempt_id)
    .fetch_optional(&mut *conn)
    .await?;

    let attempt = match attempt {
        Some(attempt) if attempt.user_id == caller => attempt,
        _ => return Err(AppError::NotFound("Attempt not found".to_string())),
    };

    let test = find_test(conn, org_id, attempt.test_id).await?;
    Ok((attempt, test))
}

/// Starts (or returns) the caller's single attempt at a test.
///
/// Guards: the test is in `org_id`, the caller belongs to the test's batch, and
/// the window is open. The insert runs inside a savepoint; if a concurrent
/// request already created the row, the unique violation is rolled back to the
/// savepoint and the existing attempt is returned as success.
pub async fn start_attempt(
    conn: &mut PgConnection,
    org_id: Uuid,
    test_id: Uuid,
    user_id: Uuid,
) -> Result<Attempt, AppError> {
    let test = find_test(conn, org_id, test_id).await?;

    access::require_batch_membership(conn, user_id, org_id, test.batch_id).await?;

    check_window(&test, Utc::now())?;

    let mut savepoint = conn.begin().await?;

    let inserted = sqlx::query_as::<_, Attempt>(
        r#"
        INSERT INTO attempts (id, test_id, user_id)
        VALUES ($1, $2, $3)
        RETURNING id, test_id, user_id, submitted_at, score, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(test.id)
    .bind(user_id)
    .fetch_one(&mut *savepoint)
    .await;

    match inserted {
        Ok(attempt) => {
            savepoint.commit().await?;
            tracing::info!("User {} started attempt {} on test {}", user_id, attempt.id, test.id);
            Ok(attempt)
        }
        Err(e) if unique_constraint(&e) == Some(ATTEMPT_PER_USER) => {
            savepoint.rollback().await?;
            tracing::debug!("Attempt for test {} by {} already exists", test.id, user_id);
            find_attempt_for(conn, test.id, user_id)
                .await?
                .ok_or_else(|| AppError::from(e))
        }
        Err(e) => Err(e.into()),
    }
}

/// Records (last write wins) the caller's selection for one question.
///
/// `option_id = None` clears the selection. The question must belong to the
/// attempt's test and the option to that question, otherwise `InvalidAnswer`.
pub async fn upsert_answer(
    conn: &mut PgConnection,
    org_id: Uuid,
    attempt_id: Uuid,
    question_id: Uuid,
    option_id: Option<Uuid>,
    caller: Uuid,
) -> Result<AttemptAnswer, AppError> {
    let (attempt, test) = find_owned_attempt(conn, org_id, attempt_id, caller).await?;

    if attempt.is_submitted() {
        return Err(AppError::Conflict("Attempt already submitted".to_string()));
    }

    let question = sqlx::query_as::<_, Question>(
        "SELECT id, test_id, prompt, position, created_at FROM questions WHERE id = $1",
    )
    .bind(question_id)
    .fetch_optional(&mut *conn)
    .await?;

    let question = match question {
        Some(q) if q.test_id == test.id => q,
        _ => {
            return Err(AppError::InvalidAnswer(
                "Question does not belong to this test".to_string(),
            ));
        }
    };

    if let Some(option_id) = option_id {
        let owner = sqlx::query_scalar::<_, Uuid>(
            "SELECT question_id FROM question_options WHERE id = $1",
        )
        .bind(option_id)
        .fetch_optional(&mut *conn)
        .await?;

        if owner != Some(question.id) {
            return Err(AppError::InvalidAnswer(
                "Option does not belong to this question".to_string(),
            ));
        }
    }

    let answer = sqlx::query_as::<_, AttemptAnswer>(
        r#"
        INSERT INTO attempt_answers (id, attempt_id, question_id, selected_option_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (attempt_id, question_id) DO UPDATE SET
            selected_option_id = EXCLUDED.selected_option_id,
            updated_at = NOW()
        RETURNING id, attempt_id, question_id, selected_option_id, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(attempt.id)
    .bind(question.id)
    .bind(option_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(answer)
}

/// Grades the attempt from current data and persists the score.
///
/// Calling it again recomputes and overwrites `score`; the first
/// `submitted_at` is kept.
pub async fn submit_attempt(
    conn: &mut PgConnection,
    org_id: Uuid,
    attempt_id: Uuid,
    caller: Uuid,
) -> Result<Score, AppError> {
    let (attempt, test) = find_owned_attempt(conn, org_id, attempt_id, caller).await?;

    let question_ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM questions WHERE test_id = $1")
        .bind(test.id)
        .fetch_all(&mut *conn)
        .await?;

    let answers = sqlx::query_as::<_, GradedAnswer>(
        r#"
        SELECT a.question_id, o.is_correct
        FROM attempt_answers a
        LEFT JOIN question_options o
            ON o.id = a.selected_option_id AND o.question_id = a.question_id
        WHERE a.attempt_id = $1
        "#,
    )
    .bind(attempt.id)
    .fetch_all(&mut *conn)
    .await?;

    let score = calculate_score(&question_ids, &answers);
    let stored_score =
        i32::try_from(score.score).map_err(|e| AppError::InternalServerError(e.to_string()))?;

    sqlx::query(
        r#"
        UPDATE attempts
        SET score = $1, submitted_at = COALESCE(submitted_at, NOW())
        WHERE id = $2
        "#,
    )
    .bind(stored_score)
    .bind(attempt.id)
    .execute(&mut *conn)
    .await?;

    if attempt.is_submitted() {
        tracing::info!("Attempt {} resubmitted, score recomputed", attempt.id);
    } else {
        tracing::info!("Attempt {} submitted: {}/{}", attempt.id, score.score, score.total);
    }

    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_with_window(
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Test {
        Test {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            title: "Algebra".into(),
            starts_at,
            ends_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unbounded_window_is_always_open() {
        let test = test_with_window(None, None);
        assert!(check_window(&test, Utc::now()).is_ok());
        assert!(check_window(&test, Utc::now() + Duration::days(3650)).is_ok());
    }

    #[test]
    fn before_start_is_forbidden() {
        let now = Utc::now();
        let test = test_with_window(Some(now + Duration::hours(1)), None);
        assert!(matches!(check_window(&test, now), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn after_end_is_forbidden() {
        let now = Utc::now();
        let test = test_with_window(None, Some(now - Duration::hours(1)));
        assert!(matches!(check_window(&test, now), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn bounds_are_inclusive() {
        let now = Utc::now();
        assert!(check_window(&test_with_window(Some(now), Some(now)), now).is_ok());
    }

    #[test]
    fn two_of_three_correct() {
        let q: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let answers = vec![
            GradedAnswer { question_id: q[0], is_correct: Some(true) },
            GradedAnswer { question_id: q[1], is_correct: Some(true) },
            GradedAnswer { question_id: q[2], is_correct: Some(false) },
        ];
        assert_eq!(calculate_score(&q, &answers), Score { score: 2, total: 3 });
    }

    #[test]
    fn blank_answers_score_nothing() {
        let q: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let answers = vec![
            GradedAnswer { question_id: q[0], is_correct: Some(true) },
            GradedAnswer { question_id: q[1], is_correct: Some(true) },
            GradedAnswer { question_id: q[2], is_correct: None },
        ];
        assert_eq!(calculate_score(&q, &answers), Score { score: 2, total: 3 });
    }

    #[test]
    fn answers_outside_the_test_are_ignored() {
        let q = vec![Uuid::new_v4()];
        let answers = vec![
            GradedAnswer { question_id: Uuid::new_v4(), is_correct: Some(true) },
            GradedAnswer { question_id: q[0], is_correct: Some(false) },
        ];
        assert_eq!(calculate_score(&q, &answers), Score { score: 0, total: 1 });
    }

    #[test]
    fn empty_test_scores_zero_of_zero() {
        assert_eq!(calculate_score(&[], &[]), Score { score: 0, total: 0 });
    }
}
