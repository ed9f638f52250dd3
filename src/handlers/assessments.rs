// src/handlers/assessments.rs

use std::{collections::HashMap, sync::Arc};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::{
        assessment::{
            CreateQuestionRequest, CreateQuestionResponse, CreateTestRequest, CreateTestResponse,
            PublicOption, PublicQuestion, Question, Test, TestListItem,
        },
        role::{ANY_MEMBER, MANAGERS, Role},
    },
    services::{
        access::{self, RoleRegistry},
        attempt::find_test,
    },
    utils::{html::clean_html, jwt::CurrentUser},
};

/// Creates a test for one of the organization's batches.
/// Admin or teacher.
pub async fn create_test(
    State(pool): State<PgPool>,
    State(roles): State<Arc<RoleRegistry>>,
    Extension(user): Extension<CurrentUser>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    access::require_org_role(&mut tx, &roles, user.id, org_id, MANAGERS).await?;

    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if !payload.window_is_ordered() {
        return Err(AppError::BadRequest(
            "starts_at must be before ends_at".to_string(),
        ));
    }

    let batch = access::find_batch(&mut tx, org_id, payload.batch_id).await?;

    let test = sqlx::query_as::<_, Test>(
        r#"
        INSERT INTO tests (id, organization_id, batch_id, title, starts_at, ends_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, organization_id, batch_id, title, starts_at, ends_at, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(batch.id)
    .bind(clean_html(&payload.title))
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("Test {} created in batch {}", test.id, batch.id);

    Ok((
        StatusCode::CREATED,
        Json(CreateTestResponse { test_id: test.id }),
    ))
}

/// Lists the organization's tests, newest first. Any member.
pub async fn list_tests(
    State(pool): State<PgPool>,
    State(roles): State<Arc<RoleRegistry>>,
    Extension(user): Extension<CurrentUser>,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    access::require_org_role(&mut conn, &roles, user.id, org_id, ANY_MEMBER).await?;

    let items = sqlx::query_as::<_, TestListItem>(
        r#"
        SELECT id, title, batch_id, starts_at, ends_at
        FROM tests
        WHERE organization_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(org_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Json(serde_json::json!({ "items": items })))
}

/// Adds a multiple-choice question with its options.
///
/// Exactly the option at `correct_position` is marked correct; this is the
/// only place the one-correct-option rule is enforced.
/// Admin or teacher.
pub async fn add_question(
    State(pool): State<PgPool>,
    State(roles): State<Arc<RoleRegistry>>,
    Extension(user): Extension<CurrentUser>,
    Path((org_id, test_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    access::require_org_role(&mut tx, &roles, user.id, org_id, MANAGERS).await?;

    let test = find_test(&mut tx, org_id, test_id).await?;

    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if !payload.has_correct_option() {
        return Err(AppError::BadRequest("Invalid correct_position".to_string()));
    }

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions (id, test_id, prompt, position)
        VALUES ($1, $2, $3, $4)
        RETURNING id, test_id, prompt, position, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(test.id)
    .bind(clean_html(&payload.prompt))
    .bind(payload.position)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!(
                "Question position {} already taken",
                payload.position
            ))
        } else {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::from(e)
        }
    })?;

    let mut query_builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO question_options (id, question_id, text, position, is_correct) ",
    );
    query_builder.push_values(&payload.options, |mut row, option| {
        row.push_bind(Uuid::new_v4())
            .push_bind(question.id)
            .push_bind(clean_html(&option.text))
            .push_bind(option.position)
            .push_bind(option.position == payload.correct_position);
    });
    query_builder.build().execute(&mut *tx).await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateQuestionResponse {
            question_id: question.id,
        }),
    ))
}

/// Questions of a test in position order, without the answer key.
/// Any member; students must also belong to the test's batch.
pub async fn list_questions(
    State(pool): State<PgPool>,
    State(roles): State<Arc<RoleRegistry>>,
    Extension(user): Extension<CurrentUser>,
    Path((org_id, test_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let membership =
        access::require_org_role(&mut conn, &roles, user.id, org_id, ANY_MEMBER).await?;

    let test = find_test(&mut conn, org_id, test_id).await?;

    if membership.role == Role::Student {
        access::require_batch_membership(&mut conn, user.id, org_id, test.batch_id).await?;
    }

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, test_id, prompt, position, created_at
        FROM questions
        WHERE test_id = $1
        ORDER BY position
        "#,
    )
    .bind(test.id)
    .fetch_all(&mut *conn)
    .await?;

    let options = sqlx::query_as::<_, PublicOption>(
        r#"
        SELECT o.id, o.question_id, o.text, o.position
        FROM question_options o
        JOIN questions q ON q.id = o.question_id
        WHERE q.test_id = $1
        ORDER BY o.position
        "#,
    )
    .bind(test.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_question: HashMap<Uuid, Vec<PublicOption>> = HashMap::new();
    for option in options {
        by_question.entry(option.question_id).or_default().push(option);
    }

    let paper: Vec<PublicQuestion> = questions
        .into_iter()
        .map(|q| PublicQuestion {
            options: by_question.remove(&q.id).unwrap_or_default(),
            id: q.id,
            prompt: q.prompt,
            position: q.position,
        })
        .collect();

    Ok(Json(paper))
}
