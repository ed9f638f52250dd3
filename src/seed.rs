// src/seed.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{error::AppError, models::role::Role};

/// Inserts any missing row of the fixed role set. Existing rows are left untouched.
/// Returns how many rows were created.
pub async fn ensure_roles(pool: &PgPool) -> Result<u64, AppError> {
    let mut created = 0;

    for role in Role::ALL {
        let result = sqlx::query(
            r#"
            INSERT INTO roles (id, code, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(role.code())
        .bind(role.name())
        .execute(pool)
        .await?;

        created += result.rows_affected();
    }

    if created > 0 {
        tracing::info!("Seeded {} role(s)", created);
    }
    Ok(created)
}
