// src/services/access.rs

//! Role and membership checks for organization- and batch-scoped operations.
//!
//! Checks are evaluated against the database on every call; nothing here
//! caches membership across requests. The only shared state is the
//! `RoleRegistry`, loaded once at startup.

use std::collections::HashMap;

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        batch::{Batch, BatchMember},
        organization::{Membership, OrgMembership},
        role::{Role, RoleRow},
    },
};

/// Immutable mapping between role codes and the ids of their seeded rows.
#[derive(Debug, Default, Clone)]
pub struct RoleRegistry {
    ids: HashMap<Role, Uuid>,
    roles: HashMap<Uuid, Role>,
}

impl RoleRegistry {
    pub fn from_rows(rows: impl IntoIterator<Item = RoleRow>) -> Self {
        let mut registry = Self::default();
        for row in rows {
            match row.code.parse::<Role>() {
                Ok(role) => {
                    registry.ids.insert(role, row.id);
                    registry.roles.insert(row.id, role);
                }
                Err(_) => tracing::warn!("Ignoring unknown role code '{}'", row.code),
            }
        }
        registry
    }

    /// Reads the seeded `roles` table. Never creates rows.
    pub async fn load(conn: &mut PgConnection) -> Result<Self, AppError> {
        let rows = sqlx::query_as::<_, RoleRow>("SELECT id, code, name FROM roles")
            .fetch_all(&mut *conn)
            .await?;

        Ok(Self::from_rows(rows))
    }

    /// Id of the seeded row for `role`. A missing row is a deployment fault.
    pub fn role_id(&self, role: Role) -> Result<Uuid, AppError> {
        self.ids.get(&role).copied().ok_or_else(|| {
            AppError::InternalServerError(format!("Role '{}' not found. Run seed.", role))
        })
    }

    /// Role referenced by a membership's `role_id`.
    pub fn role_for_id(&self, role_id: Uuid) -> Result<Role, AppError> {
        self.roles.get(&role_id).copied().ok_or_else(|| {
            AppError::InternalServerError(format!("Role id {} not found. Run seed.", role_id))
        })
    }

    /// Roles with no seeded row.
    pub fn missing(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| !self.ids.contains_key(role))
            .collect()
    }
}

pub fn role_allowed(role: Role, allowed: &[Role]) -> bool {
    allowed.contains(&role)
}

/// The caller's membership in `org_id`, if any, with its role resolved.
pub async fn resolve_org_role(
    conn: &mut PgConnection,
    roles: &RoleRegistry,
    user_id: Uuid,
    org_id: Uuid,
) -> Result<Option<OrgMembership>, AppError> {
    let membership = sqlx::query_as::<_, Membership>(
        r#"
        SELECT id, organization_id, user_id, role_id, created_at
        FROM memberships
        WHERE organization_id = $1 AND user_id = $2
        "#,
    )
    .bind(org_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    match membership {
        Some(membership) => {
            let role = roles.role_for_id(membership.role_id)?;
            Ok(Some(OrgMembership { membership, role }))
        }
        None => Ok(None),
    }
}

/// Fails with `Forbidden` unless the user is a member of `org_id` with one of `allowed`.
pub async fn require_org_role(
    conn: &mut PgConnection,
    roles: &RoleRegistry,
    user_id: Uuid,
    org_id: Uuid,
    allowed: &[Role],
) -> Result<OrgMembership, AppError> {
    let membership = resolve_org_role(conn, roles, user_id, org_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Forbidden".to_string()))?;

    if !role_allowed(membership.role, allowed) {
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }

    Ok(membership)
}

/// Loads a batch, reporting batches of other organizations as missing.
pub async fn find_batch(
    conn: &mut PgConnection,
    org_id: Uuid,
    batch_id: Uuid,
) -> Result<Batch, AppError> {
    let batch = sqlx::query_as::<_, Batch>(
        "SELECT id, organization_id, name, created_at FROM batches WHERE id = $1",
    )
    .bind(batch_id)
    .fetch_optional(&mut *conn)
    .await?;

    match batch {
        Some(batch) if batch.organization_id == org_id => Ok(batch),
        _ => Err(AppError::NotFound("Batch not found".to_string())),
    }
}

/// Gate for taking a batch's tests.
///
/// `NotFound` if the batch is absent or in another organization,
/// `Forbidden` if the user is not a member of it.
pub async fn require_batch_membership(
    conn: &mut PgConnection,
    user_id: Uuid,
    org_id: Uuid,
    batch_id: Uuid,
) -> Result<BatchMember, AppError> {
    let batch = find_batch(conn, org_id, batch_id).await?;

    sqlx::query_as::<_, BatchMember>(
        r#"
        SELECT id, batch_id, user_id, created_at
        FROM batch_members
        WHERE batch_id = $1 AND user_id = $2
        "#,
    )
    .bind(batch.id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::Forbidden("Not in batch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::{ADMIN_ONLY, ANY_MEMBER, MANAGERS};

    fn seeded() -> (RoleRegistry, Vec<RoleRow>) {
        let rows: Vec<RoleRow> = Role::ALL
            .into_iter()
            .map(|role| RoleRow {
                id: Uuid::new_v4(),
                code: role.code().to_string(),
                name: role.name().to_string(),
            })
            .collect();
        (RoleRegistry::from_rows(rows.clone()), rows)
    }

    #[test]
    fn registry_maps_both_ways() {
        let (registry, rows) = seeded();
        for row in rows {
            let role: Role = row.code.parse().unwrap();
            assert_eq!(registry.role_id(role).unwrap(), row.id);
            assert_eq!(registry.role_for_id(row.id).unwrap(), role);
        }
        assert!(registry.missing().is_empty());
    }

    #[test]
    fn missing_role_is_internal_error() {
        let registry = RoleRegistry::from_rows(vec![RoleRow {
            id: Uuid::new_v4(),
            code: "admin".into(),
            name: "Admin".into(),
        }]);

        let err = registry.role_id(Role::Student).unwrap_err();
        assert!(matches!(err, AppError::InternalServerError(_)));
        assert!(matches!(
            registry.role_for_id(Uuid::new_v4()),
            Err(AppError::InternalServerError(_))
        ));
        assert_eq!(registry.missing(), vec![Role::Teacher, Role::Student]);
    }

    #[test]
    fn unknown_codes_are_ignored() {
        let registry = RoleRegistry::from_rows(vec![RoleRow {
            id: Uuid::new_v4(),
            code: "owner".into(),
            name: "Owner".into(),
        }]);
        assert_eq!(registry.missing().len(), 3);
    }

    #[test]
    fn student_is_limited_to_read_sets() {
        assert!(!role_allowed(Role::Student, MANAGERS));
        assert!(!role_allowed(Role::Student, ADMIN_ONLY));
        assert!(role_allowed(Role::Student, ANY_MEMBER));
        assert!(role_allowed(Role::Teacher, MANAGERS));
        assert!(!role_allowed(Role::Teacher, ADMIN_ONLY));
        assert!(role_allowed(Role::Admin, ADMIN_ONLY));
    }
}
