// src/models/role.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// The closed set of roles a member can hold inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

/// Role set for organization administration (adding members).
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Role set for mutating operations: authoring batches, tests and questions.
pub const MANAGERS: &[Role] = &[Role::Admin, Role::Teacher];

/// Role set for read operations.
pub const ANY_MEMBER: &[Role] = &[Role::Admin, Role::Teacher, Role::Student];

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Teacher, Role::Student];

    /// Code stored in `roles.code`.
    pub fn code(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Human readable name seeded into `roles.name`.
    pub fn name(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Teacher => "Teacher",
            Role::Student => "Student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.code() == s)
            .ok_or_else(|| format!("Unknown role '{}'", s))
    }
}

/// Represents the 'roles' table, seeded once at startup.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoleRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.code().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn route_sets() {
        assert!(!MANAGERS.contains(&Role::Student));
        assert!(ANY_MEMBER.contains(&Role::Student));
        assert_eq!(ADMIN_ONLY, &[Role::Admin]);
    }

    #[test]
    fn serializes_as_code() {
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"teacher\"");
    }
}
