//! Users and the departments they own.

use serde::{Deserialize, Serialize};

use crate::{Result, access::Role, validate::ValidationErrors};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:       i64,
  pub username: String,
  pub name:     String,
  /// The first role is the default active role.
  pub roles:    Vec<Role>,
}

impl User {
  pub fn has_role(&self, role: Role) -> bool { self.roles.contains(&role) }
}

/// A user account as seeded from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub username:      String,
  pub name:          String,
  /// PHC string produced by argon2.
  pub password_hash: String,
  pub roles:         Vec<Role>,
}

/// A user together with the stored password hash, for authentication only.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub user:          User,
  pub password_hash: String,
}

/// Departemen: an auditee organisational unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
  pub id:            i64,
  pub name:          String,
  /// The accountable auditee.
  pub owner_user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDepartment {
  pub name:          String,
  #[serde(default)]
  pub owner_user_id: Option<i64>,
}

impl NewDepartment {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require_text("name", &self.name);
    errors.into_result()
  }
}

/// Filter for listing departments.
#[derive(Debug, Clone, Default)]
pub struct DepartmentFilter {
  pub owner_user_id:   Option<i64>,
  /// Only departments this auditor is assigned to.
  pub auditor_user_id: Option<i64>,
  /// Restricts `auditor_user_id` to cycles of one year.
  pub year:            Option<i32>,
}
