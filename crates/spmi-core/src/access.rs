//! Roles and the per-request authorization context.
//!
//! A user may hold several roles. Each request acts under exactly one
//! *active* role, chosen by the client or defaulting to the first granted
//! role. Admins and superadmins may act under any role and are never limited
//! to their assigned departments.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result, directory::Department, schedule::CycleDetail};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  SuperAdmin,
  Admin,
  Auditor,
  Auditee,
}

impl Role {
  pub fn is_admin(self) -> bool { matches!(self, Self::SuperAdmin | Self::Admin) }

  pub fn parse(value: &str) -> Result<Self> {
    value.parse().map_err(|_| Error::InvalidValue {
      kind:  "role",
      value: value.to_owned(),
    })
  }
}

/// The authenticated caller, resolved once per request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
  pub user_id:  i64,
  pub username: String,
  /// Granted roles in assignment order.
  pub roles:    Vec<Role>,
  pub active:   Role,
}

impl AuthContext {
  /// Resolve the active role.
  ///
  /// Non-admin users may only activate a role they hold. A user without any
  /// role cannot act at all.
  pub fn resolve(
    user_id: i64,
    username: String,
    roles: Vec<Role>,
    requested: Option<Role>,
  ) -> Result<Self> {
    let default = *roles
      .first()
      .ok_or_else(|| Error::Forbidden(format!("user {username} has no role")))?;

    let elevated = roles.iter().any(|r| r.is_admin());
    let active = match requested {
      None => default,
      Some(role) if elevated || roles.contains(&role) => role,
      Some(role) => {
        return Err(Error::Forbidden(format!("role {role} is not granted")));
      }
    };

    Ok(Self { user_id, username, roles, active })
  }

  /// Holds admin or superadmin, whatever the active role.
  pub fn is_elevated(&self) -> bool { self.roles.iter().any(|r| r.is_admin()) }

  pub fn require_admin(&self) -> Result<()> {
    if self.active.is_admin() {
      Ok(())
    } else {
      Err(Error::Forbidden("admin capability required".into()))
    }
  }

  /// Scoring and verification capability.
  pub fn require_auditor(&self) -> Result<()> {
    if self.active == Role::Auditor || self.active.is_admin() {
      Ok(())
    } else {
      Err(Error::Forbidden("auditor capability required".into()))
    }
  }

  /// CAR response capability. Admins reach it by activating `auditee`.
  pub fn require_auditee(&self) -> Result<()> {
    if self.active == Role::Auditee {
      Ok(())
    } else {
      Err(Error::Forbidden("auditee capability required".into()))
    }
  }

  /// Whether the caller may see and act on `cycle`.
  pub fn check_cycle(&self, cycle: &CycleDetail) -> Result<()> {
    let allowed = self.is_elevated()
      || match self.active {
        Role::Auditor => cycle.is_auditor(self.user_id),
        Role::Auditee => cycle.department.owner_user_id == Some(self.user_id),
        Role::Admin | Role::SuperAdmin => false,
      };
    if allowed {
      Ok(())
    } else {
      Err(Error::Forbidden(format!(
        "audit cycle {} is outside your assignments",
        cycle.cycle.id
      )))
    }
  }

  /// Whether the caller may see `department`. `assigned` tells whether the
  /// caller audits the department in any cycle.
  pub fn check_department(&self, department: &Department, assigned: bool) -> Result<()> {
    let allowed = self.is_elevated()
      || match self.active {
        Role::Auditor => assigned,
        Role::Auditee => department.owner_user_id == Some(self.user_id),
        Role::Admin | Role::SuperAdmin => false,
      };
    if allowed {
      Ok(())
    } else {
      Err(Error::Forbidden(format!(
        "department {} is outside your assignments",
        department.id
      )))
    }
  }

  /// Owner filter to apply to listings for non-elevated auditees.
  pub fn owner_scope(&self) -> Option<i64> {
    (!self.is_elevated() && self.active == Role::Auditee).then_some(self.user_id)
  }

  /// Auditor filter to apply to listings for non-elevated auditors.
  pub fn auditor_scope(&self) -> Option<i64> {
    (!self.is_elevated() && self.active == Role::Auditor).then_some(self.user_id)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::schedule::{Assignment, AuditCycle};

  fn ctx(roles: Vec<Role>, requested: Option<Role>) -> Result<AuthContext> {
    AuthContext::resolve(7, "budi".into(), roles, requested)
  }

  fn cycle(owner: Option<i64>, auditor: i64) -> CycleDetail {
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    CycleDetail {
      cycle:       AuditCycle {
        id:         1,
        year:       2024,
        sk_number:  None,
        start_date: date,
        end_date:   date,
      },
      department:  Department { id: 2, name: "Teknik Sipil".into(), owner_user_id: owner },
      assignments: vec![Assignment {
        id: 1,
        cycle_id: 1,
        auditor_user_id: auditor,
        department_id: 2,
      }],
      locked:      false,
    }
  }

  #[test]
  fn defaults_to_first_role() {
    let c = ctx(vec![Role::Auditee, Role::Auditor], None).unwrap();
    assert_eq!(c.active, Role::Auditee);
  }

  #[test]
  fn unheld_role_is_forbidden() {
    let result = ctx(vec![Role::Auditee], Some(Role::Auditor));
    assert!(matches!(result, Err(Error::Forbidden(_))));
  }

  #[test]
  fn user_without_roles_is_forbidden() {
    assert!(matches!(ctx(vec![], None), Err(Error::Forbidden(_))));
  }

  #[test]
  fn admin_may_act_as_any_role() {
    let c = ctx(vec![Role::Admin], Some(Role::Auditee)).unwrap();
    assert_eq!(c.active, Role::Auditee);
    assert!(c.require_auditee().is_ok());
    assert!(c.require_admin().is_err());
    assert!(c.check_cycle(&cycle(None, 99)).is_ok());
  }

  #[test]
  fn auditor_scope_follows_assignments() {
    let c = ctx(vec![Role::Auditor], None).unwrap();
    assert!(c.check_cycle(&cycle(None, 7)).is_ok());
    assert!(c.check_cycle(&cycle(None, 8)).is_err());
    assert!(c.require_auditee().is_err());
    assert_eq!(c.auditor_scope(), Some(7));
    assert_eq!(c.owner_scope(), None);
  }

  #[test]
  fn auditee_scope_follows_ownership() {
    let c = ctx(vec![Role::Auditee], None).unwrap();
    assert!(c.check_cycle(&cycle(Some(7), 1)).is_ok());
    assert!(c.check_cycle(&cycle(Some(8), 1)).is_err());
    assert!(c.require_auditor().is_err());
  }

  #[test]
  fn role_strings() {
    assert_eq!(Role::SuperAdmin.as_ref(), "superadmin");
    assert_eq!(Role::parse("auditee").unwrap(), Role::Auditee);
    assert!(Role::parse("dean").is_err());
  }
}
