//! Audit cycles (JadwalAudit) and auditor assignments (JadwalAuditDetail).
//!
//! A cycle audits exactly one department in a given year; its assignments
//! list the auditors. Once any indicator in the cycle has been scored the
//! cycle is locked against re-assignment and deletion.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Result, directory::Department, validate::ValidationErrors};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCycle {
  pub id:         i64,
  pub year:       i32,
  /// Decree (surat keputusan) number, if issued.
  pub sk_number:  Option<String>,
  pub start_date: NaiveDate,
  pub end_date:   NaiveDate,
}

/// Who audits whom within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub id:              i64,
  pub cycle_id:        i64,
  pub auditor_user_id: i64,
  pub department_id:   i64,
}

/// A cycle with its auditee department and assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleDetail {
  pub cycle:       AuditCycle,
  pub department:  Department,
  pub assignments: Vec<Assignment>,
  /// Set once any assessment in the cycle carries a score.
  pub locked:      bool,
}

impl CycleDetail {
  pub fn is_auditor(&self, user_id: i64) -> bool {
    self.assignments.iter().any(|a| a.auditor_user_id == user_id)
  }

  /// Auditor ids in ascending order.
  pub fn auditor_ids(&self) -> BTreeSet<i64> {
    self.assignments.iter().map(|a| a.auditor_user_id).collect()
  }

  /// Whether applying `input` would change who audits whom.
  pub fn reassigns(&self, input: &CycleInput) -> bool {
    self.department.id != input.department_id
      || self.auditor_ids() != input.auditor_ids.iter().copied().collect::<BTreeSet<_>>()
  }
}

/// Header and assignments submitted together on create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleInput {
  pub year:          i32,
  #[serde(default)]
  pub sk_number:     Option<String>,
  pub start_date:    NaiveDate,
  pub end_date:      NaiveDate,
  pub department_id: i64,
  pub auditor_ids:   Vec<i64>,
}

impl CycleInput {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    if !(2000..=2100).contains(&self.year) {
      errors.add("year", "year must be between 2000 and 2100");
    }
    if self.end_date < self.start_date {
      errors.add("end_date", "end_date must not be before start_date");
    }
    if self.auditor_ids.is_empty() {
      errors.add("auditor_ids", "at least one auditor is required");
    }
    let unique: BTreeSet<_> = self.auditor_ids.iter().collect();
    if unique.len() != self.auditor_ids.len() {
      errors.add("auditor_ids", "an auditor may only be assigned once");
    }
    errors.into_result()
  }
}

/// Filter for listing cycles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CycleFilter {
  pub year:            Option<i32>,
  pub department_id:   Option<i64>,
  pub auditor_user_id: Option<i64>,
  pub owner_user_id:   Option<i64>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  fn date(m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, m, d).unwrap() }

  fn input() -> CycleInput {
    CycleInput {
      year:          2024,
      sk_number:     Some("012/SK/2024".into()),
      start_date:    date(3, 1),
      end_date:      date(3, 31),
      department_id: 2,
      auditor_ids:   vec![5, 6],
    }
  }

  #[test]
  fn valid_input_passes() { assert!(input().validate().is_ok()); }

  #[test]
  fn reversed_dates_and_duplicates_fail() {
    let mut bad = input();
    bad.end_date = date(2, 1);
    bad.auditor_ids = vec![5, 5];
    let Err(Error::Validation(errors)) = bad.validate() else {
      panic!("expected validation error");
    };
    assert!(errors.contains("end_date"));
    assert!(errors.contains("auditor_ids"));
  }

  #[test]
  fn reassignment_detection_ignores_order() {
    let detail = CycleDetail {
      cycle:       AuditCycle {
        id:         1,
        year:       2024,
        sk_number:  None,
        start_date: date(3, 1),
        end_date:   date(3, 31),
      },
      department:  Department { id: 2, name: "Farmasi".into(), owner_user_id: None },
      assignments: vec![
        Assignment { id: 1, cycle_id: 1, auditor_user_id: 6, department_id: 2 },
        Assignment { id: 2, cycle_id: 1, auditor_user_id: 5, department_id: 2 },
      ],
      locked:      true,
    };

    assert!(!detail.reassigns(&input()));

    let mut moved = input();
    moved.department_id = 3;
    assert!(detail.reassigns(&moved));

    let mut swapped = input();
    swapped.auditor_ids = vec![5];
    assert!(detail.reassigns(&swapped));
  }
}
