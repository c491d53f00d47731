//! The audit catalog: Lingkup → Kriteria → Standar → Indikator.
//!
//! Catalog entries are long-lived reference data. Each level is managed
//! independently; deleting a node removes its whole subtree.

use serde::{Deserialize, Serialize};

use crate::{Result, validate::ValidationErrors};

// ─── Scope (Lingkup) ─────────────────────────────────────────────────────────

/// Root of the catalog hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
  pub id:   i64,
  pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScope {
  pub name: String,
}

impl NewScope {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require_text("name", &self.name);
    errors.into_result()
  }
}

// ─── Criterion (Kriteria) ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
  pub id:       i64,
  pub name:     String,
  pub scope_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCriterion {
  pub name:     String,
  pub scope_id: i64,
}

impl NewCriterion {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require_text("name", &self.name);
    errors.into_result()
  }
}

// ─── Standard (Standar) ──────────────────────────────────────────────────────

/// A quality standard under a criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standard {
  pub id:            i64,
  pub statement:     String,
  pub criterion_id:  i64,
  /// `None` means the standard applies to every department.
  pub department_id: Option<i64>,
}

impl Standard {
  /// Whether indicators under this standard are audited for `department_id`.
  pub fn applies_to(&self, department_id: i64) -> bool {
    self.department_id.is_none_or(|d| d == department_id)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStandard {
  pub statement:     String,
  pub criterion_id:  i64,
  #[serde(default)]
  pub department_id: Option<i64>,
}

impl NewStandard {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require_text("statement", &self.statement);
    errors.into_result()
  }
}

// ─── Indicator (Indikator) ───────────────────────────────────────────────────

/// Leaf of the catalog and the unit that gets scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
  pub id:           i64,
  pub statement:    String,
  pub criterion_id: i64,
  pub standard_id:  i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIndicator {
  pub statement:    String,
  pub criterion_id: i64,
  pub standard_id:  i64,
}

impl NewIndicator {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require_text("statement", &self.statement);
    errors.into_result()
  }
}

/// Filter for listing indicators.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndicatorFilter {
  pub criterion_id: Option<i64>,
  pub standard_id:  Option<i64>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  #[test]
  fn standard_scope_matches_department() {
    let mut standard = Standard {
      id:            1,
      statement:     "Dosen tetap memiliki jabatan fungsional".into(),
      criterion_id:  1,
      department_id: None,
    };
    assert!(standard.applies_to(3));

    standard.department_id = Some(4);
    assert!(standard.applies_to(4));
    assert!(!standard.applies_to(3));
  }

  #[test]
  fn blank_statement_is_rejected() {
    let input = NewIndicator {
      statement:    "  ".into(),
      criterion_id: 1,
      standard_id:  1,
    };
    match input.validate() {
      Err(Error::Validation(errors)) => assert!(errors.contains("statement")),
      other => panic!("expected validation error, got {other:?}"),
    }
  }
}
