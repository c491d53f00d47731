//! Corrective Action Requests and their status machine.
//!
//! ```text
//!  score (nonconformity) ──▶ OPEN ──respond──▶ SUBMITTED ──verify──▶ Close
//!                             ▲                    │                   │
//!                             └──────verify────────┘◀──re-score────────┘
//! ```
//!
//! Auditees move a CAR from `OPEN` to `SUBMITTED`. Auditors and admins
//! verify from any status to `OPEN` or `Close`, always supplying the final
//! score for the indicator.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  score::{NonconformityLevel, Score},
  validate::{ValidationErrors, non_blank},
};

/// CAR status. The `Close` spelling is stored verbatim.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
pub enum CarStatus {
  #[serde(rename = "OPEN")]
  #[strum(serialize = "OPEN")]
  Open,
  #[serde(rename = "SUBMITTED")]
  #[strum(serialize = "SUBMITTED")]
  Submitted,
  #[serde(rename = "Close")]
  #[strum(serialize = "Close")]
  Closed,
}

impl CarStatus {
  /// Transition taken when the auditee submits a response.
  pub fn respond(self) -> Result<Self> {
    match self {
      Self::Open => Ok(Self::Submitted),
      other => Err(Error::Conflict(format!(
        "a response can only be submitted while the CAR is OPEN (currently {other})"
      ))),
    }
  }

  /// Transition taken on verification. Any current status is accepted so
  /// that auditors can close an `OPEN` CAR directly.
  pub fn verify(self, target: Self) -> Result<Self> {
    match target {
      Self::Open | Self::Closed => Ok(target),
      Self::Submitted => Err(Error::field(
        "status",
        "verification sets the status to OPEN or Close",
      )),
    }
  }

  pub fn is_closed(self) -> bool { self == Self::Closed }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
  pub id:                i64,
  pub cycle_id:          i64,
  pub indicator_id:      i64,
  pub level:             NonconformityLevel,
  pub finding:           String,
  pub root_cause:        Option<String>,
  pub corrective_action: Option<String>,
  pub due_date:          Option<NaiveDate>,
  pub status:            CarStatus,
  /// Allocated once, when the CAR is first closed.
  pub ptk_number:        Option<String>,
  pub submitted_at:      Option<DateTime<Utc>>,
  pub closed_at:         Option<DateTime<Utc>>,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

/// Filter for listing CARs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarFilter {
  pub cycle_id:        Option<i64>,
  pub department_id:   Option<i64>,
  pub status:          Option<CarStatus>,
  #[serde(skip)]
  pub auditor_user_id: Option<i64>,
  #[serde(skip)]
  pub owner_user_id:   Option<i64>,
}

// ─── Auditee response ────────────────────────────────────────────────────────

/// Raw response form fields.
#[derive(Debug, Clone, Default)]
pub struct CarResponseInput {
  pub root_cause:        Option<String>,
  pub corrective_action: Option<String>,
  /// A link to evidence held elsewhere, recorded as an evidence note.
  pub link:              Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarResponse {
  pub root_cause:        String,
  pub corrective_action: String,
  pub link:              Option<String>,
}

impl CarResponseInput {
  pub fn validate(self) -> Result<CarResponse> {
    let root_cause = non_blank(self.root_cause);
    let corrective_action = non_blank(self.corrective_action);

    let mut errors = ValidationErrors::new();
    errors.require_some_text("root_cause", root_cause.as_deref());
    errors.require_some_text("corrective_action", corrective_action.as_deref());

    match (root_cause, corrective_action) {
      (Some(root_cause), Some(corrective_action)) => Ok(CarResponse {
        root_cause,
        corrective_action,
        link: non_blank(self.link),
      }),
      _ => Err(Error::Validation(errors)),
    }
  }
}

// ─── Auditor verification ────────────────────────────────────────────────────

/// Raw verification form as submitted by an auditor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyInput {
  pub status: String,
  #[serde(default)]
  pub score:  Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarVerification {
  pub status: CarStatus,
  /// Final score written to the assessment in the same transaction.
  pub score:  Score,
}

impl VerifyInput {
  pub fn validate(self) -> Result<CarVerification> {
    let mut errors = ValidationErrors::new();

    let status = match self.status.trim().parse::<CarStatus>() {
      Ok(CarStatus::Submitted) | Err(_) => {
        errors.add("status", "status must be OPEN or Close");
        None
      }
      Ok(status) => Some(status),
    };

    let score = match self.score.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
      None => {
        errors.add("score", "a final score is required on verification");
        None
      }
      Some(raw) => errors.absorb(Score::parse_field("score", raw))?,
    };

    match (status, score) {
      (Some(status), Some(score)) => Ok(CarVerification { status, score }),
      _ => Err(Error::Validation(errors)),
    }
  }
}

// ─── PTK numbering ───────────────────────────────────────────────────────────

/// A corrective-action document number, `NNN/ASA/PTK/YYYY`. The sequence
/// restarts every calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtkNumber {
  pub sequence: u32,
  pub year:     i32,
}

impl fmt::Display for PtkNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:03}/ASA/PTK/{}", self.sequence, self.year)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_strings_preserve_casing() {
    assert_eq!(CarStatus::Closed.as_ref(), "Close");
    assert_eq!("SUBMITTED".parse::<CarStatus>().unwrap(), CarStatus::Submitted);
    assert!("CLOSED".parse::<CarStatus>().is_err());
    assert_eq!(serde_json::to_string(&CarStatus::Open).unwrap(), "\"OPEN\"");
  }

  #[test]
  fn respond_only_from_open() {
    assert_eq!(CarStatus::Open.respond().unwrap(), CarStatus::Submitted);
    assert!(matches!(CarStatus::Submitted.respond(), Err(Error::Conflict(_))));
    assert!(matches!(CarStatus::Closed.respond(), Err(Error::Conflict(_))));
  }

  #[test]
  fn verify_allows_override_from_any_status() {
    assert_eq!(CarStatus::Open.verify(CarStatus::Closed).unwrap(), CarStatus::Closed);
    assert_eq!(CarStatus::Submitted.verify(CarStatus::Open).unwrap(), CarStatus::Open);
    assert!(CarStatus::Submitted.verify(CarStatus::Submitted).is_err());
  }

  #[test]
  fn response_requires_both_texts() {
    let Err(Error::Validation(errors)) = CarResponseInput {
      root_cause: Some("SOP belum disosialisasikan".into()),
      corrective_action: Some("   ".into()),
      link: None,
    }
    .validate() else {
      panic!("expected validation error");
    };
    assert!(errors.contains("corrective_action"));
    assert!(!errors.contains("root_cause"));

    let ok = CarResponseInput {
      root_cause:        Some("SOP belum disosialisasikan".into()),
      corrective_action: Some("Sosialisasi SOP".into()),
      link:              Some(" https://drive.example/sop ".into()),
    }
    .validate()
    .unwrap();
    assert_eq!(ok.link.as_deref(), Some("https://drive.example/sop"));
  }

  #[test]
  fn verification_requires_score() {
    let Err(Error::Validation(errors)) =
      VerifyInput { status: "Close".into(), score: None }.validate()
    else {
      panic!("expected validation error");
    };
    assert!(errors.contains("score"));

    let Err(Error::Validation(errors)) =
      VerifyInput { status: "SUBMITTED".into(), score: Some("Sesuai Standar".into()) }.validate()
    else {
      panic!("expected validation error");
    };
    assert!(errors.contains("status"));

    let ok = VerifyInput { status: "Close".into(), score: Some("Sesuai Standar".into()) }
      .validate()
      .unwrap();
    assert_eq!(ok.status, CarStatus::Closed);
    assert_eq!(ok.score, Score::MeetsStandard);
  }

  #[test]
  fn ptk_number_format() {
    let number = PtkNumber { sequence: 7, year: 2024 };
    assert_eq!(number.to_string(), "007/ASA/PTK/2024");
    assert_eq!(PtkNumber { sequence: 1234, year: 2025 }.to_string(), "1234/ASA/PTK/2025");
  }
}
