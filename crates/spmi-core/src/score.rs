//! Indicator scores (Pami) and the rule that turns a nonconformity score into
//! a corrective-action request.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator as _};

use crate::{
  Error, Result,
  validate::{ValidationErrors, non_blank},
};

// ─── Score ───────────────────────────────────────────────────────────────────

/// The closed set of values an auditor may assign to an indicator. The
/// strings are stored verbatim.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, AsRefStr,
  Display, EnumString, EnumIter,
)]
pub enum Score {
  #[serde(rename = "Melampaui Standar")]
  #[strum(serialize = "Melampaui Standar")]
  ExceedsStandard,
  #[serde(rename = "Sesuai Standar")]
  #[strum(serialize = "Sesuai Standar")]
  MeetsStandard,
  #[serde(rename = "Ketidaksesuaian Observasi")]
  #[strum(serialize = "Ketidaksesuaian Observasi")]
  Observation,
  #[serde(rename = "Ketidaksesuaian Minor")]
  #[strum(serialize = "Ketidaksesuaian Minor")]
  Minor,
  #[serde(rename = "Ketidaksesuaian Mayor")]
  #[strum(serialize = "Ketidaksesuaian Mayor")]
  Major,
}

impl Score {
  /// Parse a submitted form value, reporting failures against `field`.
  pub fn parse_field(field: &str, value: &str) -> Result<Self> {
    value.trim().parse().map_err(|_| {
      let allowed: Vec<String> = Self::iter().map(|s| s.to_string()).collect();
      Error::field(field, format!("score must be one of: {}", allowed.join(", ")))
    })
  }

  /// The nonconformity level this score raises, if any.
  pub fn nonconformity(self) -> Option<NonconformityLevel> {
    match self {
      Self::ExceedsStandard | Self::MeetsStandard => None,
      Self::Observation => Some(NonconformityLevel::Observasi),
      Self::Minor => Some(NonconformityLevel::Minor),
      Self::Major => Some(NonconformityLevel::Mayor),
    }
  }

  pub fn is_conforming(self) -> bool { self.nonconformity().is_none() }

  /// Weight used for dashboard averages.
  pub fn weight(self) -> u8 {
    match self {
      Self::ExceedsStandard => 4,
      Self::MeetsStandard => 3,
      Self::Observation => 2,
      Self::Minor => 1,
      Self::Major => 0,
    }
  }
}

/// Severity of a finding recorded on a CAR.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
pub enum NonconformityLevel {
  Observasi,
  Minor,
  Mayor,
}

// ─── Assessment (Pami) ───────────────────────────────────────────────────────

/// One row per (cycle, indicator). Created lazily by the first score or the
/// first evidence upload, so `score` may still be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
  pub id:           i64,
  pub cycle_id:     i64,
  pub indicator_id: i64,
  pub score:        Option<Score>,
  pub auditor_note: Option<String>,
  pub updated_at:   DateTime<Utc>,
}

// ─── Score submission ────────────────────────────────────────────────────────

/// Raw score form as submitted by an auditor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreInput {
  pub score:        String,
  #[serde(default)]
  pub finding:      Option<String>,
  /// ISO date (`YYYY-MM-DD`).
  #[serde(default)]
  pub due_date:     Option<String>,
  #[serde(default)]
  pub auditor_note: Option<String>,
}

/// The CAR fields implied by a nonconformity score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarUpdate {
  pub level:    NonconformityLevel,
  pub finding:  String,
  pub due_date: NaiveDate,
}

/// What a score write does to the stored auditor note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NoteUpdate {
  /// The note was omitted.
  #[default]
  Keep,
  /// The note was submitted blank.
  Clear,
  Set(String),
}

impl NoteUpdate {
  /// Omitted keeps, blank clears, anything else replaces.
  pub fn from_input(value: Option<String>) -> Self {
    match value {
      None => Self::Keep,
      Some(text) => match non_blank(Some(text)) {
        None => Self::Clear,
        Some(text) => Self::Set(text),
      },
    }
  }
}

/// A validated score write, ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreChange {
  pub score:        Score,
  pub auditor_note: NoteUpdate,
  /// Upsert of the linked CAR; `None` leaves any existing CAR untouched.
  pub car:          Option<CarUpdate>,
}

/// Decide whether `score` raises a corrective action.
///
/// Nonconformity scores require both a finding and a due date. Conforming
/// scores never produce a [`CarUpdate`].
pub fn derive_car_from_score(
  score: Score,
  finding: Option<&str>,
  due_date: Option<NaiveDate>,
) -> Result<Option<CarUpdate>> {
  let Some(level) = score.nonconformity() else {
    return Ok(None);
  };

  let finding = finding.map(str::trim).filter(|f| !f.is_empty());
  let mut errors = ValidationErrors::new();
  if finding.is_none() {
    errors.add("finding", "finding is required for a nonconformity score");
  }
  if due_date.is_none() {
    errors.add("due_date", "due_date is required for a nonconformity score");
  }

  match (finding, due_date) {
    (Some(finding), Some(due_date)) => Ok(Some(CarUpdate {
      level,
      finding: finding.to_owned(),
      due_date,
    })),
    _ => Err(Error::Validation(errors)),
  }
}

/// Parse an optional ISO date form field.
pub fn parse_date_field(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
  match value.map(str::trim).filter(|v| !v.is_empty()) {
    None => Ok(None),
    Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
      .map(Some)
      .map_err(|_| Error::field(field, format!("{field} must be a date (YYYY-MM-DD)"))),
  }
}

impl ScoreInput {
  /// Validate every field, reporting all failures together.
  pub fn validate(self) -> Result<ScoreChange> {
    let mut errors = ValidationErrors::new();
    let score = errors.absorb(Score::parse_field("score", &self.score))?;
    let due_date = errors.absorb(parse_date_field("due_date", self.due_date.as_deref()))?;

    let car = match (score, due_date) {
      (Some(score), Some(due_date)) => errors
        .absorb(derive_car_from_score(score, self.finding.as_deref(), due_date))?
        .flatten(),
      // The date already failed; the finding still needs checking.
      (Some(score), None) if !score.is_conforming() => {
        if non_blank(self.finding).is_none() {
          errors.add("finding", "finding is required for a nonconformity score");
        }
        None
      }
      _ => None,
    };

    match score {
      Some(score) if errors.is_empty() => Ok(ScoreChange {
        score,
        auditor_note: NoteUpdate::from_input(self.auditor_note),
        car,
      }),
      _ => Err(Error::Validation(errors)),
    }
  }
}
