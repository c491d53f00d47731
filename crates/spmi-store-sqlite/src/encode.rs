//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as
//! `YYYY-MM-DD`. Enumerations are stored using their canonical strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use spmi_core::{
  car::{Car, CarStatus},
  catalog::{Indicator, Standard},
  evidence::{Evidence, StoredFile},
  schedule::AuditCycle,
  score::{Assessment, NonconformityLevel, Score},
};

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Parse a stored enumeration string, naming `kind` on failure.
pub fn decode_enum<T: FromStr>(kind: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {kind}: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns of `cars`, aliased `c`.
pub const CAR_COLUMNS: &str = "c.car_id, c.cycle_id, c.indicator_id, c.level, c.finding, \
  c.root_cause, c.corrective_action, c.due_date, c.status, c.ptk_number, c.submitted_at, \
  c.closed_at, c.created_at, c.updated_at";

pub struct RawCar {
  pub car_id:            i64,
  pub cycle_id:          i64,
  pub indicator_id:      i64,
  pub level:             String,
  pub finding:           String,
  pub root_cause:        Option<String>,
  pub corrective_action: Option<String>,
  pub due_date:          Option<String>,
  pub status:            String,
  pub ptk_number:        Option<String>,
  pub submitted_at:      Option<String>,
  pub closed_at:         Option<String>,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawCar {
  /// Read [`CAR_COLUMNS`] starting at column `offset`.
  pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      car_id:            row.get(offset)?,
      cycle_id:          row.get(offset + 1)?,
      indicator_id:      row.get(offset + 2)?,
      level:             row.get(offset + 3)?,
      finding:           row.get(offset + 4)?,
      root_cause:        row.get(offset + 5)?,
      corrective_action: row.get(offset + 6)?,
      due_date:          row.get(offset + 7)?,
      status:            row.get(offset + 8)?,
      ptk_number:        row.get(offset + 9)?,
      submitted_at:      row.get(offset + 10)?,
      closed_at:         row.get(offset + 11)?,
      created_at:        row.get(offset + 12)?,
      updated_at:        row.get(offset + 13)?,
    })
  }

  pub fn into_car(self) -> Result<Car> {
    Ok(Car {
      id:                self.car_id,
      cycle_id:          self.cycle_id,
      indicator_id:      self.indicator_id,
      level:             decode_enum::<NonconformityLevel>("nonconformity level", &self.level)?,
      finding:           self.finding,
      root_cause:        self.root_cause,
      corrective_action: self.corrective_action,
      due_date:          self.due_date.as_deref().map(decode_date).transpose()?,
      status:            decode_enum::<CarStatus>("CAR status", &self.status)?,
      ptk_number:        self.ptk_number,
      submitted_at:      decode_opt_dt(self.submitted_at)?,
      closed_at:         decode_opt_dt(self.closed_at)?,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

/// Columns of `assessments`, aliased `a`.
pub const ASSESSMENT_COLUMNS: &str =
  "a.assessment_id, a.cycle_id, a.indicator_id, a.score, a.auditor_note, a.updated_at";

pub struct RawAssessment {
  pub assessment_id: i64,
  pub cycle_id:      i64,
  pub indicator_id:  i64,
  pub score:         Option<String>,
  pub auditor_note:  Option<String>,
  pub updated_at:    String,
}

impl RawAssessment {
  pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      assessment_id: row.get(offset)?,
      cycle_id:      row.get(offset + 1)?,
      indicator_id:  row.get(offset + 2)?,
      score:         row.get(offset + 3)?,
      auditor_note:  row.get(offset + 4)?,
      updated_at:    row.get(offset + 5)?,
    })
  }

  pub fn into_assessment(self) -> Result<Assessment> {
    Ok(Assessment {
      id:           self.assessment_id,
      cycle_id:     self.cycle_id,
      indicator_id: self.indicator_id,
      score:        self
        .score
        .as_deref()
        .map(|s| decode_enum::<Score>("score", s))
        .transpose()?,
      auditor_note: self.auditor_note,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

/// Columns of `evidence`, aliased `e`.
pub const EVIDENCE_COLUMNS: &str = "e.evidence_id, e.assessment_id, e.file_path, e.file_name, \
  e.content_hash, e.size_bytes, e.note, e.uploaded_by_role, e.uploaded_by, e.created_at";

pub struct RawEvidence {
  pub evidence_id:      i64,
  pub assessment_id:    i64,
  pub file_path:        Option<String>,
  pub file_name:        Option<String>,
  pub content_hash:     Option<String>,
  pub size_bytes:       Option<i64>,
  pub note:             Option<String>,
  pub uploaded_by_role: String,
  pub uploaded_by:      Option<i64>,
  pub created_at:       String,
}

impl RawEvidence {
  pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      evidence_id:      row.get(offset)?,
      assessment_id:    row.get(offset + 1)?,
      file_path:        row.get(offset + 2)?,
      file_name:        row.get(offset + 3)?,
      content_hash:     row.get(offset + 4)?,
      size_bytes:       row.get(offset + 5)?,
      note:             row.get(offset + 6)?,
      uploaded_by_role: row.get(offset + 7)?,
      uploaded_by:      row.get(offset + 8)?,
      created_at:       row.get(offset + 9)?,
    })
  }

  pub fn into_evidence(self) -> Result<Evidence> {
    let file = match self.file_path {
      Some(path) => Some(StoredFile {
        name: self.file_name.unwrap_or_else(|| path.clone()),
        path,
        content_hash: self.content_hash.unwrap_or_default(),
        size_bytes: u64::try_from(self.size_bytes.unwrap_or_default())
          .map_err(|e| Error::Decode(format!("evidence size: {e}")))?,
      }),
      None => None,
    };

    Ok(Evidence {
      id: self.evidence_id,
      assessment_id: self.assessment_id,
      file,
      note: self.note,
      uploaded_by_role: decode_enum("role", &self.uploaded_by_role)?,
      uploaded_by: self.uploaded_by,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Columns of `audit_cycles`, aliased `y`.
pub const CYCLE_COLUMNS: &str = "y.cycle_id, y.year, y.sk_number, y.start_date, y.end_date";

pub struct RawCycle {
  pub cycle_id:   i64,
  pub year:       i32,
  pub sk_number:  Option<String>,
  pub start_date: String,
  pub end_date:   String,
}

impl RawCycle {
  pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      cycle_id:   row.get(offset)?,
      year:       row.get(offset + 1)?,
      sk_number:  row.get(offset + 2)?,
      start_date: row.get(offset + 3)?,
      end_date:   row.get(offset + 4)?,
    })
  }

  pub fn into_cycle(self) -> Result<AuditCycle> {
    Ok(AuditCycle {
      id:         self.cycle_id,
      year:       self.year,
      sk_number:  self.sk_number,
      start_date: decode_date(&self.start_date)?,
      end_date:   decode_date(&self.end_date)?,
    })
  }
}

/// Columns of `standards`, aliased `s`.
pub const STANDARD_COLUMNS: &str = "s.standard_id, s.statement, s.criterion_id, s.department_id";

pub fn standard_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Standard> {
  Ok(Standard {
    id:            row.get(offset)?,
    statement:     row.get(offset + 1)?,
    criterion_id:  row.get(offset + 2)?,
    department_id: row.get(offset + 3)?,
  })
}

/// Columns of `indicators`, aliased `i`.
pub const INDICATOR_COLUMNS: &str = "i.indicator_id, i.statement, i.criterion_id, i.standard_id";

pub fn indicator_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Indicator> {
  Ok(Indicator {
    id:           row.get(offset)?,
    statement:    row.get(offset + 1)?,
    criterion_id: row.get(offset + 2)?,
    standard_id:  row.get(offset + 3)?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dates_use_iso_format() {
    let d = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    assert_eq!(encode_date(d), "2024-06-30");
    assert_eq!(decode_date("2024-06-30").unwrap(), d);
    assert!(decode_date("30/06/2024").is_err());
  }

  #[test]
  fn enum_decoding_reports_kind() {
    let err = decode_enum::<CarStatus>("CAR status", "CLOSED").unwrap_err();
    assert!(err.to_string().contains("CAR status"));
    assert_eq!(decode_enum::<CarStatus>("CAR status", "Close").unwrap(), CarStatus::Closed);
  }
}
