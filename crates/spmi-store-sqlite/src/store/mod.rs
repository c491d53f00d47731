//! [`SqliteStore`]: the SQLite implementation of the `spmi-core` storage
//! traits.
//!
//! Every trait method runs one synchronous function on the connection thread.
//! Writes open a transaction there and commit only on success; returning
//! early with an error drops the transaction, which rolls it back.

mod audit;
mod catalog;
mod directory;
mod report;
mod schedule;

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, params};
use spmi_core::{
  access::Role,
  car::Car,
  catalog::{Indicator, Standard},
  directory::{Department, User},
  evidence::{Evidence, NewEvidence},
  schedule::{Assignment, CycleDetail},
  score::{Assessment, NoteUpdate},
  store::Store,
};

use crate::{
  Error, Result,
  encode::{
    ASSESSMENT_COLUMNS, CAR_COLUMNS, CYCLE_COLUMNS, EVIDENCE_COLUMNS, INDICATOR_COLUMNS,
    RawAssessment, RawCar, RawCycle, RawEvidence, STANDARD_COLUMNS, decode_enum, encode_dt,
    indicator_from_row, standard_from_row,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An SPMI audit store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread.
  async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Execute raw SQL, bypassing the store API.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<usize> {
    self.with_conn(move |conn| Ok(conn.execute(sql, [])?)).await
  }
}

impl Store for SqliteStore {
  type Error = Error;
}

// ─── Shared row helpers ──────────────────────────────────────────────────────

fn now() -> String { encode_dt(Utc::now()) }

fn exists(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<bool> {
  Ok(conn.query_row(sql, params, |_| Ok(())).optional()?.is_some())
}

fn load_roles(conn: &Connection, user_id: i64) -> Result<Vec<Role>> {
  let mut stmt =
    conn.prepare("SELECT role FROM user_roles WHERE user_id = ?1 ORDER BY position")?;
  let raws = stmt
    .query_map(params![user_id], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.iter().map(|r| decode_enum("role", r)).collect()
}

fn load_user(conn: &Connection, id: i64) -> Result<Option<User>> {
  let row = conn
    .query_row(
      "SELECT user_id, username, name FROM users WHERE user_id = ?1",
      params![id],
      |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
    )
    .optional()?;

  match row {
    Some((id, username, name)) => {
      let roles = load_roles(conn, id)?;
      Ok(Some(User { id, username, name, roles }))
    }
    None => Ok(None),
  }
}

fn load_department(conn: &Connection, id: i64) -> Result<Option<Department>> {
  Ok(
    conn
      .query_row(
        "SELECT department_id, name, owner_user_id FROM departments WHERE department_id = ?1",
        params![id],
        |row| {
          Ok(Department {
            id:            row.get(0)?,
            name:          row.get(1)?,
            owner_user_id: row.get(2)?,
          })
        },
      )
      .optional()?,
  )
}

fn load_standard(conn: &Connection, id: i64) -> Result<Option<Standard>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT {STANDARD_COLUMNS} FROM standards s WHERE s.standard_id = ?1"),
        params![id],
        |row| standard_from_row(row, 0),
      )
      .optional()?,
  )
}

fn load_indicator(conn: &Connection, id: i64) -> Result<Option<Indicator>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT {INDICATOR_COLUMNS} FROM indicators i WHERE i.indicator_id = ?1"),
        params![id],
        |row| indicator_from_row(row, 0),
      )
      .optional()?,
  )
}

fn load_assignments(conn: &Connection, cycle_id: i64) -> Result<Vec<Assignment>> {
  let mut stmt = conn.prepare(
    "SELECT assignment_id, cycle_id, auditor_user_id, department_id
     FROM audit_assignments WHERE cycle_id = ?1 ORDER BY assignment_id",
  )?;
  let rows = stmt
    .query_map(params![cycle_id], |row| {
      Ok(Assignment {
        id:              row.get(0)?,
        cycle_id:        row.get(1)?,
        auditor_user_id: row.get(2)?,
        department_id:   row.get(3)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn is_locked(conn: &Connection, cycle_id: i64) -> Result<bool> {
  exists(
    conn,
    "SELECT 1 FROM assessments WHERE cycle_id = ?1 AND score IS NOT NULL",
    params![cycle_id],
  )
}

/// Load a cycle with its department, assignments and lock state.
fn load_cycle(conn: &Connection, id: i64) -> Result<Option<CycleDetail>> {
  let row = conn
    .query_row(
      &format!(
        "SELECT {CYCLE_COLUMNS}, d.department_id, d.name, d.owner_user_id
         FROM audit_cycles y
         JOIN departments d ON d.department_id = y.department_id
         WHERE y.cycle_id = ?1"
      ),
      params![id],
      |row| {
        Ok((RawCycle::from_row(row, 0)?, Department {
          id:            row.get(5)?,
          name:          row.get(6)?,
          owner_user_id: row.get(7)?,
        }))
      },
    )
    .optional()?;

  let Some((raw, department)) = row else {
    return Ok(None);
  };
  let cycle = raw.into_cycle()?;
  Ok(Some(CycleDetail {
    assignments: load_assignments(conn, cycle.id)?,
    locked: is_locked(conn, cycle.id)?,
    cycle,
    department,
  }))
}

fn require_cycle(conn: &Connection, id: i64) -> Result<CycleDetail> {
  load_cycle(conn, id)?.ok_or_else(|| spmi_core::Error::not_found("audit cycle", id).into())
}

/// An indicator that is audited for the cycle's department.
fn applicable_indicator(
  conn: &Connection,
  cycle: &CycleDetail,
  indicator_id: i64,
) -> Result<Indicator> {
  let indicator = load_indicator(conn, indicator_id)?
    .ok_or_else(|| spmi_core::Error::not_found("indicator", indicator_id))?;
  let standard = load_standard(conn, indicator.standard_id)?
    .ok_or_else(|| spmi_core::Error::not_found("standard", indicator.standard_id))?;

  if !standard.applies_to(cycle.department.id) {
    return Err(
      spmi_core::Error::field(
        "indicator_id",
        format!(
          "indicator {indicator_id} does not apply to department {}",
          cycle.department.name
        ),
      )
      .into(),
    );
  }
  Ok(indicator)
}

fn load_assessment(
  conn: &Connection,
  cycle_id: i64,
  indicator_id: i64,
) -> Result<Option<Assessment>> {
  conn
    .query_row(
      &format!(
        "SELECT {ASSESSMENT_COLUMNS} FROM assessments a
         WHERE a.cycle_id = ?1 AND a.indicator_id = ?2"
      ),
      params![cycle_id, indicator_id],
      |row| RawAssessment::from_row(row, 0),
    )
    .optional()?
    .map(RawAssessment::into_assessment)
    .transpose()
}

/// The assessment id for `(cycle, indicator)`, inserting an unscored row if
/// none exists yet.
fn ensure_assessment(conn: &Connection, cycle_id: i64, indicator_id: i64) -> Result<i64> {
  conn.execute(
    "INSERT INTO assessments (cycle_id, indicator_id, score, auditor_note, updated_at)
     VALUES (?1, ?2, NULL, NULL, ?3)
     ON CONFLICT (cycle_id, indicator_id) DO NOTHING",
    params![cycle_id, indicator_id, now()],
  )?;
  Ok(conn.query_row(
    "SELECT assessment_id FROM assessments WHERE cycle_id = ?1 AND indicator_id = ?2",
    params![cycle_id, indicator_id],
    |row| row.get(0),
  )?)
}

fn set_score(
  conn: &Connection,
  cycle_id: i64,
  indicator_id: i64,
  score: &str,
  note: &NoteUpdate,
) -> Result<()> {
  let (keep_note, auditor_note) = match note {
    NoteUpdate::Keep => (true, None),
    NoteUpdate::Clear => (false, None),
    NoteUpdate::Set(text) => (false, Some(text.as_str())),
  };
  conn.execute(
    "INSERT INTO assessments (cycle_id, indicator_id, score, auditor_note, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT (cycle_id, indicator_id) DO UPDATE SET
       score        = excluded.score,
       auditor_note = CASE WHEN ?6 THEN assessments.auditor_note ELSE excluded.auditor_note END,
       updated_at   = excluded.updated_at",
    params![cycle_id, indicator_id, score, auditor_note, now(), keep_note],
  )?;
  Ok(())
}

fn insert_evidence(conn: &Connection, assessment_id: i64, input: &NewEvidence) -> Result<Evidence> {
  let file = input.file.as_ref();
  let size = file
    .map(|f| i64::try_from(f.size_bytes))
    .transpose()
    .map_err(|e| Error::Decode(format!("evidence size: {e}")))?;

  conn.execute(
    "INSERT INTO evidence (
       assessment_id, file_path, file_name, content_hash, size_bytes,
       note, uploaded_by_role, uploaded_by, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    params![
      assessment_id,
      file.map(|f| f.path.as_str()),
      file.map(|f| f.name.as_str()),
      file.map(|f| f.content_hash.as_str()),
      size,
      input.note.as_deref(),
      input.uploaded_by_role.to_string(),
      input.uploaded_by,
      now(),
    ],
  )?;

  let id = conn.last_insert_rowid();
  load_evidence(conn, id)?
    .ok_or_else(|| spmi_core::Error::not_found("evidence", id).into())
}

fn load_evidence(conn: &Connection, id: i64) -> Result<Option<Evidence>> {
  conn
    .query_row(
      &format!("SELECT {EVIDENCE_COLUMNS} FROM evidence e WHERE e.evidence_id = ?1"),
      params![id],
      |row| RawEvidence::from_row(row, 0),
    )
    .optional()?
    .map(RawEvidence::into_evidence)
    .transpose()
}

/// Evidence of one assessment, latest first.
fn list_evidence(conn: &Connection, assessment_id: i64) -> Result<Vec<Evidence>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {EVIDENCE_COLUMNS} FROM evidence e
     WHERE e.assessment_id = ?1
     ORDER BY e.created_at DESC, e.evidence_id DESC"
  ))?;
  let raws = stmt
    .query_map(params![assessment_id], |row| RawEvidence::from_row(row, 0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawEvidence::into_evidence).collect()
}

fn load_car(conn: &Connection, id: i64) -> Result<Option<Car>> {
  conn
    .query_row(
      &format!("SELECT {CAR_COLUMNS} FROM cars c WHERE c.car_id = ?1"),
      params![id],
      |row| RawCar::from_row(row, 0),
    )
    .optional()?
    .map(RawCar::into_car)
    .transpose()
}

fn load_car_for(conn: &Connection, cycle_id: i64, indicator_id: i64) -> Result<Option<Car>> {
  conn
    .query_row(
      &format!("SELECT {CAR_COLUMNS} FROM cars c WHERE c.cycle_id = ?1 AND c.indicator_id = ?2"),
      params![cycle_id, indicator_id],
      |row| RawCar::from_row(row, 0),
    )
    .optional()?
    .map(RawCar::into_car)
    .transpose()
}

/// Which subtree a cascading delete removes.
#[derive(Clone, Copy)]
enum Subtree {
  Scope,
  Criterion,
  Standard,
  Indicator,
  Cycle,
}

impl Subtree {
  fn column(self) -> &'static str {
    match self {
      Self::Scope => "c.scope_id",
      Self::Criterion => "i.criterion_id",
      Self::Standard => "i.standard_id",
      Self::Indicator => "i.indicator_id",
      Self::Cycle => "a.cycle_id",
    }
  }
}

/// Storage paths of the evidence files inside a subtree about to be deleted.
fn evidence_paths(conn: &Connection, subtree: Subtree, id: i64) -> Result<Vec<String>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT e.file_path
     FROM evidence e
     JOIN assessments a ON a.assessment_id = e.assessment_id
     JOIN indicators  i ON i.indicator_id   = a.indicator_id
     JOIN criteria    c ON c.criterion_id   = i.criterion_id
     WHERE e.file_path IS NOT NULL AND {} = ?1
     ORDER BY e.evidence_id",
    subtree.column()
  ))?;
  let paths = stmt
    .query_map(params![id], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(paths)
}
