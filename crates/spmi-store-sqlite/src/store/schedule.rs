//! [`ScheduleStore`] for [`SqliteStore`].

use rusqlite::{Connection, params};
use spmi_core::{
  Error as CoreError,
  access::Role,
  schedule::{CycleDetail, CycleFilter, CycleInput},
  store::{OrphanedFiles, ScheduleStore},
  validate::ValidationErrors,
};

use super::{SqliteStore, Subtree, evidence_paths, exists, load_cycle, load_department, load_user};
use crate::{Result, encode::encode_date};

/// Check references that the domain layer cannot see: the department and
/// every auditor must exist, and auditors must hold the auditor role.
fn check_references(conn: &Connection, input: &CycleInput) -> Result<()> {
  let mut errors = ValidationErrors::new();

  if load_department(conn, input.department_id)?.is_none() {
    errors.add("department_id", format!("department {} does not exist", input.department_id));
  }
  for &auditor_id in &input.auditor_ids {
    match load_user(conn, auditor_id)? {
      None => errors.add("auditor_ids", format!("user {auditor_id} does not exist")),
      Some(user) if !user.has_role(Role::Auditor) => errors.add(
        "auditor_ids",
        format!("user {} does not hold the auditor role", user.username),
      ),
      Some(_) => {}
    }
  }

  Ok(errors.into_result()?)
}

/// One cycle per (year, department).
fn check_unique(conn: &Connection, input: &CycleInput, except: Option<i64>) -> Result<()> {
  if exists(
    conn,
    "SELECT 1 FROM audit_cycles
     WHERE year = ?1 AND department_id = ?2 AND (?3 IS NULL OR cycle_id != ?3)",
    params![input.year, input.department_id, except],
  )? {
    return Err(
      CoreError::Conflict(format!(
        "department {} already has an audit cycle in {}",
        input.department_id, input.year
      ))
      .into(),
    );
  }
  Ok(())
}

fn insert_assignments(conn: &Connection, cycle_id: i64, input: &CycleInput) -> Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO audit_assignments (cycle_id, auditor_user_id, department_id)
     VALUES (?1, ?2, ?3)",
  )?;
  for auditor_id in &input.auditor_ids {
    stmt.execute(params![cycle_id, auditor_id, input.department_id])?;
  }
  Ok(())
}

fn sk_number(input: &CycleInput) -> Option<String> {
  spmi_core::validate::non_blank(input.sk_number.clone())
}

impl ScheduleStore for SqliteStore {
  async fn list_cycles(&self, filter: CycleFilter) -> Result<Vec<CycleDetail>> {
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT y.cycle_id FROM audit_cycles y
           JOIN departments d ON d.department_id = y.department_id
           WHERE (?1 IS NULL OR y.year = ?1)
             AND (?2 IS NULL OR y.department_id = ?2)
             AND (?3 IS NULL OR EXISTS (
                   SELECT 1 FROM audit_assignments a
                   WHERE a.cycle_id = y.cycle_id AND a.auditor_user_id = ?3))
             AND (?4 IS NULL OR d.owner_user_id = ?4)
           ORDER BY y.year DESC, d.name",
        )?;
        let ids = stmt
          .query_map(
            params![
              filter.year,
              filter.department_id,
              filter.auditor_user_id,
              filter.owner_user_id
            ],
            |row| row.get::<_, i64>(0),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut cycles = Vec::with_capacity(ids.len());
        for id in ids {
          if let Some(cycle) = load_cycle(conn, id)? {
            cycles.push(cycle);
          }
        }
        Ok(cycles)
      })
      .await
  }

  async fn get_cycle(&self, id: i64) -> Result<Option<CycleDetail>> {
    self.with_conn(move |conn| load_cycle(conn, id)).await
  }

  async fn create_cycle(&self, input: CycleInput) -> Result<CycleDetail> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        check_references(&tx, &input)?;
        check_unique(&tx, &input, None)?;

        tx.execute(
          "INSERT INTO audit_cycles (year, sk_number, start_date, end_date, department_id)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![
            input.year,
            sk_number(&input),
            encode_date(input.start_date),
            encode_date(input.end_date),
            input.department_id,
          ],
        )?;
        let cycle_id = tx.last_insert_rowid();
        insert_assignments(&tx, cycle_id, &input)?;

        let detail =
          load_cycle(&tx, cycle_id)?.ok_or_else(|| CoreError::not_found("audit cycle", cycle_id))?;
        tx.commit()?;
        Ok(detail)
      })
      .await
  }

  async fn update_cycle(&self, id: i64, input: CycleInput) -> Result<CycleDetail> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let current =
          load_cycle(&tx, id)?.ok_or_else(|| CoreError::not_found("audit cycle", id))?;
        let reassigns = current.reassigns(&input);

        if current.locked && (reassigns || current.cycle.year != input.year) {
          return Err(
            CoreError::Conflict(format!(
              "audit cycle {id} already has scores; its year and assignments are locked"
            ))
            .into(),
          );
        }
        check_references(&tx, &input)?;
        check_unique(&tx, &input, Some(id))?;

        tx.execute(
          "UPDATE audit_cycles
           SET year = ?1, sk_number = ?2, start_date = ?3, end_date = ?4, department_id = ?5
           WHERE cycle_id = ?6",
          params![
            input.year,
            sk_number(&input),
            encode_date(input.start_date),
            encode_date(input.end_date),
            input.department_id,
            id,
          ],
        )?;
        if reassigns {
          tx.execute("DELETE FROM audit_assignments WHERE cycle_id = ?1", params![id])?;
          insert_assignments(&tx, id, &input)?;
        }

        let detail = load_cycle(&tx, id)?.ok_or_else(|| CoreError::not_found("audit cycle", id))?;
        tx.commit()?;
        Ok(detail)
      })
      .await
  }

  async fn delete_cycle(&self, id: i64) -> Result<OrphanedFiles> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let current =
          load_cycle(&tx, id)?.ok_or_else(|| CoreError::not_found("audit cycle", id))?;
        if current.locked {
          return Err(
            CoreError::Conflict(format!("audit cycle {id} already has scores and cannot be deleted"))
              .into(),
          );
        }

        let paths = evidence_paths(&tx, Subtree::Cycle, id)?;
        tx.execute("DELETE FROM audit_cycles WHERE cycle_id = ?1", params![id])?;
        tx.commit()?;
        Ok(paths)
      })
      .await
  }
}
