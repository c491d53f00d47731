//! [`CatalogStore`] for [`SqliteStore`].

use rusqlite::{Connection, OptionalExtension as _, params};
use spmi_core::{
  Error as CoreError,
  catalog::{
    Criterion, Indicator, IndicatorFilter, NewCriterion, NewIndicator, NewScope, NewStandard,
    Scope, Standard,
  },
  store::{CatalogStore, OrphanedFiles},
};

use super::{
  SqliteStore, Subtree, evidence_paths, exists, load_department, load_indicator, load_standard,
};
use crate::{
  Result,
  encode::{INDICATOR_COLUMNS, STANDARD_COLUMNS, indicator_from_row, standard_from_row},
};

fn load_scope(conn: &Connection, id: i64) -> Result<Option<Scope>> {
  Ok(
    conn
      .query_row(
        "SELECT scope_id, name FROM scopes WHERE scope_id = ?1",
        params![id],
        |row| Ok(Scope { id: row.get(0)?, name: row.get(1)? }),
      )
      .optional()?,
  )
}

fn load_criterion(conn: &Connection, id: i64) -> Result<Option<Criterion>> {
  Ok(
    conn
      .query_row(
        "SELECT criterion_id, name, scope_id FROM criteria WHERE criterion_id = ?1",
        params![id],
        |row| {
          Ok(Criterion {
            id:       row.get(0)?,
            name:     row.get(1)?,
            scope_id: row.get(2)?,
          })
        },
      )
      .optional()?,
  )
}

// ── Parent checks ───────────────────────────────────────────────────────────

fn check_scope_parent(conn: &Connection, scope_id: i64) -> Result<()> {
  if load_scope(conn, scope_id)?.is_none() {
    return Err(CoreError::field("scope_id", format!("scope {scope_id} does not exist")).into());
  }
  Ok(())
}

fn check_criterion_parent(conn: &Connection, criterion_id: i64) -> Result<()> {
  if load_criterion(conn, criterion_id)?.is_none() {
    return Err(
      CoreError::field("criterion_id", format!("criterion {criterion_id} does not exist")).into(),
    );
  }
  Ok(())
}

fn check_standard_parents(conn: &Connection, input: &NewStandard) -> Result<()> {
  check_criterion_parent(conn, input.criterion_id)?;
  match input.department_id {
    Some(department_id) if load_department(conn, department_id)?.is_none() => Err(
      CoreError::field("department_id", format!("department {department_id} does not exist"))
        .into(),
    ),
    _ => Ok(()),
  }
}

fn check_indicator_parents(conn: &Connection, input: &NewIndicator) -> Result<()> {
  check_criterion_parent(conn, input.criterion_id)?;
  match load_standard(conn, input.standard_id)? {
    None => Err(
      CoreError::field(
        "standard_id",
        format!("standard {} does not exist", input.standard_id),
      )
      .into(),
    ),
    Some(standard) if standard.criterion_id != input.criterion_id => Err(
      CoreError::field(
        "standard_id",
        format!(
          "standard {} belongs to criterion {}, not {}",
          standard.id, standard.criterion_id, input.criterion_id
        ),
      )
      .into(),
    ),
    Some(_) => Ok(()),
  }
}

/// Delete one row of a catalog table, collecting the evidence files of its
/// subtree first. The cascade itself is done by the foreign keys.
fn delete_subtree(
  conn: &mut Connection,
  subtree: Subtree,
  entity: &'static str,
  sql: &str,
  id: i64,
) -> Result<OrphanedFiles> {
  let tx = conn.transaction()?;
  let paths = evidence_paths(&tx, subtree, id)?;
  if tx.execute(sql, params![id])? == 0 {
    return Err(CoreError::not_found(entity, id).into());
  }
  tx.commit()?;
  Ok(paths)
}

impl CatalogStore for SqliteStore {
  // ── Scopes ────────────────────────────────────────────────────────────────

  async fn list_scopes(&self) -> Result<Vec<Scope>> {
    self
      .with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT scope_id, name FROM scopes ORDER BY scope_id")?;
        let rows = stmt
          .query_map([], |row| Ok(Scope { id: row.get(0)?, name: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn get_scope(&self, id: i64) -> Result<Option<Scope>> {
    self.with_conn(move |conn| load_scope(conn, id)).await
  }

  async fn create_scope(&self, input: NewScope) -> Result<Scope> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let name = input.name.trim().to_owned();
        conn.execute("INSERT INTO scopes (name) VALUES (?1)", params![name])?;
        Ok(Scope { id: conn.last_insert_rowid(), name })
      })
      .await
  }

  async fn update_scope(&self, id: i64, input: NewScope) -> Result<Scope> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let name = input.name.trim().to_owned();
        if conn.execute("UPDATE scopes SET name = ?1 WHERE scope_id = ?2", params![name, id])? == 0
        {
          return Err(CoreError::not_found("scope", id).into());
        }
        Ok(Scope { id, name })
      })
      .await
  }

  async fn delete_scope(&self, id: i64) -> Result<OrphanedFiles> {
    self
      .with_conn(move |conn| {
        delete_subtree(conn, Subtree::Scope, "scope", "DELETE FROM scopes WHERE scope_id = ?1", id)
      })
      .await
  }

  // ── Criteria ──────────────────────────────────────────────────────────────

  async fn list_criteria(&self, scope_id: Option<i64>) -> Result<Vec<Criterion>> {
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT criterion_id, name, scope_id FROM criteria
           WHERE (?1 IS NULL OR scope_id = ?1)
           ORDER BY criterion_id",
        )?;
        let rows = stmt
          .query_map(params![scope_id], |row| {
            Ok(Criterion {
              id:       row.get(0)?,
              name:     row.get(1)?,
              scope_id: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn get_criterion(&self, id: i64) -> Result<Option<Criterion>> {
    self.with_conn(move |conn| load_criterion(conn, id)).await
  }

  async fn create_criterion(&self, input: NewCriterion) -> Result<Criterion> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        check_scope_parent(&tx, input.scope_id)?;
        let name = input.name.trim().to_owned();
        tx.execute(
          "INSERT INTO criteria (name, scope_id) VALUES (?1, ?2)",
          params![name, input.scope_id],
        )?;
        let criterion = Criterion { id: tx.last_insert_rowid(), name, scope_id: input.scope_id };
        tx.commit()?;
        Ok(criterion)
      })
      .await
  }

  async fn update_criterion(&self, id: i64, input: NewCriterion) -> Result<Criterion> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        if load_criterion(&tx, id)?.is_none() {
          return Err(CoreError::not_found("criterion", id).into());
        }
        check_scope_parent(&tx, input.scope_id)?;
        let name = input.name.trim().to_owned();
        tx.execute(
          "UPDATE criteria SET name = ?1, scope_id = ?2 WHERE criterion_id = ?3",
          params![name, input.scope_id, id],
        )?;
        tx.commit()?;
        Ok(Criterion { id, name, scope_id: input.scope_id })
      })
      .await
  }

  async fn delete_criterion(&self, id: i64) -> Result<OrphanedFiles> {
    self
      .with_conn(move |conn| {
        delete_subtree(
          conn,
          Subtree::Criterion,
          "criterion",
          "DELETE FROM criteria WHERE criterion_id = ?1",
          id,
        )
      })
      .await
  }

  // ── Standards ─────────────────────────────────────────────────────────────

  async fn list_standards(&self, criterion_id: Option<i64>) -> Result<Vec<Standard>> {
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STANDARD_COLUMNS} FROM standards s
           WHERE (?1 IS NULL OR s.criterion_id = ?1)
           ORDER BY s.standard_id"
        ))?;
        let rows = stmt
          .query_map(params![criterion_id], |row| standard_from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn get_standard(&self, id: i64) -> Result<Option<Standard>> {
    self.with_conn(move |conn| load_standard(conn, id)).await
  }

  async fn create_standard(&self, input: NewStandard) -> Result<Standard> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        check_standard_parents(&tx, &input)?;
        let statement = input.statement.trim().to_owned();
        tx.execute(
          "INSERT INTO standards (statement, criterion_id, department_id) VALUES (?1, ?2, ?3)",
          params![statement, input.criterion_id, input.department_id],
        )?;
        let standard = Standard {
          id: tx.last_insert_rowid(),
          statement,
          criterion_id: input.criterion_id,
          department_id: input.department_id,
        };
        tx.commit()?;
        Ok(standard)
      })
      .await
  }

  async fn update_standard(&self, id: i64, input: NewStandard) -> Result<Standard> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        if load_standard(&tx, id)?.is_none() {
          return Err(CoreError::not_found("standard", id).into());
        }
        check_standard_parents(&tx, &input)?;

        // Indicators record their criterion too; moving the standard must
        // not leave them pointing at the old one.
        if exists(
          &tx,
          "SELECT 1 FROM indicators WHERE standard_id = ?1 AND criterion_id != ?2",
          params![id, input.criterion_id],
        )? {
          return Err(
            CoreError::field(
              "criterion_id",
              "the standard still has indicators under its current criterion",
            )
            .into(),
          );
        }

        let statement = input.statement.trim().to_owned();
        tx.execute(
          "UPDATE standards SET statement = ?1, criterion_id = ?2, department_id = ?3
           WHERE standard_id = ?4",
          params![statement, input.criterion_id, input.department_id, id],
        )?;
        tx.commit()?;
        Ok(Standard {
          id,
          statement,
          criterion_id: input.criterion_id,
          department_id: input.department_id,
        })
      })
      .await
  }

  async fn delete_standard(&self, id: i64) -> Result<OrphanedFiles> {
    self
      .with_conn(move |conn| {
        delete_subtree(
          conn,
          Subtree::Standard,
          "standard",
          "DELETE FROM standards WHERE standard_id = ?1",
          id,
        )
      })
      .await
  }

  // ── Indicators ────────────────────────────────────────────────────────────

  async fn list_indicators(&self, filter: IndicatorFilter) -> Result<Vec<Indicator>> {
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INDICATOR_COLUMNS} FROM indicators i
           WHERE (?1 IS NULL OR i.criterion_id = ?1)
             AND (?2 IS NULL OR i.standard_id  = ?2)
           ORDER BY i.standard_id, i.indicator_id"
        ))?;
        let rows = stmt
          .query_map(params![filter.criterion_id, filter.standard_id], |row| {
            indicator_from_row(row, 0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn get_indicator(&self, id: i64) -> Result<Option<Indicator>> {
    self.with_conn(move |conn| load_indicator(conn, id)).await
  }

  async fn create_indicator(&self, input: NewIndicator) -> Result<Indicator> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        check_indicator_parents(&tx, &input)?;
        let statement = input.statement.trim().to_owned();
        tx.execute(
          "INSERT INTO indicators (statement, criterion_id, standard_id) VALUES (?1, ?2, ?3)",
          params![statement, input.criterion_id, input.standard_id],
        )?;
        let indicator = Indicator {
          id: tx.last_insert_rowid(),
          statement,
          criterion_id: input.criterion_id,
          standard_id: input.standard_id,
        };
        tx.commit()?;
        Ok(indicator)
      })
      .await
  }

  async fn update_indicator(&self, id: i64, input: NewIndicator) -> Result<Indicator> {
    input.validate()?;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        if load_indicator(&tx, id)?.is_none() {
          return Err(CoreError::not_found("indicator", id).into());
        }
        check_indicator_parents(&tx, &input)?;
        let statement = input.statement.trim().to_owned();
        tx.execute(
          "UPDATE indicators SET statement = ?1, criterion_id = ?2, standard_id = ?3
           WHERE indicator_id = ?4",
          params![statement, input.criterion_id, input.standard_id, id],
        )?;
        tx.commit()?;
        Ok(Indicator {
          id,
          statement,
          criterion_id: input.criterion_id,
          standard_id: input.standard_id,
        })
      })
      .await
  }

  async fn delete_indicator(&self, id: i64) -> Result<OrphanedFiles> {
    self
      .with_conn(move |conn| {
        delete_subtree(
          conn,
          Subtree::Indicator,
          "indicator",
          "DELETE FROM indicators WHERE indicator_id = ?1",
          id,
        )
      })
      .await
  }
}
