//! [`AuditStore`] for [`SqliteStore`]: scores, evidence and CARs.

use std::collections::HashMap;

use rusqlite::{Connection, params};
use spmi_core::{
  Error as CoreError,
  car::{Car, CarFilter, CarResponse, CarStatus, CarVerification, PtkNumber},
  evidence::{Evidence, EvidenceRecord, NewEvidence},
  report::{AssessmentView, ChecklistRow},
  score::{CarUpdate, NoteUpdate, ScoreChange},
  store::{AuditStore, ScoreOutcome},
};
use tracing::{info, warn};

use super::{
  SqliteStore, applicable_indicator, ensure_assessment, insert_evidence, list_evidence,
  load_assessment, load_car, load_car_for, load_evidence, load_indicator, now, require_cycle,
  set_score,
};
use crate::{
  Result,
  encode::{
    ASSESSMENT_COLUMNS, CAR_COLUMNS, INDICATOR_COLUMNS, RawAssessment, RawCar,
    STANDARD_COLUMNS, encode_date, indicator_from_row, standard_from_row,
  },
};

/// Upsert the CAR for `(cycle, indicator)`, always resetting it to `OPEN`.
/// An already allocated PTK number is kept.
fn upsert_car(
  conn: &Connection,
  cycle_id: i64,
  indicator_id: i64,
  update: &CarUpdate,
) -> Result<()> {
  let at = now();
  conn.execute(
    "INSERT INTO cars (
       cycle_id, indicator_id, level, finding, due_date, status, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
     ON CONFLICT (cycle_id, indicator_id) DO UPDATE SET
       level      = excluded.level,
       finding    = excluded.finding,
       due_date   = excluded.due_date,
       status     = excluded.status,
       closed_at  = NULL,
       updated_at = excluded.updated_at",
    params![
      cycle_id,
      indicator_id,
      update.level.to_string(),
      update.finding,
      encode_date(update.due_date),
      CarStatus::Open.to_string(),
      at,
    ],
  )?;
  Ok(())
}

/// Hand out the next PTK sequence number for `year`.
fn allocate_ptk(conn: &Connection, year: i32) -> Result<PtkNumber> {
  let sequence: u32 = conn.query_row(
    "INSERT INTO ptk_counters (year, last_value) VALUES (?1, 1)
     ON CONFLICT (year) DO UPDATE SET last_value = last_value + 1
     RETURNING last_value",
    params![year],
    |row| row.get(0),
  )?;
  Ok(PtkNumber { sequence, year })
}

fn require_car(conn: &Connection, id: i64) -> Result<Car> {
  load_car(conn, id)?.ok_or_else(|| CoreError::not_found("CAR", id).into())
}

impl AuditStore for SqliteStore {
  async fn record_score(
    &self,
    cycle_id: i64,
    indicator_id: i64,
    change: ScoreChange,
  ) -> Result<ScoreOutcome> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let cycle = require_cycle(&tx, cycle_id)?;
        applicable_indicator(&tx, &cycle, indicator_id)?;

        set_score(
          &tx,
          cycle_id,
          indicator_id,
          change.score.as_ref(),
          &change.auditor_note,
        )?;
        if let Some(update) = &change.car {
          upsert_car(&tx, cycle_id, indicator_id, update)?;
        }

        let assessment = load_assessment(&tx, cycle_id, indicator_id)?
          .ok_or_else(|| CoreError::not_found("assessment", indicator_id))?;
        let car = match change.car {
          Some(_) => load_car_for(&tx, cycle_id, indicator_id)?,
          None => None,
        };
        tx.commit()?;
        Ok(ScoreOutcome { assessment, car })
      })
      .await
  }

  async fn add_evidence(
    &self,
    cycle_id: i64,
    indicator_id: i64,
    input: NewEvidence,
  ) -> Result<Evidence> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let cycle = require_cycle(&tx, cycle_id)?;
        applicable_indicator(&tx, &cycle, indicator_id)?;

        let assessment_id = ensure_assessment(&tx, cycle_id, indicator_id)?;
        let evidence = insert_evidence(&tx, assessment_id, &input)?;
        tx.commit()?;
        Ok(evidence)
      })
      .await
  }

  async fn get_evidence(&self, id: i64) -> Result<Option<EvidenceRecord>> {
    self
      .with_conn(move |conn| {
        let Some(evidence) = load_evidence(conn, id)? else {
          return Ok(None);
        };
        let (cycle_id, indicator_id): (i64, i64) = conn.query_row(
          "SELECT cycle_id, indicator_id FROM assessments WHERE assessment_id = ?1",
          params![evidence.assessment_id],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(Some(EvidenceRecord { evidence, cycle_id, indicator_id }))
      })
      .await
  }

  async fn delete_evidence(&self, id: i64) -> Result<()> {
    self
      .with_conn(move |conn| {
        if conn.execute("DELETE FROM evidence WHERE evidence_id = ?1", params![id])? == 0 {
          return Err(CoreError::not_found("evidence", id).into());
        }
        Ok(())
      })
      .await
  }

  async fn get_assessment(
    &self,
    cycle_id: i64,
    indicator_id: i64,
  ) -> Result<Option<AssessmentView>> {
    self
      .with_conn(move |conn| {
        let cycle = require_cycle(conn, cycle_id)?;
        let Some(indicator) = load_indicator(conn, indicator_id)? else {
          return Ok(None);
        };
        applicable_indicator(conn, &cycle, indicator_id)?;

        let assessment = load_assessment(conn, cycle_id, indicator_id)?;
        let evidence = match &assessment {
          Some(a) => list_evidence(conn, a.id)?,
          None => Vec::new(),
        };
        let car = load_car_for(conn, cycle_id, indicator_id)?;
        Ok(Some(AssessmentView { indicator, assessment, car, evidence }))
      })
      .await
  }

  async fn checklist(&self, cycle_id: i64) -> Result<Vec<ChecklistRow>> {
    self
      .with_conn(move |conn| {
        let cycle = require_cycle(conn, cycle_id)?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {STANDARD_COLUMNS}, {INDICATOR_COLUMNS}
           FROM indicators i
           JOIN standards s ON s.standard_id = i.standard_id
           WHERE s.department_id IS NULL OR s.department_id = ?1
           ORDER BY s.standard_id, i.indicator_id"
        ))?;
        let catalog = stmt
          .query_map(params![cycle.department.id], |row| {
            Ok((standard_from_row(row, 0)?, indicator_from_row(row, 4)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {ASSESSMENT_COLUMNS},
                  (SELECT COUNT(*) FROM evidence e WHERE e.assessment_id = a.assessment_id)
           FROM assessments a WHERE a.cycle_id = ?1"
        ))?;
        let raws = stmt
          .query_map(params![cycle_id], |row| {
            Ok((RawAssessment::from_row(row, 0)?, row.get::<_, u32>(6)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut assessments = HashMap::with_capacity(raws.len());
        for (raw, count) in raws {
          let assessment = raw.into_assessment()?;
          assessments.insert(assessment.indicator_id, (assessment, count));
        }

        let mut stmt =
          conn.prepare(&format!("SELECT {CAR_COLUMNS} FROM cars c WHERE c.cycle_id = ?1"))?;
        let raws = stmt
          .query_map(params![cycle_id], |row| RawCar::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut cars = HashMap::with_capacity(raws.len());
        for raw in raws {
          let car = raw.into_car()?;
          cars.insert(car.indicator_id, car);
        }

        Ok(
          catalog
            .into_iter()
            .map(|(standard, indicator)| {
              let (assessment, evidence_count) = match assessments.remove(&indicator.id) {
                Some((a, n)) => (Some(a), n),
                None => (None, 0),
              };
              ChecklistRow {
                car: cars.remove(&indicator.id),
                standard,
                indicator,
                assessment,
                evidence_count,
              }
            })
            .collect(),
        )
      })
      .await
  }

  async fn get_car(&self, id: i64) -> Result<Option<Car>> {
    self.with_conn(move |conn| load_car(conn, id)).await
  }

  async fn list_cars(&self, filter: CarFilter) -> Result<Vec<Car>> {
    let status = filter.status.map(|s| s.to_string());
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CAR_COLUMNS}
           FROM cars c
           JOIN audit_cycles y ON y.cycle_id      = c.cycle_id
           JOIN departments  d ON d.department_id = y.department_id
           WHERE (?1 IS NULL OR c.cycle_id = ?1)
             AND (?2 IS NULL OR y.department_id = ?2)
             AND (?3 IS NULL OR c.status = ?3)
             AND (?4 IS NULL OR EXISTS (
                   SELECT 1 FROM audit_assignments a
                   WHERE a.cycle_id = c.cycle_id AND a.auditor_user_id = ?4))
             AND (?5 IS NULL OR d.owner_user_id = ?5)
           ORDER BY y.year DESC, c.car_id DESC"
        ))?;
        let raws = stmt
          .query_map(
            params![
              filter.cycle_id,
              filter.department_id,
              status,
              filter.auditor_user_id,
              filter.owner_user_id
            ],
            |row| RawCar::from_row(row, 0),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawCar::into_car).collect()
      })
      .await
  }

  async fn respond_car(
    &self,
    id: i64,
    response: CarResponse,
    evidence: Option<NewEvidence>,
  ) -> Result<Car> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let car = require_car(&tx, id)?;
        let status = car.status.respond()?;
        let at = now();

        tx.execute(
          "UPDATE cars
           SET root_cause = ?1, corrective_action = ?2, status = ?3,
               submitted_at = ?4, updated_at = ?4
           WHERE car_id = ?5",
          params![response.root_cause, response.corrective_action, status.to_string(), at, id],
        )?;
        if let Some(evidence) = &evidence {
          let assessment_id = ensure_assessment(&tx, car.cycle_id, car.indicator_id)?;
          insert_evidence(&tx, assessment_id, evidence)?;
        }

        let car = require_car(&tx, id)?;
        tx.commit()?;
        Ok(car)
      })
      .await
  }

  async fn verify_car(
    &self,
    id: i64,
    verification: CarVerification,
    year: i32,
  ) -> Result<Car> {
    let car = self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let car = require_car(&tx, id)?;
        let status = car.status.verify(verification.status)?;
        let at = now();

        set_score(
          &tx,
          car.cycle_id,
          car.indicator_id,
          verification.score.as_ref(),
          &NoteUpdate::Keep,
        )?;

        if status.is_closed() {
          let ptk_number = match car.ptk_number {
            Some(number) => number,
            None => {
              let number = allocate_ptk(&tx, year)?.to_string();
              info!(car_id = id, ptk_number = %number, "allocated PTK number");
              number
            }
          };
          tx.execute(
            "UPDATE cars SET status = ?1, ptk_number = ?2, closed_at = ?3, updated_at = ?3
             WHERE car_id = ?4",
            params![status.to_string(), ptk_number, at, id],
          )?;
        } else {
          tx.execute(
            "UPDATE cars SET status = ?1, closed_at = NULL, updated_at = ?2 WHERE car_id = ?3",
            params![status.to_string(), at, id],
          )?;
        }

        let car = require_car(&tx, id)?;
        tx.commit()?;
        Ok(car)
      })
      .await?;

    if car.status.is_closed() && !verification.score.is_conforming() {
      warn!(
        car_id = car.id,
        score = %verification.score,
        "CAR closed with a nonconformity score"
      );
    }
    Ok(car)
  }
}
