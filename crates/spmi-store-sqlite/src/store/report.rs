//! [`ReportStore`] for [`SqliteStore`].

use rusqlite::{Connection, params};
use spmi_core::{
  Error as CoreError,
  car::CarStatus,
  report::{CarCounts, CycleSummary, PtkDocument, RtlEntry, RtlStandard, group_rtl},
  schedule::{CycleDetail, CycleFilter},
  score::Score,
  store::{ReportStore, ScheduleStore},
};

use super::{
  SqliteStore, list_evidence, load_assessment, load_car, load_department, load_indicator,
  load_standard, load_user, require_cycle,
};
use crate::{
  Result,
  encode::{
    CAR_COLUMNS, INDICATOR_COLUMNS, RawCar, STANDARD_COLUMNS, decode_enum, indicator_from_row,
    standard_from_row,
  },
};

fn summarize(conn: &Connection, detail: CycleDetail) -> Result<CycleSummary> {
  let cycle_id = detail.cycle.id;

  let indicator_count: u32 = conn.query_row(
    "SELECT COUNT(*) FROM indicators i
     JOIN standards s ON s.standard_id = i.standard_id
     WHERE s.department_id IS NULL OR s.department_id = ?1",
    params![detail.department.id],
    |row| row.get(0),
  )?;

  let mut stmt = conn.prepare(
    "SELECT score, COUNT(*) FROM assessments
     WHERE cycle_id = ?1 AND score IS NOT NULL
     GROUP BY score",
  )?;
  let raws = stmt
    .query_map(params![cycle_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let scores = raws
    .iter()
    .map(|(s, n)| Ok((decode_enum::<Score>("score", s)?, *n)))
    .collect::<Result<Vec<_>>>()?;

  let mut stmt =
    conn.prepare("SELECT status, COUNT(*) FROM cars WHERE cycle_id = ?1 GROUP BY status")?;
  let raws = stmt
    .query_map(params![cycle_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let mut car_counts = CarCounts::default();
  for (status, n) in &raws {
    car_counts.add(decode_enum::<CarStatus>("CAR status", status)?, *n);
  }

  Ok(CycleSummary::new(detail.cycle, detail.department, indicator_count, &scores, car_counts))
}

impl ReportStore for SqliteStore {
  async fn rtl(&self, department_id: i64) -> Result<Vec<RtlStandard>> {
    self
      .with_conn(move |conn| {
        if load_department(conn, department_id)?.is_none() {
          return Err(CoreError::not_found("department", department_id).into());
        }

        let mut stmt = conn.prepare(&format!(
          "SELECT {STANDARD_COLUMNS}, {INDICATOR_COLUMNS}, {CAR_COLUMNS}, y.year
           FROM cars c
           JOIN audit_cycles y ON y.cycle_id     = c.cycle_id
           JOIN indicators   i ON i.indicator_id = c.indicator_id
           JOIN standards    s ON s.standard_id  = i.standard_id
           WHERE c.cycle_id IN (
                   SELECT cycle_id FROM audit_assignments WHERE department_id = ?1)
             AND c.status != ?2
           ORDER BY s.standard_id, i.indicator_id, y.year DESC, y.cycle_id DESC"
        ))?;
        let raws = stmt
          .query_map(params![department_id, CarStatus::Closed.to_string()], |row| {
            Ok((
              standard_from_row(row, 0)?,
              indicator_from_row(row, 4)?,
              RawCar::from_row(row, 8)?,
              row.get::<_, i32>(22)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(raws.len());
        for (standard, indicator, raw, cycle_year) in raws {
          let car = raw.into_car()?;
          // Score and evidence come from the CAR's own cycle.
          let assessment = load_assessment(conn, car.cycle_id, car.indicator_id)?;
          let evidence = match &assessment {
            Some(a) => list_evidence(conn, a.id)?,
            None => Vec::new(),
          };
          let score = assessment.and_then(|a| a.score);
          rows.push((standard, indicator, RtlEntry { car, cycle_year, score, evidence }));
        }

        Ok(group_rtl(rows))
      })
      .await
  }

  async fn cycle_summaries(&self, filter: CycleFilter) -> Result<Vec<CycleSummary>> {
    let cycles = self.list_cycles(filter).await?;
    self
      .with_conn(move |conn| {
        cycles
          .into_iter()
          .map(|detail| summarize(conn, detail))
          .collect()
      })
      .await
  }

  async fn ptk_document(&self, car_id: i64) -> Result<Option<PtkDocument>> {
    self
      .with_conn(move |conn| {
        let Some(car) = load_car(conn, car_id)? else {
          return Ok(None);
        };
        let indicator = load_indicator(conn, car.indicator_id)?
          .ok_or_else(|| CoreError::not_found("indicator", car.indicator_id))?;
        let standard = load_standard(conn, indicator.standard_id)?
          .ok_or_else(|| CoreError::not_found("standard", indicator.standard_id))?;
        let detail = require_cycle(conn, car.cycle_id)?;

        let mut auditors = Vec::with_capacity(detail.assignments.len());
        for assignment in &detail.assignments {
          if let Some(user) = load_user(conn, assignment.auditor_user_id)? {
            auditors.push(user);
          }
        }
        let score = load_assessment(conn, car.cycle_id, car.indicator_id)?.and_then(|a| a.score);

        Ok(Some(PtkDocument {
          ptk_number: car.ptk_number.clone(),
          car,
          indicator,
          standard,
          cycle: detail.cycle,
          department: detail.department,
          auditors,
          score,
        }))
      })
      .await
  }
}
