//! Read-only views derived from the audit tables at request time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  car::{Car, CarStatus},
  catalog::{Indicator, Standard},
  directory::{Department, User},
  evidence::Evidence,
  schedule::AuditCycle,
  score::{Assessment, Score},
};

// ─── Assessment view ─────────────────────────────────────────────────────────

/// One indicator in one cycle: its score, CAR and evidence (latest first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentView {
  pub indicator:  Indicator,
  pub assessment: Option<Assessment>,
  pub car:        Option<Car>,
  pub evidence:   Vec<Evidence>,
}

/// A row of a cycle checklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistRow {
  pub standard:       Standard,
  pub indicator:      Indicator,
  pub assessment:     Option<Assessment>,
  pub car:            Option<Car>,
  pub evidence_count: u32,
}

// ─── RTL (follow-up plan) ────────────────────────────────────────────────────

/// An unresolved CAR, annotated with data from its own cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtlEntry {
  pub car:        Car,
  pub cycle_year: i32,
  /// The score recorded in the CAR's cycle, not the current one.
  pub score:      Option<Score>,
  pub evidence:   Vec<Evidence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtlIndicator {
  pub indicator: Indicator,
  pub entries:   Vec<RtlEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtlStandard {
  pub standard:   Standard,
  pub indicators: Vec<RtlIndicator>,
}

/// Group flat `(standard, indicator, entry)` rows into the RTL tree.
///
/// Rows for the same standard and indicator need not be adjacent. Group order
/// follows first appearance; entry order is preserved. Closed CARs are dropped
/// and so are the groups they leave empty. Entries are never merged, so an
/// indicator with open CARs from two cycles yields two entries.
pub fn group_rtl(rows: Vec<(Standard, Indicator, RtlEntry)>) -> Vec<RtlStandard> {
  let mut out: Vec<RtlStandard> = Vec::new();

  for (standard, indicator, entry) in rows {
    if entry.car.status == CarStatus::Closed {
      continue;
    }

    let s_idx = match out.iter().position(|s| s.standard.id == standard.id) {
      Some(i) => i,
      None => {
        out.push(RtlStandard { standard, indicators: Vec::new() });
        out.len() - 1
      }
    };
    let group = &mut out[s_idx];

    let i_idx = match group.indicators.iter().position(|i| i.indicator.id == indicator.id) {
      Some(i) => i,
      None => {
        group.indicators.push(RtlIndicator { indicator, entries: Vec::new() });
        group.indicators.len() - 1
      }
    };
    group.indicators[i_idx].entries.push(entry);
  }

  out
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

/// CAR counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarCounts {
  pub open:      u32,
  pub submitted: u32,
  pub closed:    u32,
}

impl CarCounts {
  pub fn add(&mut self, status: CarStatus, n: u32) {
    match status {
      CarStatus::Open => self.open += n,
      CarStatus::Submitted => self.submitted += n,
      CarStatus::Closed => self.closed += n,
    }
  }
}

/// Progress and outcome figures for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
  pub cycle:           AuditCycle,
  pub department:      Department,
  pub indicator_count: u32,
  pub scored_count:    u32,
  /// Keyed by the stored score string.
  pub score_counts:    BTreeMap<String, u32>,
  pub car_counts:      CarCounts,
  /// Mean of [`Score::weight`] over scored indicators.
  pub average_score:   Option<f64>,
}

impl CycleSummary {
  pub fn new(
    cycle: AuditCycle,
    department: Department,
    indicator_count: u32,
    scores: &[(Score, u32)],
    car_counts: CarCounts,
  ) -> Self {
    let scored_count: u32 = scores.iter().map(|(_, n)| n).sum();
    let weighted: u32 = scores.iter().map(|(s, n)| u32::from(s.weight()) * n).sum();
    let average_score =
      (scored_count > 0).then(|| f64::from(weighted) / f64::from(scored_count));

    let score_counts = scores
      .iter()
      .filter(|(_, n)| *n > 0)
      .map(|(s, n)| (s.to_string(), *n))
      .collect();

    Self {
      cycle,
      department,
      indicator_count,
      scored_count,
      score_counts,
      car_counts,
      average_score,
    }
  }
}

// ─── PTK document ────────────────────────────────────────────────────────────

/// Everything printed on a corrective-action report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtkDocument {
  pub ptk_number: Option<String>,
  pub car:        Car,
  pub indicator:  Indicator,
  pub standard:   Standard,
  pub cycle:      AuditCycle,
  pub department: Department,
  pub auditors:   Vec<User>,
  pub score:      Option<Score>,
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, TimeZone, Utc};

  use super::*;
  use crate::score::NonconformityLevel;

  fn standard(id: i64) -> Standard {
    Standard { id, statement: format!("Standar {id}"), criterion_id: 1, department_id: None }
  }

  fn indicator(id: i64, standard_id: i64) -> Indicator {
    Indicator { id, statement: format!("Indikator {id}"), criterion_id: 1, standard_id }
  }

  fn entry(car_id: i64, cycle_id: i64, year: i32, status: CarStatus) -> RtlEntry {
    let at = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
    RtlEntry {
      car:        Car {
        id: car_id,
        cycle_id,
        indicator_id: 7,
        level: NonconformityLevel::Minor,
        finding: "Dokumen tidak lengkap".into(),
        root_cause: None,
        corrective_action: None,
        due_date: NaiveDate::from_ymd_opt(year, 6, 30),
        status,
        ptk_number: None,
        submitted_at: None,
        closed_at: None,
        created_at: at,
        updated_at: at,
      },
      cycle_year: year,
      score:      Some(Score::Minor),
      evidence:   vec![],
    }
  }

  #[test]
  fn open_cars_from_two_cycles_are_not_collapsed() {
    let rows = vec![
      (standard(1), indicator(7, 1), entry(2, 20, 2024, CarStatus::Open)),
      (standard(1), indicator(7, 1), entry(1, 10, 2023, CarStatus::Submitted)),
    ];
    let tree = group_rtl(rows);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].indicators.len(), 1);
    let years: Vec<i32> = tree[0].indicators[0].entries.iter().map(|e| e.cycle_year).collect();
    assert_eq!(years, vec![2024, 2023]);
  }

  #[test]
  fn closed_cars_and_empty_groups_are_dropped() {
    let rows = vec![
      (standard(1), indicator(7, 1), entry(1, 10, 2023, CarStatus::Closed)),
      (standard(2), indicator(8, 2), entry(2, 10, 2023, CarStatus::Open)),
      (standard(2), indicator(9, 2), entry(3, 10, 2023, CarStatus::Closed)),
    ];
    let tree = group_rtl(rows);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].standard.id, 2);
    assert_eq!(tree[0].indicators.len(), 1);
    assert_eq!(tree[0].indicators[0].indicator.id, 8);
  }

  #[test]
  fn all_closed_yields_nothing() {
    let rows = vec![(standard(1), indicator(7, 1), entry(1, 10, 2023, CarStatus::Closed))];
    assert!(group_rtl(rows).is_empty());
  }

  #[test]
  fn summary_average_uses_weights() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let cycle = AuditCycle { id: 1, year: 2024, sk_number: None, start_date: date, end_date: date };
    let department = Department { id: 1, name: "Teknik Elektro".into(), owner_user_id: None };
    let mut cars = CarCounts::default();
    cars.add(CarStatus::Open, 1);

    let summary = CycleSummary::new(
      cycle.clone(),
      department.clone(),
      10,
      &[(Score::ExceedsStandard, 1), (Score::MeetsStandard, 2), (Score::Minor, 1)],
      cars,
    );
    assert_eq!(summary.scored_count, 4);
    assert_eq!(summary.average_score, Some(11.0 / 4.0));
    assert_eq!(summary.score_counts.get("Sesuai Standar"), Some(&2));
    assert_eq!(summary.car_counts.open, 1);

    let empty = CycleSummary::new(cycle, department, 10, &[], CarCounts::default());
    assert_eq!(empty.average_score, None);
    assert!(empty.score_counts.is_empty());
  }
}
