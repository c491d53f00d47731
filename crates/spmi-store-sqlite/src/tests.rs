//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use spmi_core::{
  Error as CoreError,
  access::Role,
  car::{CarFilter, CarResponseInput, CarStatus, VerifyInput},
  catalog::{IndicatorFilter, NewCriterion, NewIndicator, NewScope, NewStandard},
  directory::{DepartmentFilter, NewDepartment, NewUser},
  evidence::{NewEvidence, StoredFile},
  schedule::{CycleFilter, CycleInput},
  score::{NonconformityLevel, NoteUpdate, Score, ScoreChange, ScoreInput},
  store::{AuditStore, CatalogStore, DirectoryStore, ReportStore, ScheduleStore},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

fn core(err: Error) -> CoreError {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a domain error, got {other:?}"),
  }
}

/// A seeded catalog with one department, its auditee and two auditors.
struct Fixture {
  store:      SqliteStore,
  auditor:    i64,
  auditor2:   i64,
  auditee:    i64,
  department: i64,
  criterion:  i64,
  standard:   i64,
  indicator:  i64,
}

async fn user(s: &SqliteStore, username: &str, roles: Vec<Role>) -> i64 {
  s.upsert_user(NewUser {
    username: username.into(),
    name: username.to_uppercase(),
    password_hash: "$argon2id$placeholder".into(),
    roles,
  })
  .await
  .unwrap()
  .id
}

async fn fixture() -> Fixture {
  let store = store().await;
  let auditor = user(&store, "andi", vec![Role::Auditor]).await;
  let auditor2 = user(&store, "sari", vec![Role::Auditor, Role::Auditee]).await;
  let auditee = user(&store, "budi", vec![Role::Auditee]).await;

  let department = store
    .create_department(NewDepartment {
      name:          "Teknik Informatika".into(),
      owner_user_id: Some(auditee),
    })
    .await
    .unwrap()
    .id;

  let scope = store.create_scope(NewScope { name: "Pendidikan".into() }).await.unwrap().id;
  let criterion = store
    .create_criterion(NewCriterion { name: "Sumber Daya Manusia".into(), scope_id: scope })
    .await
    .unwrap()
    .id;
  let standard = store
    .create_standard(NewStandard {
      statement: "Dosen tetap memiliki jabatan fungsional".into(),
      criterion_id: criterion,
      department_id: None,
    })
    .await
    .unwrap()
    .id;
  let indicator = store
    .create_indicator(NewIndicator {
      statement: "Persentase dosen berjabatan Lektor".into(),
      criterion_id: criterion,
      standard_id: standard,
    })
    .await
    .unwrap()
    .id;

  Fixture { store, auditor, auditor2, auditee, department, criterion, standard, indicator }
}

impl Fixture {
  async fn cycle(&self, year: i32) -> i64 {
    self
      .store
      .create_cycle(CycleInput {
        year,
        sk_number: Some(format!("012/SK/{year}")),
        start_date: date(year, 3, 1),
        end_date: date(year, 3, 31),
        department_id: self.department,
        auditor_ids: vec![self.auditor],
      })
      .await
      .unwrap()
      .cycle
      .id
  }
}

fn minor(finding: &str, due: &str) -> ScoreChange {
  ScoreInput {
    score:        "Ketidaksesuaian Minor".into(),
    finding:      Some(finding.into()),
    due_date:     Some(due.into()),
    auditor_note: None,
  }
  .validate()
  .unwrap()
}

fn conforming(score: &str) -> ScoreChange {
  ScoreInput { score: score.into(), ..Default::default() }.validate().unwrap()
}

fn file(path: &str) -> StoredFile {
  StoredFile {
    path:         path.into(),
    name:         "notulen.pdf".into(),
    content_hash: "ab".repeat(32),
    size_bytes:   2048,
  }
}

fn response() -> spmi_core::car::CarResponse {
  CarResponseInput {
    root_cause:        Some("SOP belum disosialisasikan".into()),
    corrective_action: Some("Sosialisasi SOP ke seluruh dosen".into()),
    link:              None,
  }
  .validate()
  .unwrap()
}

fn verify(status: &str, score: &str) -> spmi_core::car::CarVerification {
  VerifyInput { status: status.into(), score: Some(score.into()) }.validate().unwrap()
}

// ─── Users and departments ───────────────────────────────────────────────────

#[tokio::test]
async fn upsert_user_replaces_roles_in_order() {
  let s = store().await;
  let id = user(&s, "dewi", vec![Role::Auditee]).await;
  let again = user(&s, "dewi", vec![Role::Auditor, Role::Auditee, Role::Auditor]).await;
  assert_eq!(id, again);

  let creds = s.find_credentials("dewi".into()).await.unwrap().unwrap();
  assert_eq!(creds.user.roles, vec![Role::Auditor, Role::Auditee]);
  assert_eq!(creds.password_hash, "$argon2id$placeholder");
  assert!(s.find_credentials("nobody".into()).await.unwrap().is_none());

  let auditors = s.list_users(Some(Role::Auditor)).await.unwrap();
  assert_eq!(auditors.len(), 1);
}

#[tokio::test]
async fn department_owner_must_exist() {
  let s = store().await;
  let err = s
    .create_department(NewDepartment { name: "Farmasi".into(), owner_user_id: Some(99) })
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(e) if e.contains("owner_user_id")));
}

#[tokio::test]
async fn referenced_department_cannot_be_deleted() {
  let f = fixture().await;
  f.cycle(2024).await;
  let err = f.store.delete_department(f.department).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Conflict(_)));
}

#[tokio::test]
async fn auditor_departments_follow_assignments() {
  let f = fixture().await;
  f.cycle(2024).await;

  let mine = f
    .store
    .list_departments(DepartmentFilter { auditor_user_id: Some(f.auditor), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(mine.len(), 1);

  let other_year = f
    .store
    .list_departments(DepartmentFilter {
      auditor_user_id: Some(f.auditor),
      year:            Some(2023),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(other_year.is_empty());

  let unassigned = f
    .store
    .list_departments(DepartmentFilter { auditor_user_id: Some(f.auditor2), ..Default::default() })
    .await
    .unwrap();
  assert!(unassigned.is_empty());
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn indicator_standard_must_share_criterion() {
  let f = fixture().await;
  let scope = f.store.create_scope(NewScope { name: "Penelitian".into() }).await.unwrap().id;
  let other = f
    .store
    .create_criterion(NewCriterion { name: "Luaran".into(), scope_id: scope })
    .await
    .unwrap()
    .id;

  let err = f
    .store
    .create_indicator(NewIndicator {
      statement:    "Jumlah publikasi".into(),
      criterion_id: other,
      standard_id:  f.standard,
    })
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(e) if e.contains("standard_id")));
}

#[tokio::test]
async fn missing_parent_is_a_field_error() {
  let s = store().await;
  let err = s
    .create_criterion(NewCriterion { name: "Kurikulum".into(), scope_id: 42 })
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(e) if e.contains("scope_id")));
}

#[tokio::test]
async fn deleting_a_scope_cascades_and_reports_files() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let evidence =
    NewEvidence::new(Some(file("bukti_audit/1/a.pdf")), None, Role::Auditee, f.auditee).unwrap();
  f.store.add_evidence(cycle, f.indicator, evidence).await.unwrap();
  f.store.record_score(cycle, f.indicator, minor("x", "2024-06-30")).await.unwrap();

  let scope = f.store.list_scopes().await.unwrap()[0].id;
  let paths = f.store.delete_scope(scope).await.unwrap();
  assert_eq!(paths, vec!["bukti_audit/1/a.pdf".to_string()]);

  assert!(f.store.get_criterion(f.criterion).await.unwrap().is_none());
  assert!(
    f.store.list_indicators(IndicatorFilter::default()).await.unwrap().is_empty()
  );
  assert!(f.store.list_cars(CarFilter::default()).await.unwrap().is_empty());

  let err = f.store.delete_scope(scope).await.unwrap_err();
  assert!(matches!(core(err), CoreError::NotFound { .. }));
}

// ─── Schedule ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_cycle_per_year_and_department() {
  let f = fixture().await;
  f.cycle(2024).await;
  let err = f
    .store
    .create_cycle(CycleInput {
      year:          2024,
      sk_number:     None,
      start_date:    date(2024, 9, 1),
      end_date:      date(2024, 9, 30),
      department_id: f.department,
      auditor_ids:   vec![f.auditor2],
    })
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Conflict(_)));
}

#[tokio::test]
async fn assigned_users_must_be_auditors() {
  let f = fixture().await;
  let err = f
    .store
    .create_cycle(CycleInput {
      year:          2024,
      sk_number:     None,
      start_date:    date(2024, 3, 1),
      end_date:      date(2024, 3, 31),
      department_id: f.department,
      auditor_ids:   vec![f.auditee],
    })
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(e) if e.contains("auditor_ids")));
}

#[tokio::test]
async fn scored_cycle_is_locked() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let detail = f.store.get_cycle(cycle).await.unwrap().unwrap();
  assert!(!detail.locked);

  // Evidence alone does not lock the cycle.
  let note = NewEvidence::new(None, Some("Lihat SK".into()), Role::Auditee, f.auditee).unwrap();
  f.store.add_evidence(cycle, f.indicator, note).await.unwrap();
  assert!(!f.store.get_cycle(cycle).await.unwrap().unwrap().locked);

  f.store.record_score(cycle, f.indicator, conforming("Sesuai Standar")).await.unwrap();
  assert!(f.store.get_cycle(cycle).await.unwrap().unwrap().locked);

  let mut input = CycleInput {
    year:          2024,
    sk_number:     Some("099/SK/2024".into()),
    start_date:    date(2024, 3, 1),
    end_date:      date(2024, 4, 15),
    department_id: f.department,
    auditor_ids:   vec![f.auditor],
  };
  let updated = f.store.update_cycle(cycle, input.clone()).await.unwrap();
  assert_eq!(updated.cycle.sk_number.as_deref(), Some("099/SK/2024"));
  assert_eq!(updated.cycle.end_date, date(2024, 4, 15));

  input.auditor_ids = vec![f.auditor, f.auditor2];
  let err = f.store.update_cycle(cycle, input).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Conflict(_)));

  let err = f.store.delete_cycle(cycle).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Conflict(_)));
}

#[tokio::test]
async fn unlocked_cycle_can_be_reassigned_and_deleted() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let updated = f
    .store
    .update_cycle(cycle, CycleInput {
      year:          2024,
      sk_number:     None,
      start_date:    date(2024, 3, 1),
      end_date:      date(2024, 3, 31),
      department_id: f.department,
      auditor_ids:   vec![f.auditor2],
    })
    .await
    .unwrap();
  assert!(updated.is_auditor(f.auditor2));
  assert!(!updated.is_auditor(f.auditor));

  let note = NewEvidence::new(Some(file("bukti_audit/1/b.pdf")), None, Role::Auditee, f.auditee)
    .unwrap();
  f.store.add_evidence(cycle, f.indicator, note).await.unwrap();
  let paths = f.store.delete_cycle(cycle).await.unwrap();
  assert_eq!(paths, vec!["bukti_audit/1/b.pdf".to_string()]);
  assert!(f.store.get_cycle(cycle).await.unwrap().is_none());
}

#[tokio::test]
async fn cycles_filter_by_auditor_and_owner() {
  let f = fixture().await;
  f.cycle(2023).await;
  f.cycle(2024).await;

  let by_auditor = f
    .store
    .list_cycles(CycleFilter { auditor_user_id: Some(f.auditor), ..Default::default() })
    .await
    .unwrap();
  let years: Vec<i32> = by_auditor.iter().map(|c| c.cycle.year).collect();
  assert_eq!(years, vec![2024, 2023]);

  let by_owner = f
    .store
    .list_cycles(CycleFilter { owner_user_id: Some(f.auditor2), ..Default::default() })
    .await
    .unwrap();
  assert!(by_owner.is_empty());
}

// ─── Uniqueness ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn assessment_and_car_are_unique_per_cycle_indicator() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  f.store.record_score(cycle, f.indicator, minor("x", "2024-06-30")).await.unwrap();
  // Repeated scoring still leaves a single row each.
  f.store.record_score(cycle, f.indicator, minor("y", "2024-07-31")).await.unwrap();

  let dup_assessment = f
    .store
    .execute_raw(
      "INSERT INTO assessments (cycle_id, indicator_id, score, updated_at)
       SELECT cycle_id, indicator_id, score, updated_at FROM assessments",
    )
    .await;
  assert!(dup_assessment.is_err());

  let dup_car = f
    .store
    .execute_raw(
      "INSERT INTO cars (cycle_id, indicator_id, level, finding, status, created_at, updated_at)
       SELECT cycle_id, indicator_id, level, finding, status, created_at, updated_at FROM cars",
    )
    .await;
  assert!(dup_car.is_err());

  assert_eq!(f.store.list_cars(CarFilter::default()).await.unwrap().len(), 1);
}

// ─── Scoring ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn nonconformity_score_opens_a_car() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;

  let outcome = f
    .store
    .record_score(cycle, f.indicator, minor("Dokumen tidak lengkap", "2024-06-30"))
    .await
    .unwrap();

  assert_eq!(outcome.assessment.score, Some(Score::Minor));
  let car = outcome.car.expect("CAR created");
  assert_eq!(car.status, CarStatus::Open);
  assert_eq!(car.level, NonconformityLevel::Minor);
  assert_eq!(car.finding, "Dokumen tidak lengkap");
  assert_eq!(car.due_date, Some(date(2024, 6, 30)));
  assert_eq!(car.ptk_number, None);
}

#[tokio::test]
async fn rescoring_reopens_a_closed_car() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let car = f
    .store
    .record_score(cycle, f.indicator, minor("Dokumen tidak lengkap", "2024-06-30"))
    .await
    .unwrap()
    .car
    .unwrap();
  f.store.respond_car(car.id, response(), None).await.unwrap();
  let closed = f.store.verify_car(car.id, verify("Close", "Sesuai Standar"), 2024).await.unwrap();
  assert_eq!(closed.status, CarStatus::Closed);

  let reopened = f
    .store
    .record_score(cycle, f.indicator, ScoreInput {
      score:        "Ketidaksesuaian Mayor".into(),
      finding:      Some("Dokumen palsu".into()),
      due_date:     Some("2024-08-31".into()),
      auditor_note: None,
    }
    .validate()
    .unwrap())
    .await
    .unwrap()
    .car
    .unwrap();

  assert_eq!(reopened.id, car.id);
  assert_eq!(reopened.status, CarStatus::Open);
  assert_eq!(reopened.level, NonconformityLevel::Mayor);
  assert_eq!(reopened.finding, "Dokumen palsu");
  assert_eq!(reopened.due_date, Some(date(2024, 8, 31)));
  assert_eq!(reopened.closed_at, None);
  assert_eq!(reopened.ptk_number, closed.ptk_number);
}

#[tokio::test]
async fn conforming_score_creates_no_car() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  for score in ["Melampaui Standar", "Sesuai Standar"] {
    let outcome = f.store.record_score(cycle, f.indicator, conforming(score)).await.unwrap();
    assert!(outcome.car.is_none());
  }
  assert!(f.store.list_cars(CarFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn conforming_rescore_leaves_car_untouched() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let car = f
    .store
    .record_score(cycle, f.indicator, minor("Dokumen tidak lengkap", "2024-06-30"))
    .await
    .unwrap()
    .car
    .unwrap();

  f.store.record_score(cycle, f.indicator, conforming("Sesuai Standar")).await.unwrap();

  let after = f.store.get_car(car.id).await.unwrap().unwrap();
  assert_eq!(after, car);
}

#[tokio::test]
async fn omitted_note_keeps_previous_note() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let mut change = conforming("Sesuai Standar");
  change.auditor_note = NoteUpdate::Set("Dokumen lengkap".into());
  f.store.record_score(cycle, f.indicator, change).await.unwrap();

  let outcome = f.store.record_score(cycle, f.indicator, conforming("Melampaui Standar")).await.unwrap();
  assert_eq!(outcome.assessment.auditor_note.as_deref(), Some("Dokumen lengkap"));
  assert_eq!(outcome.assessment.score, Some(Score::ExceedsStandard));
}

#[tokio::test]
async fn blank_note_clears_previous_note() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let mut change = conforming("Sesuai Standar");
  change.auditor_note = NoteUpdate::Set("Dokumen lengkap".into());
  f.store.record_score(cycle, f.indicator, change).await.unwrap();

  let cleared = ScoreInput {
    score:        "Sesuai Standar".into(),
    auditor_note: Some("".into()),
    ..Default::default()
  }
  .validate()
  .unwrap();
  let outcome = f.store.record_score(cycle, f.indicator, cleared).await.unwrap();
  assert_eq!(outcome.assessment.auditor_note, None);
}

#[tokio::test]
async fn indicator_outside_department_is_rejected() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let other = f
    .store
    .create_department(NewDepartment { name: "Farmasi".into(), owner_user_id: None })
    .await
    .unwrap()
    .id;
  let standard = f
    .store
    .create_standard(NewStandard {
      statement: "Laboratorium terakreditasi".into(),
      criterion_id: f.criterion,
      department_id: Some(other),
    })
    .await
    .unwrap()
    .id;
  let indicator = f
    .store
    .create_indicator(NewIndicator {
      statement: "Sertifikat laboratorium".into(),
      criterion_id: f.criterion,
      standard_id: standard,
    })
    .await
    .unwrap()
    .id;

  let err = f
    .store
    .record_score(cycle, indicator, conforming("Sesuai Standar"))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(e) if e.contains("indicator_id")));

  let checklist = f.store.checklist(cycle).await.unwrap();
  assert_eq!(checklist.len(), 1);
  assert_eq!(checklist[0].indicator.id, f.indicator);
}

#[tokio::test]
async fn failed_score_writes_nothing() {
  let f = fixture().await;
  let err = f
    .store
    .record_score(999, f.indicator, minor("x", "2024-06-30"))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::NotFound { entity: "audit cycle", .. }));
  assert!(f.store.list_cars(CarFilter::default()).await.unwrap().is_empty());
}

// ─── Evidence ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn evidence_before_score_creates_unscored_assessment() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;

  let input =
    NewEvidence::new(Some(file("bukti_audit/1/notulen.pdf")), None, Role::Auditee, f.auditee)
      .unwrap();
  let evidence = f.store.add_evidence(cycle, f.indicator, input).await.unwrap();
  assert_eq!(evidence.uploaded_by_role, Role::Auditee);
  assert_eq!(evidence.uploaded_by, Some(f.auditee));
  assert_eq!(evidence.note, None);
  let stored = evidence.file.as_ref().unwrap();
  assert_eq!(stored.path, "bukti_audit/1/notulen.pdf");
  assert_eq!(stored.size_bytes, 2048);

  let view = f.store.get_assessment(cycle, f.indicator).await.unwrap().unwrap();
  let assessment = view.assessment.unwrap();
  assert_eq!(assessment.score, None);
  assert_eq!(evidence.assessment_id, assessment.id);
  assert_eq!(view.evidence, vec![evidence]);
  assert!(view.car.is_none());
}

#[tokio::test]
async fn evidence_is_appended_latest_first() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  for note in ["pertama", "kedua", "ketiga"] {
    let input = NewEvidence::new(None, Some(note.into()), Role::Auditee, f.auditee).unwrap();
    f.store.add_evidence(cycle, f.indicator, input).await.unwrap();
  }

  let view = f.store.get_assessment(cycle, f.indicator).await.unwrap().unwrap();
  let notes: Vec<_> = view.evidence.iter().filter_map(|e| e.note.as_deref()).collect();
  assert_eq!(notes, vec!["ketiga", "kedua", "pertama"]);

  let checklist = f.store.checklist(cycle).await.unwrap();
  assert_eq!(checklist[0].evidence_count, 3);

  let record = f.store.get_evidence(view.evidence[0].id).await.unwrap().unwrap();
  assert_eq!(record.cycle_id, cycle);
  assert_eq!(record.indicator_id, f.indicator);

  f.store.delete_evidence(record.evidence.id).await.unwrap();
  assert!(f.store.get_evidence(record.evidence.id).await.unwrap().is_none());
  let err = f.store.delete_evidence(record.evidence.id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::NotFound { .. }));
}

// ─── CAR workflow ────────────────────────────────────────────────────────────

#[tokio::test]
async fn respond_moves_open_to_submitted_once() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let car = f
    .store
    .record_score(cycle, f.indicator, minor("Dokumen tidak lengkap", "2024-06-30"))
    .await
    .unwrap()
    .car
    .unwrap();

  let link = NewEvidence::new(
    None,
    Some("https://drive.example/sop".into()),
    Role::Auditee,
    f.auditee,
  )
  .unwrap();
  let submitted = f.store.respond_car(car.id, response(), Some(link)).await.unwrap();
  assert_eq!(submitted.status, CarStatus::Submitted);
  assert_eq!(submitted.root_cause.as_deref(), Some("SOP belum disosialisasikan"));
  assert!(submitted.submitted_at.is_some());

  let view = f.store.get_assessment(cycle, f.indicator).await.unwrap().unwrap();
  assert_eq!(view.evidence.len(), 1);

  let err = f.store.respond_car(car.id, response(), None).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Conflict(_)));
}

#[tokio::test]
async fn verify_closes_and_rewrites_score() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let car = f
    .store
    .record_score(cycle, f.indicator, minor("Dokumen tidak lengkap", "2024-06-30"))
    .await
    .unwrap()
    .car
    .unwrap();
  f.store.respond_car(car.id, response(), None).await.unwrap();

  let closed = f.store.verify_car(car.id, verify("Close", "Sesuai Standar"), 2024).await.unwrap();
  assert_eq!(closed.status, CarStatus::Closed);
  assert!(closed.closed_at.is_some());
  assert_eq!(closed.ptk_number.as_deref(), Some("001/ASA/PTK/2024"));

  let view = f.store.get_assessment(cycle, f.indicator).await.unwrap().unwrap();
  assert_eq!(view.assessment.unwrap().score, Some(Score::MeetsStandard));
  assert_eq!(f.store.list_cars(CarFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn open_car_can_be_closed_directly() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let car = f
    .store
    .record_score(cycle, f.indicator, minor("x", "2024-06-30"))
    .await
    .unwrap()
    .car
    .unwrap();
  let closed = f
    .store
    .verify_car(car.id, verify("Close", "Ketidaksesuaian Minor"), 2024)
    .await
    .unwrap();
  assert_eq!(closed.status, CarStatus::Closed);
}

#[tokio::test]
async fn ptk_number_is_allocated_once_per_car() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let second_indicator = f
    .store
    .create_indicator(NewIndicator {
      statement:    "Rasio dosen terhadap mahasiswa".into(),
      criterion_id: f.criterion,
      standard_id:  f.standard,
    })
    .await
    .unwrap()
    .id;

  let first = f
    .store
    .record_score(cycle, f.indicator, minor("a", "2024-06-30"))
    .await
    .unwrap()
    .car
    .unwrap();
  let second = f
    .store
    .record_score(cycle, second_indicator, minor("b", "2024-06-30"))
    .await
    .unwrap()
    .car
    .unwrap();

  let closed = f.store.verify_car(first.id, verify("Close", "Sesuai Standar"), 2024).await.unwrap();
  assert_eq!(closed.ptk_number.as_deref(), Some("001/ASA/PTK/2024"));

  // Reopen and close again: the number does not change.
  let reopened = f.store.verify_car(first.id, verify("OPEN", "Ketidaksesuaian Minor"), 2024).await.unwrap();
  assert_eq!(reopened.status, CarStatus::Open);
  assert_eq!(reopened.ptk_number.as_deref(), Some("001/ASA/PTK/2024"));
  let again = f.store.verify_car(first.id, verify("Close", "Sesuai Standar"), 2024).await.unwrap();
  assert_eq!(again.ptk_number.as_deref(), Some("001/ASA/PTK/2024"));

  let second = f.store.verify_car(second.id, verify("Close", "Sesuai Standar"), 2025).await.unwrap();
  assert_eq!(second.ptk_number.as_deref(), Some("001/ASA/PTK/2025"));

  // Reading the document never allocates.
  let document = f.store.ptk_document(first.id).await.unwrap().unwrap();
  assert_eq!(document.ptk_number.as_deref(), Some("001/ASA/PTK/2024"));
  assert_eq!(document.auditors.len(), 1);
  assert_eq!(document.score, Some(Score::MeetsStandard));
  assert!(f.store.ptk_document(999).await.unwrap().is_none());
}

#[tokio::test]
async fn cars_are_scoped_by_auditor_and_owner() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  f.store.record_score(cycle, f.indicator, minor("x", "2024-06-30")).await.unwrap();

  let mine = f
    .store
    .list_cars(CarFilter { auditor_user_id: Some(f.auditor), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(mine.len(), 1);

  let not_mine = f
    .store
    .list_cars(CarFilter { auditor_user_id: Some(f.auditor2), ..Default::default() })
    .await
    .unwrap();
  assert!(not_mine.is_empty());

  let owned = f
    .store
    .list_cars(CarFilter {
      owner_user_id: Some(f.auditee),
      status: Some(CarStatus::Open),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(owned.len(), 1);
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rtl_is_empty_when_every_car_is_closed() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  let car = f
    .store
    .record_score(cycle, f.indicator, minor("x", "2024-06-30"))
    .await
    .unwrap()
    .car
    .unwrap();
  assert_eq!(f.store.rtl(f.department).await.unwrap().len(), 1);

  f.store.verify_car(car.id, verify("Close", "Sesuai Standar"), 2024).await.unwrap();
  assert!(f.store.rtl(f.department).await.unwrap().is_empty());
}

#[tokio::test]
async fn rtl_keeps_one_entry_per_open_car_across_cycles() {
  let f = fixture().await;
  let older = f.cycle(2023).await;
  let newer = f.cycle(2024).await;

  let evidence = NewEvidence::new(None, Some("bukti 2023".into()), Role::Auditee, f.auditee).unwrap();
  f.store.add_evidence(older, f.indicator, evidence).await.unwrap();
  f.store.record_score(older, f.indicator, minor("temuan 2023", "2023-06-30")).await.unwrap();
  f.store
    .record_score(newer, f.indicator, ScoreInput {
      score:        "Ketidaksesuaian Observasi".into(),
      finding:      Some("temuan 2024".into()),
      due_date:     Some("2024-06-30".into()),
      auditor_note: None,
    }
    .validate()
    .unwrap())
    .await
    .unwrap();

  let tree = f.store.rtl(f.department).await.unwrap();
  assert_eq!(tree.len(), 1);
  assert_eq!(tree[0].standard.id, f.standard);
  assert_eq!(tree[0].indicators.len(), 1);

  let entries = &tree[0].indicators[0].entries;
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[0].cycle_year, 2024);
  assert_eq!(entries[0].score, Some(Score::Observation));
  assert!(entries[0].evidence.is_empty());
  assert_eq!(entries[1].cycle_year, 2023);
  assert_eq!(entries[1].score, Some(Score::Minor));
  assert_eq!(entries[1].evidence.len(), 1);
}

#[tokio::test]
async fn dashboard_counts_scores_and_cars() {
  let f = fixture().await;
  let cycle = f.cycle(2024).await;
  f.store
    .create_indicator(NewIndicator {
      statement:    "Rasio dosen terhadap mahasiswa".into(),
      criterion_id: f.criterion,
      standard_id:  f.standard,
    })
    .await
    .unwrap();
  f.store.record_score(cycle, f.indicator, minor("x", "2024-06-30")).await.unwrap();

  let summaries = f.store.cycle_summaries(CycleFilter::default()).await.unwrap();
  assert_eq!(summaries.len(), 1);
  let summary = &summaries[0];
  assert_eq!(summary.indicator_count, 2);
  assert_eq!(summary.scored_count, 1);
  assert_eq!(summary.score_counts.get("Ketidaksesuaian Minor"), Some(&1));
  assert_eq!(summary.car_counts.open, 1);
  assert_eq!(summary.average_score, Some(1.0));
}
