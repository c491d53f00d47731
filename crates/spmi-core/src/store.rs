//! Storage traits implemented by backends (e.g. `spmi-store-sqlite`).
//!
//! Higher layers depend on these abstractions rather than on a concrete
//! backend. Every multi-row write named here is atomic: either all of its rows
//! persist or none do.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use crate::{
  access::Role,
  car::{Car, CarFilter, CarResponse, CarVerification},
  catalog::{
    Criterion, Indicator, IndicatorFilter, NewCriterion, NewIndicator, NewScope, NewStandard,
    Scope, Standard,
  },
  directory::{Credentials, Department, DepartmentFilter, NewDepartment, NewUser, User},
  evidence::{Evidence, EvidenceRecord, NewEvidence},
  report::{AssessmentView, ChecklistRow, CycleSummary, PtkDocument, RtlStandard},
  schedule::{CycleDetail, CycleFilter, CycleInput},
  score::{Assessment, ScoreChange},
};

/// Lets callers recover the domain-level cause of a backend error.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The domain error this backend error carries, if it is one.
  fn domain(&self) -> Option<&crate::Error>;
}

/// Storage paths of evidence files whose rows a cascading delete removed.
/// Callers remove the files themselves.
pub type OrphanedFiles = Vec<String>;

/// Result of [`AuditStore::record_score`].
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
  pub assessment: Assessment,
  /// The CAR written by this score, if the score was a nonconformity.
  pub car:        Option<Car>,
}

/// Shared error type for every storage trait of one backend.
pub trait Store: Send + Sync {
  type Error: StoreError;
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

pub trait CatalogStore: Store {
  fn list_scopes(&self) -> impl Future<Output = Result<Vec<Scope>, Self::Error>> + Send + '_;

  fn get_scope(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Scope>, Self::Error>> + Send + '_;

  fn create_scope(
    &self,
    input: NewScope,
  ) -> impl Future<Output = Result<Scope, Self::Error>> + Send + '_;

  fn update_scope(
    &self,
    id: i64,
    input: NewScope,
  ) -> impl Future<Output = Result<Scope, Self::Error>> + Send + '_;

  /// Delete a scope and everything beneath it.
  fn delete_scope(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<OrphanedFiles, Self::Error>> + Send + '_;

  fn list_criteria(
    &self,
    scope_id: Option<i64>,
  ) -> impl Future<Output = Result<Vec<Criterion>, Self::Error>> + Send + '_;

  fn get_criterion(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Criterion>, Self::Error>> + Send + '_;

  /// Returns a validation error if `scope_id` does not exist.
  fn create_criterion(
    &self,
    input: NewCriterion,
  ) -> impl Future<Output = Result<Criterion, Self::Error>> + Send + '_;

  fn update_criterion(
    &self,
    id: i64,
    input: NewCriterion,
  ) -> impl Future<Output = Result<Criterion, Self::Error>> + Send + '_;

  fn delete_criterion(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<OrphanedFiles, Self::Error>> + Send + '_;

  fn list_standards(
    &self,
    criterion_id: Option<i64>,
  ) -> impl Future<Output = Result<Vec<Standard>, Self::Error>> + Send + '_;

  fn get_standard(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Standard>, Self::Error>> + Send + '_;

  fn create_standard(
    &self,
    input: NewStandard,
  ) -> impl Future<Output = Result<Standard, Self::Error>> + Send + '_;

  fn update_standard(
    &self,
    id: i64,
    input: NewStandard,
  ) -> impl Future<Output = Result<Standard, Self::Error>> + Send + '_;

  fn delete_standard(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<OrphanedFiles, Self::Error>> + Send + '_;

  fn list_indicators(
    &self,
    filter: IndicatorFilter,
  ) -> impl Future<Output = Result<Vec<Indicator>, Self::Error>> + Send + '_;

  fn get_indicator(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Indicator>, Self::Error>> + Send + '_;

  /// Returns a validation error if the standard is missing or belongs to a
  /// different criterion.
  fn create_indicator(
    &self,
    input: NewIndicator,
  ) -> impl Future<Output = Result<Indicator, Self::Error>> + Send + '_;

  fn update_indicator(
    &self,
    id: i64,
    input: NewIndicator,
  ) -> impl Future<Output = Result<Indicator, Self::Error>> + Send + '_;

  fn delete_indicator(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<OrphanedFiles, Self::Error>> + Send + '_;
}

// ─── Users and departments ───────────────────────────────────────────────────

pub trait DirectoryStore: Store {
  /// Insert or replace a user by username, including its role list.
  fn upsert_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn find_credentials(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  fn list_users(
    &self,
    role: Option<Role>,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  fn list_departments(
    &self,
    filter: DepartmentFilter,
  ) -> impl Future<Output = Result<Vec<Department>, Self::Error>> + Send + '_;

  fn get_department(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Department>, Self::Error>> + Send + '_;

  fn create_department(
    &self,
    input: NewDepartment,
  ) -> impl Future<Output = Result<Department, Self::Error>> + Send + '_;

  fn update_department(
    &self,
    id: i64,
    input: NewDepartment,
  ) -> impl Future<Output = Result<Department, Self::Error>> + Send + '_;

  /// Reassign the accountable auditee.
  fn set_department_owner(
    &self,
    id: i64,
    owner_user_id: Option<i64>,
  ) -> impl Future<Output = Result<Department, Self::Error>> + Send + '_;

  /// Returns a conflict if standards or cycles still reference it.
  fn delete_department(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Schedule ────────────────────────────────────────────────────────────────

pub trait ScheduleStore: Store {
  fn list_cycles(
    &self,
    filter: CycleFilter,
  ) -> impl Future<Output = Result<Vec<CycleDetail>, Self::Error>> + Send + '_;

  fn get_cycle(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<CycleDetail>, Self::Error>> + Send + '_;

  /// Write the header and its assignments in one transaction.
  fn create_cycle(
    &self,
    input: CycleInput,
  ) -> impl Future<Output = Result<CycleDetail, Self::Error>> + Send + '_;

  /// Returns a conflict if the cycle is locked and `input` reassigns it.
  fn update_cycle(
    &self,
    id: i64,
    input: CycleInput,
  ) -> impl Future<Output = Result<CycleDetail, Self::Error>> + Send + '_;

  /// Returns a conflict if the cycle is locked.
  fn delete_cycle(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<OrphanedFiles, Self::Error>> + Send + '_;
}

// ─── Scoring, evidence and CARs ──────────────────────────────────────────────

pub trait AuditStore: Store {
  /// Upsert the assessment and, for nonconformity scores, the CAR (reset to
  /// `OPEN`) in one transaction.
  fn record_score(
    &self,
    cycle_id: i64,
    indicator_id: i64,
    change: ScoreChange,
  ) -> impl Future<Output = Result<ScoreOutcome, Self::Error>> + Send + '_;

  /// Append an evidence row, creating an unscored assessment if needed.
  fn add_evidence(
    &self,
    cycle_id: i64,
    indicator_id: i64,
    input: NewEvidence,
  ) -> impl Future<Output = Result<Evidence, Self::Error>> + Send + '_;

  fn get_evidence(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<EvidenceRecord>, Self::Error>> + Send + '_;

  /// Delete the evidence row only; the caller owns file removal.
  fn delete_evidence(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_assessment(
    &self,
    cycle_id: i64,
    indicator_id: i64,
  ) -> impl Future<Output = Result<Option<AssessmentView>, Self::Error>> + Send + '_;

  /// Every indicator applicable to the cycle's department.
  fn checklist(
    &self,
    cycle_id: i64,
  ) -> impl Future<Output = Result<Vec<ChecklistRow>, Self::Error>> + Send + '_;

  fn get_car(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Car>, Self::Error>> + Send + '_;

  fn list_cars(
    &self,
    filter: CarFilter,
  ) -> impl Future<Output = Result<Vec<Car>, Self::Error>> + Send + '_;

  /// `OPEN → SUBMITTED`, with optional evidence written in the same
  /// transaction.
  fn respond_car(
    &self,
    id: i64,
    response: CarResponse,
    evidence: Option<NewEvidence>,
  ) -> impl Future<Output = Result<Car, Self::Error>> + Send + '_;

  /// Set the status and the assessment score together. Closing allocates the
  /// PTK number for `year` unless the CAR already has one.
  fn verify_car(
    &self,
    id: i64,
    verification: CarVerification,
    year: i32,
  ) -> impl Future<Output = Result<Car, Self::Error>> + Send + '_;
}

// ─── Reports ─────────────────────────────────────────────────────────────────

pub trait ReportStore: Store {
  /// Unresolved CARs across every cycle the department took part in.
  fn rtl(
    &self,
    department_id: i64,
  ) -> impl Future<Output = Result<Vec<RtlStandard>, Self::Error>> + Send + '_;

  fn cycle_summaries(
    &self,
    filter: CycleFilter,
  ) -> impl Future<Output = Result<Vec<CycleSummary>, Self::Error>> + Send + '_;

  fn ptk_document(
    &self,
    car_id: i64,
  ) -> impl Future<Output = Result<Option<PtkDocument>, Self::Error>> + Send + '_;
}

/// Everything the HTTP layer needs from a backend.
pub trait SpmiStore:
  CatalogStore + DirectoryStore + ScheduleStore + AuditStore + ReportStore
{
}

impl<T> SpmiStore for T where
  T: CatalogStore + DirectoryStore + ScheduleStore + AuditStore + ReportStore
{
}
