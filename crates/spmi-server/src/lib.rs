//! HTTP surface for the SPMI audit service.
//!
//! Exposes an axum [`Router`] serving the JSON API over any [`SpmiStore`],
//! authenticating every request with HTTP Basic credentials and an optional
//! `X-Active-Role` header.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod storage;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post, put},
};
use serde::Deserialize;
use spmi_core::{directory::NewUser, store::SpmiStore};
use tower_http::{services::ServeDir, trace::TraceLayer};

use handlers::{audit, cars, catalog, cycles, departments, reports, users};
use storage::EvidenceStorage;

/// Room for multipart framing and text fields on top of the largest file.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SPMI_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  #[serde(default = "default_base_url")]
  pub base_url:               String,
  #[serde(default = "default_database_path")]
  pub database_path:          PathBuf,
  /// Root for uploaded evidence, served under `/files`.
  #[serde(default = "default_storage_dir")]
  pub storage_dir:            PathBuf,
  #[serde(default = "default_max_evidence_bytes")]
  pub max_evidence_bytes:     u64,
  #[serde(default = "default_max_car_response_bytes")]
  pub max_car_response_bytes: u64,
  /// Accounts upserted at startup.
  #[serde(default)]
  pub users:                  Vec<NewUser>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_base_url() -> String { "http://localhost:8080".into() }
fn default_database_path() -> PathBuf { PathBuf::from("spmi.db") }
fn default_storage_dir() -> PathBuf { PathBuf::from("storage") }
fn default_max_evidence_bytes() -> u64 { 10 * 1024 * 1024 }
fn default_max_car_response_bytes() -> u64 { 20 * 1024 * 1024 }

impl ServerConfig {
  fn body_limit(&self) -> usize {
    let largest = self.max_evidence_bytes.max(self.max_car_response_bytes);
    usize::try_from(largest.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX)
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:   Arc<S>,
  pub storage: Arc<EvidenceStorage>,
  pub config:  Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      storage: Arc::clone(&self.storage),
      config:  Arc::clone(&self.config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the audit API.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: SpmiStore + 'static,
{
  let files = ServeDir::new(state.storage.root());
  let body_limit = state.config.body_limit();

  Router::new()
    .route("/health", get(handlers::health))
    .route("/me", get(handlers::me))
    // Catalog
    .route("/scopes", get(catalog::list_scopes::<S>).post(catalog::create_scope::<S>))
    .route(
      "/scopes/{id}",
      get(catalog::get_scope::<S>)
        .put(catalog::update_scope::<S>)
        .delete(catalog::delete_scope::<S>),
    )
    .route("/criteria", get(catalog::list_criteria::<S>).post(catalog::create_criterion::<S>))
    .route(
      "/criteria/{id}",
      get(catalog::get_criterion::<S>)
        .put(catalog::update_criterion::<S>)
        .delete(catalog::delete_criterion::<S>),
    )
    .route("/standards", get(catalog::list_standards::<S>).post(catalog::create_standard::<S>))
    .route(
      "/standards/{id}",
      get(catalog::get_standard::<S>)
        .put(catalog::update_standard::<S>)
        .delete(catalog::delete_standard::<S>),
    )
    .route(
      "/indicators",
      get(catalog::list_indicators::<S>).post(catalog::create_indicator::<S>),
    )
    .route(
      "/indicators/{id}",
      get(catalog::get_indicator::<S>)
        .put(catalog::update_indicator::<S>)
        .delete(catalog::delete_indicator::<S>),
    )
    // Directory
    .route("/departments", get(departments::list::<S>).post(departments::create::<S>))
    .route(
      "/departments/{id}",
      get(departments::get_one::<S>)
        .put(departments::update::<S>)
        .delete(departments::delete::<S>),
    )
    .route("/departments/{id}/owner", put(departments::set_owner::<S>))
    .route("/departments/{id}/rtl", get(departments::rtl::<S>))
    .route("/users", get(users::list::<S>))
    // Schedule
    .route("/cycles", get(cycles::list::<S>).post(cycles::create::<S>))
    .route(
      "/cycles/{id}",
      get(cycles::get_one::<S>).put(cycles::update::<S>).delete(cycles::delete::<S>),
    )
    .route("/cycles/{id}/checklist", get(cycles::checklist::<S>))
    // Scoring and evidence
    .route("/cycles/{cycle}/indicators/{indicator}", get(audit::get_assessment::<S>))
    .route("/cycles/{cycle}/indicators/{indicator}/score", put(audit::record_score::<S>))
    .route("/cycles/{cycle}/indicators/{indicator}/evidence", post(audit::add_evidence::<S>))
    .route("/evidence/{id}", axum::routing::delete(audit::delete_evidence::<S>))
    // CARs
    .route("/cars", get(cars::list::<S>))
    .route("/cars/{id}", get(cars::get_one::<S>))
    .route("/cars/{id}/response", post(cars::respond::<S>))
    .route("/cars/{id}/verify", post(cars::verify::<S>))
    .route("/cars/{id}/ptk", get(cars::ptk::<S>))
    // Reports
    .route("/dashboard", get(reports::dashboard::<S>))
    .nest_service("/files", files)
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
