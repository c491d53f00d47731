//! `GET /dashboard[?year=&department_id=]`: per-cycle progress for the
//! cycles the caller can see.

use axum::{
  Json,
  extract::{Query, State},
};
use spmi_core::{
  report::CycleSummary,
  schedule::CycleFilter,
  store::{ReportStore, SpmiStore},
};

use super::cycles::scoped;
use crate::{AppState, auth::Authenticated, error::Error};

pub async fn dashboard<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Query(filter): Query<CycleFilter>,
) -> Result<Json<Vec<CycleSummary>>, Error> {
  let summaries = state
    .store
    .cycle_summaries(scoped(&ctx, filter))
    .await
    .map_err(Error::store)?;
  Ok(Json(summaries))
}
