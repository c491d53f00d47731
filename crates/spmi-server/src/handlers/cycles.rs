//! Handlers for `/cycles` (audit schedule headers and their assignments).
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/cycles` | Scoped; optional `?year=&department_id=` |
//! | `POST` | `/cycles` | Admin |
//! | `GET\|PUT\|DELETE` | `/cycles/{id}` | Writes admin only; 409 once scored |
//! | `GET`  | `/cycles/{id}/checklist` | Applicable indicators with progress |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use spmi_core::{
  report::ChecklistRow,
  schedule::{CycleDetail, CycleFilter, CycleInput},
  store::{AuditStore, ScheduleStore, SpmiStore},
};
use tracing::info;

use super::visible_cycle;
use crate::{AppState, auth::Authenticated, error::Error};

/// Narrow a client filter to what the caller may see.
pub(crate) fn scoped(ctx: &spmi_core::access::AuthContext, mut filter: CycleFilter) -> CycleFilter {
  if let Some(id) = ctx.auditor_scope() {
    filter.auditor_user_id = Some(id);
  }
  if let Some(id) = ctx.owner_scope() {
    filter.owner_user_id = Some(id);
  }
  filter
}

/// `GET /cycles`
pub async fn list<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Query(filter): Query<CycleFilter>,
) -> Result<Json<Vec<CycleDetail>>, Error> {
  let cycles = state.store.list_cycles(scoped(&ctx, filter)).await.map_err(Error::store)?;
  Ok(Json(cycles))
}

/// `GET /cycles/{id}`
pub async fn get_one<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<Json<CycleDetail>, Error> {
  Ok(Json(visible_cycle(&state, &ctx, id).await?))
}

/// `POST /cycles`
pub async fn create<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Json(body): Json<CycleInput>,
) -> Result<impl IntoResponse, Error> {
  ctx.require_admin()?;
  let cycle = state.store.create_cycle(body).await.map_err(Error::store)?;
  info!(
    cycle_id = cycle.cycle.id,
    year = cycle.cycle.year,
    department_id = cycle.department.id,
    user = %ctx.username,
    "created audit cycle"
  );
  Ok((StatusCode::CREATED, Json(cycle)))
}

/// `PUT /cycles/{id}`
pub async fn update<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
  Json(body): Json<CycleInput>,
) -> Result<Json<CycleDetail>, Error> {
  ctx.require_admin()?;
  let cycle = state.store.update_cycle(id, body).await.map_err(Error::store)?;
  info!(cycle_id = id, user = %ctx.username, "updated audit cycle");
  Ok(Json(cycle))
}

/// `DELETE /cycles/{id}`
pub async fn delete<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
  ctx.require_admin()?;
  let orphans = state.store.delete_cycle(id).await.map_err(Error::store)?;
  info!(cycle_id = id, files = orphans.len(), user = %ctx.username, "deleted audit cycle");
  state.storage.remove_orphans(orphans).await;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /cycles/{id}/checklist`
pub async fn checklist<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<Json<Vec<ChecklistRow>>, Error> {
  visible_cycle(&state, &ctx, id).await?;
  let rows = state.store.checklist(id).await.map_err(Error::store)?;
  Ok(Json(rows))
}
