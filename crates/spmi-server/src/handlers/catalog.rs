//! Handlers for the audit catalog: scopes, criteria, standards, indicators.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/scopes` | |
//! | `POST` | `/scopes` | Admin. Body: `{"name":".."}` |
//! | `GET\|PUT\|DELETE` | `/scopes/{id}` | Writes admin only; delete cascades |
//! | `GET`  | `/criteria` | Optional `?scope_id=` |
//! | `GET`  | `/standards` | Optional `?criterion_id=` |
//! | `GET`  | `/indicators` | Optional `?criterion_id=&standard_id=` |
//!
//! Criteria, standards and indicators follow the same shape as scopes.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use spmi_core::{
  Error as CoreError,
  catalog::{
    Criterion, Indicator, IndicatorFilter, NewCriterion, NewIndicator, NewScope, NewStandard,
    Scope, Standard,
  },
  store::{CatalogStore, SpmiStore},
};
use tracing::info;

use crate::{AppState, auth::Authenticated, error::Error};

// ─── Scopes ───────────────────────────────────────────────────────────────────

/// `GET /scopes`
pub async fn list_scopes<S: SpmiStore>(
  State(state): State<AppState<S>>,
  _: Authenticated,
) -> Result<Json<Vec<Scope>>, Error> {
  let scopes = state.store.list_scopes().await.map_err(Error::store)?;
  Ok(Json(scopes))
}

/// `GET /scopes/{id}`
pub async fn get_scope<S: SpmiStore>(
  State(state): State<AppState<S>>,
  _: Authenticated,
  Path(id): Path<i64>,
) -> Result<Json<Scope>, Error> {
  let scope = state
    .store
    .get_scope(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::not_found("scope", id))?;
  Ok(Json(scope))
}

/// `POST /scopes`
pub async fn create_scope<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Json(body): Json<NewScope>,
) -> Result<impl IntoResponse, Error> {
  ctx.require_admin()?;
  let scope = state.store.create_scope(body).await.map_err(Error::store)?;
  info!(scope_id = scope.id, user = %ctx.username, "created scope");
  Ok((StatusCode::CREATED, Json(scope)))
}

/// `PUT /scopes/{id}`
pub async fn update_scope<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
  Json(body): Json<NewScope>,
) -> Result<Json<Scope>, Error> {
  ctx.require_admin()?;
  let scope = state.store.update_scope(id, body).await.map_err(Error::store)?;
  info!(scope_id = id, user = %ctx.username, "updated scope");
  Ok(Json(scope))
}

/// `DELETE /scopes/{id}`
pub async fn delete_scope<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
  ctx.require_admin()?;
  let orphans = state.store.delete_scope(id).await.map_err(Error::store)?;
  info!(scope_id = id, files = orphans.len(), user = %ctx.username, "deleted scope");
  state.storage.remove_orphans(orphans).await;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Criteria ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CriterionParams {
  pub scope_id: Option<i64>,
}

/// `GET /criteria[?scope_id=<id>]`
pub async fn list_criteria<S: SpmiStore>(
  State(state): State<AppState<S>>,
  _: Authenticated,
  Query(params): Query<CriterionParams>,
) -> Result<Json<Vec<Criterion>>, Error> {
  let criteria = state.store.list_criteria(params.scope_id).await.map_err(Error::store)?;
  Ok(Json(criteria))
}

/// `GET /criteria/{id}`
pub async fn get_criterion<S: SpmiStore>(
  State(state): State<AppState<S>>,
  _: Authenticated,
  Path(id): Path<i64>,
) -> Result<Json<Criterion>, Error> {
  let criterion = state
    .store
    .get_criterion(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::not_found("criterion", id))?;
  Ok(Json(criterion))
}

/// `POST /criteria`
pub async fn create_criterion<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Json(body): Json<NewCriterion>,
) -> Result<impl IntoResponse, Error> {
  ctx.require_admin()?;
  let criterion = state.store.create_criterion(body).await.map_err(Error::store)?;
  info!(criterion_id = criterion.id, user = %ctx.username, "created criterion");
  Ok((StatusCode::CREATED, Json(criterion)))
}

/// `PUT /criteria/{id}`
pub async fn update_criterion<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
  Json(body): Json<NewCriterion>,
) -> Result<Json<Criterion>, Error> {
  ctx.require_admin()?;
  let criterion = state.store.update_criterion(id, body).await.map_err(Error::store)?;
  info!(criterion_id = id, user = %ctx.username, "updated criterion");
  Ok(Json(criterion))
}

/// `DELETE /criteria/{id}`
pub async fn delete_criterion<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
  ctx.require_admin()?;
  let orphans = state.store.delete_criterion(id).await.map_err(Error::store)?;
  info!(criterion_id = id, files = orphans.len(), user = %ctx.username, "deleted criterion");
  state.storage.remove_orphans(orphans).await;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Standards ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StandardParams {
  pub criterion_id: Option<i64>,
}

/// `GET /standards[?criterion_id=<id>]`
pub async fn list_standards<S: SpmiStore>(
  State(state): State<AppState<S>>,
  _: Authenticated,
  Query(params): Query<StandardParams>,
) -> Result<Json<Vec<Standard>>, Error> {
  let standards = state.store.list_standards(params.criterion_id).await.map_err(Error::store)?;
  Ok(Json(standards))
}

/// `GET /standards/{id}`
pub async fn get_standard<S: SpmiStore>(
  State(state): State<AppState<S>>,
  _: Authenticated,
  Path(id): Path<i64>,
) -> Result<Json<Standard>, Error> {
  let standard = state
    .store
    .get_standard(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::not_found("standard", id))?;
  Ok(Json(standard))
}

/// `POST /standards`
pub async fn create_standard<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Json(body): Json<NewStandard>,
) -> Result<impl IntoResponse, Error> {
  ctx.require_admin()?;
  let standard = state.store.create_standard(body).await.map_err(Error::store)?;
  info!(standard_id = standard.id, user = %ctx.username, "created standard");
  Ok((StatusCode::CREATED, Json(standard)))
}

/// `PUT /standards/{id}`
pub async fn update_standard<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
  Json(body): Json<NewStandard>,
) -> Result<Json<Standard>, Error> {
  ctx.require_admin()?;
  let standard = state.store.update_standard(id, body).await.map_err(Error::store)?;
  info!(standard_id = id, user = %ctx.username, "updated standard");
  Ok(Json(standard))
}

/// `DELETE /standards/{id}`
pub async fn delete_standard<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
  ctx.require_admin()?;
  let orphans = state.store.delete_standard(id).await.map_err(Error::store)?;
  info!(standard_id = id, files = orphans.len(), user = %ctx.username, "deleted standard");
  state.storage.remove_orphans(orphans).await;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Indicators ───────────────────────────────────────────────────────────────

/// `GET /indicators[?criterion_id=<id>&standard_id=<id>]`
pub async fn list_indicators<S: SpmiStore>(
  State(state): State<AppState<S>>,
  _: Authenticated,
  Query(filter): Query<IndicatorFilter>,
) -> Result<Json<Vec<Indicator>>, Error> {
  let indicators = state.store.list_indicators(filter).await.map_err(Error::store)?;
  Ok(Json(indicators))
}

/// `GET /indicators/{id}`
pub async fn get_indicator<S: SpmiStore>(
  State(state): State<AppState<S>>,
  _: Authenticated,
  Path(id): Path<i64>,
) -> Result<Json<Indicator>, Error> {
  let indicator = state
    .store
    .get_indicator(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::not_found("indicator", id))?;
  Ok(Json(indicator))
}

/// `POST /indicators`
pub async fn create_indicator<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Json(body): Json<NewIndicator>,
) -> Result<impl IntoResponse, Error> {
  ctx.require_admin()?;
  let indicator = state.store.create_indicator(body).await.map_err(Error::store)?;
  info!(indicator_id = indicator.id, user = %ctx.username, "created indicator");
  Ok((StatusCode::CREATED, Json(indicator)))
}

/// `PUT /indicators/{id}`
pub async fn update_indicator<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
  Json(body): Json<NewIndicator>,
) -> Result<Json<Indicator>, Error> {
  ctx.require_admin()?;
  let indicator = state.store.update_indicator(id, body).await.map_err(Error::store)?;
  info!(indicator_id = id, user = %ctx.username, "updated indicator");
  Ok(Json(indicator))
}

/// `DELETE /indicators/{id}`
pub async fn delete_indicator<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
  ctx.require_admin()?;
  let orphans = state.store.delete_indicator(id).await.map_err(Error::store)?;
  info!(indicator_id = id, files = orphans.len(), user = %ctx.username, "deleted indicator");
  state.storage.remove_orphans(orphans).await;
  Ok(StatusCode::NO_CONTENT)
}
