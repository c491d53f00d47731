//! Handlers for `/departments` and the per-department RTL report.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/departments` | Scoped to the caller; optional `?year=` |
//! | `POST` | `/departments` | Admin |
//! | `GET\|PUT\|DELETE` | `/departments/{id}` | Writes admin only |
//! | `PUT`  | `/departments/{id}/owner` | Admin. Body: `{"owner_user_id":3}` |
//! | `GET`  | `/departments/{id}/rtl` | Unresolved CARs across cycles |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use spmi_core::{
  Error as CoreError,
  access::AuthContext,
  directory::{Department, DepartmentFilter, NewDepartment},
  report::RtlStandard,
  store::{DirectoryStore, ReportStore, SpmiStore},
};
use tracing::info;

use crate::{AppState, auth::Authenticated, error::Error};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub year: Option<i32>,
}

/// `GET /departments[?year=<year>]`
pub async fn list<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Department>>, Error> {
  let filter = DepartmentFilter {
    owner_user_id:   ctx.owner_scope(),
    auditor_user_id: ctx.auditor_scope(),
    year:            params.year,
  };
  let departments = state.store.list_departments(filter).await.map_err(Error::store)?;
  Ok(Json(departments))
}

/// Load a department the caller may see.
async fn visible_department<S: SpmiStore>(
  state: &AppState<S>,
  ctx: &AuthContext,
  id: i64,
) -> Result<Department, Error> {
  let department = state
    .store
    .get_department(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::not_found("department", id))?;

  let assigned = match ctx.auditor_scope() {
    Some(auditor_user_id) => {
      let filter = DepartmentFilter { auditor_user_id: Some(auditor_user_id), ..Default::default() };
      let audited = state.store.list_departments(filter).await.map_err(Error::store)?;
      audited.iter().any(|d| d.id == id)
    }
    None => false,
  };
  ctx.check_department(&department, assigned)?;
  Ok(department)
}

/// `GET /departments/{id}`
pub async fn get_one<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<Json<Department>, Error> {
  Ok(Json(visible_department(&state, &ctx, id).await?))
}

/// `POST /departments`
pub async fn create<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Json(body): Json<NewDepartment>,
) -> Result<impl IntoResponse, Error> {
  ctx.require_admin()?;
  let department = state.store.create_department(body).await.map_err(Error::store)?;
  info!(department_id = department.id, user = %ctx.username, "created department");
  Ok((StatusCode::CREATED, Json(department)))
}

/// `PUT /departments/{id}`
pub async fn update<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
  Json(body): Json<NewDepartment>,
) -> Result<Json<Department>, Error> {
  ctx.require_admin()?;
  let department = state.store.update_department(id, body).await.map_err(Error::store)?;
  info!(department_id = id, user = %ctx.username, "updated department");
  Ok(Json(department))
}

#[derive(Debug, Deserialize)]
pub struct OwnerBody {
  pub owner_user_id: Option<i64>,
}

/// `PUT /departments/{id}/owner`
pub async fn set_owner<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
  Json(body): Json<OwnerBody>,
) -> Result<Json<Department>, Error> {
  ctx.require_admin()?;
  let department = state
    .store
    .set_department_owner(id, body.owner_user_id)
    .await
    .map_err(Error::store)?;
  info!(department_id = id, owner = ?body.owner_user_id, user = %ctx.username, "reassigned department owner");
  Ok(Json(department))
}

/// `DELETE /departments/{id}`
pub async fn delete<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
  ctx.require_admin()?;
  state.store.delete_department(id).await.map_err(Error::store)?;
  info!(department_id = id, user = %ctx.username, "deleted department");
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /departments/{id}/rtl`
pub async fn rtl<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<Json<Vec<RtlStandard>>, Error> {
  visible_department(&state, &ctx, id).await?;
  let report = state.store.rtl(id).await.map_err(Error::store)?;
  Ok(Json(report))
}
