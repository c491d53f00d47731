//! Handlers for corrective-action requests.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/cars` | Scoped; optional `?cycle_id=&department_id=&status=` |
//! | `GET`  | `/cars/{id}` | |
//! | `POST` | `/cars/{id}/response` | Auditee. Multipart: `root_cause`, `corrective_action`, `link`, `file` |
//! | `POST` | `/cars/{id}/verify` | Auditor. Body: `{"status":"Close","score":"Sesuai Standar"}` |
//! | `GET`  | `/cars/{id}/ptk` | Corrective-action report data |

use axum::{
  Json,
  extract::{Multipart, Path, Query, State},
};
use chrono::{Datelike, Utc};
use spmi_core::{
  Error as CoreError,
  access::AuthContext,
  car::{Car, CarFilter, CarResponseInput, VerifyInput},
  evidence::NewEvidence,
  report::PtkDocument,
  store::{AuditStore, ReportStore, SpmiStore},
};
use tracing::info;

use super::{UploadForm, store_upload, visible_cycle};
use crate::{AppState, auth::Authenticated, error::Error, storage::EvidenceStorage};

/// Load a CAR whose cycle the caller may act on.
async fn visible_car<S: SpmiStore>(
  state: &AppState<S>,
  ctx: &AuthContext,
  id: i64,
) -> Result<Car, Error> {
  let car = state
    .store
    .get_car(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::not_found("CAR", id))?;
  visible_cycle(state, ctx, car.cycle_id).await?;
  Ok(car)
}

/// `GET /cars`
pub async fn list<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Query(mut filter): Query<CarFilter>,
) -> Result<Json<Vec<Car>>, Error> {
  filter.auditor_user_id = ctx.auditor_scope();
  filter.owner_user_id = ctx.owner_scope();
  let cars = state.store.list_cars(filter).await.map_err(Error::store)?;
  Ok(Json(cars))
}

/// `GET /cars/{id}`
pub async fn get_one<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<Json<Car>, Error> {
  Ok(Json(visible_car(&state, &ctx, id).await?))
}

/// `POST /cars/{id}/response`
pub async fn respond<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
  multipart: Multipart,
) -> Result<Json<Car>, Error> {
  ctx.require_auditee()?;
  let car = visible_car(&state, &ctx, id).await?;
  car.status.respond()?;

  let mut form = UploadForm::read(multipart, state.config.max_car_response_bytes).await?;
  let response = CarResponseInput {
    root_cause:        form.take("root_cause"),
    corrective_action: form.take("corrective_action"),
    link:              form.take("link"),
  }
  .validate()?;

  let file = store_upload(&state, &EvidenceStorage::car_dir(id), form.file.take()).await?;
  let stored_path = file.as_ref().map(|f| f.path.clone());
  let evidence = match (&file, &response.link) {
    (None, None) => None,
    _ => Some(NewEvidence::new(file, response.link.clone(), ctx.active, ctx.user_id)?),
  };

  match state.store.respond_car(id, response, evidence).await {
    Ok(car) => {
      info!(car_id = id, user = %ctx.username, "submitted CAR response");
      Ok(Json(car))
    }
    Err(e) => {
      if let Some(path) = stored_path {
        state.storage.remove_orphans(vec![path]).await;
      }
      Err(Error::store(e))
    }
  }
}

/// `POST /cars/{id}/verify`
pub async fn verify<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
  Json(body): Json<VerifyInput>,
) -> Result<Json<Car>, Error> {
  ctx.require_auditor()?;
  visible_car(&state, &ctx, id).await?;

  let verification = body.validate()?;
  let car = state
    .store
    .verify_car(id, verification, Utc::now().year())
    .await
    .map_err(Error::store)?;
  info!(
    car_id = id,
    status = %car.status,
    score = %verification.score,
    user = %ctx.username,
    "verified CAR"
  );
  Ok(Json(car))
}

/// `GET /cars/{id}/ptk`
pub async fn ptk<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<Json<PtkDocument>, Error> {
  visible_car(&state, &ctx, id).await?;
  let document = state
    .store
    .ptk_document(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::not_found("CAR", id))?;
  Ok(Json(document))
}
