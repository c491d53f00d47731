//! Handlers for scoring one indicator in one cycle and its evidence trail.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/cycles/{cycle}/indicators/{indicator}` | Assessment, CAR, evidence |
//! | `PUT`    | `/cycles/{cycle}/indicators/{indicator}/score` | Auditor. Nonconformity opens a CAR |
//! | `POST`   | `/cycles/{cycle}/indicators/{indicator}/evidence` | Multipart: `file`, `note` |
//! | `DELETE` | `/evidence/{id}` | Uploader or admin |

use axum::{
  Json,
  extract::{Multipart, Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Serialize;
use spmi_core::{
  Error as CoreError,
  car::Car,
  evidence::NewEvidence,
  report::AssessmentView,
  score::{Assessment, ScoreInput},
  store::{AuditStore, SpmiStore},
};
use tracing::{info, warn};

use super::{UploadForm, store_upload, visible_cycle};
use crate::{AppState, auth::Authenticated, error::Error, storage::EvidenceStorage};

/// `GET /cycles/{cycle}/indicators/{indicator}`
pub async fn get_assessment<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path((cycle_id, indicator_id)): Path<(i64, i64)>,
) -> Result<Json<AssessmentView>, Error> {
  visible_cycle(&state, &ctx, cycle_id).await?;
  let view = state
    .store
    .get_assessment(cycle_id, indicator_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::not_found("indicator", indicator_id))?;
  Ok(Json(view))
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
  pub assessment: Assessment,
  pub car:        Option<Car>,
}

/// `PUT /cycles/{cycle}/indicators/{indicator}/score`
///
/// Body: `{"score":"Ketidaksesuaian Minor","finding":"..","due_date":"2024-06-30"}`
pub async fn record_score<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path((cycle_id, indicator_id)): Path<(i64, i64)>,
  Json(body): Json<ScoreInput>,
) -> Result<Json<ScoreResponse>, Error> {
  ctx.require_auditor()?;
  visible_cycle(&state, &ctx, cycle_id).await?;

  let change = body.validate()?;
  let score = change.score;
  let outcome = state
    .store
    .record_score(cycle_id, indicator_id, change)
    .await
    .map_err(Error::store)?;

  info!(
    cycle_id,
    indicator_id,
    score = %score,
    car_id = outcome.car.as_ref().map(|c| c.id),
    user = %ctx.username,
    "recorded score"
  );
  Ok(Json(ScoreResponse { assessment: outcome.assessment, car: outcome.car }))
}

/// `POST /cycles/{cycle}/indicators/{indicator}/evidence`
pub async fn add_evidence<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path((cycle_id, indicator_id)): Path<(i64, i64)>,
  multipart: Multipart,
) -> Result<impl IntoResponse, Error> {
  visible_cycle(&state, &ctx, cycle_id).await?;

  let mut form = UploadForm::read(multipart, state.config.max_evidence_bytes).await?;
  let note = form.take("note");
  if form.file.is_none() {
    // Validate before touching the disk.
    NewEvidence::new(None, note.clone(), ctx.active, ctx.user_id)?;
  }

  let file = store_upload(&state, &EvidenceStorage::cycle_dir(cycle_id), form.file.take()).await?;
  let stored_path = file.as_ref().map(|f| f.path.clone());
  let input = NewEvidence::new(file, note, ctx.active, ctx.user_id)?;

  match state.store.add_evidence(cycle_id, indicator_id, input).await {
    Ok(evidence) => {
      info!(
        evidence_id = evidence.id,
        cycle_id,
        indicator_id,
        role = %ctx.active,
        user = %ctx.username,
        "added evidence"
      );
      Ok((StatusCode::CREATED, Json(evidence)))
    }
    Err(e) => {
      if let Some(path) = stored_path {
        state.storage.remove_orphans(vec![path]).await;
      }
      Err(Error::store(e))
    }
  }
}

/// `DELETE /evidence/{id}`
///
/// The file goes first; the row is kept if the file cannot be removed.
pub async fn delete_evidence<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<i64>,
) -> Result<StatusCode, Error> {
  let record = state
    .store
    .get_evidence(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::not_found("evidence", id))?;
  visible_cycle(&state, &ctx, record.cycle_id).await?;

  if !ctx.is_elevated() && record.evidence.uploaded_by != Some(ctx.user_id) {
    return Err(CoreError::Forbidden("only the uploader may delete this evidence".into()).into());
  }

  if let Some(file) = &record.evidence.file {
    if let Err(e) = state.storage.remove(&file.path).await {
      warn!(evidence_id = id, path = %file.path, error = %e, "evidence file removal failed");
      return Err(e.into());
    }
  }
  state.store.delete_evidence(id).await.map_err(Error::store)?;
  info!(evidence_id = id, user = %ctx.username, "deleted evidence");
  Ok(StatusCode::NO_CONTENT)
}
