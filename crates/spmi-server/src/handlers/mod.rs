//! HTTP handlers, one module per resource.

pub mod audit;
pub mod cars;
pub mod catalog;
pub mod cycles;
pub mod departments;
pub mod reports;
pub mod users;

use std::collections::HashMap;

use axum::{Json, extract::Multipart};
use bytes::Bytes;
use serde_json::{Value, json};
use spmi_core::{
  Error as CoreError,
  evidence::StoredFile,
  schedule::CycleDetail,
  store::{ScheduleStore, SpmiStore},
};

use crate::{AppState, auth::Authenticated, error::Error};

/// `GET /health`
pub async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

/// `GET /me`: the caller and the role this request acts under.
pub async fn me(Authenticated(ctx): Authenticated) -> Json<spmi_core::access::AuthContext> {
  Json(ctx)
}

/// Load a cycle the caller may act on.
pub(crate) async fn visible_cycle<S: SpmiStore>(
  state: &AppState<S>,
  ctx: &spmi_core::access::AuthContext,
  cycle_id: i64,
) -> Result<CycleDetail, Error> {
  let cycle = state
    .store
    .get_cycle(cycle_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::not_found("audit cycle", cycle_id))?;
  ctx.check_cycle(&cycle)?;
  Ok(cycle)
}

/// An uploaded file held in memory until its request validates.
pub(crate) struct UploadedFile {
  pub name:  String,
  pub bytes: Bytes,
}

/// A parsed multipart form: text fields plus at most one `file` part.
#[derive(Default)]
pub(crate) struct UploadForm {
  pub fields: HashMap<String, String>,
  pub file:   Option<UploadedFile>,
}

impl UploadForm {
  /// Read every part, rejecting a second `file` or one larger than `max_bytes`.
  pub async fn read(mut multipart: Multipart, max_bytes: u64) -> Result<Self, Error> {
    let mut form = Self::default();
    while let Some(field) = multipart.next_field().await? {
      let Some(name) = field.name().map(str::to_owned) else {
        continue;
      };
      if name == "file" {
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let bytes = field.bytes().await?;
        if bytes.is_empty() && file_name.is_empty() {
          continue;
        }
        if form.file.is_some() {
          return Err(CoreError::field("file", "only one file may be uploaded").into());
        }
        if bytes.len() as u64 > max_bytes {
          return Err(CoreError::field("file", format!("file exceeds {max_bytes} bytes")).into());
        }
        form.file = Some(UploadedFile { name: file_name, bytes });
      } else {
        let text = field.text().await?;
        form.fields.insert(name, text);
      }
    }
    Ok(form)
  }

  pub fn take(&mut self, field: &str) -> Option<String> { self.fields.remove(field) }
}

/// Persist an optional upload under `dir`.
pub(crate) async fn store_upload<S>(
  state: &AppState<S>,
  dir: &str,
  file: Option<UploadedFile>,
) -> Result<Option<StoredFile>, Error> {
  match file {
    Some(file) => Ok(Some(state.storage.save(dir, &file.name, &file.bytes).await?)),
    None => Ok(None),
  }
}
