//! Disk-backed evidence files.
//!
//! Files live under a single root. The store only ever sees paths relative
//! to that root, which is also what `/files/...` serves.

use std::{
  io,
  path::{Component, Path, PathBuf},
};

use sha2::{Digest, Sha256};
use spmi_core::evidence::StoredFile;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 100;

pub struct EvidenceStorage {
  root: PathBuf,
}

impl EvidenceStorage {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Directory for evidence uploaded against an assessment.
  pub fn cycle_dir(cycle_id: i64) -> String { format!("bukti_audit/{cycle_id}") }

  /// Directory for files attached to a CAR response.
  pub fn car_dir(car_id: i64) -> String { format!("uploads/car/{car_id}") }

  /// Write `bytes` under `dir` with a unique name and record its digest.
  pub async fn save(&self, dir: &str, original_name: &str, bytes: &[u8]) -> io::Result<StoredFile> {
    let name = sanitize_name(original_name);
    let path = format!("{dir}/{}_{name}", Uuid::new_v4().simple());
    let target = self.root.join(&path);
    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent).await?;
    }
    fs::write(&target, bytes).await?;

    Ok(StoredFile {
      path,
      name,
      content_hash: hex::encode(Sha256::digest(bytes)),
      size_bytes: bytes.len() as u64,
    })
  }

  /// Remove a stored file. A file that is already gone is not an error.
  pub async fn remove(&self, path: &str) -> io::Result<()> {
    let target = self.resolve(path)?;
    match fs::remove_file(&target).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        warn!(path, "evidence file already missing");
        Ok(())
      }
      Err(e) => Err(e),
    }
  }

  /// Remove files left behind by a cascading delete, logging failures.
  pub async fn remove_orphans(&self, paths: Vec<String>) {
    for path in paths {
      if let Err(e) = self.remove(&path).await {
        warn!(path, error = %e, "failed to remove orphaned evidence file");
      }
    }
  }

  fn resolve(&self, path: &str) -> io::Result<PathBuf> {
    let relative = Path::new(path);
    if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("stored path {path:?} escapes the storage root"),
      ));
    }
    Ok(self.root.join(relative))
  }
}

/// Reduce a client-supplied file name to a safe final path component.
fn sanitize_name(original: &str) -> String {
  let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
  let clean: String = base
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .collect();
  let clean = clean.trim_start_matches('.');
  if clean.is_empty() {
    "file".to_owned()
  } else {
    clean.chars().take(MAX_NAME_LEN).collect()
  }
}
