//! Evidence uploads (PamiUpload): an append-only trail attached to an
//! assessment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, access::Role, validate::non_blank};

/// A file persisted by the storage layer. No binary data lives in the
/// database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
  /// Path relative to the configured storage directory.
  pub path:         String,
  /// The client-supplied file name.
  pub name:         String,
  /// SHA-256 hex digest of the content.
  pub content_hash: String,
  pub size_bytes:   u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
  pub id:               i64,
  pub assessment_id:    i64,
  pub file:             Option<StoredFile>,
  pub note:             Option<String>,
  /// The role the uploader was acting under.
  pub uploaded_by_role: Role,
  pub uploaded_by:      Option<i64>,
  pub created_at:       DateTime<Utc>,
}

/// An evidence row with the (cycle, indicator) it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceRecord {
  pub evidence:     Evidence,
  pub cycle_id:     i64,
  pub indicator_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewEvidence {
  pub file:             Option<StoredFile>,
  pub note:             Option<String>,
  pub uploaded_by_role: Role,
  pub uploaded_by:      i64,
}

impl NewEvidence {
  /// Build an upload, requiring a file or a non-blank note.
  pub fn new(
    file: Option<StoredFile>,
    note: Option<String>,
    uploaded_by_role: Role,
    uploaded_by: i64,
  ) -> Result<Self> {
    let note = non_blank(note);
    if file.is_none() && note.is_none() {
      return Err(Error::field("file", "either a file or a note is required"));
    }
    Ok(Self { file, note, uploaded_by_role, uploaded_by })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_or_note_is_required() {
    assert!(matches!(
      NewEvidence::new(None, Some("   ".into()), Role::Auditee, 1),
      Err(Error::Validation(e)) if e.contains("file")
    ));

    let note_only = NewEvidence::new(None, Some("Lihat notulen".into()), Role::Auditee, 1).unwrap();
    assert_eq!(note_only.note.as_deref(), Some("Lihat notulen"));

    let file = StoredFile {
      path:         "bukti_audit/1/a.pdf".into(),
      name:         "a.pdf".into(),
      content_hash: "00".into(),
      size_bytes:   1,
    };
    assert!(NewEvidence::new(Some(file), None, Role::Auditor, 1).is_ok());
  }
}
