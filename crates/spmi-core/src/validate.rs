//! Per-field validation errors.
//!
//! Form-style handlers report every failing field at once, so validation
//! collects messages keyed by field name instead of stopping at the first
//! failure.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::{Error, Result};

/// Field name → messages, serialised as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn single(field: &str, message: impl Into<String>) -> Self {
    let mut errors = Self::new();
    errors.add(field, message);
    errors
  }

  pub fn add(&mut self, field: &str, message: impl Into<String>) {
    self.0.entry(field.to_owned()).or_default().push(message.into());
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn contains(&self, field: &str) -> bool { self.0.contains_key(field) }

  pub fn messages(&self, field: &str) -> &[String] {
    self.0.get(field).map(Vec::as_slice).unwrap_or_default()
  }

  /// `Ok(())` when nothing was recorded, otherwise [`Error::Validation`].
  pub fn into_result(self) -> Result<()> {
    if self.is_empty() {
      Ok(())
    } else {
      Err(Error::Validation(self))
    }
  }

  /// Fold the field messages of a failed validation into `self`. Other
  /// errors pass through.
  pub fn absorb<T>(&mut self, result: Result<T>) -> Result<Option<T>> {
    match result {
      Ok(value) => Ok(Some(value)),
      Err(Error::Validation(other)) => {
        for (field, messages) in other.0 {
          self.0.entry(field).or_default().extend(messages);
        }
        Ok(None)
      }
      Err(other) => Err(other),
    }
  }

  /// Record a "required" message when `value` is blank.
  pub fn require_text(&mut self, field: &str, value: &str) {
    if value.trim().is_empty() {
      self.add(field, format!("{field} is required"));
    }
  }

  /// Like [`Self::require_text`] for optional form inputs.
  pub fn require_some_text(&mut self, field: &str, value: Option<&str>) {
    self.require_text(field, value.unwrap_or_default());
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, messages) in &self.0 {
      for message in messages {
        if !first {
          f.write_str("; ")?;
        }
        write!(f, "{field}: {message}")?;
        first = false;
      }
    }
    Ok(())
  }
}

/// Trim an optional form value, mapping blank input to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collects_messages_per_field() {
    let mut errors = ValidationErrors::new();
    errors.require_text("name", "   ");
    errors.require_some_text("finding", None);
    errors.add("name", "too short");

    assert_eq!(errors.messages("name").len(), 2);
    assert!(errors.contains("finding"));
    assert!(errors.messages("missing").is_empty());
    assert!(matches!(errors.into_result(), Err(Error::Validation(_))));
  }

  #[test]
  fn empty_errors_are_ok() {
    let mut errors = ValidationErrors::new();
    errors.require_text("name", "Teknik Informatika");
    assert!(errors.into_result().is_ok());
  }

  #[test]
  fn absorb_merges_validation_only() {
    let mut errors = ValidationErrors::single("score", "unknown score");
    let parsed: Option<i32> = errors.absorb(Err(Error::field("score", "blank"))).unwrap();
    assert_eq!(parsed, None);
    assert_eq!(errors.messages("score").len(), 2);
    assert_eq!(errors.absorb(Ok(3)).unwrap(), Some(3));
    assert!(errors.absorb::<()>(Err(Error::Conflict("x".into()))).is_err());
  }

  #[test]
  fn serialises_as_object() {
    let errors = ValidationErrors::single("score", "unknown score");
    let json = serde_json::to_string(&errors).unwrap();
    assert_eq!(json, r#"{"score":["unknown score"]}"#);
  }

  #[test]
  fn non_blank_trims() {
    assert_eq!(non_blank(Some("  x ".into())).as_deref(), Some("x"));
    assert_eq!(non_blank(Some("   ".into())), None);
    assert_eq!(non_blank(None), None);
  }
}
