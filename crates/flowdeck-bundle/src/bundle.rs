use std::collections::HashSet;

use flowdeck_client::FlowFile;
use serde::Serialize;

use crate::error::BundleError;

/// The source files behind one flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBundle {
  pub flow_id: String,
  /// Files in upload order.
  pub files: Vec<FlowFile>,
  /// Object-store prefix shared by every file, ending in `/`.
  pub prefix: String,
  pub entrypoint: Option<String>,
  /// Relative path of the entry module, when the entrypoint maps to a file.
  pub main_relative_path: Option<String>,
}

impl CodeBundle {
  pub fn file(&self, relative_path: &str) -> Option<&FlowFile> {
    self.files.iter().find(|f| f.relative_path == relative_path)
  }

  pub fn is_single_file(&self) -> bool {
    self.files.len() == 1
  }

  /// The entry module. A single-file bundle is its own entry; a multi-file
  /// bundle without a mapped entrypoint is [`BundleError::Incomplete`].
  pub fn entry(&self) -> Result<&FlowFile, BundleError> {
    let found = match &self.main_relative_path {
      Some(path) => self.file(path),
      None if self.is_single_file() => self.files.first(),
      None => None,
    };
    found.ok_or_else(|| BundleError::Incomplete {
      flow_id: self.flow_id.clone(),
      entrypoint: self.entrypoint.clone(),
    })
  }
}

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
  pub uploaded_count: usize,
  /// Full object keys in write order.
  pub keys: Vec<String>,
  /// Keys left under the prefix by an earlier save and deleted by this one.
  pub removed: Vec<String>,
}

/// Check that relative paths are non-empty, relative, free of `.`/`..`
/// segments and unique.
pub fn validate_files(files: &[FlowFile]) -> Result<(), BundleError> {
  if files.is_empty() {
    return Err(BundleError::Empty);
  }

  let mut seen = HashSet::with_capacity(files.len());
  for file in files {
    let path = file.relative_path.as_str();
    let reason = if path.is_empty() {
      Some("empty path")
    } else if path.starts_with('/') {
      Some("absolute path")
    } else if path.contains('\\') {
      Some("backslash separator")
    } else if path.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
      Some("empty, '.' or '..' segment")
    } else {
      None
    };
    if let Some(reason) = reason {
      return Err(BundleError::InvalidPath {
        path: path.to_string(),
        reason,
      });
    }
    if !seen.insert(path) {
      return Err(BundleError::DuplicatePath(path.to_string()));
    }
  }
  Ok(())
}
