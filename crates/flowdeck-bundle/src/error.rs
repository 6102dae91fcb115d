use flowdeck_client::ClientError;
use thiserror::Error;

/// Errors that can occur while loading or saving a code bundle.
#[derive(Debug, Error)]
pub enum BundleError {
  /// The entrypoint could not be mapped to a file of a multi-file bundle.
  #[error("bundle for flow '{flow_id}' has no entry module (entrypoint: {entrypoint:?})")]
  Incomplete {
    flow_id: String,
    entrypoint: Option<String>,
  },

  /// A relative path is empty, absolute, or escapes the bundle root.
  #[error("invalid bundle path '{path}': {reason}")]
  InvalidPath { path: String, reason: &'static str },

  /// Two files share a relative path.
  #[error("duplicate bundle path: {0}")]
  DuplicatePath(String),

  /// Nothing to save.
  #[error("bundle has no files")]
  Empty,

  /// A stored object is not UTF-8 source text.
  #[error("object '{key}' is not valid UTF-8")]
  NotText { key: String },

  /// Reading from the object store failed.
  #[error("store error on '{key}': {source}")]
  Store {
    key: String,
    #[source]
    source: flowdeck_artifact::Error,
  },

  /// A write failed. Keys written before the failure have been removed.
  #[error("saving bundle failed at '{key}' ({rolled_back} written keys rolled back): {source}")]
  SaveFailed {
    key: String,
    rolled_back: usize,
    #[source]
    source: flowdeck_artifact::Error,
  },

  /// The engine call failed.
  #[error("engine error: {0}")]
  Engine(#[from] ClientError),
}

impl BundleError {
  /// Whether the error is the engine asking for sign-in.
  pub fn is_auth(&self) -> bool {
    matches!(self, BundleError::Engine(e) if e.is_auth())
  }
}
