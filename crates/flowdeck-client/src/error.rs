use thiserror::Error;

/// Errors returned by engine calls.
#[derive(Debug, Error)]
pub enum ClientError {
  /// The engine rejected our credentials; the sign-in boundary was notified.
  #[error("authentication required (HTTP {status})")]
  AuthRequired { status: u16 },

  /// The engine answered with a non-success status.
  #[error("engine returned HTTP {status}: {body}")]
  Status { status: u16, body: String },

  /// The request never produced a response.
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The response body did not match the expected shape.
  #[error("invalid response from {endpoint}: {message}")]
  Decode { endpoint: String, message: String },

  #[error("invalid engine base url '{url}': {message}")]
  InvalidBaseUrl { url: String, message: String },
}

impl ClientError {
  pub fn is_auth(&self) -> bool {
    matches!(self, ClientError::AuthRequired { .. })
  }

  /// HTTP status of the failed call, when there was one.
  pub fn status(&self) -> Option<u16> {
    match self {
      ClientError::AuthRequired { status } | ClientError::Status { status, .. } => Some(*status),
      ClientError::Http(e) => e.status().map(|s| s.as_u16()),
      _ => None,
    }
  }
}
