use tracing::warn;

/// Where the console sends the operator when the engine refuses a call.
///
/// The boundary is invoked once per rejected call, before the call returns
/// [`crate::ClientError::AuthRequired`].
pub trait SignInBoundary: Send + Sync {
  fn redirect(&self, status: u16);
}

/// A boundary that only records the redirect in the log.
#[derive(Debug, Clone, Default)]
pub struct LogSignIn;

impl SignInBoundary for LogSignIn {
  fn redirect(&self, status: u16) {
    warn!(status, "engine rejected credentials, sign-in required");
  }
}
