//! Flowdeck Client
//!
//! This crate is the console's only door to the orchestration engine. The
//! engine is an external service; everything here is a thin, typed view over
//! its HTTP surface.
//!
//! The surface is split along the two seams the rest of the workspace needs:
//! - [`FlowsApi`]: flow records, flow code and file uploads
//! - [`RunsApi`]: submitting, resuming and observing runs, and their logs
//!
//! [`HttpEngineClient`] implements both over `reqwest`. Every call shares one
//! contract: a 401/403 response is handed to the configured [`SignInBoundary`]
//! and surfaces as [`ClientError::AuthRequired`], never as a raw HTTP error.

mod api;
mod auth;
mod error;
mod http;
mod types;

pub use api::{FlowsApi, RunsApi};
pub use auth::{LogSignIn, SignInBoundary};
pub use error::ClientError;
pub use http::HttpEngineClient;
pub use types::{
  BatchRegisterResult, FlowCode, FlowCodeUpdate, FlowFile, FlowUpdate, LogEntry, LogLevel,
  LogPage, RawFlow, RegistrationFailure, RunAccepted, RunRecord, RunRequest, StateType,
  UploadedFiles,
};

// Registration bodies are defined alongside the manifest that produces them.
pub use flowdeck_config::{FlowRegistration, RunMode};
