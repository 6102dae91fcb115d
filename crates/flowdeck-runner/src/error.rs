use flowdeck_client::ClientError;
use flowdeck_config::RunMode;
use thiserror::Error;

use crate::state::ObservedState;

fn describe(last: &Option<ObservedState>) -> String {
  match last {
    Some(state) => state.to_string(),
    None => "unknown".to_string(),
  }
}

/// Errors raised while driving a run.
#[derive(Debug, Error)]
pub enum RunError {
  /// The run or test run could not be started. Never retried.
  #[error("could not start {mode} of flow '{flow_id}': {source}")]
  Submission {
    flow_id: String,
    mode: RunMode,
    #[source]
    source: ClientError,
  },

  /// Status fetches failed more often in a row than tolerated.
  #[error(
    "gave up observing run '{run_id}' after {failures} failed status fetches (last state: {})",
    describe(.last)
  )]
  PollEscalated {
    run_id: String,
    failures: u32,
    last: Option<ObservedState>,
    #[source]
    source: ClientError,
  },

  /// Resume was asked for a run that is not waiting for it.
  #[error("run '{run_id}' cannot be resumed from state {}", describe(.last))]
  ResumeRejected {
    run_id: String,
    last: Option<ObservedState>,
  },

  /// The engine refused or failed the resume call.
  #[error("resume of run '{run_id}' failed: {source}")]
  Resume {
    run_id: String,
    #[source]
    source: ClientError,
  },

  /// A single status fetch failed outside of a watch loop.
  #[error("status fetch for run '{run_id}' failed: {source}")]
  Poll {
    run_id: String,
    #[source]
    source: ClientError,
  },

  /// The operation does not apply to the controller's current phase.
  #[error("cannot {operation} while {phase}")]
  InvalidPhase {
    operation: &'static str,
    phase: &'static str,
  },
}

impl RunError {
  /// Last engine state seen before the error, when one was observed.
  pub fn last_observed(&self) -> Option<&ObservedState> {
    match self {
      RunError::PollEscalated { last, .. } | RunError::ResumeRejected { last, .. } => {
        last.as_ref()
      }
      _ => None,
    }
  }

  /// Whether the engine asked for sign-in.
  pub fn is_auth(&self) -> bool {
    match self {
      RunError::Submission { source, .. }
      | RunError::PollEscalated { source, .. }
      | RunError::Resume { source, .. }
      | RunError::Poll { source, .. } => source.is_auth(),
      _ => false,
    }
  }
}
