use std::fmt;

use flowdeck_client::{RunRecord, StateType};
use serde::Serialize;

/// How a watched run settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  Completed,
  Failed,
  Cancelled,
  Crashed,
  /// The caller's timeout elapsed first. The run may still be going.
  TimedOut,
  /// The caller withdrew interest. The run is untouched.
  Detached,
  /// Status fetches kept failing.
  ObservationFailed,
}

impl Outcome {
  /// Outcome for an engine terminal state.
  pub fn from_terminal(state_type: &StateType) -> Option<Self> {
    match state_type {
      StateType::Completed => Some(Outcome::Completed),
      StateType::Failed => Some(Outcome::Failed),
      StateType::Cancelled => Some(Outcome::Cancelled),
      StateType::Crashed => Some(Outcome::Crashed),
      _ => None,
    }
  }

  pub fn is_success(&self) -> bool {
    *self == Outcome::Completed
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Outcome::Completed => "completed",
      Outcome::Failed => "failed",
      Outcome::Cancelled => "cancelled",
      Outcome::Crashed => "crashed",
      Outcome::TimedOut => "timed_out",
      Outcome::Detached => "detached",
      Outcome::ObservationFailed => "observation_failed",
    }
  }
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Where the controller is in a run's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
  Idle,
  Submitting,
  Polling {
    run_id: String,
  },
  /// The engine is holding the run for approval.
  Paused {
    run_id: String,
  },
  Resuming {
    run_id: String,
  },
  Finished {
    /// Absent when submission itself failed.
    run_id: Option<String>,
    outcome: Outcome,
  },
}

impl Phase {
  pub fn run_id(&self) -> Option<&str> {
    match self {
      Phase::Idle | Phase::Submitting => None,
      Phase::Polling { run_id } | Phase::Paused { run_id } | Phase::Resuming { run_id } => {
        Some(run_id)
      }
      Phase::Finished { run_id, .. } => run_id.as_deref(),
    }
  }

  pub fn outcome(&self) -> Option<Outcome> {
    match self {
      Phase::Finished { outcome, .. } => Some(*outcome),
      _ => None,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Phase::Idle => "idle",
      Phase::Submitting => "submitting",
      Phase::Polling { .. } => "polling",
      Phase::Paused { .. } => "paused",
      Phase::Resuming { .. } => "resuming",
      Phase::Finished { .. } => "finished",
    }
  }
}

/// The engine-reported state of a run at the last successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedState {
  pub state_type: StateType,
  pub state_name: Option<String>,
}

impl ObservedState {
  /// Whether the engine is waiting for the run to be resumed.
  pub fn is_pause_capable(&self) -> bool {
    self.state_type == StateType::Paused
      || self.state_name.as_deref().is_some_and(|name| {
        name.eq_ignore_ascii_case("paused") || name.eq_ignore_ascii_case("suspended")
      })
  }

  pub fn is_terminal(&self) -> bool {
    self.state_type.is_terminal()
  }
}

impl From<&RunRecord> for ObservedState {
  fn from(record: &RunRecord) -> Self {
    Self {
      state_type: record.state_type.clone(),
      state_name: record.state_name.clone(),
    }
  }
}

impl fmt::Display for ObservedState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.state_name {
      Some(name) => write!(f, "{} ({name})", self.state_type),
      None => write!(f, "{}", self.state_type),
    }
  }
}
