//! Lifecycle events and notifiers.
//!
//! The controller emits a [`RunEvent`] at every phase change so consumers can
//! observe a run without polling the controller (stream to a terminal, record
//! history, etc.).

use flowdeck_client::StateType;
use flowdeck_config::RunMode;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::state::Outcome;

/// Events emitted while a run is driven.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
  Submitted {
    flow_id: String,
    run_id: String,
    mode: RunMode,
  },

  SubmissionFailed {
    flow_id: String,
    mode: RunMode,
    error: String,
  },

  /// The engine reported a state different from the previous observation.
  StateChanged {
    run_id: String,
    state_type: StateType,
    state_name: Option<String>,
  },

  /// One status fetch failed. Polling continues until the failure threshold.
  PollFailed {
    run_id: String,
    consecutive: u32,
    error: String,
  },

  Paused {
    run_id: String,
  },

  ResumeRequested {
    run_id: String,
  },

  Finished {
    run_id: Option<String>,
    outcome: Outcome,
  },
}

/// Receives lifecycle events.
pub trait RunNotifier: Send + Sync {
  fn notify(&self, event: RunEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl RunNotifier for NoopNotifier {
  fn notify(&self, _event: RunEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
    Self { sender }
  }
}

impl RunNotifier for ChannelNotifier {
  fn notify(&self, event: RunEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}

/// Writes events to the `tracing` subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl RunNotifier for TracingNotifier {
  fn notify(&self, event: RunEvent) {
    match event {
      RunEvent::Submitted {
        flow_id,
        run_id,
        mode,
      } => info!(%flow_id, %run_id, %mode, "run submitted"),
      RunEvent::SubmissionFailed {
        flow_id,
        mode,
        error,
      } => warn!(%flow_id, %mode, %error, "run submission failed"),
      RunEvent::StateChanged {
        run_id,
        state_type,
        state_name,
      } => info!(
        %run_id,
        %state_type,
        state_name = state_name.as_deref().unwrap_or(""),
        "run state changed"
      ),
      RunEvent::PollFailed {
        run_id,
        consecutive,
        error,
      } => warn!(%run_id, consecutive, %error, "status fetch failed"),
      RunEvent::Paused { run_id } => info!(%run_id, "run paused, awaiting resume"),
      RunEvent::ResumeRequested { run_id } => info!(%run_id, "resume requested"),
      RunEvent::Finished { run_id, outcome } => info!(
        run_id = run_id.as_deref().unwrap_or(""),
        %outcome,
        "run finished"
      ),
    }
  }
}
