use std::future::pending;

use flowdeck_client::{ClientError, RunRecord, RunRequest, RunsApi};
use flowdeck_config::PollingConfig;
use serde::Serialize;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::RunError;
use crate::events::{NoopNotifier, RunEvent, RunNotifier};
use crate::state::{ObservedState, Outcome, Phase};
use crate::timer::PollTimer;

/// Where a watch left the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
  pub run_id: String,
  /// `Finished` or `Paused`.
  pub phase: Phase,
  pub last_observed: Option<ObservedState>,
  /// Status fetches issued by this watch.
  pub polls: u32,
}

impl RunSummary {
  pub fn outcome(&self) -> Option<Outcome> {
    self.phase.outcome()
  }
}

enum Wake {
  Detached,
  TimedOut,
  Polled(Result<RunRecord, ClientError>),
}

/// Drives one run through its lifecycle.
///
/// Each controller owns exactly one run. Concurrent submissions of the same
/// flow use separate controllers and are not deduplicated.
pub struct RunController<R: RunsApi, N: RunNotifier = NoopNotifier> {
  api: R,
  polling: PollingConfig,
  notifier: N,
  phase: Phase,
  last: Option<RunRecord>,
  /// Set after a successful resume until the engine leaves the paused state.
  awaiting_resume: bool,
}

impl<R: RunsApi> RunController<R, NoopNotifier> {
  pub fn new(api: R, polling: PollingConfig) -> Self {
    Self::with_notifier(api, polling, NoopNotifier)
  }
}

impl<R: RunsApi, N: RunNotifier> RunController<R, N> {
  pub fn with_notifier(api: R, polling: PollingConfig, notifier: N) -> Self {
    Self {
      api,
      polling,
      notifier,
      phase: Phase::Idle,
      last: None,
      awaiting_resume: false,
    }
  }

  pub fn api(&self) -> &R {
    &self.api
  }

  pub fn phase(&self) -> &Phase {
    &self.phase
  }

  /// The last run record fetched from the engine.
  pub fn last_record(&self) -> Option<&RunRecord> {
    self.last.as_ref()
  }

  pub fn last_observed(&self) -> Option<ObservedState> {
    self.last.as_ref().map(ObservedState::from)
  }

  /// Submit the request. Issues exactly one call and never retries.
  #[instrument(skip(self, request), fields(flow_id = %request.flow_id, mode = %request.mode))]
  pub async fn submit(&mut self, request: RunRequest) -> Result<String, RunError> {
    if self.phase != Phase::Idle {
      return Err(RunError::InvalidPhase {
        operation: "submit",
        phase: self.phase.name(),
      });
    }

    self.set_phase(Phase::Submitting);
    match self.api.submit_run(&request).await {
      Ok(accepted) => {
        let run_id = accepted.flow_run_id;
        self.notifier.notify(RunEvent::Submitted {
          flow_id: request.flow_id,
          run_id: run_id.clone(),
          mode: request.mode,
        });
        self.set_phase(Phase::Polling {
          run_id: run_id.clone(),
        });
        Ok(run_id)
      }
      Err(source) => {
        self.notifier.notify(RunEvent::SubmissionFailed {
          flow_id: request.flow_id.clone(),
          mode: request.mode,
          error: source.to_string(),
        });
        self.finish(None, Outcome::Failed);
        Err(RunError::Submission {
          flow_id: request.flow_id,
          mode: request.mode,
          source,
        })
      }
    }
  }

  /// Fetch the run's current state once and adopt the matching phase.
  ///
  /// Lets a controller pick up a run it did not submit, e.g. before resuming.
  #[instrument(skip(self))]
  pub async fn observe(&mut self, run_id: &str) -> Result<RunRecord, RunError> {
    let record = self
      .api
      .get_run(run_id)
      .await
      .map_err(|source| RunError::Poll {
        run_id: run_id.to_string(),
        source,
      })?;

    let observed = ObservedState::from(&record);
    self.record(record.clone());

    let run_id = run_id.to_string();
    let phase = match Outcome::from_terminal(&observed.state_type) {
      Some(outcome) => Phase::Finished {
        run_id: Some(run_id),
        outcome,
      },
      None if observed.is_pause_capable() => Phase::Paused { run_id },
      None => Phase::Polling { run_id },
    };
    self.set_phase(phase);
    Ok(record)
  }

  /// Poll until the run settles.
  ///
  /// Returns when the engine reports a terminal or pause-capable state, when
  /// the configured timeout elapses (`TimedOut`), or when `cancel` fires
  /// (`Detached`). Cancellation never touches the remote run and discards any
  /// in-flight status fetch.
  #[instrument(skip(self, cancel))]
  pub async fn watch(&mut self, cancel: CancellationToken) -> Result<RunSummary, RunError> {
    let run_id = match &self.phase {
      Phase::Polling { run_id } => run_id.clone(),
      other => {
        return Err(RunError::InvalidPhase {
          operation: "watch",
          phase: other.name(),
        });
      }
    };

    let deadline = self.polling.timeout().map(|t| Instant::now() + t);
    let expiry = async move {
      match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
      }
    };
    tokio::pin!(expiry);

    let mut timer = PollTimer::new(self.polling.interval());
    timer.start();
    let mut polls: u32 = 0;
    let mut failures: u32 = 0;

    loop {
      let woke = tokio::select! {
        biased;
        _ = cancel.cancelled() => Some(Wake::Detached),
        _ = &mut expiry => Some(Wake::TimedOut),
        _ = timer.tick() => None,
      };

      let wake = match woke {
        Some(wake) => wake,
        None => {
          polls += 1;
          tokio::select! {
            biased;
            _ = cancel.cancelled() => Wake::Detached,
            _ = &mut expiry => Wake::TimedOut,
            result = self.api.get_run(&run_id) => Wake::Polled(result),
          }
        }
      };

      match wake {
        Wake::Detached => {
          timer.stop();
          info!(%run_id, polls, "stopped watching run");
          return Ok(self.settle(run_id, Outcome::Detached, polls));
        }
        Wake::TimedOut => {
          timer.stop();
          warn!(%run_id, polls, "watch timed out, run may still be active");
          return Ok(self.settle(run_id, Outcome::TimedOut, polls));
        }
        Wake::Polled(Ok(record)) => {
          failures = 0;
          let observed = ObservedState::from(&record);
          self.record(record);

          if let Some(outcome) = Outcome::from_terminal(&observed.state_type) {
            return Ok(self.settle(run_id, outcome, polls));
          }

          if !observed.is_pause_capable() {
            self.awaiting_resume = false;
          } else if !self.awaiting_resume {
            self.notifier.notify(RunEvent::Paused {
              run_id: run_id.clone(),
            });
            self.set_phase(Phase::Paused {
              run_id: run_id.clone(),
            });
            return Ok(self.summary(run_id, polls));
          }

          timer.reset();
        }
        Wake::Polled(Err(source)) => {
          failures += 1;
          self.notifier.notify(RunEvent::PollFailed {
            run_id: run_id.clone(),
            consecutive: failures,
            error: source.to_string(),
          });

          if source.is_auth() || failures > self.polling.max_consecutive_failures {
            self.finish(Some(run_id.clone()), Outcome::ObservationFailed);
            return Err(RunError::PollEscalated {
              run_id,
              failures,
              last: self.last_observed(),
              source,
            });
          }

          timer.reset();
        }
      }
    }
  }

  /// Ask the engine to resume a paused run.
  ///
  /// Rejected without any network call unless the controller is paused on
  /// `run_id` and the last state observed for it is pause-capable. A resume
  /// already sent counts until a poll sees the run leave the pause. On
  /// success the controller is polling again.
  #[instrument(skip(self))]
  pub async fn resume(&mut self, run_id: &str) -> Result<(), RunError> {
    let last = self
      .last
      .as_ref()
      .filter(|record| record.id == run_id)
      .map(ObservedState::from);

    let paused_here = matches!(&self.phase, Phase::Paused { run_id: id } if id == run_id);
    let resumable = paused_here
      && !self.awaiting_resume
      && last.as_ref().is_some_and(ObservedState::is_pause_capable);
    if !resumable {
      warn!(run_id, last = ?last, "resume rejected");
      return Err(RunError::ResumeRejected {
        run_id: run_id.to_string(),
        last,
      });
    }

    self.notifier.notify(RunEvent::ResumeRequested {
      run_id: run_id.to_string(),
    });
    self.set_phase(Phase::Resuming {
      run_id: run_id.to_string(),
    });

    match self.api.resume_run(run_id).await {
      Ok(()) => {
        self.awaiting_resume = true;
        self.set_phase(Phase::Polling {
          run_id: run_id.to_string(),
        });
        Ok(())
      }
      Err(source) => {
        self.set_phase(Phase::Paused {
          run_id: run_id.to_string(),
        });
        Err(RunError::Resume {
          run_id: run_id.to_string(),
          source,
        })
      }
    }
  }

  /// Submit and watch.
  pub async fn run(
    &mut self,
    request: RunRequest,
    cancel: CancellationToken,
  ) -> Result<RunSummary, RunError> {
    self.submit(request).await?;
    self.watch(cancel).await
  }

  fn record(&mut self, record: RunRecord) {
    let observed = ObservedState::from(&record);
    let changed = self
      .last
      .as_ref()
      .is_none_or(|prev| prev.id != record.id || ObservedState::from(prev) != observed);
    if changed {
      self.notifier.notify(RunEvent::StateChanged {
        run_id: record.id.clone(),
        state_type: observed.state_type,
        state_name: observed.state_name,
      });
    }
    self.last = Some(record);
  }

  fn set_phase(&mut self, phase: Phase) {
    debug!(from = self.phase.name(), to = phase.name(), "phase change");
    self.phase = phase;
  }

  fn finish(&mut self, run_id: Option<String>, outcome: Outcome) {
    self.awaiting_resume = false;
    self.notifier.notify(RunEvent::Finished {
      run_id: run_id.clone(),
      outcome,
    });
    self.set_phase(Phase::Finished { run_id, outcome });
  }

  fn settle(&mut self, run_id: String, outcome: Outcome, polls: u32) -> RunSummary {
    self.finish(Some(run_id.clone()), outcome);
    self.summary(run_id, polls)
  }

  fn summary(&self, run_id: String, polls: u32) -> RunSummary {
    RunSummary {
      run_id,
      phase: self.phase.clone(),
      last_observed: self.last_observed(),
      polls,
    }
  }
}
