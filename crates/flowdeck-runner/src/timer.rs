use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// A single one-shot timer that paces status polls.
///
/// At most one deadline is armed at a time. [`PollTimer::tick`] disarms it, so
/// the next poll is only scheduled when the caller calls [`PollTimer::reset`]
/// after the previous poll resolved.
#[derive(Debug)]
pub struct PollTimer {
  interval: Duration,
  deadline: Option<Instant>,
}

impl PollTimer {
  pub fn new(interval: Duration) -> Self {
    Self {
      interval,
      deadline: None,
    }
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// Arm the timer to fire immediately.
  pub fn start(&mut self) {
    self.deadline = Some(Instant::now());
  }

  pub fn stop(&mut self) {
    self.deadline = None;
  }

  /// Arm the timer to fire one interval from now.
  pub fn reset(&mut self) {
    self.deadline = Some(Instant::now() + self.interval);
  }

  pub fn is_armed(&self) -> bool {
    self.deadline.is_some()
  }

  /// Wait for the armed deadline, then disarm. Never resolves while stopped.
  pub async fn tick(&mut self) {
    match self.deadline {
      Some(deadline) => {
        sleep_until(deadline).await;
        self.deadline = None;
      }
      None => std::future::pending().await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::time::timeout;

  #[tokio::test(start_paused = true)]
  async fn test_start_fires_immediately_then_disarms() {
    let mut timer = PollTimer::new(Duration::from_secs(2));
    let begin = Instant::now();

    timer.start();
    timer.tick().await;
    assert_eq!(Instant::now(), begin);
    assert!(!timer.is_armed());
  }

  #[tokio::test(start_paused = true)]
  async fn test_reset_waits_one_interval() {
    let mut timer = PollTimer::new(Duration::from_secs(2));
    let begin = Instant::now();

    timer.reset();
    timer.tick().await;
    assert_eq!(Instant::now() - begin, Duration::from_secs(2));
  }

  #[tokio::test(start_paused = true)]
  async fn test_stopped_timer_never_fires() {
    let mut timer = PollTimer::new(Duration::from_millis(10));
    timer.reset();
    timer.stop();

    let waited = timeout(Duration::from_secs(60), timer.tick()).await;
    assert!(waited.is_err());
  }
}
