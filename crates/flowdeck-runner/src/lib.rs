//! Flowdeck Runner
//!
//! Drives a single flow run from submission to a settled state and pages
//! through its logs.
//!
//! [`RunController`] is an explicit state machine:
//!
//! ```text
//! Idle -> Submitting -> Polling -> Finished(outcome)
//!                         |  ^
//!                         v  |
//!                 Paused -> Resuming
//! ```
//!
//! Polling is driven by a single [`PollTimer`]; the next status fetch is only
//! armed once the previous one has resolved. Callers withdraw interest through
//! a `CancellationToken`, which never touches the remote run.
//!
//! [`LogPager`] fetches bounded pages of logs and downloads full log artifacts
//! from the engine's bulk endpoint.

mod controller;
mod error;
mod events;
mod logs;
mod state;
mod timer;

pub use controller::{RunController, RunSummary};
pub use error::RunError;
pub use events::{ChannelNotifier, NoopNotifier, RunEvent, RunNotifier, TracingNotifier};
pub use logs::{LogFetchError, LogPager, MAX_PAGE_LIMIT};
pub use state::{ObservedState, Outcome, Phase};
pub use timer::PollTimer;
