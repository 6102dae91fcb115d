use std::fmt;

use chrono::{DateTime, Utc};
use flowdeck_config::RunMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A flow record as the engine returns it, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFlow {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub labels: Map<String, Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated: Option<DateTime<Utc>>,
}

/// Partial update of a flow record. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tags: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub labels: Option<Map<String, Value>>,
}

/// The engine's view of where a flow's code lives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowCode {
  #[serde(default)]
  pub entrypoint: Option<String>,
  /// Object-store prefix holding the flow's files.
  #[serde(default)]
  pub prefix: Option<String>,
  /// Inline code for flows registered as a single file.
  #[serde(default)]
  pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCodeUpdate {
  pub code: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub entrypoint: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub prefix: Option<String>,
}

/// One source file of a flow bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowFile {
  pub relative_path: String,
  pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedFiles {
  pub uploaded_count: usize,
  #[serde(default)]
  pub keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRegisterResult {
  #[serde(default)]
  pub registered: Vec<RawFlow>,
  #[serde(default)]
  pub failed: Vec<RegistrationFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationFailure {
  pub name: String,
  pub error: String,
}

/// A request to start a flow. Consumed once by submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
  pub flow_id: String,
  pub mode: RunMode,
  pub parameters: Map<String, Value>,
}

impl RunRequest {
  pub fn new(flow_id: impl Into<String>, mode: RunMode) -> Self {
    Self {
      flow_id: flow_id.into(),
      mode,
      parameters: Map::new(),
    }
  }

  pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
    self.parameters = parameters;
    self
  }

  /// Wire body for the run/test call. Empty parameters are left out entirely.
  pub fn body(&self) -> Value {
    let mut body = Map::new();
    if !self.parameters.is_empty() {
      body.insert(
        "parameters".to_string(),
        Value::Object(self.parameters.clone()),
      );
    }
    Value::Object(body)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAccepted {
  #[serde(alias = "id")]
  pub flow_run_id: String,
}

/// Coarse run state as defined by the engine.
///
/// Unknown values are preserved verbatim in [`StateType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StateType {
  Scheduled,
  Pending,
  Running,
  Paused,
  Cancelling,
  Completed,
  Failed,
  Cancelled,
  Crashed,
  Other(String),
}

impl StateType {
  /// States after which the engine will not move the run again.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      StateType::Completed | StateType::Failed | StateType::Cancelled | StateType::Crashed
    )
  }

  pub fn as_str(&self) -> &str {
    match self {
      StateType::Scheduled => "SCHEDULED",
      StateType::Pending => "PENDING",
      StateType::Running => "RUNNING",
      StateType::Paused => "PAUSED",
      StateType::Cancelling => "CANCELLING",
      StateType::Completed => "COMPLETED",
      StateType::Failed => "FAILED",
      StateType::Cancelled => "CANCELLED",
      StateType::Crashed => "CRASHED",
      StateType::Other(other) => other,
    }
  }
}

impl From<String> for StateType {
  fn from(value: String) -> Self {
    match value.to_ascii_uppercase().as_str() {
      "SCHEDULED" => StateType::Scheduled,
      "PENDING" => StateType::Pending,
      "RUNNING" => StateType::Running,
      "PAUSED" => StateType::Paused,
      "CANCELLING" => StateType::Cancelling,
      "COMPLETED" => StateType::Completed,
      "FAILED" => StateType::Failed,
      "CANCELLED" => StateType::Cancelled,
      "CRASHED" => StateType::Crashed,
      _ => StateType::Other(value),
    }
  }
}

impl From<StateType> for String {
  fn from(value: StateType) -> Self {
    value.as_str().to_string()
  }
}

impl fmt::Display for StateType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A run as last reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  #[serde(alias = "flow_run_id")]
  pub id: String,
  pub flow_id: String,
  pub state_type: StateType,
  #[serde(default)]
  pub state_name: Option<String>,
  pub created: DateTime<Utc>,
  #[serde(default)]
  pub start_time: Option<DateTime<Utc>>,
  #[serde(default)]
  pub end_time: Option<DateTime<Utc>>,
}

/// Log level as sent by the engine: numeric (`20`) or named (`"INFO"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogLevel {
  Numeric(i64),
  Named(String),
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LogLevel::Named(name) => f.write_str(name),
      LogLevel::Numeric(n) => match n {
        50.. => f.write_str("CRITICAL"),
        40..=49 => f.write_str("ERROR"),
        30..=39 => f.write_str("WARNING"),
        20..=29 => f.write_str("INFO"),
        _ => f.write_str("DEBUG"),
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  pub id: String,
  pub created: DateTime<Utc>,
  pub level: LogLevel,
  pub message: String,
  pub timestamp: DateTime<Utc>,
}

/// One page of run logs, in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
  #[serde(default)]
  pub logs: Vec<LogEntry>,
  /// Total log count known to the engine when the page was produced.
  #[serde(default)]
  pub total: u64,
}
