use std::fmt;

use serde::{Deserialize, Serialize};

/// Tier of a flow in the main → feature hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
  Main,
  Feature,
  Subflow,
}

impl FlowType {
  /// Parse a `flow_type` label value.
  ///
  /// Returns `None` for anything that is not one of the three known tiers.
  pub fn from_label(value: &str) -> Option<Self> {
    match value.trim().to_ascii_lowercase().as_str() {
      "main" => Some(FlowType::Main),
      "feature" => Some(FlowType::Feature),
      "subflow" => Some(FlowType::Subflow),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      FlowType::Main => "main",
      FlowType::Feature => "feature",
      FlowType::Subflow => "subflow",
    }
  }

  /// Whether nodes of this tier hang under a main flow.
  pub fn is_child(&self) -> bool {
    !matches!(self, FlowType::Main)
  }
}

impl fmt::Display for FlowType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How a flow invocation is submitted to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
  Run,
  Test,
}

impl RunMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      RunMode::Run => "run",
      RunMode::Test => "test",
    }
  }
}

impl fmt::Display for RunMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_flow_type_from_label() {
    assert_eq!(FlowType::from_label("main"), Some(FlowType::Main));
    assert_eq!(FlowType::from_label(" Feature "), Some(FlowType::Feature));
    assert_eq!(FlowType::from_label("SUBFLOW"), Some(FlowType::Subflow));
    assert_eq!(FlowType::from_label("pipeline"), None);
  }

  #[test]
  fn test_flow_type_serde_snake_case() {
    let json = serde_json::to_string(&FlowType::Subflow).unwrap();
    assert_eq!(json, "\"subflow\"");
  }
}
