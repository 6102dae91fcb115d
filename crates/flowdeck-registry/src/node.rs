use std::collections::BTreeSet;

use flowdeck_config::{FlowType, LABEL_DESCRIPTION, LABEL_ENTRYPOINT};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A normalized flow in the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
  pub id: String,
  pub name: String,
  pub flow_type: FlowType,
  /// Name of the parent main flow as declared by the `parent_flow` label.
  /// Kept even when no main flow carries that name.
  pub parent_flow_id: Option<String>,
  pub parent: ParentLink,
  pub tags: BTreeSet<String>,
  pub labels: Map<String, Value>,
}

/// How a node relates to the main flow above it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParentLink {
  /// A main flow; it has no parent.
  Root,
  /// Linked to the main flow with this storage id.
  Attached { main_id: String },
  /// Declares a parent name that no main flow carries.
  Orphaned,
  /// A feature/subflow without any `parent_flow` label.
  Unparented,
}

impl FlowNode {
  pub fn entrypoint(&self) -> Option<&str> {
    self.labels.get(LABEL_ENTRYPOINT).and_then(Value::as_str)
  }

  pub fn description(&self) -> Option<&str> {
    self.labels.get(LABEL_DESCRIPTION).and_then(Value::as_str)
  }

  pub fn is_main(&self) -> bool {
    self.flow_type == FlowType::Main
  }

  /// Storage id of the main flow this node renders inside, if any.
  pub fn attached_to(&self) -> Option<&str> {
    match &self.parent {
      ParentLink::Attached { main_id } => Some(main_id),
      _ => None,
    }
  }

  /// A child node that renders outside every container.
  pub fn is_unattached(&self) -> bool {
    matches!(self.parent, ParentLink::Orphaned | ParentLink::Unparented)
  }
}
