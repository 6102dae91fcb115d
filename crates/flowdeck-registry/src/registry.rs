use std::collections::HashMap;

use flowdeck_client::RawFlow;
use flowdeck_config::{FlowType, LABEL_FLOW_TYPE, LABEL_PARENT_FLOW};
use serde_json::Value;
use tracing::{debug, warn};

use crate::node::{FlowNode, ParentLink};

/// The normalized flow hierarchy for one session.
#[derive(Debug, Clone, Default)]
pub struct FlowRegistry {
  /// Nodes in input order.
  nodes: Vec<FlowNode>,
  /// Storage id -> index into `nodes`.
  by_id: HashMap<String, usize>,
  /// Main flow name -> index of the main flow that owns the name.
  mains_by_name: HashMap<String, usize>,
}

/// Normalize raw engine records into a [`FlowRegistry`].
///
/// Never fails: unknown tiers default to `feature`, dangling parents become
/// [`ParentLink::Orphaned`], and when two main flows share a name the first one
/// in input order owns it.
pub fn normalize(raw_flows: &[RawFlow]) -> FlowRegistry {
  let flow_types: Vec<FlowType> = raw_flows.iter().map(flow_type_of).collect();

  // Pass 1: index main flows by name. First occurrence wins.
  let mut mains_by_name: HashMap<String, usize> = HashMap::new();
  for (index, (raw, flow_type)) in raw_flows.iter().zip(&flow_types).enumerate() {
    if *flow_type != FlowType::Main {
      continue;
    }
    if let Some(&first) = mains_by_name.get(&raw.name) {
      warn!(
        name = %raw.name,
        kept = %raw_flows[first].id,
        ignored = %raw.id,
        "duplicate main flow name, children link to the first"
      );
      continue;
    }
    mains_by_name.insert(raw.name.clone(), index);
  }

  // Pass 2: build nodes and resolve parents.
  let mut nodes = Vec::with_capacity(raw_flows.len());
  let mut by_id = HashMap::with_capacity(raw_flows.len());

  for (index, (raw, flow_type)) in raw_flows.iter().zip(flow_types).enumerate() {
    let (parent_flow_id, parent) = if flow_type == FlowType::Main {
      (None, ParentLink::Root)
    } else {
      match parent_label(raw) {
        None => (None, ParentLink::Unparented),
        Some(parent_name) => {
          let link = match mains_by_name.get(parent_name) {
            Some(&main_index) => ParentLink::Attached {
              main_id: raw_flows[main_index].id.clone(),
            },
            None => {
              debug!(flow = %raw.name, parent = %parent_name, "parent flow not found, orphaned");
              ParentLink::Orphaned
            }
          };
          (Some(parent_name.to_string()), link)
        }
      }
    };

    if by_id.contains_key(&raw.id) {
      warn!(id = %raw.id, "duplicate flow id, later record ignored for lookups");
    } else {
      by_id.insert(raw.id.clone(), index);
    }

    nodes.push(FlowNode {
      id: raw.id.clone(),
      name: raw.name.clone(),
      flow_type,
      parent_flow_id,
      parent,
      tags: raw.tags.iter().cloned().collect(),
      labels: raw.labels.clone(),
    });
  }

  FlowRegistry {
    nodes,
    by_id,
    mains_by_name,
  }
}

fn flow_type_of(raw: &RawFlow) -> FlowType {
  raw
    .labels
    .get(LABEL_FLOW_TYPE)
    .and_then(Value::as_str)
    .and_then(FlowType::from_label)
    .unwrap_or(FlowType::Feature)
}

fn parent_label(raw: &RawFlow) -> Option<&str> {
  raw
    .labels
    .get(LABEL_PARENT_FLOW)
    .and_then(Value::as_str)
    .filter(|name| !name.trim().is_empty())
}

impl FlowRegistry {
  /// All nodes in input order.
  pub fn nodes(&self) -> &[FlowNode] {
    &self.nodes
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Get a node by storage id.
  pub fn get(&self, id: &str) -> Option<&FlowNode> {
    self.by_id.get(id).map(|&i| &self.nodes[i])
  }

  /// The main flow that owns `name`, if any.
  pub fn main_by_name(&self, name: &str) -> Option<&FlowNode> {
    self.mains_by_name.get(name).map(|&i| &self.nodes[i])
  }

  /// Main flows sorted by name, then id.
  pub fn mains(&self) -> Vec<&FlowNode> {
    let mut mains: Vec<&FlowNode> = self.nodes.iter().filter(|n| n.is_main()).collect();
    mains.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
    mains
  }

  /// Children attached to the main flow with the given id, sorted by name, then id.
  pub fn children_of(&self, main_id: &str) -> Vec<&FlowNode> {
    let mut children: Vec<&FlowNode> = self
      .nodes
      .iter()
      .filter(|n| n.attached_to() == Some(main_id))
      .collect();
    children.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
    children
  }

  /// Child nodes that render outside every container, sorted by name, then id.
  pub fn unattached(&self) -> Vec<&FlowNode> {
    let mut nodes: Vec<&FlowNode> = self.nodes.iter().filter(|n| n.is_unattached()).collect();
    nodes.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
    nodes
  }

  /// Nodes whose declared parent does not exist.
  pub fn orphaned(&self) -> Vec<&FlowNode> {
    self
      .nodes
      .iter()
      .filter(|n| n.parent == ParentLink::Orphaned)
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{Map, json};

  fn raw(id: &str, name: &str, labels: Value) -> RawFlow {
    let labels: Map<String, Value> = serde_json::from_value(labels).unwrap();
    RawFlow {
      id: id.to_string(),
      name: name.to_string(),
      tags: vec!["dataset-etl".to_string()],
      labels,
      created: None,
      updated: None,
    }
  }

  fn etl_flows(main_name: &str) -> Vec<RawFlow> {
    vec![
      raw("f-main", main_name, json!({ "flow_type": "main" })),
      raw(
        "f-collect",
        "data-collection-flow",
        json!({ "flow_type": "feature", "parent_flow": "dataset-etl-flow" }),
      ),
      raw(
        "f-convert",
        "data-conversion-flow",
        json!({ "flow_type": "feature", "parent_flow": "dataset-etl-flow" }),
      ),
      raw(
        "f-compat",
        "rustfs-list-files",
        json!({ "flow_type": "subflow", "parent_flow": "dataset-etl-flow" }),
      ),
    ]
  }

  #[test]
  fn test_children_attach_to_main_by_name() {
    let registry = normalize(&etl_flows("dataset-etl-flow"));

    let children: Vec<&str> = registry
      .children_of("f-main")
      .iter()
      .map(|n| n.name.as_str())
      .collect();
    assert_eq!(
      children,
      vec!["data-collection-flow", "data-conversion-flow", "rustfs-list-files"]
    );
    assert!(registry.unattached().is_empty());
  }

  #[test]
  fn test_resolved_parents_always_name_a_main_flow() {
    let mut flows = etl_flows("dataset-etl-flow");
    flows.push(raw(
      "f-x",
      "stray-flow",
      json!({ "flow_type": "feature", "parent_flow": "data-collection-flow" }),
    ));
    let registry = normalize(&flows);

    for node in registry.nodes() {
      if let Some(main_id) = node.attached_to() {
        let main = registry.get(main_id).unwrap();
        assert_eq!(main.flow_type, FlowType::Main);
        assert_eq!(Some(main.name.as_str()), node.parent_flow_id.as_deref());
      }
    }
    // A feature flow is not a valid parent.
    assert_eq!(registry.get("f-x").unwrap().parent, ParentLink::Orphaned);
  }

  #[test]
  fn test_renaming_main_orphans_children_but_keeps_label() {
    let registry = normalize(&etl_flows("dataset-etl-flow-v2"));

    assert!(registry.children_of("f-main").is_empty());
    let collect = registry.get("f-collect").unwrap();
    assert_eq!(collect.parent, ParentLink::Orphaned);
    assert_eq!(collect.parent_flow_id.as_deref(), Some("dataset-etl-flow"));
    assert_eq!(registry.orphaned().len(), 3);
  }

  #[test]
  fn test_flow_type_defaults_to_feature() {
    let registry = normalize(&[
      raw("a", "no-labels", json!({})),
      raw("b", "odd-type", json!({ "flow_type": "pipeline" })),
      raw("c", "numeric-type", json!({ "flow_type": 3 })),
    ]);

    for node in registry.nodes() {
      assert_eq!(node.flow_type, FlowType::Feature);
      assert_eq!(node.parent, ParentLink::Unparented);
      assert!(node.parent_flow_id.is_none());
    }
  }

  #[test]
  fn test_main_ignores_parent_label() {
    let registry = normalize(&[raw(
      "m",
      "main-with-parent",
      json!({ "flow_type": "main", "parent_flow": "other" }),
    )]);

    let node = registry.get("m").unwrap();
    assert_eq!(node.parent, ParentLink::Root);
    assert!(node.parent_flow_id.is_none());
  }

  #[test]
  fn test_duplicate_main_names_pick_first_in_input_order() {
    let registry = normalize(&[
      raw("m-1", "etl", json!({ "flow_type": "main" })),
      raw("m-2", "etl", json!({ "flow_type": "main" })),
      raw(
        "c",
        "child",
        json!({ "flow_type": "feature", "parent_flow": "etl" }),
      ),
    ]);

    assert_eq!(registry.get("c").unwrap().attached_to(), Some("m-1"));
    assert_eq!(registry.main_by_name("etl").unwrap().id, "m-1");
    assert!(registry.children_of("m-2").is_empty());
  }

  #[test]
  fn test_labels_pass_through_untouched() {
    let registry = normalize(&[raw(
      "m",
      "etl",
      json!({
        "flow_type": "main",
        "entrypoint": "docs.flows.main:dataset_etl_flow",
        "owner": { "team": 1 }
      }),
    )]);

    let node = registry.get("m").unwrap();
    assert_eq!(node.entrypoint(), Some("docs.flows.main:dataset_etl_flow"));
    assert_eq!(node.labels["owner"], json!({ "team": 1 }));
    assert!(node.tags.contains("dataset-etl"));
  }

  #[test]
  fn test_blank_parent_label_is_unparented() {
    let registry = normalize(&[raw(
      "c",
      "child",
      json!({ "flow_type": "subflow", "parent_flow": "  " }),
    )]);
    assert_eq!(registry.get("c").unwrap().parent, ParentLink::Unparented);
  }

  #[test]
  fn test_parent_label_matches_raw_name() {
    let registry = normalize(&[
      raw("m", "dataset-etl-flow", json!({ "flow_type": "main" })),
      raw(
        "c",
        "child",
        json!({ "flow_type": "feature", "parent_flow": " dataset-etl-flow " }),
      ),
    ]);

    let child = registry.get("c").unwrap();
    assert_eq!(child.parent, ParentLink::Orphaned);
    assert_eq!(child.parent_flow_id.as_deref(), Some(" dataset-etl-flow "));
    assert!(registry.children_of("m").is_empty());
  }
}
