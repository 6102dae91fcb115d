use flowdeck_config::{FlowType, LayoutConfig};
use flowdeck_registry::{FlowNode, FlowRegistry};
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Where a node ended up in the layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
  /// A main flow drawn as a container.
  Container,
  /// A child drawn inside the container of the given main flow.
  Nested { container_id: String },
  /// A child whose parent could not be resolved, drawn outside all containers.
  Unattached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedNode {
  pub id: String,
  pub name: String,
  pub flow_type: FlowType,
  #[serde(flatten)]
  pub placement: Placement,
  /// Absolute bounds on the canvas.
  pub bounds: Rect,
}

/// A computed layout. Nodes are ordered containers first (each followed by its
/// children), then the unattached band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
  pub nodes: Vec<PlacedNode>,
}

impl Layout {
  pub fn get(&self, id: &str) -> Option<&PlacedNode> {
    self.nodes.iter().find(|n| n.id == id)
  }

  pub fn containers(&self) -> impl Iterator<Item = &PlacedNode> {
    self
      .nodes
      .iter()
      .filter(|n| n.placement == Placement::Container)
  }

  pub fn nested_in<'a>(&'a self, container_id: &'a str) -> impl Iterator<Item = &'a PlacedNode> {
    self.nodes.iter().filter(move |n| {
      matches!(&n.placement, Placement::Nested { container_id: c } if c == container_id)
    })
  }

  pub fn unattached(&self) -> impl Iterator<Item = &PlacedNode> {
    self
      .nodes
      .iter()
      .filter(|n| n.placement == Placement::Unattached)
  }

  /// Bounding box of the whole canvas.
  pub fn extent(&self) -> Option<Rect> {
    Rect::union_all(self.nodes.iter().map(|n| &n.bounds))
  }
}

/// Lay out the hierarchy.
pub fn layout(registry: &FlowRegistry, config: &LayoutConfig) -> Layout {
  let mut nodes = Vec::with_capacity(registry.len());
  let mut cursor_y = 0;

  for main in registry.mains() {
    let children = registry.children_of(&main.id);

    // Leaf pass: child boxes relative to the content origin.
    let slots = grid(children.len(), config);

    // Aggregate pass: container size from the children's union.
    let size = container_size(&slots, config);

    let anchor = Rect::new(0, cursor_y, size.0, size.1);
    nodes.push(placed(main, Placement::Container, anchor));

    let content_x = anchor.x + config.padding;
    let content_y = anchor.y + config.header_height + config.padding;
    for (child, slot) in children.iter().zip(&slots) {
      nodes.push(placed(
        child,
        Placement::Nested {
          container_id: main.id.clone(),
        },
        slot.translate(content_x, content_y),
      ));
    }

    cursor_y = anchor.bottom() + config.gap;
  }

  let unattached = registry.unattached();
  let slots = grid(unattached.len(), config);
  for (node, slot) in unattached.iter().zip(&slots) {
    nodes.push(placed(node, Placement::Unattached, slot.translate(0, cursor_y)));
  }

  Layout { nodes }
}

fn placed(node: &FlowNode, placement: Placement, bounds: Rect) -> PlacedNode {
  PlacedNode {
    id: node.id.clone(),
    name: node.name.clone(),
    flow_type: node.flow_type,
    placement,
    bounds,
  }
}

/// Row-major grid of `count` node boxes starting at the origin.
fn grid(count: usize, config: &LayoutConfig) -> Vec<Rect> {
  let columns = config.columns.max(1) as usize;
  (0..count)
    .map(|i| {
      let col = (i % columns) as u32;
      let row = (i / columns) as u32;
      Rect::new(
        col * (config.node_width + config.gap),
        row * (config.node_height + config.gap),
        config.node_width,
        config.node_height,
      )
    })
    .collect()
}

/// Container (width, height) enclosing the given child slots.
fn container_size(slots: &[Rect], config: &LayoutConfig) -> (u32, u32) {
  let content = Rect::union_all(slots).unwrap_or(Rect::new(0, 0, 0, 0));
  let width = content.right() + 2 * config.padding;
  let height = config.header_height + content.bottom() + 2 * config.padding;
  (
    width.max(config.min_container_width),
    height.max(config.min_container_height),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowdeck_client::RawFlow;
  use flowdeck_registry::normalize;
  use serde_json::json;

  fn raw(id: &str, name: &str, labels: serde_json::Value) -> RawFlow {
    RawFlow {
      id: id.to_string(),
      name: name.to_string(),
      tags: vec![],
      labels: serde_json::from_value(labels).unwrap(),
      created: None,
      updated: None,
    }
  }

  fn feature(id: &str, name: &str, parent: &str) -> RawFlow {
    raw(
      id,
      name,
      json!({ "flow_type": "feature", "parent_flow": parent }),
    )
  }

  fn etl(main_name: &str) -> Vec<RawFlow> {
    vec![
      // Input order deliberately differs from name order.
      feature("f-convert", "data-conversion-flow", "dataset-etl-flow"),
      raw("f-main", main_name, json!({ "flow_type": "main" })),
      feature("f-collect", "data-collection-flow", "dataset-etl-flow"),
    ]
  }

  #[test]
  fn test_container_encloses_exactly_two_children() {
    let config = LayoutConfig::default();
    let layout = layout(&normalize(&etl("dataset-etl-flow")), &config);

    let containers: Vec<_> = layout.containers().collect();
    assert_eq!(containers.len(), 1);
    let container = containers[0];

    let children: Vec<_> = layout.nested_in("f-main").collect();
    assert_eq!(children.len(), 2);
    for child in &children {
      assert!(container.bounds.contains(&child.bounds));
    }
    assert!(!children[0].bounds.intersects(&children[1].bounds));

    // Two boxes side by side plus padding on both sides.
    assert_eq!(
      container.bounds.width,
      2 * config.node_width + config.gap + 2 * config.padding
    );
    assert_eq!(
      container.bounds.height,
      config.header_height + config.node_height + 2 * config.padding
    );
  }

  #[test]
  fn test_children_ordered_by_name_not_input() {
    let layout = layout(&normalize(&etl("dataset-etl-flow")), &LayoutConfig::default());
    let names: Vec<&str> = layout.nested_in("f-main").map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["data-collection-flow", "data-conversion-flow"]);

    let collect = layout.get("f-collect").unwrap();
    let convert = layout.get("f-convert").unwrap();
    assert!(collect.bounds.x < convert.bounds.x);
  }

  #[test]
  fn test_renamed_main_leaves_children_unattached() {
    let layout = layout(&normalize(&etl("dataset-etl-v2")), &LayoutConfig::default());

    let container = layout.get("f-main").unwrap();
    assert_eq!(layout.nested_in("f-main").count(), 0);
    assert_eq!(layout.unattached().count(), 2);
    for node in layout.unattached() {
      assert!(!container.bounds.intersects(&node.bounds));
      assert!(node.bounds.y >= container.bounds.bottom());
    }
  }

  #[test]
  fn test_layout_is_idempotent() {
    let registry = normalize(&etl("dataset-etl-flow"));
    let config = LayoutConfig::default();
    assert_eq!(layout(&registry, &config), layout(&registry, &config));
  }

  #[test]
  fn test_containers_never_overlap_and_wrap_rows() {
    let mut flows = vec![
      raw("m-a", "alpha", json!({ "flow_type": "main" })),
      raw("m-b", "beta", json!({ "flow_type": "main" })),
    ];
    for i in 0..5 {
      flows.push(feature(&format!("a-{i}"), &format!("alpha-child-{i}"), "alpha"));
    }
    flows.push(feature("b-0", "beta-child", "beta"));

    let config = LayoutConfig {
      columns: 2,
      ..LayoutConfig::default()
    };
    let layout = layout(&normalize(&flows), &config);

    let alpha = layout.get("m-a").unwrap();
    let beta = layout.get("m-b").unwrap();
    assert!(!alpha.bounds.intersects(&beta.bounds));

    // Five children in two columns need three rows.
    assert_eq!(
      alpha.bounds.height,
      config.header_height + 3 * config.node_height + 2 * config.gap + 2 * config.padding
    );

    let children: Vec<_> = layout.nested_in("m-a").collect();
    for (i, a) in children.iter().enumerate() {
      assert!(alpha.bounds.contains(&a.bounds));
      for b in &children[i + 1..] {
        assert!(!a.bounds.intersects(&b.bounds));
      }
    }
  }

  #[test]
  fn test_container_anchor_stable_when_it_grows() {
    let config = LayoutConfig::default();
    let mut flows = etl("dataset-etl-flow");
    let before = layout(&normalize(&flows), &config);

    flows.push(feature("f-clean", "data-cleaning-flow", "dataset-etl-flow"));
    flows.push(feature("f-encrypt", "data-encryption-flow", "dataset-etl-flow"));
    let after = layout(&normalize(&flows), &config);

    let b = before.get("f-main").unwrap().bounds;
    let a = after.get("f-main").unwrap().bounds;
    assert_eq!((a.x, a.y), (b.x, b.y));
    assert!(a.width >= b.width && a.height > b.height);
  }

  #[test]
  fn test_empty_main_gets_minimum_size() {
    let config = LayoutConfig::default();
    let layout = layout(
      &normalize(&[raw("m", "lonely", json!({ "flow_type": "main" }))]),
      &config,
    );
    let bounds = layout.get("m").unwrap().bounds;
    assert_eq!(bounds.width, config.min_container_width);
    assert_eq!(bounds.height, config.min_container_height);
  }
}
