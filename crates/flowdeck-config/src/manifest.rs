//! Bulk registration manifest.
//!
//! A manifest lists one main flow, its compatibility subflows and its feature
//! flows, together with the source file and entrypoint of each:
//!
//! ```json
//! {
//!   "tags": ["dataset-etl"],
//!   "main": {
//!     "name": "dataset-etl-flow",
//!     "entrypoint": "docs.flows.main:dataset_etl_flow",
//!     "file_path": "docs/flows/main.py",
//!     "flow_type": "main"
//!   },
//!   "feature_flows": [
//!     {
//!       "name": "data-collection-flow",
//!       "entrypoint": "docs.flows.feature_flows.data_collection_flow:data_collection_flow",
//!       "file_path": "docs/flows/feature_flows/data_collection_flow.py",
//!       "flow_type": "feature",
//!       "parent_flow": "dataset-etl-flow"
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::FlowType;
use crate::error::ConfigError;
use crate::{LABEL_DESCRIPTION, LABEL_ENTRYPOINT, LABEL_FLOW_TYPE, LABEL_PARENT_FLOW};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowManifest {
  /// Tags applied to every flow in the manifest.
  #[serde(default)]
  pub tags: Vec<String>,
  pub main: ManifestFlow,
  #[serde(default)]
  pub compatibility: Vec<ManifestFlow>,
  #[serde(default)]
  pub feature_flows: Vec<ManifestFlow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFlow {
  pub name: String,
  pub entrypoint: String,
  /// Source file, relative to the manifest root.
  pub file_path: PathBuf,
  pub flow_type: FlowType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent_flow: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
}

/// The body the engine expects when a flow is created or batch-registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRegistration {
  pub name: String,
  #[serde(default)]
  pub tags: Vec<String>,
  /// Opaque labels. Unknown keys are carried through untouched.
  #[serde(default)]
  pub labels: Map<String, Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,
}

/// A consistency problem found in a manifest.
///
/// Issues are reported, not fatal: the engine accepts the flows regardless and
/// the console renders anything dangling as unattached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestIssue {
  DuplicateName(String),
  UnknownParent { flow: String, parent: String },
  MissingParent(String),
  MainHasParent(String),
}

impl std::fmt::Display for ManifestIssue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ManifestIssue::DuplicateName(name) => write!(f, "flow name '{}' is listed twice", name),
      ManifestIssue::UnknownParent { flow, parent } => {
        write!(f, "flow '{}' references unknown main flow '{}'", flow, parent)
      }
      ManifestIssue::MissingParent(name) => write!(f, "child flow '{}' has no parent_flow", name),
      ManifestIssue::MainHasParent(name) => {
        write!(f, "main flow '{}' must not declare parent_flow", name)
      }
    }
  }
}

impl FlowManifest {
  /// Load a manifest from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// All flows in registration order: main first, then compatibility, then features.
  pub fn flows(&self) -> impl Iterator<Item = &ManifestFlow> {
    std::iter::once(&self.main)
      .chain(self.compatibility.iter())
      .chain(self.feature_flows.iter())
  }

  pub fn validate(&self) -> Vec<ManifestIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    let mains: HashSet<&str> = self
      .flows()
      .filter(|f| f.flow_type == FlowType::Main)
      .map(|f| f.name.as_str())
      .collect();

    for flow in self.flows() {
      if !seen.insert(flow.name.as_str()) {
        issues.push(ManifestIssue::DuplicateName(flow.name.clone()));
      }

      match (flow.flow_type, &flow.parent_flow) {
        (FlowType::Main, Some(_)) => issues.push(ManifestIssue::MainHasParent(flow.name.clone())),
        (FlowType::Main, None) => {}
        (_, None) => issues.push(ManifestIssue::MissingParent(flow.name.clone())),
        (_, Some(parent)) if !mains.contains(parent.as_str()) => {
          issues.push(ManifestIssue::UnknownParent {
            flow: flow.name.clone(),
            parent: parent.clone(),
          })
        }
        _ => {}
      }
    }

    issues
  }

  /// Build registration payloads, reading each flow's code relative to `root`.
  pub fn registrations(&self, root: &Path) -> Result<Vec<FlowRegistration>, ConfigError> {
    self
      .flows()
      .map(|flow| {
        let path = root.join(&flow.file_path);
        let code = std::fs::read_to_string(&path)
          .map_err(|source| ConfigError::Read { path, source })?;
        Ok(self.registration_for(flow, code))
      })
      .collect()
  }

  fn registration_for(&self, flow: &ManifestFlow, code: String) -> FlowRegistration {
    let mut labels = Map::new();
    labels.insert(
      LABEL_FLOW_TYPE.to_string(),
      Value::String(flow.flow_type.as_str().to_string()),
    );
    labels.insert(
      LABEL_ENTRYPOINT.to_string(),
      Value::String(flow.entrypoint.clone()),
    );
    labels.insert(
      LABEL_DESCRIPTION.to_string(),
      Value::String(flow.description.clone().unwrap_or_default()),
    );
    if let Some(parent) = &flow.parent_flow {
      labels.insert(LABEL_PARENT_FLOW.to_string(), Value::String(parent.clone()));
    }

    let mut tags = self.tags.clone();
    for tag in &flow.tags {
      if !tags.contains(tag) {
        tags.push(tag.clone());
      }
    }

    FlowRegistration {
      name: flow.name.clone(),
      tags,
      labels,
      code: Some(code),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn flow(name: &str, flow_type: FlowType, parent: Option<&str>) -> ManifestFlow {
    ManifestFlow {
      name: name.to_string(),
      entrypoint: format!("flows.{}:run", name.replace('-', "_")),
      file_path: PathBuf::from(format!("flows/{}.py", name.replace('-', "_"))),
      flow_type,
      parent_flow: parent.map(|p| p.to_string()),
      description: None,
      tags: vec![],
    }
  }

  fn etl_manifest() -> FlowManifest {
    FlowManifest {
      tags: vec!["dataset-etl".to_string()],
      main: flow("dataset-etl-flow", FlowType::Main, None),
      compatibility: vec![flow(
        "rustfs-list-files",
        FlowType::Subflow,
        Some("dataset-etl-flow"),
      )],
      feature_flows: vec![
        flow("data-collection-flow", FlowType::Feature, Some("dataset-etl-flow")),
        flow("data-conversion-flow", FlowType::Feature, Some("dataset-etl-flow")),
      ],
    }
  }

  #[test]
  fn test_valid_manifest_has_no_issues() {
    assert!(etl_manifest().validate().is_empty());
  }

  #[test]
  fn test_validate_reports_dangling_parent() {
    let mut manifest = etl_manifest();
    manifest.feature_flows[0].parent_flow = Some("etl-v2".to_string());

    assert_eq!(
      manifest.validate(),
      vec![ManifestIssue::UnknownParent {
        flow: "data-collection-flow".to_string(),
        parent: "etl-v2".to_string(),
      }]
    );
  }

  #[test]
  fn test_validate_reports_duplicates_and_missing_parent() {
    let mut manifest = etl_manifest();
    manifest
      .feature_flows
      .push(flow("data-collection-flow", FlowType::Feature, None));

    let issues = manifest.validate();
    assert!(issues.contains(&ManifestIssue::DuplicateName(
      "data-collection-flow".to_string()
    )));
    assert!(issues.contains(&ManifestIssue::MissingParent(
      "data-collection-flow".to_string()
    )));
  }

  #[test]
  fn test_registrations_read_code_and_build_labels() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = etl_manifest();
    for f in manifest.flows() {
      let path = dir.path().join(&f.file_path);
      std::fs::create_dir_all(path.parent().unwrap()).unwrap();
      std::fs::write(&path, format!("# {}\n", f.name)).unwrap();
    }

    let regs = manifest.registrations(dir.path()).unwrap();
    assert_eq!(regs.len(), 4);

    let main = &regs[0];
    assert_eq!(main.name, "dataset-etl-flow");
    assert_eq!(main.labels[LABEL_FLOW_TYPE], "main");
    assert!(!main.labels.contains_key(LABEL_PARENT_FLOW));
    assert_eq!(main.tags, vec!["dataset-etl".to_string()]);
    assert_eq!(main.code.as_deref(), Some("# dataset-etl-flow\n"));

    let subflow = &regs[1];
    assert_eq!(subflow.labels[LABEL_FLOW_TYPE], "subflow");
    assert_eq!(subflow.labels[LABEL_PARENT_FLOW], "dataset-etl-flow");
  }

  #[test]
  fn test_registrations_fail_on_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = etl_manifest().registrations(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
  }
}
