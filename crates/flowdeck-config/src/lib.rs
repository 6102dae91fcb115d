//! Flowdeck Config
//!
//! This crate contains the serializable configuration types for Flowdeck.
//! These types describe how the console reaches the orchestration engine,
//! how runs are observed, and which flows get registered in bulk.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `--config=config.json`)
//! - Environment overrides (`FLOWDECK_ENGINE_URL` and friends)
//!
//! The registration manifest describes a main flow together with its feature
//! flows and compatibility subflows, and is turned into engine registration
//! payloads by [`FlowManifest::registrations`].

mod console;
mod enums;
mod error;
mod manifest;

pub use console::{
  BundleConfig, ConsoleConfig, EngineAuth, EngineConfig, LayoutConfig, LogsConfig, PollingConfig,
  StoreConfig,
};
pub use enums::{FlowType, RunMode};
pub use error::ConfigError;
pub use manifest::{FlowManifest, FlowRegistration, ManifestFlow, ManifestIssue};

/// Label key holding the flow tier (`main`, `feature`, `subflow`).
pub const LABEL_FLOW_TYPE: &str = "flow_type";

/// Label key holding the name of the parent main flow.
pub const LABEL_PARENT_FLOW: &str = "parent_flow";

/// Label key holding the engine entrypoint (`module.path:symbol`).
pub const LABEL_ENTRYPOINT: &str = "entrypoint";

/// Label key holding a free-form description.
pub const LABEL_DESCRIPTION: &str = "description";
