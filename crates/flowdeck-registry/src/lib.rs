//! Flowdeck Registry
//!
//! This crate turns the flat list of flow records returned by the engine into
//! a typed hierarchy: main flows at the top, feature flows and compatibility
//! subflows attached to them.
//!
//! Key points:
//! - The tier comes from the `flow_type` label and defaults to `feature`
//! - Parents are linked by *name* through the `parent_flow` label
//! - A child whose parent cannot be found is kept and marked orphaned; it is
//!   never dropped and never re-attached by guessing
//! - The registry is read-only once built

mod node;
mod registry;

pub use flowdeck_config::FlowType;
pub use node::{FlowNode, ParentLink};
pub use registry::{FlowRegistry, normalize};
