//! Flowdeck Layout
//!
//! Computes positions for the flow hierarchy graph. Main flows render as
//! containers; their attached feature flows and subflows render nested inside.
//!
//! ```text
//! (0,0)
//! ┌─ dataset-etl-flow ───────────────────────────┐
//! │ header                                       │
//! │  ┌──────────────┐  ┌──────────────┐          │
//! │  │ data-collect │  │ data-convert │  ...     │
//! │  └──────────────┘  └──────────────┘          │
//! └──────────────────────────────────────────────┘
//! ┌─ next main flow ─┐
//! └──────────────────┘
//! ┌──────────────┐  unattached band (orphans, never nested)
//! └──────────────┘
//! ```
//!
//! Layout runs in two passes. The leaf pass places each container's children
//! on a grid relative to the container's content origin. The aggregate pass
//! derives every container's size from its children's boxes plus padding.
//! Containers are anchored at their top-left corner and only grow right and
//! down. Ordering is by name (then id), so the same input always yields the
//! same layout.

mod geometry;
mod hierarchy;

pub use geometry::Rect;
pub use hierarchy::{Layout, PlacedNode, Placement, layout};
