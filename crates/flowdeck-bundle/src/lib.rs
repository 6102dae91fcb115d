//! Flowdeck Bundle
//!
//! A flow's code is a bundle of source files kept under one object-store
//! prefix, while the engine only records the flow's entrypoint and that
//! prefix. This crate joins the two views.
//!
//! - [`BundleResolver::load_bundle`] reads every file under the prefix and
//!   picks the entry module named by the entrypoint.
//! - [`BundleResolver::save_bundle`] writes a bundle all-or-nothing.
//! - [`BundleResolver::publish_bundle`] saves and then points the engine at it.

mod bundle;
mod entrypoint;
mod error;
mod resolver;

pub use bundle::{CodeBundle, SaveReport, validate_files};
pub use entrypoint::module_path;
pub use error::BundleError;
pub use resolver::{BundleResolver, Resolver};
