//! cadloop Part Graph
//!
//! Tracks which parts depend on which, which need regeneration, and which
//! a human has locked.
//!
//! # Example
//!
//! ```rust
//! use cadloop_graph::PartDependencyGraph;
//! use cadloop_plan::PlanItem;
//!
//! let mut graph = PartDependencyGraph::from_plan(&[
//!     PlanItem::new("base"),
//!     PlanItem::new("lid").depends_on("base"),
//! ]);
//! assert_eq!(graph.topological_order(), vec!["base", "lid"]);
//!
//! for name in graph.affected_by("base") {
//!     graph.mark_dirty(&name);
//! }
//! assert_eq!(graph.dirty_parts(), vec!["lid"]);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod graph;
mod issue;
mod part;

pub use graph::{GraphSnapshot, PartDependencyGraph, PartSnapshot};
pub use issue::GraphIssue;
pub use part::{safe_identifier, Part};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
