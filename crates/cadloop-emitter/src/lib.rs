//! cadloop Code Emitter
//!
//! Turns a part graph into one build123d script.
//!
//! # Example
//!
//! ```rust
//! use cadloop_emitter::{CodeEmitter, EmitScope};
//! use cadloop_graph::PartDependencyGraph;
//! use cadloop_plan::PlanItem;
//!
//! let mut graph = PartDependencyGraph::from_plan(&[PlanItem::new("base")]);
//! let emitter = CodeEmitter::new();
//! let template = emitter.emit_part(graph.get("base").expect("registered"));
//! emitter.update_part_code(&mut graph, "base", template);
//!
//! let script = emitter.emit(&graph, &EmitScope::All);
//! assert!(script.contains("# === base ==="));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod emitter;
mod sanitize;
mod templates;

pub use emitter::{CodeEmitter, EmitScope};
pub use sanitize::{format_code, strip_code_fences};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
