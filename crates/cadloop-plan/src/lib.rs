//! cadloop Plans
//!
//! The pre-graph stage of a generation run.
//!
//! # Core Concepts
//!
//! - [`Plan`] / [`PlanItem`]: parts proposed by the planning service
//! - [`Plan::parse_response`]: tolerant extraction of a plan from service text
//! - [`PlanValidator`]: heuristic checks run before any code is generated
//!
//! # Example
//!
//! ```rust
//! use cadloop_plan::{Plan, PlanValidator};
//!
//! let plan = Plan::parse_response(r#"[{"name": "base"}, {"name": "lid", "dependencies": ["base"]}]"#)
//!     .expect("valid plan");
//! assert!(PlanValidator::new().validate(&plan.items).is_valid());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod parse;
mod types;
mod validator;

pub use parse::PlanParseError;
pub use types::{PartOperation, Placement, Plan, PlanItem, UnknownOperation};
pub use validator::{PlanIssue, PlanIssueKind, PlanValidator, ValidationReport, ValidatorConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
