//! cadloop Core
//!
//! The workflow orchestrator: plan a design as parts, generate code for each
//! part, assemble one script, render and inspect it, and retry with the
//! inspector's feedback until it passes or the iteration ceiling is reached.
//!
//! # Example
//!
//! ```rust,ignore
//! use cadloop_core::{Services, WorkflowConfig, WorkflowOrchestrator};
//!
//! let services = Services::new(planner, coder, renderer, inspector);
//! let orchestrator = WorkflowOrchestrator::new(WorkflowConfig::default(), services)?;
//!
//! let mut session = orchestrator.new_session();
//! let outcome = orchestrator.run(&mut session, "a small table").await;
//! println!("{:?} after {} iterations", outcome.termination, outcome.iterations);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod config;
mod error;
mod events;
mod history;
mod orchestrator;
mod outcome;
mod services;
mod session;
pub mod verdict;

pub use cache::RenderCache;
pub use config::WorkflowConfig;
pub use error::{ConfigError, HistoryError, PartGenerationError, ServiceError, WorkflowError};
pub use events::{EventLog, WorkflowEvent};
pub use history::{
    HistoryEntry, HistoryStore, JsonFileHistory, Role, SessionDocument, SessionId, SessionSummary,
};
pub use orchestrator::WorkflowOrchestrator;
pub use outcome::{RunOutcome, Termination, WorkflowState};
pub use services::{
    InspectionService, PartCodeService, PlanningService, RenderOutcome, RenderService, Services,
};
pub use session::WorkflowSession;
pub use verdict::{InspectionResult, Verdict, FORCED_PASS_NOTE};

pub use tokio_util::sync::CancellationToken;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
