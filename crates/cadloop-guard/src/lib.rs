//! cadloop Diff Guard
//!
//! Keeps human edits alive when parts are regenerated.
//!
//! # Example
//!
//! ```rust
//! use cadloop_guard::DiffGuard;
//!
//! let mut guard = DiffGuard::new();
//! guard.set_baseline("width = 10\nheight = 20\n");
//! guard.track_edit("width = 10\nheight = 35\n");
//! guard.protect_variable("height");
//!
//! let merged = guard.merge_code("# regenerated\nwidth = 12\nheight = 20\n");
//! assert_eq!(merged, "# regenerated\nwidth = 12\nheight = 35\n");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod guard;
mod params;

pub use guard::{DiffGuard, EditRecord, GuardConfig, ProtectedInfo, ProtectedRegion};
pub use params::{
    assigns, extract_parameters, format_value, is_parameter_line, parse_assignment,
    update_parameter, update_parameters,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
