//! cadloop Artifact System
//!
//! Assembled CAD scripts with content fingerprints.
//!
//! # Core Concepts
//!
//! - [`Artifact`]: assembled script text, fingerprint and part order
//! - [`ContentHash`]: 32-byte Blake3 hash used as the fingerprint
//!
//! # Example
//!
//! ```rust
//! use cadloop_artifact::{Artifact, ContentHash};
//!
//! let artifact = Artifact::new("compound = Compound(children=[])", vec!["base".into()]);
//! assert_eq!(artifact.fingerprint(), ContentHash::of_text(artifact.text()));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod hash;

pub use artifact::Artifact;
pub use hash::{ContentHash, HashError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
