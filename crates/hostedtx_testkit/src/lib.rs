//! # hostedtx testkit
//!
//! Test utilities for hostedtx.
//!
//! This crate provides:
//! - Fixtures: test commands, outcomes, and coordinator builders
//! - Property-based generators and a reference model of the per-id states
//! - Multi-threaded stress harnesses for the masquerade protocol
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hostedtx_testkit::prelude::*;
//!
//! #[test]
//! fn commands_run_serially() {
//!     let coordinator = test_coordinator();
//!     let result = stress_contended_masquerade(coordinator, &StressConfig::default());
//!     assert_eq!(result.failed_ops, 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
