//! # Tether Testkit
//!
//! Test utilities for tether.
//!
//! This crate provides:
//! - Fixture documents shared by the engine, server and benchmark suites
//! - Property-based test generators for JSON documents, field edits and
//!   list edits
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tether_testkit::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn diff_reconciles(before in document_strategy(), after in document_strategy()) {
//!         // ...
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use proptest::prelude::*;
}

pub use fixtures::*;
pub use generators::*;
