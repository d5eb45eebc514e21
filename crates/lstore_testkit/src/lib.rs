//! # lstore Testkit
//!
//! Test utilities for the lstore journal.
//!
//! This crate provides:
//! - Store fixtures over a temporary directory or the in-memory file system
//! - Helpers that take a journal file from a pool and stamp it
//! - Property-based generators for journal operations, with a model of the
//!   records they leave live
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lstore_testkit::prelude::*;
//!
//! #[test]
//! fn replay() {
//!     let store = TestStore::memory();
//!     let pool = store.add_pool(1, 64, 2);
//!     let writer = store.new_journal(&pool, "orders", 1);
//!     // ... write records, then replay with Recovery
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
}

pub use fixtures::*;
pub use generators::*;
