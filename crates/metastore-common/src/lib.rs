//! # metastore-common
//!
//! Common types, errors, and constants for the metastore.
//!
//! This crate provides the foundational pieces shared by every metastore
//! component:
//!
//! - **Types**: Identifier generation (ULID based)
//! - **Errors**: Unified error handling with `MetastoreError`
//! - **Constants**: Region names, key separator and server defaults
//!
//! ## Example
//!
//! ```rust
//! use metastore_common::error::{MetastoreError, MetastoreResult};
//! use metastore_common::types::new_identifier;
//!
//! fn example(name: &str) -> MetastoreResult<String> {
//!     if name.is_empty() {
//!         return Err(MetastoreError::invalid_argument("missing database name"));
//!     }
//!     Ok(new_identifier())
//! }
//! # assert!(example("sales").is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{ErrorCode, MetastoreError, MetastoreResult};
pub use types::new_identifier;
