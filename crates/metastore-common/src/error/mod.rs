//! Error handling for the metastore.
//!
//! This module provides a unified error type and result alias used
//! across all metastore components.

mod metastore;

pub use metastore::{ErrorCode, MetastoreError};

/// Result type alias for metastore operations.
pub type MetastoreResult<T> = std::result::Result<T, MetastoreError>;
