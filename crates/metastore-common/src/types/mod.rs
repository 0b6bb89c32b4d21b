//! Type definitions shared across the metastore.

mod ids;

pub use ids::{new_identifier, IDENTIFIER_LEN};
