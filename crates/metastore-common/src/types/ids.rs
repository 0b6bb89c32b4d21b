//! Identifier generation.
//!
//! Databases, tables and partitions are identified by ULIDs: 128-bit values
//! (48-bit millisecond timestamp + 80 random bits) rendered as 26 characters
//! of Crockford base32. The text form sorts in creation order.

use std::sync::OnceLock;

use parking_lot::Mutex;
use ulid::{Generator, Ulid};

/// Length of every generated identifier, in characters.
pub const IDENTIFIER_LEN: usize = 26;

fn generator() -> &'static Mutex<Generator> {
    static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();
    GENERATOR.get_or_init(|| Mutex::new(Generator::new()))
}

/// Returns a new unique, time-ordered identifier.
///
/// Identifiers produced within the same millisecond are strictly increasing.
/// If the random component would overflow inside one millisecond a fresh
/// random ULID is returned instead.
///
/// # Example
///
/// ```rust
/// use metastore_common::types::{new_identifier, IDENTIFIER_LEN};
///
/// let a = new_identifier();
/// let b = new_identifier();
/// assert_eq!(a.len(), IDENTIFIER_LEN);
/// assert!(a < b);
/// ```
#[must_use]
pub fn new_identifier() -> String {
    let ulid = generator().lock().generate().unwrap_or_else(|_| Ulid::new());
    ulid.to_string()
}
