//! Metastore error types.
//!
//! Every catalog operation reports failure through [`MetastoreError`]. The
//! variants map one-to-one onto the error kinds surfaced to RPC callers.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// A required request field is missing or empty.
    InvalidArgument = 0x0001,
    /// A catalog, database, table, partition or region does not exist.
    NotFound = 0x0002,
    /// A name or partition value tuple is already taken.
    AlreadyExists = 0x0003,
    /// An index points at data that cannot be read back.
    Corruption = 0x0100,
    /// Storage engine, transaction or encoding failure.
    Internal = 0x0200,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "Request",
            0x01 => "Data",
            0x02 => "Storage",
            _ => "Unknown",
        }
    }

    /// Returns true for errors caused by the caller rather than the server.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument | Self::NotFound | Self::AlreadyExists
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for the metastore.
///
/// # Example
///
/// ```rust
/// use metastore_common::error::{ErrorCode, MetastoreError, MetastoreResult};
///
/// fn lookup(name: &str) -> MetastoreResult<()> {
///     Err(MetastoreError::not_found(format!("database {name} doesn't exist")))
/// }
///
/// assert_eq!(lookup("sales").unwrap_err().code(), ErrorCode::NotFound);
/// ```
#[derive(Debug, Error)]
pub enum MetastoreError {
    /// A required field is missing or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Referenced entity or region does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Name or value tuple collision on create.
    #[error("{0}")]
    AlreadyExists(String),

    /// An index entry exists but its record cannot be decoded.
    #[error("corrupt catalog: {0}")]
    Corruption(String),

    /// Encoding or other internal failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// Storage engine failure.
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),
}

impl MetastoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates an already exists error.
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Creates a corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::Corruption(_) => ErrorCode::Corruption,
            Self::Internal(_) | Self::Storage(_) => ErrorCode::Internal,
        }
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

macro_rules! impl_from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MetastoreError {
                fn from(e: $ty) -> Self {
                    Self::Storage(e.into())
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl From<prost::EncodeError> for MetastoreError {
    fn from(e: prost::EncodeError) -> Self {
        Self::Internal(format!("failed to encode record: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            MetastoreError::invalid_argument("x").code(),
            ErrorCode::InvalidArgument
        );
        assert_eq!(MetastoreError::not_found("x").code(), ErrorCode::NotFound);
        assert_eq!(
            MetastoreError::already_exists("x").code(),
            ErrorCode::AlreadyExists
        );
        assert_eq!(MetastoreError::corruption("x").code(), ErrorCode::Corruption);
        assert_eq!(MetastoreError::internal("x").code(), ErrorCode::Internal);
    }

    #[test]
    fn test_error_display() {
        let err = MetastoreError::not_found("database sales doesn't exist");
        assert_eq!(err.to_string(), "database sales doesn't exist");

        let err = MetastoreError::corruption("missing NAME map");
        assert!(err.to_string().contains("corrupt catalog"));

        let err = MetastoreError::invalid_argument("missing catalog");
        assert_eq!(err.to_string(), "invalid argument: missing catalog");
    }

    #[test]
    fn test_code_category() {
        assert_eq!(ErrorCode::NotFound.category(), "Request");
        assert_eq!(ErrorCode::Corruption.category(), "Data");
        assert_eq!(ErrorCode::Internal.category(), "Storage");
        assert!(ErrorCode::AlreadyExists.is_client_error());
        assert!(!ErrorCode::Internal.is_client_error());
    }

    #[test]
    fn test_from_storage_error() {
        let err: MetastoreError = redb::StorageError::Corrupted("bad page".into()).into();
        assert!(matches!(err, MetastoreError::Storage(_)));
        assert_eq!(err.code(), ErrorCode::Internal);
    }
}
