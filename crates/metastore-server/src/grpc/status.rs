//! Mapping store errors onto the wire.
//!
//! Unary calls report failures inside their `RequestStatus` envelope,
//! except request validation, which fails the call itself. Streaming calls
//! have no envelope and always fail with a gRPC status.

use tonic::Status;

use metastore_common::error::{ErrorCode, MetastoreError};
use metastore_proto::proto::{self, RequestStatus};

/// Converts an error code to its wire form.
pub fn wire_code(code: ErrorCode) -> proto::ErrorCode {
    match code {
        ErrorCode::InvalidArgument => proto::ErrorCode::InvalidArgument,
        ErrorCode::NotFound => proto::ErrorCode::NotFound,
        ErrorCode::AlreadyExists => proto::ErrorCode::AlreadyExists,
        ErrorCode::Corruption => proto::ErrorCode::Corruption,
        ErrorCode::Internal => proto::ErrorCode::Internal,
    }
}

/// Builds the failure envelope of a unary call.
///
/// Validation errors are returned as `Err` and fail the call.
pub fn envelope(err: MetastoreError) -> Result<RequestStatus, Status> {
    match err {
        MetastoreError::InvalidArgument(msg) => Err(Status::invalid_argument(msg)),
        other => {
            if other.code().is_client_error() {
                tracing::debug!("Request failed: {}", other);
            } else {
                tracing::error!("Request failed: {}", other);
            }
            Ok(RequestStatus::error(wire_code(other.code()), other.to_string()))
        }
    }
}

/// Converts an error to a gRPC status.
pub fn to_status(err: MetastoreError) -> Status {
    match &err {
        MetastoreError::InvalidArgument(msg) => Status::invalid_argument(msg.clone()),
        MetastoreError::NotFound(msg) => Status::not_found(msg.clone()),
        MetastoreError::AlreadyExists(msg) => Status::already_exists(msg.clone()),
        MetastoreError::Corruption(_) => Status::data_loss(err.to_string()),
        MetastoreError::Internal(_) | MetastoreError::Storage(_) => Status::internal(err.to_string()),
    }
}
