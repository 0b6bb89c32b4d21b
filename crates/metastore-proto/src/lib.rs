//! Metastore gRPC Protocol Definitions
//!
//! This crate provides the gRPC service definitions and generated code
//! for client-server communication with the metastore.
//!
//! # Overview
//!
//! The protocol defines:
//! - Database create/get/list/alter/drop
//! - Table create/get/list/drop
//! - Partition add (single and client-streamed), get, list, drop (single,
//!   batch and client-streamed)
//! - The `RequestStatus` envelope carried by unary responses
//!
//! # Example
//!
//! ```ignore
//! use metastore_proto::metastore_client::MetastoreClient;
//! use metastore_proto::{GetDatabaseRequest, Id};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = MetastoreClient::connect("http://localhost:10010").await?;
//!
//!     let request = GetDatabaseRequest {
//!         catalog: "hive".to_string(),
//!         id: Some(Id::named("sales")),
//!     };
//!
//!     let response = client.get_database(request).await?;
//!     println!("Database: {:?}", response.into_inner().database);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

/// Generated protobuf types and gRPC service definitions.
#[allow(missing_docs)]
#[allow(clippy::derive_partial_eq_without_eq)]
pub mod proto {
    tonic::include_proto!("metastore");
}

// Re-export commonly used types
pub use proto::*;

// Re-export server and client types
pub use proto::metastore_client::MetastoreClient;
pub use proto::metastore_server::{Metastore, MetastoreServer};

impl Id {
    /// Creates an identity that refers to an entity by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
        }
    }

    /// Creates an identity that refers to an entity by generated id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            id: id.into(),
        }
    }

    /// Returns true if neither the name nor the id is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.id.is_empty()
    }
}

impl RequestStatus {
    /// A successful status.
    pub fn ok() -> Self {
        Self {
            status: request_status::Status::Ok as i32,
            error: String::new(),
            code: ErrorCode::None as i32,
        }
    }

    /// A failed status with a message and error code.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: request_status::Status::Error as i32,
            error: message.into(),
            code: code as i32,
        }
    }

    /// Returns true if the status is OK.
    pub fn is_ok(&self) -> bool {
        self.status == request_status::Status::Ok as i32
    }
}

impl PartitionValues {
    /// Wraps a value tuple.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}
