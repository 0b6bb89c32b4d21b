//! # metastore-server
//!
//! Network server for the metastore.
//!
//! This crate provides:
//!
//! - **gRPC Service**: the `metastore.Metastore` service over a shared
//!   [`MetaStore`](metastore_store::MetaStore), with the status envelope
//!   for unary calls and bounded streaming for list calls.
//!
//! - **Configuration**: TOML-backed server settings.
//!
//! - **`metastored`**: the server daemon.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use metastore_server::grpc::GrpcServer;
//! use metastore_store::MetaStore;
//!
//! let store = Arc::new(MetaStore::open_path("hms2.db")?);
//! GrpcServer::new(store, "0.0.0.0:10010".parse()?).serve().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// gRPC service implementation.
pub mod grpc;

/// Server configuration.
pub mod config;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use grpc::{GrpcServer, MetastoreService};
