//! # metastore-store
//!
//! Transactional catalog storage for the metastore.
//!
//! The catalog is a four-level hierarchy (catalog, database, table,
//! partition) kept in a single embedded redb file. Every mutation runs in
//! exactly one write transaction; reads run against a consistent snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        MetaStore                         │
//! │                                                          │
//! │   database.rs      table.rs       partition.rs           │
//! │        │               │               │                 │
//! │        └───────────────┼───────────────┘                 │
//! │                        ▼                                 │
//! │   bucket.rs  (path of regions, name/id resolution)       │
//! │                        │                                 │
//! │   codec.rs ◄───────────┼──────────► projection.rs        │
//! │                        ▼                                 │
//! │   txn.rs     (ReadTx / WriteTx over two redb tables)     │
//! │                        │                                 │
//! │                        ▼                                 │
//! │                   redb::Database                         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use metastore_proto::{Database, Id};
//! use metastore_store::{ListDatabasesOptions, MetaStore, VecSink};
//!
//! let store = MetaStore::open_memory()?;
//! store.create_database("hive", Database {
//!     id: Some(Id::named("sales")),
//!     ..Default::default()
//! })?;
//!
//! let mut sink = VecSink::new();
//! store.list_databases("hive", &ListDatabasesOptions::default(), &mut sink)?;
//! assert_eq!(sink.into_inner().len(), 1);
//! # Ok::<(), metastore_common::MetastoreError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bucket;
mod codec;
mod database;
mod partition;
mod projection;
pub mod sink;
mod store;
mod table;
mod txn;
mod validate;

pub use bucket::BucketPath;
pub use database::ListDatabasesOptions;
pub use partition::ListPartitionsOptions;
pub use projection::{Field, Projectable};
pub use sink::{RecordSink, VecSink};
pub use store::{MetaStore, StoreConfig};
pub use validate::partition_key;
