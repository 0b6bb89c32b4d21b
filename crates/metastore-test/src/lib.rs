//! # metastore-test
//!
//! End-to-end tests for the metastore.
//!
//! The helpers here start a [`GrpcServer`] over a fresh in-memory catalog
//! on a unique local port and hand back a connected client.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tonic::transport::Channel;

use metastore_proto::{
    AddPartitionRequest, CreateDatabaseRequest, CreateTableRequest, Database, FieldSchema, Id,
    MetastoreClient, Partition, StorageDescriptor, Table,
};
use metastore_server::grpc::GrpcServer;
use metastore_store::{MetaStore, StoreConfig};

/// Catalog used by the helpers.
pub const CATALOG: &str = "hive";

/// Port counter for test isolation.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(51200);

/// Returns a port no other test in this process uses.
pub fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A running server and a client connected to it.
pub struct TestServer {
    /// Connected client.
    pub client: MetastoreClient<Channel>,
    /// The catalog behind the server.
    pub store: Arc<MetaStore>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Starts a server over an in-memory catalog.
    ///
    /// Returns `None` when no connection could be made, typically because
    /// the port is taken.
    pub async fn start() -> Option<Self> {
        Self::start_with(StoreConfig::in_memory()).await
    }

    /// Starts a server over a catalog opened with `config`.
    pub async fn start_with(config: StoreConfig) -> Option<Self> {
        let store = Arc::new(MetaStore::open(config).ok()?);
        let addr: SocketAddr = format!("127.0.0.1:{}", next_port()).parse().ok()?;

        let server = GrpcServer::new(Arc::clone(&store), addr).with_stream_buffer(4);
        let handle = tokio::spawn(async move {
            let _ = server.serve().await;
        });

        let endpoint = format!("http://{addr}");
        for _ in 0..50 {
            match MetastoreClient::connect(endpoint.clone()).await {
                Ok(client) => {
                    return Some(Self {
                        client,
                        store,
                        handle,
                    })
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        eprintln!("Could not connect to {endpoint}");
        handle.abort();
        None
    }

    /// Creates a database with the given name and location.
    pub async fn create_database(&mut self, name: &str, location: &str) -> Database {
        let resp = self
            .client
            .create_database(CreateDatabaseRequest {
                catalog: CATALOG.to_string(),
                database: Some(Database {
                    id: Some(Id::named(name)),
                    location: location.to_string(),
                    ..Default::default()
                }),
            })
            .await
            .expect("CreateDatabase failed")
            .into_inner();
        assert!(
            resp.status.as_ref().is_some_and(|s| s.is_ok()),
            "CreateDatabase {name}: {:?}",
            resp.status
        );
        resp.database.expect("CreateDatabase returned no database")
    }

    /// Creates a table partitioned by `keys`, all typed `string`.
    pub async fn create_table(&mut self, db: &str, name: &str, keys: &[&str]) -> Table {
        let resp = self
            .client
            .create_table(CreateTableRequest {
                catalog: CATALOG.to_string(),
                db_id: Some(Id::named(db)),
                table: Some(partitioned_table(name, keys)),
            })
            .await
            .expect("CreateTable failed")
            .into_inner();
        assert!(
            resp.status.as_ref().is_some_and(|s| s.is_ok()),
            "CreateTable {db}.{name}: {:?}",
            resp.status
        );
        resp.table.expect("CreateTable returned no table")
    }

    /// Adds a partition and returns its sequence number.
    pub async fn add_partition(&mut self, db: &str, table: &str, values: &[&str]) -> u64 {
        let resp = self
            .client
            .add_partition(add_request(db, table, values, 0))
            .await
            .expect("AddPartition failed")
            .into_inner();
        assert!(
            resp.status.as_ref().is_some_and(|s| s.is_ok()),
            "AddPartition {values:?}: {:?}",
            resp.status
        );
        resp.seq_id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A table partitioned by string keys, stored under `/warehouse/<name>`.
pub fn partitioned_table(name: &str, keys: &[&str]) -> Table {
    Table {
        id: Some(Id::named(name)),
        partition_keys: keys
            .iter()
            .map(|k| FieldSchema {
                name: k.to_string(),
                r#type: "string".to_string(),
                comment: String::new(),
            })
            .collect(),
        sd: Some(StorageDescriptor {
            location: format!("/warehouse/{name}"),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// An AddPartition request for `values` with a location derived from them.
pub fn add_request(db: &str, table: &str, values: &[&str], sequence: u64) -> AddPartitionRequest {
    AddPartitionRequest {
        catalog: CATALOG.to_string(),
        db_id: Some(Id::named(db)),
        table_id: Some(Id::named(table)),
        partition: Some(Partition {
            values: strings(values),
            location: format!("/warehouse/{table}/{}", values.join("/")),
            ..Default::default()
        }),
        sequence,
    }
}

/// Converts string slices to owned strings.
pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
