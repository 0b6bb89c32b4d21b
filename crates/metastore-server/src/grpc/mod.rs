//! gRPC service implementation for the metastore.
//!
//! Every call runs its storage work on the blocking pool. List calls hold
//! one read transaction for the whole enumeration and feed records through
//! a bounded channel into the response stream, so a slow client slows the
//! scan down instead of growing a buffer.
//!
//! ```text
//!   spawn_blocking                         tonic
//! ┌──────────────────┐   mpsc (bounded)  ┌──────────────┐
//! │ MetaStore::list_*│ ─► ChannelSink ─► │ response     │ ─► client
//! │  (read txn)      │                   │ stream       │
//! └──────────────────┘                   └──────────────┘
//! ```

mod status;

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tonic::{Request, Response, Status, Streaming};

use metastore_common::constants::DEFAULT_STREAM_BUFFER;
use metastore_common::error::{MetastoreError, MetastoreResult};
use metastore_proto::proto::{
    metastore_server::Metastore, AddPartitionRequest, AddPartitionResponse, AlterDatabaseRequest,
    CreateDatabaseRequest, CreateTableRequest, Database, DropDatabaseRequest,
    DropPartitionRequest, DropPartitionsRequest, DropTableRequest, GetDatabaseRequest,
    GetDatabaseResponse, GetPartitionRequest, GetPartitionResponse, GetTableRequest,
    GetTableResponse, ListDatabasesRequest, ListPartitionsRequest, ListTablesRequest, Partition,
    RequestStatus, Table,
};
use metastore_proto::MetastoreServer;
use metastore_store::{ListDatabasesOptions, ListPartitionsOptions, MetaStore, RecordSink};

pub use status::{envelope, to_status, wire_code};

/// Response stream of a list call.
pub type RecordStream<T> = Pin<Box<dyn futures_core::Stream<Item = Result<T, Status>> + Send>>;

/// Feeds records from a blocking scan into a response stream.
struct ChannelSink<T> {
    tx: mpsc::Sender<Result<T, Status>>,
}

impl<T> RecordSink<T> for ChannelSink<T> {
    fn send(&mut self, record: T) -> MetastoreResult<()> {
        self.tx
            .blocking_send(Ok(record))
            .map_err(|_| MetastoreError::internal("response stream closed"))
    }
}

/// Metastore gRPC service implementation.
pub struct MetastoreService {
    /// The catalog.
    store: Arc<MetaStore>,
    /// Capacity of the channel behind each list stream.
    stream_buffer: usize,
}

impl MetastoreService {
    /// Creates a new gRPC service over the given store.
    pub fn new(store: Arc<MetaStore>) -> Self {
        Self {
            store,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Sets the list stream buffer size.
    pub fn with_stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size.max(1);
        self
    }

    /// Runs storage work on the blocking pool.
    async fn run<T, F>(&self, f: F) -> MetastoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&MetaStore) -> MetastoreResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| MetastoreError::internal(format!("storage task failed: {e}")))?
    }

    /// Starts a list scan and returns its response stream.
    ///
    /// Waits for the first item so that a scan failing before its first
    /// record fails the call itself.
    async fn stream<T, F>(&self, produce: F) -> Result<RecordStream<T>, Status>
    where
        T: Send + 'static,
        F: FnOnce(&MetaStore, &mut ChannelSink<T>) -> MetastoreResult<()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(self.stream_buffer);
        let store = Arc::clone(&self.store);

        tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink { tx };
            if let Err(e) = produce(&store, &mut sink) {
                tracing::debug!("List stream ended with error: {}", e);
                // The receiver may already be gone.
                let _ = sink.tx.blocking_send(Err(to_status(e)));
            }
        });

        let first = match rx.recv().await {
            Some(Err(status)) => return Err(status),
            first => first,
        };
        let rest = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(futures_util::stream::iter(first).chain(rest)))
    }
}

/// Folds the result of a mutation into a status envelope.
fn status_of<T>(result: MetastoreResult<T>) -> Result<RequestStatus, Status> {
    match result {
        Ok(_) => Ok(RequestStatus::ok()),
        Err(e) => envelope(e),
    }
}

#[tonic::async_trait]
impl Metastore for MetastoreService {
    async fn create_database(
        &self,
        request: Request<CreateDatabaseRequest>,
    ) -> Result<Response<GetDatabaseResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!("CreateDatabase catalog={}", req.catalog);
        let database = req
            .database
            .ok_or_else(|| Status::invalid_argument("missing database"))?;

        let response = match self
            .run(move |store| store.create_database(&req.catalog, database))
            .await
        {
            Ok(database) => GetDatabaseResponse {
                status: Some(RequestStatus::ok()),
                database: Some(database),
            },
            Err(e) => GetDatabaseResponse {
                status: Some(envelope(e)?),
                database: None,
            },
        };
        Ok(Response::new(response))
    }

    async fn get_database(
        &self,
        request: Request<GetDatabaseRequest>,
    ) -> Result<Response<GetDatabaseResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!("GetDatabase catalog={} id={:?}", req.catalog, req.id);
        let id = req.id.unwrap_or_default();

        let response = match self
            .run(move |store| store.get_database(&req.catalog, &id))
            .await
        {
            Ok(database) => GetDatabaseResponse {
                status: Some(RequestStatus::ok()),
                database: Some(database),
            },
            Err(e) => GetDatabaseResponse {
                status: Some(envelope(e)?),
                database: None,
            },
        };
        Ok(Response::new(response))
    }

    type ListDatabasesStream = RecordStream<Database>;

    async fn list_databases(
        &self,
        request: Request<ListDatabasesRequest>,
    ) -> Result<Response<Self::ListDatabasesStream>, Status> {
        let req = request.into_inner();
        tracing::debug!("ListDatabases catalog={}", req.catalog);
        let options = ListDatabasesOptions {
            exclude_params: req.exclude_params,
            fields: req.fields,
        };

        let stream = self
            .stream(move |store, sink| store.list_databases(&req.catalog, &options, sink))
            .await?;
        Ok(Response::new(stream))
    }

    async fn alter_database(
        &self,
        request: Request<AlterDatabaseRequest>,
    ) -> Result<Response<GetDatabaseResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!("AlterDatabase catalog={} id={:?}", req.catalog, req.id);
        let id = req.id.unwrap_or_default();
        let changes = req
            .database
            .ok_or_else(|| Status::invalid_argument("missing database"))?;

        let response = match self
            .run(move |store| store.alter_database(&req.catalog, &id, changes))
            .await
        {
            Ok(database) => GetDatabaseResponse {
                status: Some(RequestStatus::ok()),
                database: Some(database),
            },
            Err(e) => GetDatabaseResponse {
                status: Some(envelope(e)?),
                database: None,
            },
        };
        Ok(Response::new(response))
    }

    async fn drop_database(
        &self,
        request: Request<DropDatabaseRequest>,
    ) -> Result<Response<RequestStatus>, Status> {
        let req = request.into_inner();
        tracing::debug!("DropDatabase catalog={} id={:?}", req.catalog, req.id);
        let id = req.id.unwrap_or_default();

        let result = self
            .run(move |store| store.drop_database(&req.catalog, &id))
            .await;
        Ok(Response::new(status_of(result)?))
    }

    async fn create_table(
        &self,
        request: Request<CreateTableRequest>,
    ) -> Result<Response<GetTableResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!("CreateTable catalog={} db={:?}", req.catalog, req.db_id);
        let db = req.db_id.unwrap_or_default();
        let table = req
            .table
            .ok_or_else(|| Status::invalid_argument("missing table"))?;

        let response = match self
            .run(move |store| store.create_table(&req.catalog, &db, table))
            .await
        {
            Ok(table) => GetTableResponse {
                status: Some(RequestStatus::ok()),
                table: Some(table),
            },
            Err(e) => GetTableResponse {
                status: Some(envelope(e)?),
                table: None,
            },
        };
        Ok(Response::new(response))
    }

    async fn get_table(
        &self,
        request: Request<GetTableRequest>,
    ) -> Result<Response<GetTableResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!(
            "GetTable catalog={} db={:?} id={:?}",
            req.catalog,
            req.db_id,
            req.id
        );
        let db = req.db_id.unwrap_or_default();
        let id = req.id.unwrap_or_default();

        let response = match self
            .run(move |store| store.get_table(&req.catalog, &db, &id))
            .await
        {
            Ok(table) => GetTableResponse {
                status: Some(RequestStatus::ok()),
                table: Some(table),
            },
            Err(e) => GetTableResponse {
                status: Some(envelope(e)?),
                table: None,
            },
        };
        Ok(Response::new(response))
    }

    type ListTablesStream = RecordStream<Table>;

    async fn list_tables(
        &self,
        request: Request<ListTablesRequest>,
    ) -> Result<Response<Self::ListTablesStream>, Status> {
        let req = request.into_inner();
        tracing::debug!("ListTables catalog={} db={:?}", req.catalog, req.db_id);
        let db = req.db_id.unwrap_or_default();

        let stream = self
            .stream(move |store, sink| store.list_tables(&req.catalog, &db, &req.fields, sink))
            .await?;
        Ok(Response::new(stream))
    }

    async fn drop_table(
        &self,
        request: Request<DropTableRequest>,
    ) -> Result<Response<RequestStatus>, Status> {
        let req = request.into_inner();
        tracing::debug!(
            "DropTable catalog={} db={:?} id={:?}",
            req.catalog,
            req.db_id,
            req.id
        );
        let db = req.db_id.unwrap_or_default();
        let id = req.id.unwrap_or_default();

        let result = self
            .run(move |store| store.drop_table(&req.catalog, &db, &id))
            .await;
        Ok(Response::new(status_of(result)?))
    }

    async fn add_partition(
        &self,
        request: Request<AddPartitionRequest>,
    ) -> Result<Response<AddPartitionResponse>, Status> {
        let req = request.into_inner();
        let sequence = req.sequence;

        let response = match self.add_one(req).await {
            Ok(partition) => AddPartitionResponse {
                status: Some(RequestStatus::ok()),
                sequence,
                seq_id: partition.seq_id,
            },
            Err(e) => AddPartitionResponse {
                status: Some(envelope(e)?),
                sequence,
                seq_id: 0,
            },
        };
        Ok(Response::new(response))
    }

    async fn add_many_partitions(
        &self,
        request: Request<Streaming<AddPartitionRequest>>,
    ) -> Result<Response<RequestStatus>, Status> {
        let mut stream = request.into_inner();
        let mut added = 0usize;

        while let Some(req) = stream.message().await? {
            let sequence = req.sequence;
            if let Err(e) = self.add_one(req).await {
                tracing::debug!("AddManyPartitions stopped at request {}", sequence);
                let mut status = envelope(e)?;
                status.error = format!("request {}: {}", sequence, status.error);
                return Ok(Response::new(status));
            }
            added += 1;
        }

        tracing::debug!("AddManyPartitions added {} partitions", added);
        Ok(Response::new(RequestStatus::ok()))
    }

    async fn get_partition(
        &self,
        request: Request<GetPartitionRequest>,
    ) -> Result<Response<GetPartitionResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!(
            "GetPartition catalog={} db={:?} table={:?} values={:?}",
            req.catalog,
            req.db_id,
            req.table_id,
            req.values
        );
        let db = req.db_id.unwrap_or_default();
        let table = req.table_id.unwrap_or_default();

        let response = match self
            .run(move |store| {
                store.get_partition(&req.catalog, &db, &table, &req.values, &req.fields)
            })
            .await
        {
            Ok(partition) => GetPartitionResponse {
                status: Some(RequestStatus::ok()),
                partition: Some(partition),
            },
            Err(e) => GetPartitionResponse {
                status: Some(envelope(e)?),
                partition: None,
            },
        };
        Ok(Response::new(response))
    }

    type ListPartitionsStream = RecordStream<Partition>;

    async fn list_partitions(
        &self,
        request: Request<ListPartitionsRequest>,
    ) -> Result<Response<Self::ListPartitionsStream>, Status> {
        let req = request.into_inner();
        tracing::debug!(
            "ListPartitions catalog={} db={:?} table={:?}",
            req.catalog,
            req.db_id,
            req.table_id
        );
        let db = req.db_id.unwrap_or_default();
        let table = req.table_id.unwrap_or_default();
        let options = ListPartitionsOptions {
            filter: req.filter.into_iter().map(|v| v.values).collect(),
            fields: req.fields,
            exclude: req.exclude,
        };

        let stream = self
            .stream(move |store, sink| {
                store.list_partitions(&req.catalog, &db, &table, &options, sink)
            })
            .await?;
        Ok(Response::new(stream))
    }

    async fn drop_partition(
        &self,
        request: Request<DropPartitionRequest>,
    ) -> Result<Response<RequestStatus>, Status> {
        let req = request.into_inner();
        tracing::debug!(
            "DropPartition catalog={} db={:?} table={:?} values={:?}",
            req.catalog,
            req.db_id,
            req.table_id,
            req.values
        );
        let db = req.db_id.unwrap_or_default();
        let table = req.table_id.unwrap_or_default();

        let result = self
            .run(move |store| store.drop_partition(&req.catalog, &db, &table, &req.values))
            .await;
        Ok(Response::new(status_of(result)?))
    }

    async fn drop_partitions(
        &self,
        request: Request<DropPartitionsRequest>,
    ) -> Result<Response<RequestStatus>, Status> {
        let req = request.into_inner();
        tracing::debug!(
            "DropPartitions catalog={} db={:?} table={:?} count={}",
            req.catalog,
            req.db_id,
            req.table_id,
            req.values.len()
        );
        let db = req.db_id.unwrap_or_default();
        let table = req.table_id.unwrap_or_default();
        let values: Vec<Vec<String>> = req.values.into_iter().map(|v| v.values).collect();

        let result = self
            .run(move |store| store.drop_partitions(&req.catalog, &db, &table, &values))
            .await;
        Ok(Response::new(status_of(result)?))
    }

    async fn drop_partitions_stream(
        &self,
        request: Request<Streaming<DropPartitionRequest>>,
    ) -> Result<Response<RequestStatus>, Status> {
        let mut stream = request.into_inner();

        // The first request names the table; later ones only add values.
        let Some(first) = stream.message().await? else {
            return Ok(Response::new(RequestStatus::ok()));
        };
        let mut values = vec![first.values];
        while let Some(req) = stream.message().await? {
            values.push(req.values);
        }
        tracing::debug!(
            "DropPartitionsStream catalog={} db={:?} table={:?} count={}",
            first.catalog,
            first.db_id,
            first.table_id,
            values.len()
        );

        let catalog = first.catalog;
        let db = first.db_id.unwrap_or_default();
        let table = first.table_id.unwrap_or_default();
        let result = self
            .run(move |store| store.drop_partitions(&catalog, &db, &table, &values))
            .await;
        Ok(Response::new(status_of(result)?))
    }
}

impl MetastoreService {
    async fn add_one(&self, req: AddPartitionRequest) -> MetastoreResult<Partition> {
        tracing::debug!(
            "AddPartition catalog={} db={:?} table={:?} sequence={}",
            req.catalog,
            req.db_id,
            req.table_id,
            req.sequence
        );
        let partition = req
            .partition
            .ok_or_else(|| MetastoreError::invalid_argument("missing partition"))?;
        let db = req.db_id.unwrap_or_default();
        let table = req.table_id.unwrap_or_default();
        let catalog = req.catalog;

        self.run(move |store| store.add_partition(&catalog, &db, &table, partition))
            .await
    }
}

/// gRPC server builder.
pub struct GrpcServer {
    /// The catalog.
    store: Arc<MetaStore>,
    /// Server address.
    addr: SocketAddr,
    /// Capacity of the channel behind each list stream.
    stream_buffer: usize,
}

impl GrpcServer {
    /// Creates a new gRPC server builder.
    pub fn new(store: Arc<MetaStore>, addr: SocketAddr) -> Self {
        Self {
            store,
            addr,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Sets the list stream buffer size.
    pub fn with_stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size;
        self
    }

    /// Starts the gRPC server.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let service = MetastoreService::new(self.store).with_stream_buffer(self.stream_buffer);

        tracing::info!("Metastore gRPC server listening on {}", self.addr);

        tonic::transport::Server::builder()
            .add_service(MetastoreServer::new(service))
            .serve(self.addr)
            .await?;

        Ok(())
    }
}
