//! Catalog commands.
//!
//! Each subcommand becomes one RPC (or one stream of RPC results) against
//! the server. A failed status envelope is turned into an error.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use clap::{Subcommand, ValueEnum};
use tonic::transport::Channel;
use tracing::debug;

use metastore_proto::{
    AddPartitionRequest, CreateDatabaseRequest, CreateTableRequest, Database,
    DropDatabaseRequest, DropPartitionRequest, DropTableRequest, FieldSchema,
    GetDatabaseRequest, GetPartitionRequest, GetTableRequest, Id, ListDatabasesRequest,
    ListPartitionsRequest, ListTablesRequest, MetastoreClient, Partition, PartitionValues,
    RequestStatus, StorageDescriptor, Table, TableType,
};

use crate::formatter::{format_records, OutputFormat};

/// Database subcommands.
#[derive(Subcommand, Debug)]
pub enum DatabaseCommand {
    /// List databases
    List {
        /// Only return these fields (id, id.name, location, parameters)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Strip parameters from the output
        #[arg(long)]
        exclude_params: bool,
    },
    /// Show one database
    Get {
        /// Database name
        name: String,
    },
    /// Create a database
    Create {
        /// Database name
        name: String,
        /// Storage location
        #[arg(long, default_value = "")]
        location: String,
        /// Parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Drop a database with all its tables and partitions
    Drop {
        /// Database name
        name: String,
    },
}

/// Table kind argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TableTypeArg {
    /// Managed table
    Managed,
    /// External table
    External,
    /// Index table
    Index,
}

impl From<TableTypeArg> for TableType {
    fn from(arg: TableTypeArg) -> Self {
        match arg {
            TableTypeArg::Managed => TableType::TtypeManaged,
            TableTypeArg::External => TableType::TtypeExternal,
            TableTypeArg::Index => TableType::TtypeIndex,
        }
    }
}

/// Table subcommands.
#[derive(Subcommand, Debug)]
pub enum TableCommand {
    /// List the tables of a database
    List {
        /// Database name
        db: String,
        /// Only return these fields (id, id.name, location, parameters,
        /// partitionKeys, sd, tableType)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Show one table
    Get {
        /// Database name
        db: String,
        /// Table name
        name: String,
    },
    /// Create a table
    Create {
        /// Database name
        db: String,
        /// Table name
        name: String,
        /// Storage location
        #[arg(long, default_value = "")]
        location: String,
        /// Partition key as name[:type] (repeatable, in order)
        #[arg(long = "partition-key")]
        partition_keys: Vec<String>,
        /// Table kind
        #[arg(long = "type", value_enum, default_value = "managed")]
        table_type: TableTypeArg,
        /// Parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Drop a table with all its partitions
    Drop {
        /// Database name
        db: String,
        /// Table name
        name: String,
    },
}

/// Partition subcommands.
#[derive(Subcommand, Debug)]
pub enum PartitionCommand {
    /// List the partitions of a table
    List {
        /// Database name
        db: String,
        /// Table name
        table: String,
        /// Only these value tuples, as v1/v2/... (repeatable)
        #[arg(long)]
        filter: Vec<String>,
        /// Only return these fields
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Clear these fields
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
    /// Show one partition
    Get {
        /// Database name
        db: String,
        /// Table name
        table: String,
        /// Partition values, in key order
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Add a partition
    Add {
        /// Database name
        db: String,
        /// Table name
        table: String,
        /// Partition values, in key order
        #[arg(required = true)]
        values: Vec<String>,
        /// Storage location
        #[arg(long, default_value = "")]
        location: String,
        /// Parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Drop a partition
    Drop {
        /// Database name
        db: String,
        /// Table name
        table: String,
        /// Partition values, in key order
        #[arg(required = true)]
        values: Vec<String>,
    },
}

/// Parses a `key=value` argument.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("invalid key=value: `{s}`")),
    }
}

/// Parses a `name[:type]` partition key; the type defaults to `string`.
pub fn parse_partition_key(s: &str) -> FieldSchema {
    let (name, ty) = s.split_once(':').unwrap_or((s, "string"));
    FieldSchema {
        name: name.to_string(),
        r#type: ty.to_string(),
        comment: String::new(),
    }
}

fn check(status: Option<RequestStatus>) -> Result<()> {
    match status {
        Some(status) if status.is_ok() => Ok(()),
        Some(status) => bail!("{} ({:?})", status.error, status.code()),
        None => bail!("server returned no status"),
    }
}

/// Executes catalog commands against one server.
pub struct Executor {
    client: MetastoreClient<Channel>,
    catalog: String,
    format: OutputFormat,
}

impl Executor {
    /// Connects to the server.
    pub async fn connect(endpoint: String, catalog: String, format: OutputFormat) -> Result<Self> {
        debug!("Connecting to {}", endpoint);
        let client = MetastoreClient::connect(endpoint.clone())
            .await
            .with_context(|| format!("Failed to connect to {endpoint}"))?;
        Ok(Self {
            client,
            catalog,
            format,
        })
    }

    /// Runs a database command.
    pub async fn database(&mut self, command: DatabaseCommand) -> Result<String> {
        let catalog = self.catalog.clone();
        match command {
            DatabaseCommand::List {
                fields,
                exclude_params,
            } => {
                let mut stream = self
                    .client
                    .list_databases(ListDatabasesRequest {
                        catalog,
                        exclude_params,
                        fields,
                    })
                    .await?
                    .into_inner();
                let mut records = Vec::new();
                while let Some(db) = stream.message().await? {
                    records.push(db);
                }
                Ok(format_records(&records, self.format))
            }
            DatabaseCommand::Get { name } => {
                let resp = self
                    .client
                    .get_database(GetDatabaseRequest {
                        catalog,
                        id: Some(Id::named(name)),
                    })
                    .await?
                    .into_inner();
                check(resp.status)?;
                Ok(format_records(&Vec::from_iter(resp.database), self.format))
            }
            DatabaseCommand::Create {
                name,
                location,
                params,
            } => {
                let resp = self
                    .client
                    .create_database(CreateDatabaseRequest {
                        catalog,
                        database: Some(Database {
                            id: Some(Id::named(name)),
                            location,
                            parameters: params.into_iter().collect(),
                            ..Default::default()
                        }),
                    })
                    .await?
                    .into_inner();
                check(resp.status)?;
                Ok(format_records(&Vec::from_iter(resp.database), self.format))
            }
            DatabaseCommand::Drop { name } => {
                let status = self
                    .client
                    .drop_database(DropDatabaseRequest {
                        catalog,
                        id: Some(Id::named(&name)),
                    })
                    .await?
                    .into_inner();
                check(Some(status))?;
                Ok(format!("Dropped database {name}"))
            }
        }
    }

    /// Runs a table command.
    pub async fn table(&mut self, command: TableCommand) -> Result<String> {
        let catalog = self.catalog.clone();
        match command {
            TableCommand::List { db, fields } => {
                let mut stream = self
                    .client
                    .list_tables(ListTablesRequest {
                        catalog,
                        db_id: Some(Id::named(db)),
                        fields,
                    })
                    .await?
                    .into_inner();
                let mut records = Vec::new();
                while let Some(table) = stream.message().await? {
                    records.push(table);
                }
                Ok(format_records(&records, self.format))
            }
            TableCommand::Get { db, name } => {
                let resp = self
                    .client
                    .get_table(GetTableRequest {
                        catalog,
                        db_id: Some(Id::named(db)),
                        id: Some(Id::named(name)),
                    })
                    .await?
                    .into_inner();
                check(resp.status)?;
                Ok(format_records(&Vec::from_iter(resp.table), self.format))
            }
            TableCommand::Create {
                db,
                name,
                location,
                partition_keys,
                table_type,
                params,
            } => {
                let table = Table {
                    id: Some(Id::named(name)),
                    location: location.clone(),
                    parameters: params.into_iter().collect(),
                    partition_keys: partition_keys.iter().map(|k| parse_partition_key(k)).collect(),
                    sd: Some(StorageDescriptor {
                        location,
                        ..Default::default()
                    }),
                    table_type: TableType::from(table_type) as i32,
                    ..Default::default()
                };
                let resp = self
                    .client
                    .create_table(CreateTableRequest {
                        catalog,
                        db_id: Some(Id::named(db)),
                        table: Some(table),
                    })
                    .await?
                    .into_inner();
                check(resp.status)?;
                Ok(format_records(&Vec::from_iter(resp.table), self.format))
            }
            TableCommand::Drop { db, name } => {
                let status = self
                    .client
                    .drop_table(DropTableRequest {
                        catalog,
                        db_id: Some(Id::named(&db)),
                        id: Some(Id::named(&name)),
                    })
                    .await?
                    .into_inner();
                check(Some(status))?;
                Ok(format!("Dropped table {db}.{name}"))
            }
        }
    }

    /// Runs a partition command.
    pub async fn partition(&mut self, command: PartitionCommand) -> Result<String> {
        let catalog = self.catalog.clone();
        match command {
            PartitionCommand::List {
                db,
                table,
                filter,
                fields,
                exclude,
            } => {
                let filter = filter
                    .iter()
                    .map(|f| PartitionValues::new(f.split('/')))
                    .collect();
                let mut stream = self
                    .client
                    .list_partitions(ListPartitionsRequest {
                        catalog,
                        db_id: Some(Id::named(db)),
                        table_id: Some(Id::named(table)),
                        filter,
                        fields,
                        exclude,
                    })
                    .await?
                    .into_inner();
                let mut records = Vec::new();
                while let Some(partition) = stream.message().await? {
                    records.push(partition);
                }
                Ok(format_records(&records, self.format))
            }
            PartitionCommand::Get { db, table, values } => {
                let resp = self
                    .client
                    .get_partition(GetPartitionRequest {
                        catalog,
                        db_id: Some(Id::named(db)),
                        table_id: Some(Id::named(table)),
                        values,
                        fields: vec![],
                    })
                    .await?
                    .into_inner();
                check(resp.status)?;
                Ok(format_records(&Vec::from_iter(resp.partition), self.format))
            }
            PartitionCommand::Add {
                db,
                table,
                values,
                location,
                params,
            } => {
                let key = values.join("/");
                let resp = self
                    .client
                    .add_partition(AddPartitionRequest {
                        catalog,
                        db_id: Some(Id::named(db)),
                        table_id: Some(Id::named(table)),
                        partition: Some(Partition {
                            values,
                            location,
                            parameters: params.into_iter().collect::<HashMap<_, _>>(),
                            ..Default::default()
                        }),
                        sequence: 0,
                    })
                    .await?
                    .into_inner();
                check(resp.status)?;
                Ok(format!("Added partition {key} (seq {})", resp.seq_id))
            }
            PartitionCommand::Drop { db, table, values } => {
                let key = values.join("/");
                let status = self
                    .client
                    .drop_partition(DropPartitionRequest {
                        catalog,
                        db_id: Some(Id::named(db)),
                        table_id: Some(Id::named(table)),
                        values,
                    })
                    .await?
                    .into_inner();
                check(Some(status))?;
                Ok(format!("Dropped partition {key}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metastore_proto::ErrorCode;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("owner=etl").unwrap(),
            ("owner".to_string(), "etl".to_string())
        );
        assert_eq!(
            parse_key_val("k=a=b").unwrap(),
            ("k".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_parse_partition_key() {
        let key = parse_partition_key("year:int");
        assert_eq!(key.name, "year");
        assert_eq!(key.r#type, "int");

        let key = parse_partition_key("month");
        assert_eq!(key.r#type, "string");
    }

    #[test]
    fn test_check_status() {
        assert!(check(Some(RequestStatus::ok())).is_ok());
        assert!(check(None).is_err());

        let err = check(Some(RequestStatus::error(ErrorCode::NotFound, "no such db"))).unwrap_err();
        assert!(err.to_string().contains("no such db"));
    }
}
