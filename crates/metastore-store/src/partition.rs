//! Partition operations.
//!
//! Partitions live in their table's region, keyed by their values joined
//! with `/`. There is no index by partition id. The region is created on
//! the first add, so a table without partitions has no region yet and
//! lists as empty.

use std::collections::HashSet;

use metastore_common::error::{MetastoreError, MetastoreResult};
use metastore_common::types::new_identifier;
use metastore_proto::{Id, Partition};

use crate::bucket::{self, TableRef};
use crate::codec;
use crate::projection;
use crate::sink::RecordSink;
use crate::store::MetaStore;
use crate::txn::RegionRead;
use crate::validate::{self, partition_key};

/// Field path naming the attached table.
const TABLE_FIELD: &str = "table";

/// Options for [`MetaStore::list_partitions`].
#[derive(Debug, Clone, Default)]
pub struct ListPartitionsOptions {
    /// Value tuples to fetch. Empty means every partition.
    pub filter: Vec<Vec<String>>,
    /// Fields to return. Empty means the whole record.
    pub fields: Vec<String>,
    /// Fields to clear.
    pub exclude: Vec<String>,
}

/// Fills an empty location from the storage descriptor.
fn fill_location(partition: &mut Partition) {
    if partition.location.is_empty() {
        if let Some(sd) = &partition.sd {
            partition.location = sd.location.clone();
        }
    }
}

fn validate_scope(catalog: &str, db: &Id, table: &Id) -> MetastoreResult<()> {
    validate::catalog(catalog)?;
    validate::identity(db, "database")?;
    validate::identity(table, "table")
}

/// Builds the keys of `tuples`, dropping repeats in first-seen order.
fn unique_keys(tuples: &[Vec<String>]) -> MetastoreResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut keys = Vec::with_capacity(tuples.len());
    for values in tuples {
        let key = partition_key(values)?;
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }
    Ok(keys)
}

fn describe_partition(db: &Id, table: &Id, key: &str) -> String {
    format!("{}.{}/{}", bucket::describe(db), bucket::describe(table), key)
}

fn read_partition<R: RegionRead + ?Sized>(
    tx: &R,
    table: &TableRef,
    key: &str,
) -> MetastoreResult<Option<Partition>> {
    let region = table.partitions();
    if !tx.region_exists(&region)? {
        return Ok(None);
    }
    tx.get(&region, key.as_bytes())?
        .map(|data| codec::decode(&data, format_args!("partition {key}")))
        .transpose()
}

impl MetaStore {
    /// Adds a partition to a table.
    ///
    /// Returns the stored record carrying its generated id and the table's
    /// next sequence number.
    pub fn add_partition(
        &self,
        catalog: &str,
        db: &Id,
        table: &Id,
        mut partition: Partition,
    ) -> MetastoreResult<Partition> {
        validate_scope(catalog, db, table)?;
        let key = partition_key(&partition.values)?;

        partition.table = None;
        partition.id = new_identifier();
        if self.config().copy_sd_location {
            fill_location(&mut partition);
        }

        let partition = self.update(|tx| {
            let table_ref = bucket::open_table(tx, catalog, db, table)?;
            let region = table_ref.partitions();
            tx.create_region(&region)?;
            if tx.get(&region, key.as_bytes())?.is_some() {
                return Err(MetastoreError::already_exists(format!(
                    "partition {} already exists",
                    describe_partition(db, table, &key)
                )));
            }
            partition.seq_id = tx.next_sequence(&region)?;
            tx.put(&region, key.as_bytes(), &codec::encode(&partition)?)?;
            Ok(partition)
        })?;

        tracing::debug!(
            "Added partition {} seq={}",
            describe_partition(db, table, &key),
            partition.seq_id
        );
        Ok(partition)
    }

    /// Returns one partition by its values.
    ///
    /// The owning table is attached when `fields` is empty or names
    /// `table`.
    pub fn get_partition(
        &self,
        catalog: &str,
        db: &Id,
        table: &Id,
        values: &[String],
        fields: &[String],
    ) -> MetastoreResult<Partition> {
        validate_scope(catalog, db, table)?;
        let key = partition_key(values)?;

        self.view(|tx| {
            let table_ref = bucket::open_table(tx, catalog, db, table)?;
            let mut partition = read_partition(tx, &table_ref, &key)?.ok_or_else(|| {
                MetastoreError::not_found(format!(
                    "partition {} doesn't exist",
                    describe_partition(db, table, &key)
                ))
            })?;
            fill_location(&mut partition);

            let mut partition = projection::project(partition, fields, &[]);
            if projection::admits(fields, &[], TABLE_FIELD) {
                partition.table = Some(bucket::read_table(tx, &table_ref)?);
            }
            Ok(partition)
        })
    }

    /// Streams the partitions of a table.
    ///
    /// Without a filter every partition is returned in key order; with one,
    /// each distinct requested tuple is looked up once and missing ones are
    /// skipped. The
    /// owning table is attached to the first record only, when both field
    /// lists admit `table`. Records that fail to decode are skipped.
    pub fn list_partitions<S: RecordSink<Partition>>(
        &self,
        catalog: &str,
        db: &Id,
        table: &Id,
        options: &ListPartitionsOptions,
        sink: &mut S,
    ) -> MetastoreResult<()> {
        validate_scope(catalog, db, table)?;
        let keys = unique_keys(&options.filter)?;

        self.view(|tx| {
            let table_ref = bucket::open_table(tx, catalog, db, table)?;
            let mut attach = if projection::admits(&options.fields, &options.exclude, TABLE_FIELD) {
                Some(bucket::read_table(tx, &table_ref)?)
            } else {
                None
            };

            let mut emit = |mut partition: Partition| -> MetastoreResult<()> {
                fill_location(&mut partition);
                let mut partition = projection::project(partition, &options.fields, &options.exclude);
                partition.table = attach.take();
                sink.send(partition)
            };

            if keys.is_empty() {
                let region = table_ref.partitions();
                if !tx.region_exists(&region)? {
                    return Ok(());
                }
                return tx.for_each(&region, &mut |key, value| {
                    match codec::decode::<Partition>(value, "partition") {
                        Ok(partition) => emit(partition),
                        Err(e) => {
                            tracing::warn!(
                                "Skipping partition {}: {}",
                                String::from_utf8_lossy(key),
                                e
                            );
                            Ok(())
                        }
                    }
                });
            }

            for key in &keys {
                match read_partition(tx, &table_ref, key) {
                    Ok(Some(partition)) => emit(partition)?,
                    Ok(None) => tracing::debug!("No partition {}", key),
                    Err(MetastoreError::Corruption(e)) => {
                        tracing::warn!("Skipping partition {}: {}", key, e);
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })
    }

    /// Drops one partition.
    pub fn drop_partition(
        &self,
        catalog: &str,
        db: &Id,
        table: &Id,
        values: &[String],
    ) -> MetastoreResult<()> {
        self.drop_partitions(catalog, db, table, &[values.to_vec()])
            .map(|_| ())
    }

    /// Drops several partitions in one transaction.
    ///
    /// Repeated tuples count once. Fails without dropping anything if any
    /// tuple is missing. Returns the number of dropped partitions.
    pub fn drop_partitions(
        &self,
        catalog: &str,
        db: &Id,
        table: &Id,
        values: &[Vec<String>],
    ) -> MetastoreResult<usize> {
        validate_scope(catalog, db, table)?;
        let keys = unique_keys(values)?;
        if keys.is_empty() {
            return Ok(0);
        }

        self.update(|tx| {
            let table_ref = bucket::open_table(tx, catalog, db, table)?;
            let region = table_ref.partitions();
            let region_exists = tx.region_exists(&region)?;
            for key in &keys {
                if !region_exists || !tx.delete(&region, key.as_bytes())? {
                    return Err(MetastoreError::not_found(format!(
                        "partition {} doesn't exist",
                        describe_partition(db, table, key)
                    )));
                }
            }
            Ok(())
        })?;

        tracing::debug!(
            "Dropped {} partitions of {}.{}",
            keys.len(),
            bucket::describe(db),
            bucket::describe(table)
        );
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::VecSink;
    use crate::store::StoreConfig;
    use metastore_proto::{Database, StorageDescriptor, Table};
    use std::collections::HashMap;

    fn setup(config: StoreConfig) -> MetaStore {
        let store = MetaStore::open(config).unwrap();
        store
            .create_database(
                "hive",
                Database {
                    id: Some(Id::named("sales")),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .create_table(
                "hive",
                &Id::named("sales"),
                Table {
                    id: Some(Id::named("orders")),
                    location: "s3://b/orders".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        store
    }

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn partition(year: &str, month: &str) -> Partition {
        Partition {
            values: values(&[year, month]),
            location: format!("s3://b/orders/{year}/{month}"),
            parameters: HashMap::from([("rows".to_string(), "10".to_string())]),
            ..Default::default()
        }
    }

    fn add(store: &MetaStore, p: Partition) -> MetastoreResult<Partition> {
        store.add_partition("hive", &Id::named("sales"), &Id::named("orders"), p)
    }

    fn list(store: &MetaStore, options: &ListPartitionsOptions) -> MetastoreResult<Vec<Partition>> {
        let mut sink = VecSink::new();
        store.list_partitions(
            "hive",
            &Id::named("sales"),
            &Id::named("orders"),
            options,
            &mut sink,
        )?;
        Ok(sink.into_inner())
    }

    #[test]
    fn test_add_and_get() {
        let store = setup(StoreConfig::in_memory());
        let first = add(&store, partition("2023", "11")).unwrap();
        let second = add(&store, partition("2023", "12")).unwrap();
        assert_eq!(first.seq_id, 1);
        assert_eq!(second.seq_id, 2);
        assert!(!first.id.is_empty());
        assert!(first.table.is_none());

        let fetched = store
            .get_partition("hive", &Id::named("sales"), &Id::named("orders"), &values(&["2023", "12"]), &[])
            .unwrap();
        assert_eq!(fetched.values, values(&["2023", "12"]));
        assert_eq!(fetched.id, second.id);
        let table = fetched.table.unwrap();
        assert_eq!(table.id.unwrap().name, "orders");
    }

    #[test]
    fn test_duplicate_values() {
        let store = setup(StoreConfig::in_memory());
        add(&store, partition("2023", "11")).unwrap();
        let err = add(&store, partition("2023", "11")).unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_add_validation() {
        let store = setup(StoreConfig::in_memory());
        let err = add(&store, Partition::default()).unwrap_err();
        assert!(matches!(err, MetastoreError::InvalidArgument(_)));

        let err = store
            .add_partition("hive", &Id::named("sales"), &Id::named("items"), partition("2023", "1"))
            .unwrap_err();
        assert!(err.is_not_found());

        let err = store
            .add_partition("hive", &Id::named("sales"), &Id::with_id("nope"), partition("2023", "1"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_get_with_fields() {
        let store = setup(StoreConfig::in_memory());
        add(&store, partition("2023", "11")).unwrap();

        let get = |fields: &[&str]| {
            store
                .get_partition(
                    "hive",
                    &Id::named("sales"),
                    &Id::named("orders"),
                    &values(&["2023", "11"]),
                    &values(fields),
                )
                .unwrap()
        };

        let p = get(&["values"]);
        assert_eq!(p.values.len(), 2);
        assert!(p.location.is_empty());
        assert!(p.table.is_none());

        let p = get(&["location", "table"]);
        assert!(p.values.is_empty());
        assert!(!p.location.is_empty());
        assert!(p.table.is_some());
    }

    #[test]
    fn test_get_missing() {
        let store = setup(StoreConfig::in_memory());
        let err = store
            .get_partition("hive", &Id::named("sales"), &Id::named("orders"), &values(&["2023", "11"]), &[])
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_attaches_table_to_first_only() {
        let store = setup(StoreConfig::in_memory());
        assert!(list(&store, &ListPartitionsOptions::default()).unwrap().is_empty());

        add(&store, partition("2023", "11")).unwrap();
        add(&store, partition("2023", "12")).unwrap();

        let all = list(&store, &ListPartitionsOptions::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].values, values(&["2023", "11"]));
        assert!(all[0].table.is_some());
        assert!(all[1].table.is_none());

        let no_table = list(
            &store,
            &ListPartitionsOptions {
                exclude: values(&["table"]),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(no_table.iter().all(|p| p.table.is_none()));
    }

    #[test]
    fn test_list_exclude_parameters() {
        let store = setup(StoreConfig::in_memory());
        add(&store, partition("2023", "11")).unwrap();

        let listed = list(
            &store,
            &ListPartitionsOptions {
                exclude: values(&["parameters"]),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(listed[0].parameters.is_empty());
        assert_eq!(listed[0].values, values(&["2023", "11"]));
        assert_eq!(listed[0].location, "s3://b/orders/2023/11");
    }

    #[test]
    fn test_list_filter_skips_missing() {
        let store = setup(StoreConfig::in_memory());
        add(&store, partition("2023", "11")).unwrap();
        add(&store, partition("2023", "12")).unwrap();

        let listed = list(
            &store,
            &ListPartitionsOptions {
                filter: vec![values(&["2023", "12"]), values(&["1999", "1"])],
                fields: values(&["values"]),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].values, values(&["2023", "12"]));
        assert!(listed[0].table.is_none());
    }

    #[test]
    fn test_location_fallback() {
        let p = Partition {
            values: values(&["2024", "1"]),
            sd: Some(StorageDescriptor {
                location: "s3://b/orders/2024/1".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        // Stored as sent, filled on read.
        let store = setup(StoreConfig::in_memory());
        let stored = add(&store, p.clone()).unwrap();
        assert!(stored.location.is_empty());
        let listed = list(
            &store,
            &ListPartitionsOptions {
                fields: values(&["location"]),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(listed[0].location, "s3://b/orders/2024/1");

        // Filled on write when enabled.
        let store = setup(StoreConfig::in_memory().copy_sd_location(true));
        let stored = add(&store, p).unwrap();
        assert_eq!(stored.location, "s3://b/orders/2024/1");
    }

    #[test]
    fn test_drop_partition() {
        let store = setup(StoreConfig::in_memory());
        add(&store, partition("2023", "11")).unwrap();

        let (db, table) = (Id::named("sales"), Id::named("orders"));
        store
            .drop_partition("hive", &db, &table, &values(&["2023", "11"]))
            .unwrap();
        let err = store
            .drop_partition("hive", &db, &table, &values(&["2023", "11"]))
            .unwrap_err();
        assert!(err.is_not_found());

        // Sequences are not reused.
        assert_eq!(add(&store, partition("2023", "11")).unwrap().seq_id, 2);
    }

    #[test]
    fn test_drop_partitions_is_all_or_nothing() {
        let store = setup(StoreConfig::in_memory());
        add(&store, partition("2023", "11")).unwrap();
        add(&store, partition("2023", "12")).unwrap();
        let (db, table) = (Id::named("sales"), Id::named("orders"));

        let err = store
            .drop_partitions(
                "hive",
                &db,
                &table,
                &[values(&["2023", "11"]), values(&["1999", "1"])],
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(list(&store, &ListPartitionsOptions::default()).unwrap().len(), 2);

        let dropped = store
            .drop_partitions(
                "hive",
                &db,
                &table,
                &[values(&["2023", "11"]), values(&["2023", "12"])],
            )
            .unwrap();
        assert_eq!(dropped, 2);
        assert!(list(&store, &ListPartitionsOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_drop_table_removes_partitions() {
        let store = setup(StoreConfig::in_memory());
        add(&store, partition("2023", "11")).unwrap();
        store
            .drop_table("hive", &Id::named("sales"), &Id::named("orders"))
            .unwrap();

        let err = list(&store, &ListPartitionsOptions::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_filter_repeats_count_once() {
        let store = setup(StoreConfig::in_memory());
        add(&store, partition("2023", "11")).unwrap();
        add(&store, partition("2023", "12")).unwrap();

        let listed = list(
            &store,
            &ListPartitionsOptions {
                filter: vec![
                    values(&["2023", "12"]),
                    values(&["2023", "11"]),
                    values(&["2023", "12"]),
                ],
                fields: values(&["values"]),
                ..Default::default()
            },
        )
        .unwrap();
        let listed: Vec<Vec<String>> = listed.into_iter().map(|p| p.values).collect();
        assert_eq!(listed, vec![values(&["2023", "12"]), values(&["2023", "11"])]);
    }

    #[test]
    fn test_drop_partitions_with_repeated_tuple() {
        let store = setup(StoreConfig::in_memory());
        add(&store, partition("2023", "11")).unwrap();
        add(&store, partition("2023", "12")).unwrap();
        let (db, table) = (Id::named("sales"), Id::named("orders"));

        let dropped = store
            .drop_partitions(
                "hive",
                &db,
                &table,
                &[values(&["2023", "11"]), values(&["2023", "11"])],
            )
            .unwrap();
        assert_eq!(dropped, 1);

        let left: Vec<Vec<String>> = list(&store, &ListPartitionsOptions::default())
            .unwrap()
            .into_iter()
            .map(|p| p.values)
            .collect();
        assert_eq!(left, vec![values(&["2023", "12"])]);
    }

    #[test]
    fn test_undecodable_partition() {
        let store = setup(StoreConfig::in_memory());
        add(&store, partition("2023", "10")).unwrap();
        add(&store, partition("2023", "11")).unwrap();
        add(&store, partition("2023", "12")).unwrap();
        let (db, table) = (Id::named("sales"), Id::named("orders"));

        store
            .update(|tx| {
                let table_ref = bucket::open_table(tx, "hive", &db, &table)?;
                tx.put(&table_ref.partitions(), b"2023/11", &[0xFF, 0xFF, 0xFF])
            })
            .unwrap();

        let listed: Vec<Vec<String>> = list(&store, &ListPartitionsOptions::default())
            .unwrap()
            .into_iter()
            .map(|p| p.values)
            .collect();
        assert_eq!(listed, vec![values(&["2023", "10"]), values(&["2023", "12"])]);

        let filtered = list(
            &store,
            &ListPartitionsOptions {
                filter: vec![values(&["2023", "11"]), values(&["2023", "12"])],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(filtered.len(), 1);

        let err = store
            .get_partition("hive", &db, &table, &values(&["2023", "11"]), &[])
            .unwrap_err();
        assert!(matches!(err, MetastoreError::Corruption(_)));
    }
}
