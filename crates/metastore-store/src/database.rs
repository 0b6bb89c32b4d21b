//! Database operations.

use metastore_common::error::{MetastoreError, MetastoreResult};
use metastore_common::types::new_identifier;
use metastore_proto::{Database, Id};

use crate::bucket::{self, Level};
use crate::codec;
use crate::projection;
use crate::sink::RecordSink;
use crate::store::MetaStore;
use crate::txn::{RegionRead, WriteTx};
use crate::validate;

/// Options for [`MetaStore::list_databases`].
#[derive(Debug, Clone, Default)]
pub struct ListDatabasesOptions {
    /// Strip both parameter maps from every record.
    pub exclude_params: bool,
    /// Fields to return. Empty means the whole record.
    pub fields: Vec<String>,
}

fn read_database<R: RegionRead + ?Sized>(
    tx: &R,
    level: &Level,
    ident: &Id,
) -> MetastoreResult<(String, Database)> {
    let id = bucket::resolve_id(tx, level, ident, "database")?;
    let data = bucket::read_record(tx, level, ident, &id, "database")?;
    let database = codec::decode(&data, format_args!("database {id}"))?;
    Ok((id, database))
}

fn database_name(database: &Database) -> &str {
    database.id.as_ref().map_or("", |id| id.name.as_str())
}

fn store_database(tx: &mut WriteTx<'_>, level: &Level, id: &str, database: &Database) -> MetastoreResult<()> {
    tx.put(&level.by_id, id.as_bytes(), &codec::encode(database)?)
}

impl MetaStore {
    /// Creates a database in `catalog`, creating the catalog if needed.
    ///
    /// Returns the stored record with its generated id and sequence.
    pub fn create_database(&self, catalog: &str, mut database: Database) -> MetastoreResult<Database> {
        validate::catalog(catalog)?;
        let name = validate::name(database.id.as_ref(), "database")?;
        let id = new_identifier();
        database.id = Some(Id {
            name: name.clone(),
            id: id.clone(),
        });

        let database = self.update(|tx| {
            let level = bucket::create_catalog(tx, catalog)?;
            if tx.get(&level.by_name, name.as_bytes())?.is_some() {
                return Err(MetastoreError::already_exists(format!(
                    "database {name} already exists"
                )));
            }
            bucket::create_database_regions(tx, catalog, &id)?;
            tx.put(&level.by_name, name.as_bytes(), id.as_bytes())?;
            database.seq_id = tx.next_sequence(&level.root)?;
            store_database(tx, &level, &id, &database)?;
            Ok(database)
        })?;

        tracing::info!(
            "Created database {}:{} id={} seq={}",
            catalog,
            name,
            id,
            database.seq_id
        );
        Ok(database)
    }

    /// Returns a database by name or id.
    pub fn get_database(&self, catalog: &str, ident: &Id) -> MetastoreResult<Database> {
        validate::catalog(catalog)?;
        validate::identity(ident, "database")?;
        self.view(|tx| {
            let level = bucket::open_catalog(tx, catalog)?;
            read_database(tx, &level, ident).map(|(_, db)| db)
        })
    }

    /// Streams every database of `catalog` in id order.
    ///
    /// A catalog that was never created has no databases. Records that fail
    /// to decode are skipped.
    pub fn list_databases<S: RecordSink<Database>>(
        &self,
        catalog: &str,
        options: &ListDatabasesOptions,
        sink: &mut S,
    ) -> MetastoreResult<()> {
        validate::catalog(catalog)?;
        self.view(|tx| {
            let level = match bucket::open_catalog(tx, catalog) {
                Ok(level) => level,
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            };

            tx.for_each(&level.by_id, &mut |key, value| {
                let database: Database = match codec::decode(value, "database") {
                    Ok(db) => db,
                    Err(e) => {
                        tracing::warn!("Skipping database {}: {}", String::from_utf8_lossy(key), e);
                        return Ok(());
                    }
                };
                let mut database = projection::project(database, &options.fields, &[]);
                if options.exclude_params {
                    database.parameters.clear();
                    database.system_parameters.clear();
                }
                sink.send(database)
            })
        })
    }

    /// Updates a database's parameters, system parameters and location.
    ///
    /// `parameters` is replaced as given; `system_parameters` and `location`
    /// only when non-empty. Identity and sequence never change.
    pub fn alter_database(&self, catalog: &str, ident: &Id, changes: Database) -> MetastoreResult<Database> {
        validate::catalog(catalog)?;
        validate::identity(ident, "database")?;

        let database = self.update(|tx| {
            let level = bucket::open_catalog(tx, catalog)?;
            let (id, mut database) = read_database(tx, &level, ident)?;
            database.parameters = changes.parameters;
            if !changes.system_parameters.is_empty() {
                database.system_parameters = changes.system_parameters;
            }
            if !changes.location.is_empty() {
                database.location = changes.location;
            }
            store_database(tx, &level, &id, &database)?;
            Ok(database)
        })?;

        tracing::debug!("Altered database {}:{}", catalog, database_name(&database));
        Ok(database)
    }

    /// Drops a database with all its tables and partitions.
    pub fn drop_database(&self, catalog: &str, ident: &Id) -> MetastoreResult<()> {
        validate::catalog(catalog)?;
        validate::identity(ident, "database")?;

        let (id, name) = self.update(|tx| {
            let level = bucket::open_catalog(tx, catalog)?;
            let (id, database) = read_database(tx, &level, ident)?;
            let name = database_name(&database).to_string();

            tx.delete(&level.by_name, name.as_bytes())?;
            tx.delete(&level.by_id, id.as_bytes())?;
            let removed = tx.delete_region(&level.child(&id))?;
            tracing::debug!("Dropped {} entries under database {}", removed, id);
            Ok((id, name))
        })?;

        tracing::info!("Dropped database {}:{} id={}", catalog, name, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::VecSink;
    use std::collections::HashMap;

    fn database(name: &str) -> Database {
        Database {
            id: Some(Id::named(name)),
            location: format!("s3://warehouse/{name}"),
            parameters: HashMap::from([("owner".to_string(), "etl".to_string())]),
            system_parameters: HashMap::from([("format".to_string(), "v2".to_string())]),
            ..Default::default()
        }
    }

    fn list(store: &MetaStore, options: &ListDatabasesOptions) -> Vec<Database> {
        let mut sink = VecSink::new();
        store.list_databases("hive", options, &mut sink).unwrap();
        sink.into_inner()
    }

    #[test]
    fn test_create_and_get() {
        let store = MetaStore::open_memory().unwrap();
        let created = store.create_database("hive", database("sales")).unwrap();

        let id = created.id.clone().unwrap();
        assert_eq!(id.name, "sales");
        assert_eq!(id.id.len(), metastore_common::types::IDENTIFIER_LEN);
        assert_eq!(created.seq_id, 1);

        assert_eq!(store.get_database("hive", &Id::named("sales")).unwrap(), created);
        assert_eq!(store.get_database("hive", &Id::with_id(&id.id)).unwrap(), created);
    }

    #[test]
    fn test_create_validates_before_writing() {
        let store = MetaStore::open_memory().unwrap();

        let err = store.create_database("", database("sales")).unwrap_err();
        assert!(matches!(err, MetastoreError::InvalidArgument(_)));

        let err = store.create_database("hive", Database::default()).unwrap_err();
        assert!(matches!(err, MetastoreError::InvalidArgument(_)));

        // Nothing was created.
        assert!(list(&store, &ListDatabasesOptions::default()).is_empty());
    }

    #[test]
    fn test_duplicate_name() {
        let store = MetaStore::open_memory().unwrap();
        store.create_database("hive", database("sales")).unwrap();
        let err = store.create_database("hive", database("sales")).unwrap_err();
        assert!(err.is_already_exists());

        // Same name in another catalog is fine.
        store.create_database("other", database("sales")).unwrap();
    }

    #[test]
    fn test_get_missing() {
        let store = MetaStore::open_memory().unwrap();
        let err = store.get_database("hive", &Id::named("sales")).unwrap_err();
        assert!(err.is_not_found());

        store.create_database("hive", database("sales")).unwrap();
        assert!(store.get_database("hive", &Id::named("hr")).unwrap_err().is_not_found());
        assert!(store.get_database("hive", &Id::with_id("nope")).unwrap_err().is_not_found());
        assert!(matches!(
            store.get_database("hive", &Id::default()).unwrap_err(),
            MetastoreError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_list_projection() {
        let store = MetaStore::open_memory().unwrap();
        assert!(list(&store, &ListDatabasesOptions::default()).is_empty());

        store.create_database("hive", database("sales")).unwrap();
        store.create_database("hive", database("hr")).unwrap();

        let all = list(&store, &ListDatabasesOptions::default());
        assert_eq!(all.len(), 2);
        // Id order is creation order.
        assert_eq!(all[0].id.as_ref().unwrap().name, "sales");
        assert_eq!(all[1].id.as_ref().unwrap().name, "hr");

        let names = list(
            &store,
            &ListDatabasesOptions {
                fields: vec!["id.name".to_string()],
                ..Default::default()
            },
        );
        assert_eq!(names[0].id, Some(Id::named("sales")));
        assert!(names[0].location.is_empty());
        assert!(names[0].parameters.is_empty());

        let bare = list(
            &store,
            &ListDatabasesOptions {
                exclude_params: true,
                fields: vec!["parameters".to_string(), "location".to_string()],
            },
        );
        assert!(bare[0].parameters.is_empty());
        assert!(bare[0].system_parameters.is_empty());
        assert_eq!(bare[0].location, "s3://warehouse/sales");
    }

    #[test]
    fn test_alter() {
        let store = MetaStore::open_memory().unwrap();
        let created = store.create_database("hive", database("sales")).unwrap();

        let changes = Database {
            parameters: HashMap::from([("owner".to_string(), "bi".to_string())]),
            ..Default::default()
        };
        let altered = store.alter_database("hive", &Id::named("sales"), changes).unwrap();
        assert_eq!(altered.parameters.get("owner").map(String::as_str), Some("bi"));
        assert_eq!(altered.system_parameters, created.system_parameters);
        assert_eq!(altered.location, created.location);
        assert_eq!(altered.id, created.id);
        assert_eq!(altered.seq_id, created.seq_id);

        // Persisted.
        assert_eq!(store.get_database("hive", &Id::named("sales")).unwrap(), altered);

        let changes = Database {
            location: "s3://elsewhere".to_string(),
            ..Default::default()
        };
        let altered = store.alter_database("hive", &Id::named("sales"), changes).unwrap();
        assert_eq!(altered.location, "s3://elsewhere");
        assert!(altered.parameters.is_empty());
    }

    #[test]
    fn test_drop() {
        let store = MetaStore::open_memory().unwrap();
        let created = store.create_database("hive", database("sales")).unwrap();
        store.create_database("hive", database("hr")).unwrap();

        store
            .drop_database("hive", &Id::with_id(&created.id.unwrap().id))
            .unwrap();
        assert!(store.get_database("hive", &Id::named("sales")).unwrap_err().is_not_found());
        assert_eq!(list(&store, &ListDatabasesOptions::default()).len(), 1);

        assert!(store.drop_database("hive", &Id::named("sales")).unwrap_err().is_not_found());

        // The name is free again and the sequence keeps counting.
        let again = store.create_database("hive", database("sales")).unwrap();
        assert_eq!(again.seq_id, 3);
    }

    #[test]
    fn test_undecodable_database() {
        let store = MetaStore::open_memory().unwrap();
        store.create_database("hive", database("a")).unwrap();
        let broken = store.create_database("hive", database("b")).unwrap();
        store.create_database("hive", database("c")).unwrap();

        let id = broken.id.unwrap().id;
        store
            .update(|tx| tx.put(&Level::catalog("hive").by_id, id.as_bytes(), &[0xFF, 0xFF, 0xFF]))
            .unwrap();

        let names: Vec<String> = list(&store, &ListDatabasesOptions::default())
            .into_iter()
            .map(|db| db.id.unwrap().name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);

        let err = store.get_database("hive", &Id::named("b")).unwrap_err();
        assert!(matches!(err, MetastoreError::Corruption(_)));
        let err = store.get_database("hive", &Id::with_id(&id)).unwrap_err();
        assert!(matches!(err, MetastoreError::Corruption(_)));
    }
}
