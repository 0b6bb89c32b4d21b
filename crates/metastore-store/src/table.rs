//! Table operations.

use metastore_common::error::{MetastoreError, MetastoreResult};
use metastore_common::types::new_identifier;
use metastore_proto::{Id, Table};

use crate::bucket::{self, Level};
use crate::codec;
use crate::projection;
use crate::sink::RecordSink;
use crate::store::MetaStore;
use crate::txn::RegionRead;
use crate::validate;

fn read_table<R: RegionRead + ?Sized>(
    tx: &R,
    level: &Level,
    ident: &Id,
) -> MetastoreResult<(String, Table)> {
    let id = bucket::resolve_id(tx, level, ident, "table")?;
    let data = bucket::read_record(tx, level, ident, &id, "table")?;
    let table = codec::decode(&data, format_args!("table {id}"))?;
    Ok((id, table))
}

impl MetaStore {
    /// Creates a table in an existing database.
    ///
    /// The table's partition region is created with its first partition.
    pub fn create_table(&self, catalog: &str, db: &Id, mut table: Table) -> MetastoreResult<Table> {
        validate::catalog(catalog)?;
        validate::identity(db, "database")?;
        let name = validate::name(table.id.as_ref(), "table")?;
        let id = new_identifier();
        table.id = Some(Id {
            name: name.clone(),
            id: id.clone(),
        });

        let table = self.update(|tx| {
            let level = bucket::open_database(tx, catalog, db)?;
            if tx.get(&level.by_name, name.as_bytes())?.is_some() {
                return Err(MetastoreError::already_exists(format!(
                    "table {catalog}:{}.{name} already exists",
                    bucket::describe(db)
                )));
            }
            tx.put(&level.by_name, name.as_bytes(), id.as_bytes())?;
            table.seq_id = tx.next_sequence(&level.root)?;
            tx.put(&level.by_id, id.as_bytes(), &codec::encode(&table)?)?;
            Ok(table)
        })?;

        tracing::info!(
            "Created table {}:{}.{} id={} seq={}",
            catalog,
            bucket::describe(db),
            name,
            id,
            table.seq_id
        );
        Ok(table)
    }

    /// Returns a table by name or id.
    pub fn get_table(&self, catalog: &str, db: &Id, ident: &Id) -> MetastoreResult<Table> {
        validate::catalog(catalog)?;
        validate::identity(db, "database")?;
        validate::identity(ident, "table")?;
        self.view(|tx| {
            let level = bucket::open_database(tx, catalog, db)?;
            read_table(tx, &level, ident).map(|(_, table)| table)
        })
    }

    /// Streams every table of a database in id order.
    ///
    /// Records that fail to decode are skipped.
    pub fn list_tables<S: RecordSink<Table>>(
        &self,
        catalog: &str,
        db: &Id,
        fields: &[String],
        sink: &mut S,
    ) -> MetastoreResult<()> {
        validate::catalog(catalog)?;
        validate::identity(db, "database")?;
        self.view(|tx| {
            let level = bucket::open_database(tx, catalog, db)?;
            tx.for_each(&level.by_id, &mut |key, value| {
                match codec::decode::<Table>(value, "table") {
                    Ok(table) => sink.send(projection::project(table, fields, &[])),
                    Err(e) => {
                        tracing::warn!("Skipping table {}: {}", String::from_utf8_lossy(key), e);
                        Ok(())
                    }
                }
            })
        })
    }

    /// Drops a table with all its partitions.
    pub fn drop_table(&self, catalog: &str, db: &Id, ident: &Id) -> MetastoreResult<()> {
        validate::catalog(catalog)?;
        validate::identity(db, "database")?;
        validate::identity(ident, "table")?;

        let (id, name) = self.update(|tx| {
            let level = bucket::open_database(tx, catalog, db)?;
            let (id, table) = read_table(tx, &level, ident)?;
            let name = table.id.map(|i| i.name).unwrap_or_default();

            tx.delete(&level.by_name, name.as_bytes())?;
            tx.delete(&level.by_id, id.as_bytes())?;
            let removed = tx.delete_region(&level.child(&id))?;
            tracing::debug!("Dropped {} partitions of table {}", removed, id);
            Ok((id, name))
        })?;

        tracing::info!(
            "Dropped table {}:{}.{} id={}",
            catalog,
            bucket::describe(db),
            name,
            id
        );
        Ok(())
    }
}
