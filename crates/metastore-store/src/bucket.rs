//! Bucket path resolution.
//!
//! The catalog is a tree of regions ("buckets") addressed by a path of
//! string segments. This module names the fixed parts of that tree and
//! resolves an entity identity (`{name, id}`) to the region holding its
//! children.
//!
//! ```text
//! <catalog>                        sequence: databases
//!   BYNAME / BYID / DB
//!                    <db id>       sequence: tables
//!                      BYNAME / BYID / TBLS
//!                                        <table id>   sequence: partitions
//! ```
//!
//! Nothing here commits or aborts: every function runs inside a transaction
//! owned by the caller, and paths are resolved afresh in each transaction.

use std::fmt;

use metastore_common::constants::{BY_ID, BY_NAME, DATABASES, TABLES};
use metastore_common::error::{MetastoreError, MetastoreResult};
use metastore_proto::{Id, Table};

use crate::codec;
use crate::txn::{RegionRead, WriteTx};

/// Marks a path segment in an encoded key.
const SEGMENT_TAG: u8 = 0x00;
/// Marks the start of an entry key inside a region.
const ENTRY_TAG: u8 = 0x01;

/// Path of a region, from the catalog root down.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketPath {
    segments: Vec<String>,
}

impl BucketPath {
    /// Creates the root path of a catalog.
    pub fn root(catalog: &str) -> Self {
        Self {
            segments: vec![catalog.to_string()],
        }
    }

    /// Returns the path of a child region.
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    /// Returns the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Encodes the path as a storage key prefix.
    ///
    /// Each segment is written as a tag byte, a big-endian length and the
    /// segment bytes, so the encoding of a path is a prefix of the encoding
    /// of every descendant and of nothing else.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let len: usize = self.segments.iter().map(|s| s.len() + 5).sum();
        let mut buf = Vec::with_capacity(len + 1);
        for segment in &self.segments {
            buf.push(SEGMENT_TAG);
            buf.extend_from_slice(&(segment.len() as u32).to_be_bytes());
            buf.extend_from_slice(segment.as_bytes());
        }
        buf
    }

    /// Prefix shared by all entries stored directly in this region.
    pub(crate) fn entry_prefix(&self) -> Vec<u8> {
        let mut buf = self.encode();
        buf.push(ENTRY_TAG);
        buf
    }

    /// Storage key of one entry in this region.
    pub(crate) fn entry_key(&self, key: &[u8]) -> Vec<u8> {
        let mut buf = self.entry_prefix();
        buf.extend_from_slice(key);
        buf
    }
}

impl fmt::Display for BucketPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Returns the smallest key greater than every key starting with `prefix`,
/// or `None` if no such key exists.
pub(crate) fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// One level of the hierarchy: a region with a name index, an id index and
/// a region holding one child region per entity.
#[derive(Debug, Clone)]
pub(crate) struct Level {
    /// The region itself. Its sequence numbers the entities of this level.
    pub root: BucketPath,
    /// `name -> id`.
    pub by_name: BucketPath,
    /// `id -> record`.
    pub by_id: BucketPath,
    /// Parent of the per-entity child regions.
    pub children: BucketPath,
}

impl Level {
    fn new(root: BucketPath, children: &str) -> Self {
        Self {
            by_name: root.child(BY_NAME),
            by_id: root.child(BY_ID),
            children: root.child(children),
            root,
        }
    }

    /// Catalog level: indexes databases.
    pub fn catalog(catalog: &str) -> Self {
        Self::new(BucketPath::root(catalog), DATABASES)
    }

    /// Database level: indexes tables.
    pub fn database(catalog: &str, db_id: &str) -> Self {
        Self::new(Self::catalog(catalog).children.child(db_id), TABLES)
    }

    /// Region owned by the child entity with the given id.
    pub fn child(&self, id: &str) -> BucketPath {
        self.children.child(id)
    }

    fn regions(&self) -> [&BucketPath; 4] {
        [&self.root, &self.by_name, &self.by_id, &self.children]
    }
}

/// A resolved table: its database level and its generated id.
#[derive(Debug, Clone)]
pub(crate) struct TableRef {
    pub db: Level,
    pub id: String,
}

impl TableRef {
    /// Region holding the table's partitions. Created on first write.
    pub fn partitions(&self) -> BucketPath {
        self.db.child(&self.id)
    }
}

/// Human-readable form of an identity for messages.
pub(crate) fn describe(ident: &Id) -> &str {
    if ident.name.is_empty() {
        &ident.id
    } else {
        &ident.name
    }
}

fn check_layout<R: RegionRead + ?Sized>(tx: &R, level: &Level) -> MetastoreResult<()> {
    for region in level.regions().into_iter().skip(1) {
        if !tx.region_exists(region)? {
            return Err(MetastoreError::corruption(format!(
                "missing region {region}"
            )));
        }
    }
    Ok(())
}

/// Opens an existing catalog; NotFound if it was never created.
pub(crate) fn open_catalog<R: RegionRead + ?Sized>(
    tx: &R,
    catalog: &str,
) -> MetastoreResult<Level> {
    let level = Level::catalog(catalog);
    if !tx.region_exists(&level.root)? {
        return Err(MetastoreError::not_found(format!(
            "catalog {catalog} doesn't exist"
        )));
    }
    check_layout(tx, &level)?;
    Ok(level)
}

/// Opens a catalog, creating its regions when missing.
pub(crate) fn create_catalog(tx: &mut WriteTx<'_>, catalog: &str) -> MetastoreResult<Level> {
    let level = Level::catalog(catalog);
    for region in level.regions() {
        tx.create_region(region)?;
    }
    Ok(level)
}

/// Resolves an identity to a generated id within `level`.
///
/// A supplied id is used as is; otherwise the name is looked up in the
/// level's name index.
pub(crate) fn resolve_id<R: RegionRead + ?Sized>(
    tx: &R,
    level: &Level,
    ident: &Id,
    kind: &str,
) -> MetastoreResult<String> {
    if !ident.id.is_empty() {
        return Ok(ident.id.clone());
    }
    let id = tx
        .get(&level.by_name, ident.name.as_bytes())?
        .ok_or_else(|| MetastoreError::not_found(format!("{kind} {} doesn't exist", ident.name)))?;
    String::from_utf8(id).map_err(|_| {
        MetastoreError::corruption(format!("{kind} {}: malformed id in name index", ident.name))
    })
}

/// Reads the raw record of `id` from the level's id index.
///
/// A record the name index pointed at but which is missing is corruption;
/// a caller-supplied id that is missing simply does not exist.
pub(crate) fn read_record<R: RegionRead + ?Sized>(
    tx: &R,
    level: &Level,
    ident: &Id,
    id: &str,
    kind: &str,
) -> MetastoreResult<Vec<u8>> {
    match tx.get(&level.by_id, id.as_bytes())? {
        Some(data) => Ok(data),
        None if ident.id.is_empty() => Err(MetastoreError::corruption(format!(
            "missing {kind} {id}"
        ))),
        None => Err(MetastoreError::not_found(format!(
            "{kind} {} doesn't exist",
            describe(ident)
        ))),
    }
}

/// Opens an existing database and returns its level.
pub(crate) fn open_database<R: RegionRead + ?Sized>(
    tx: &R,
    catalog: &str,
    db: &Id,
) -> MetastoreResult<Level> {
    let cat = open_catalog(tx, catalog)?;
    let id = resolve_id(tx, &cat, db, "database")?;
    let level = Level::database(catalog, &id);
    if !tx.region_exists(&level.root)? {
        return Err(MetastoreError::not_found(format!(
            "database {} doesn't exist",
            describe(db)
        )));
    }
    check_layout(tx, &level)?;
    Ok(level)
}

/// Creates the regions of a new database.
pub(crate) fn create_database_regions(
    tx: &mut WriteTx<'_>,
    catalog: &str,
    db_id: &str,
) -> MetastoreResult<Level> {
    let level = Level::database(catalog, db_id);
    for region in level.regions() {
        tx.create_region(region)?;
    }
    Ok(level)
}

/// Resolves an existing table inside an existing database.
pub(crate) fn open_table<R: RegionRead + ?Sized>(
    tx: &R,
    catalog: &str,
    db: &Id,
    table: &Id,
) -> MetastoreResult<TableRef> {
    let level = open_database(tx, catalog, db)?;
    let id = resolve_id(tx, &level, table, "table")?;
    if tx.get(&level.by_id, id.as_bytes())?.is_none() {
        return Err(if table.id.is_empty() {
            MetastoreError::corruption(format!("missing table {id}"))
        } else {
            MetastoreError::not_found(format!(
                "table {catalog}:{}.{} does not exist",
                describe(db),
                describe(table)
            ))
        });
    }
    Ok(TableRef { db: level, id })
}

/// Re-reads the table record behind a resolved reference.
pub(crate) fn read_table<R: RegionRead + ?Sized>(tx: &R, table: &TableRef) -> MetastoreResult<Table> {
    let data = tx
        .get(&table.db.by_id, table.id.as_bytes())?
        .ok_or_else(|| MetastoreError::corruption(format!("missing table {}", table.id)))?;
    codec::decode(&data, format_args!("table {}", table.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        let path = BucketPath::root("hive").child(DATABASES).child("01ABC");
        assert_eq!(path.to_string(), "hive/DB/01ABC");
        assert_eq!(path.segments().len(), 3);
    }

    #[test]
    fn test_encoding_is_prefix_of_descendants_only() {
        let parent = BucketPath::root("hive").child("a");
        let child = parent.child("x");
        let sibling = BucketPath::root("hive").child("ab");

        assert!(child.encode().starts_with(&parent.encode()));
        assert!(parent.entry_key(b"k").starts_with(&parent.encode()));
        assert!(!sibling.encode().starts_with(&parent.encode()));
        // Entries of a region never look like child regions.
        assert!(!child.encode().starts_with(&parent.entry_prefix()));
    }

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_end(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_end(&[]), None);
    }

    #[test]
    fn test_level_layout() {
        let cat = Level::catalog("hive");
        assert_eq!(cat.by_name.to_string(), "hive/BYNAME");
        assert_eq!(cat.by_id.to_string(), "hive/BYID");
        assert_eq!(cat.child("D1").to_string(), "hive/DB/D1");

        let db = Level::database("hive", "D1");
        assert_eq!(db.root.to_string(), "hive/DB/D1");
        assert_eq!(db.by_name.to_string(), "hive/DB/D1/BYNAME");
        assert_eq!(db.child("T1").to_string(), "hive/DB/D1/TBLS/T1");
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&Id::named("sales")), "sales");
        assert_eq!(describe(&Id::with_id("01H")), "01H");
    }
}
