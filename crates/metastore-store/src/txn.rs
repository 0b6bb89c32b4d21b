//! Transactions over the region tree.
//!
//! All regions live in two redb tables:
//!
//! ```text
//! regions:  encode(path)                 -> sequence counter
//! entries:  encode(path) 0x01 key        -> value
//! ```
//!
//! A region exists iff its row in `regions` exists. Because the encoding of
//! a path prefixes the encoding of every descendant, a whole subtree can be
//! removed with two range scans.
//!
//! [`ReadTx`] and [`WriteTx`] both implement [`RegionRead`], so lookup code
//! is written once and runs in either kind of transaction.

use redb::{ReadOnlyTable, ReadTransaction, ReadableTable, Table, TableDefinition, WriteTransaction};

use metastore_common::error::{MetastoreError, MetastoreResult};

use crate::bucket::{prefix_end, BucketPath};

/// Region rows, keyed by encoded path. Value is the region's sequence.
pub(crate) const REGIONS: TableDefinition<&[u8], u64> = TableDefinition::new("regions");

/// Entry rows, keyed by encoded path, tag and entry key.
pub(crate) const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");

/// Callback invoked for every entry of a region, with the entry key
/// relative to the region.
pub type EntryVisitor<'a> = dyn FnMut(&[u8], &[u8]) -> MetastoreResult<()> + 'a;

/// Read access to regions and their entries.
pub trait RegionRead {
    /// Returns true if the region exists.
    fn region_exists(&self, path: &BucketPath) -> MetastoreResult<bool>;

    /// Returns the value stored under `key` in the region.
    fn get(&self, path: &BucketPath, key: &[u8]) -> MetastoreResult<Option<Vec<u8>>>;

    /// Visits every entry stored directly in the region, in key order.
    ///
    /// Entries of child regions are not visited. An error returned by the
    /// visitor stops the scan and is returned.
    fn for_each(&self, path: &BucketPath, visit: &mut EntryVisitor<'_>) -> MetastoreResult<()>;
}

fn region_exists_in<T>(regions: &T, path: &BucketPath) -> MetastoreResult<bool>
where
    T: ReadableTable<&'static [u8], u64>,
{
    let key = path.encode();
    Ok(regions.get(key.as_slice())?.is_some())
}

fn get_in<T>(entries: &T, path: &BucketPath, key: &[u8]) -> MetastoreResult<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let key = path.entry_key(key);
    Ok(entries
        .get(key.as_slice())?
        .map(|value| value.value().to_vec()))
}

fn for_each_in<T>(entries: &T, path: &BucketPath, visit: &mut EntryVisitor<'_>) -> MetastoreResult<()>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let prefix = path.entry_prefix();
    let range = match prefix_end(&prefix) {
        Some(end) => entries.range(prefix.as_slice()..end.as_slice())?,
        None => entries.range(prefix.as_slice()..)?,
    };
    for item in range {
        let (key, value) = item?;
        visit(&key.value()[prefix.len()..], value.value())?;
    }
    Ok(())
}

fn keys_with_prefix<T, V>(table: &T, prefix: &[u8]) -> MetastoreResult<Vec<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], V>,
    V: redb::Value + 'static,
{
    let range = match prefix_end(prefix) {
        Some(end) => table.range(prefix..end.as_slice())?,
        None => table.range(prefix..)?,
    };
    let mut keys = Vec::new();
    for item in range {
        let (key, _) = item?;
        keys.push(key.value().to_vec());
    }
    Ok(keys)
}

/// A read-only snapshot of the catalog.
pub struct ReadTx {
    regions: ReadOnlyTable<&'static [u8], u64>,
    entries: ReadOnlyTable<&'static [u8], &'static [u8]>,
    _txn: ReadTransaction,
}

impl ReadTx {
    pub(crate) fn open(txn: ReadTransaction) -> MetastoreResult<Self> {
        Ok(Self {
            regions: txn.open_table(REGIONS)?,
            entries: txn.open_table(ENTRIES)?,
            _txn: txn,
        })
    }
}

impl RegionRead for ReadTx {
    fn region_exists(&self, path: &BucketPath) -> MetastoreResult<bool> {
        region_exists_in(&self.regions, path)
    }

    fn get(&self, path: &BucketPath, key: &[u8]) -> MetastoreResult<Option<Vec<u8>>> {
        get_in(&self.entries, path, key)
    }

    fn for_each(&self, path: &BucketPath, visit: &mut EntryVisitor<'_>) -> MetastoreResult<()> {
        for_each_in(&self.entries, path, visit)
    }
}

/// The single open write transaction.
pub struct WriteTx<'txn> {
    regions: Table<'txn, &'static [u8], u64>,
    entries: Table<'txn, &'static [u8], &'static [u8]>,
}

impl<'txn> WriteTx<'txn> {
    pub(crate) fn open(txn: &'txn WriteTransaction) -> MetastoreResult<Self> {
        Ok(Self {
            regions: txn.open_table(REGIONS)?,
            entries: txn.open_table(ENTRIES)?,
        })
    }

    /// Creates the region if it does not exist yet.
    pub fn create_region(&mut self, path: &BucketPath) -> MetastoreResult<()> {
        if !self.region_exists(path)? {
            let key = path.encode();
            self.regions.insert(key.as_slice(), 0u64)?;
        }
        Ok(())
    }

    /// Advances the region's sequence and returns the new value.
    ///
    /// Sequences start at 1 and are never handed out twice for the same
    /// region, even when the entry that consumed one is later deleted.
    pub fn next_sequence(&mut self, path: &BucketPath) -> MetastoreResult<u64> {
        let key = path.encode();
        let current = self
            .regions
            .get(key.as_slice())?
            .map(|value| value.value())
            .ok_or_else(|| MetastoreError::corruption(format!("missing region {path}")))?;
        let next = current + 1;
        self.regions.insert(key.as_slice(), next)?;
        Ok(next)
    }

    /// Stores `value` under `key` in an existing region.
    pub fn put(&mut self, path: &BucketPath, key: &[u8], value: &[u8]) -> MetastoreResult<()> {
        let key = path.entry_key(key);
        self.entries.insert(key.as_slice(), value)?;
        Ok(())
    }

    /// Removes `key` from the region. Returns true if it was present.
    pub fn delete(&mut self, path: &BucketPath, key: &[u8]) -> MetastoreResult<bool> {
        let key = path.entry_key(key);
        Ok(self.entries.remove(key.as_slice())?.is_some())
    }

    /// Removes the region, its entries and all descendant regions.
    ///
    /// Returns the number of removed entries.
    pub fn delete_region(&mut self, path: &BucketPath) -> MetastoreResult<usize> {
        let prefix = path.encode();

        let entry_keys = keys_with_prefix(&self.entries, &prefix)?;
        for key in &entry_keys {
            self.entries.remove(key.as_slice())?;
        }
        for key in keys_with_prefix(&self.regions, &prefix)? {
            self.regions.remove(key.as_slice())?;
        }
        Ok(entry_keys.len())
    }
}

impl RegionRead for WriteTx<'_> {
    fn region_exists(&self, path: &BucketPath) -> MetastoreResult<bool> {
        region_exists_in(&self.regions, path)
    }

    fn get(&self, path: &BucketPath, key: &[u8]) -> MetastoreResult<Option<Vec<u8>>> {
        get_in(&self.entries, path, key)
    }

    fn for_each(&self, path: &BucketPath, visit: &mut EntryVisitor<'_>) -> MetastoreResult<()> {
        for_each_in(&self.entries, path, visit)
    }
}
