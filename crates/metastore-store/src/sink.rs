//! Destinations for streamed records.
//!
//! List operations push records into a [`RecordSink`] one at a time while
//! holding a read transaction. The sink decides where records go (a
//! channel feeding an RPC stream, a vector in tests); an error returned by
//! the sink stops the enumeration and is returned by the list operation.

use metastore_common::error::MetastoreResult;

/// Receives records produced by a list operation.
pub trait RecordSink<T> {
    /// Accepts one record.
    fn send(&mut self, record: T) -> MetastoreResult<()>;
}

impl<T, F> RecordSink<T> for F
where
    F: FnMut(T) -> MetastoreResult<()>,
{
    fn send(&mut self, record: T) -> MetastoreResult<()> {
        self(record)
    }
}

/// Collects records into a vector.
#[derive(Debug)]
pub struct VecSink<T> {
    records: Vec<T>,
}

impl<T> VecSink<T> {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Returns the collected records.
    pub fn into_inner(self) -> Vec<T> {
        self.records
    }
}

impl<T> Default for VecSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordSink<T> for VecSink<T> {
    fn send(&mut self, record: T) -> MetastoreResult<()> {
        self.records.push(record);
        Ok(())
    }
}
