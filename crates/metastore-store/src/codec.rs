//! Record encoding.
//!
//! Records are stored in their protobuf wire form so that the persisted
//! catalog stays readable by any client that speaks the protocol.

use std::fmt::Display;

use prost::Message;

use metastore_common::error::{MetastoreError, MetastoreResult};

/// Encodes a record.
pub fn encode<M: Message>(record: &M) -> MetastoreResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(record.encoded_len());
    record.encode(&mut buf)?;
    Ok(buf)
}

/// Decodes a record referenced by an index.
///
/// Undecodable bytes behind an index entry are reported as corruption.
pub fn decode<M: Message + Default>(bytes: &[u8], what: impl Display) -> MetastoreResult<M> {
    M::decode(bytes)
        .map_err(|e| MetastoreError::corruption(format!("failed to decode {what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metastore_proto::{Database, Id};

    #[test]
    fn test_decode_garbage_is_corruption() {
        let err = decode::<Database>(&[0xFF, 0xFF, 0xFF], "database X").unwrap_err();
        assert!(matches!(err, MetastoreError::Corruption(_)));
        assert!(err.to_string().contains("database X"));
    }

    #[test]
    fn test_encoded_record_reads_back() {
        let db = Database {
            id: Some(Id::named("sales")),
            location: "s3://warehouse/sales".to_string(),
            seq_id: 7,
            ..Default::default()
        };
        let bytes = encode(&db).unwrap();
        let back: Database = decode(&bytes, "database sales").unwrap();
        assert_eq!(back, db);
    }
}
