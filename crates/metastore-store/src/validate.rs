//! Presence checks run before any transaction is opened.

use metastore_common::constants::PARTITION_KEY_SEPARATOR;
use metastore_common::error::{MetastoreError, MetastoreResult};
use metastore_proto::Id;

pub(crate) fn catalog(catalog: &str) -> MetastoreResult<()> {
    if catalog.is_empty() {
        return Err(MetastoreError::invalid_argument("missing catalog"));
    }
    Ok(())
}

pub(crate) fn identity(ident: &Id, kind: &str) -> MetastoreResult<()> {
    if ident.is_empty() {
        return Err(MetastoreError::invalid_argument(format!(
            "missing {kind} identity"
        )));
    }
    Ok(())
}

/// Returns the name carried by an optional identity.
pub(crate) fn name(ident: Option<&Id>, kind: &str) -> MetastoreResult<String> {
    match ident {
        Some(id) if !id.name.is_empty() => Ok(id.name.clone()),
        _ => Err(MetastoreError::invalid_argument(format!(
            "missing {kind} name"
        ))),
    }
}

/// Builds the storage key of a partition from its values.
///
/// # Example
///
/// ```rust
/// use metastore_store::partition_key;
///
/// let key = partition_key(&["2023".to_string(), "11".to_string()]).unwrap();
/// assert_eq!(key, "2023/11");
/// assert!(partition_key(&[]).is_err());
/// ```
pub fn partition_key(values: &[String]) -> MetastoreResult<String> {
    let key = values.join(PARTITION_KEY_SEPARATOR);
    if key.is_empty() {
        return Err(MetastoreError::invalid_argument("missing partition values"));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_checks() {
        assert!(catalog("hive").is_ok());
        assert!(catalog("").unwrap_err().code() == metastore_common::ErrorCode::InvalidArgument);

        assert!(identity(&Id::named("sales"), "database").is_ok());
        assert!(identity(&Id::with_id("01H"), "database").is_ok());
        assert!(identity(&Id::default(), "database").is_err());

        assert_eq!(name(Some(&Id::named("t")), "table").unwrap(), "t");
        assert!(name(Some(&Id::with_id("01H")), "table").is_err());
        assert!(name(None, "table").is_err());
    }

    #[test]
    fn test_partition_key() {
        let values = vec!["2023".to_string(), "12".to_string()];
        assert_eq!(partition_key(&values).unwrap(), "2023/12");
        assert_eq!(partition_key(&["x".to_string()]).unwrap(), "x");
        assert!(partition_key(&[String::new()]).is_err());
    }
}
