//! Field projection for read responses.
//!
//! Each record kind declares a table of field paths, and for every path a
//! pair of accessors: one copying the field from a source record into a
//! destination record, one clearing it in place. Allow-lists build a fresh
//! record from the selected copies; exclude-lists clear fields of an
//! existing record. Unknown paths are ignored.
//!
//! | Kind      | Paths                                                     |
//! |-----------|-----------------------------------------------------------|
//! | Database  | `id`, `id.name`, `location`, `parameters`                 |
//! | Table     | `id`, `id.name`, `location`, `parameters`,                |
//! |           | `partitionKeys`, `sd`, `tableType`                        |
//! | Partition | `location`, `parameters`, `values`, `sd`, `sd.parameters`,|
//! |           | `sd.serdeinfo`, `sd.serdeinfo.parameters`, `table`        |
//!
//! For databases and tables `parameters` covers both the user and the
//! system parameter maps.

use metastore_proto::{Database, Id, Partition, SerDeInfo, StorageDescriptor, Table};

/// Accessor pair for one field path.
pub struct Field<T> {
    /// Dotted path as it appears in requests.
    pub path: &'static str,
    /// Copies the field from the first record into the second.
    pub copy: fn(&T, &mut T),
    /// Resets the field to its default.
    pub clear: fn(&mut T),
}

/// A record kind that supports projection.
pub trait Projectable: Default + Sized + 'static {
    /// The field table of this kind.
    fn fields() -> &'static [Field<Self>];

    /// Looks up a field by path.
    fn field(path: &str) -> Option<&'static Field<Self>> {
        Self::fields().iter().find(|f| f.path == path)
    }
}

/// Builds a record holding only the listed fields of `record`.
pub fn select<T: Projectable>(record: &T, fields: &[String]) -> T {
    let mut out = T::default();
    for path in fields {
        if let Some(field) = T::field(path) {
            (field.copy)(record, &mut out);
        }
    }
    out
}

/// Clears the listed fields of `record`.
pub fn exclude<T: Projectable>(record: &mut T, fields: &[String]) {
    for path in fields {
        if let Some(field) = T::field(path) {
            (field.clear)(record);
        }
    }
}

/// Applies an allow-list (when non-empty), then an exclude-list.
pub fn project<T: Projectable>(record: T, fields: &[String], excluded: &[String]) -> T {
    let mut out = if fields.is_empty() {
        record
    } else {
        select(&record, fields)
    };
    exclude(&mut out, excluded);
    out
}

/// Returns true if `path` survives both lists.
pub fn admits(fields: &[String], excluded: &[String], path: &str) -> bool {
    (fields.is_empty() || fields.iter().any(|f| f == path)) && !excluded.iter().any(|f| f == path)
}

macro_rules! field {
    ($path:literal, $member:ident) => {
        Field {
            path: $path,
            copy: |src, dst| dst.$member = src.$member.clone(),
            clear: |rec| rec.$member = Default::default(),
        }
    };
}

fn copy_id_name(src: &Option<Id>, dst: &mut Option<Id>) {
    let name = src.as_ref().map(|id| id.name.clone()).unwrap_or_default();
    dst.get_or_insert_with(Id::default).name = name;
}

fn clear_id_name(id: &mut Option<Id>) {
    if let Some(id) = id.as_mut() {
        id.name.clear();
    }
}

fn sd_mut(sd: &mut Option<StorageDescriptor>) -> &mut StorageDescriptor {
    sd.get_or_insert_with(StorageDescriptor::default)
}

fn serde_mut(sd: &mut Option<StorageDescriptor>) -> &mut SerDeInfo {
    sd_mut(sd).serde_info.get_or_insert_with(SerDeInfo::default)
}

static DATABASE_FIELDS: &[Field<Database>] = &[
    field!("id", id),
    Field {
        path: "id.name",
        copy: |src, dst| copy_id_name(&src.id, &mut dst.id),
        clear: |rec| clear_id_name(&mut rec.id),
    },
    field!("location", location),
    Field {
        path: "parameters",
        copy: |src, dst| {
            dst.parameters = src.parameters.clone();
            dst.system_parameters = src.system_parameters.clone();
        },
        clear: |rec| {
            rec.parameters.clear();
            rec.system_parameters.clear();
        },
    },
];

impl Projectable for Database {
    fn fields() -> &'static [Field<Self>] {
        DATABASE_FIELDS
    }
}

static TABLE_FIELDS: &[Field<Table>] = &[
    field!("id", id),
    Field {
        path: "id.name",
        copy: |src, dst| copy_id_name(&src.id, &mut dst.id),
        clear: |rec| clear_id_name(&mut rec.id),
    },
    field!("location", location),
    Field {
        path: "parameters",
        copy: |src, dst| {
            dst.parameters = src.parameters.clone();
            dst.system_parameters = src.system_parameters.clone();
        },
        clear: |rec| {
            rec.parameters.clear();
            rec.system_parameters.clear();
        },
    },
    field!("partitionKeys", partition_keys),
    field!("sd", sd),
    field!("tableType", table_type),
];

impl Projectable for Table {
    fn fields() -> &'static [Field<Self>] {
        TABLE_FIELDS
    }
}

static PARTITION_FIELDS: &[Field<Partition>] = &[
    field!("location", location),
    field!("parameters", parameters),
    field!("values", values),
    field!("sd", sd),
    Field {
        path: "sd.parameters",
        copy: |src, dst| {
            if let Some(sd) = &src.sd {
                sd_mut(&mut dst.sd).parameters = sd.parameters.clone();
            }
        },
        clear: |rec| {
            if let Some(sd) = rec.sd.as_mut() {
                sd.parameters.clear();
            }
        },
    },
    Field {
        path: "sd.serdeinfo",
        copy: |src, dst| {
            if let Some(sd) = &src.sd {
                sd_mut(&mut dst.sd).serde_info = sd.serde_info.clone();
            }
        },
        clear: |rec| {
            if let Some(sd) = rec.sd.as_mut() {
                sd.serde_info = None;
            }
        },
    },
    Field {
        path: "sd.serdeinfo.parameters",
        copy: |src, dst| {
            if let Some(serde) = src.sd.as_ref().and_then(|sd| sd.serde_info.as_ref()) {
                serde_mut(&mut dst.sd).parameters = serde.parameters.clone();
            }
        },
        clear: |rec| {
            if let Some(serde) = rec.sd.as_mut().and_then(|sd| sd.serde_info.as_mut()) {
                serde.parameters.clear();
            }
        },
    },
    field!("table", table),
];

impl Projectable for Partition {
    fn fields() -> &'static [Field<Self>] {
        PARTITION_FIELDS
    }
}
