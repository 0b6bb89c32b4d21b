//! Output formatting for catalog records.
//!
//! Supports table and JSON output.

use std::collections::HashMap;

use comfy_table::{Cell, ContentArrangement, Table as TextTable};
use serde::Serialize;

use metastore_proto::{Database, Partition, Table, TableType};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Formatted table output.
    Table,
    /// JSON output.
    Json,
}

/// A record that can be shown as one table row.
pub trait Row: Serialize {
    /// Column names.
    fn headers() -> &'static [&'static str];
    /// Cell values, in header order.
    fn cells(&self) -> Vec<String>;
}

fn id_name(id: Option<&metastore_proto::Id>) -> (String, String) {
    id.map(|id| (id.name.clone(), id.id.clone()))
        .unwrap_or_default()
}

fn join_params(params: &HashMap<String, String>) -> String {
    let mut pairs: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join(", ")
}

impl Row for Database {
    fn headers() -> &'static [&'static str] {
        &["name", "id", "seq", "location", "parameters"]
    }

    fn cells(&self) -> Vec<String> {
        let (name, id) = id_name(self.id.as_ref());
        let mut params = self.parameters.clone();
        params.extend(self.system_parameters.clone());
        vec![
            name,
            id,
            self.seq_id.to_string(),
            self.location.clone(),
            join_params(&params),
        ]
    }
}

fn table_type_name(table_type: TableType) -> &'static str {
    match table_type {
        TableType::TtypeManaged => "MANAGED",
        TableType::TtypeExternal => "EXTERNAL",
        TableType::TtypeIndex => "INDEX",
    }
}

impl Row for Table {
    fn headers() -> &'static [&'static str] {
        &["name", "id", "seq", "type", "location", "partition keys"]
    }

    fn cells(&self) -> Vec<String> {
        let (name, id) = id_name(self.id.as_ref());
        let keys: Vec<String> = self
            .partition_keys
            .iter()
            .map(|k| format!("{}:{}", k.name, k.r#type))
            .collect();
        vec![
            name,
            id,
            self.seq_id.to_string(),
            table_type_name(self.table_type()).to_string(),
            self.location.clone(),
            keys.join(", "),
        ]
    }
}

impl Row for Partition {
    fn headers() -> &'static [&'static str] {
        &["values", "seq", "location", "parameters"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.values.join("/"),
            self.seq_id.to_string(),
            self.location.clone(),
            join_params(&self.parameters),
        ]
    }
}

/// Formats records according to the specified format.
pub fn format_records<R: Row>(records: &[R], format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_table(records),
        OutputFormat::Json => format_json(records),
    }
}

/// Formats the records as a table.
fn format_table<R: Row>(records: &[R]) -> String {
    let mut table = TextTable::new();

    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    table.set_header(R::headers().iter().map(|h| Cell::new(h)));
    for record in records {
        table.add_row(record.cells().into_iter().map(Cell::new));
    }

    table.to_string()
}

/// Formats the records as JSON.
fn format_json<R: Row>(records: &[R]) -> String {
    serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string())
}
