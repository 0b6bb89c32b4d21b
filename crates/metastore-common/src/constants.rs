//! System-wide constants for the metastore.
//!
//! The on-disk layout is a tree of regions. These are the fixed segment
//! names used inside it:
//!
//! ```text
//! <catalog>
//!   BYNAME   name -> database id
//!   BYID     database id -> Database
//!   DB
//!     <database id>
//!       BYNAME   name -> table id
//!       BYID     table id -> Table
//!       TBLS
//!         <table id>
//!           "v1/v2/..." -> Partition
//! ```

// =============================================================================
// Region names
// =============================================================================

/// Name index: human-readable name -> generated id.
pub const BY_NAME: &str = "BYNAME";

/// Id index: generated id -> encoded record.
pub const BY_ID: &str = "BYID";

/// Per-catalog region holding one child region per database.
pub const DATABASES: &str = "DB";

/// Per-database region holding one partition region per table.
pub const TABLES: &str = "TBLS";

// =============================================================================
// Keys
// =============================================================================

/// Separator used to join partition values into the composite storage key.
pub const PARTITION_KEY_SEPARATOR: &str = "/";

// =============================================================================
// Server defaults
// =============================================================================

/// Default gRPC port.
pub const DEFAULT_PORT: u16 = 10010;

/// Default storage file name.
pub const DEFAULT_DB_FILE: &str = "hms2.db";

/// Default number of records buffered between a list scan and its RPC stream.
pub const DEFAULT_STREAM_BUFFER: usize = 64;
