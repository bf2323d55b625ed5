//! litefile reads and writes the SQLite database file format without any database library.
//!
//! The read path finds a table's root page through the schema table on page 1 and decodes the
//! rows of that page. The write path builds a minimal database with one table from scratch.
//! Only tables whose btree is a single leaf page are supported.

pub mod btree;
pub mod builder;
pub mod dbheader;
pub mod error;
pub mod formatting;
pub mod pager;
pub mod record;
pub mod scan;
pub mod schema;
pub mod serial_type;
pub mod sql_value;
pub mod stored_db;
pub mod varint;

pub use builder::{build_minimal_database, build_minimal_database_with, write_database, BuildOptions, TableDef};
pub use error::Error;
pub use scan::{scan_table, Row, TableScan};
pub use schema::{find_table, schema_entries, SchemaEntry};
pub use sql_value::SqlValue;
pub use stored_db::StoredDb;
