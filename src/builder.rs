//! builder writes a minimal two page database from scratch: a schema page naming one table,
//! and a single leaf page holding that table's rows.
//!
//! The output is a complete file image that stock SQLite can open. Building is deterministic:
//! the same table and rows always give the same bytes.

use tracing::{debug, info};

use crate::btree::page_builder::LeafPageBuilder;
use crate::btree::{self, PageNum};
use crate::dbheader::{self, DbHeader, DB_HEADER_SIZE};
use crate::record;
use crate::schema::SCHEMA_BTREE_ROOT_PAGENUM;
use crate::sql_value::SqlValue;

pub const DEFAULT_PAGE_SIZE: u32 = 1024;

// The only table gets the first page after the schema page.
const DATA_ROOT_PAGENUM: PageNum = 2;
const NUM_PAGES: u32 = 2;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Records need {needed} bytes but the page has room for {available}.")]
    RecordTooLarge { needed: usize, available: usize },
    #[error("Invalid page size: {0}")]
    InvalidPageSize(#[from] dbheader::Error),
    #[error("Laying out page: {0}")]
    Page(btree::Error),
    #[error("Error encoding row {rowid}: {source}")]
    Record {
        rowid: btree::RowId,
        source: record::Error,
    },
    #[error("Error writing database file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<btree::Error> for Error {
    fn from(e: btree::Error) -> Self {
        match e {
            btree::Error::PageFull { needed, available } => {
                Error::RecordTooLarge { needed, available }
            }
            other => Error::Page(other),
        }
    }
}

/// The table the database is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    /// The CREATE TABLE statement stored in the schema row. It is stored as-is and not parsed.
    pub create_sql: String,
}

impl TableDef {
    pub fn new(name: &str, create_sql: &str) -> TableDef {
        TableDef {
            name: name.to_string(),
            create_sql: create_sql.to_string(),
        }
    }
}

/// Options for `build_minimal_database_with`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// A power of two from 512 to 65536.
    pub page_size: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Builds a database holding `table` with `rows`, using the default options.
pub fn build_minimal_database(table: &TableDef, rows: &[Vec<SqlValue>]) -> Result<Vec<u8>, Error> {
    build_minimal_database_with(&BuildOptions::default(), table, rows)
}

/// Builds a database holding `table` with `rows`, which get rowids 1, 2, 3...
pub fn build_minimal_database_with(
    options: &BuildOptions,
    table: &TableDef,
    rows: &[Vec<SqlValue>],
) -> Result<Vec<u8>, Error> {
    let header = DbHeader::new(options.page_size, NUM_PAGES)?;
    let page_size = options.page_size as usize;
    debug!(page_size, table = %table.name, num_rows = rows.len(), "building database");

    // Page 1: database header, then the schema table with one row.
    let schema_row = vec![
        SqlValue::from("table"),
        SqlValue::from(table.name.as_str()),
        SqlValue::from(table.name.as_str()),
        SqlValue::Int(DATA_ROOT_PAGENUM as i64),
        SqlValue::from(table.create_sql.as_str()),
    ];
    let schema_record =
        record::encode_values(&schema_row).map_err(|source| Error::Record { rowid: 1, source })?;
    let mut schema_page = LeafPageBuilder::new(
        page_size,
        btree::btree_start_offset(SCHEMA_BTREE_ROOT_PAGENUM),
    );
    schema_page.push_cell(1, &schema_record)?;
    let mut file = schema_page.finish()?;
    file[..DB_HEADER_SIZE].copy_from_slice(&header.to_bytes()?);

    // Page 2: the table's rows.
    let mut data_page =
        LeafPageBuilder::new(page_size, btree::btree_start_offset(DATA_ROOT_PAGENUM));
    for (rowid, row) in (1..).zip(rows) {
        let rec = record::encode_values(row).map_err(|source| Error::Record { rowid, source })?;
        data_page.push_cell(rowid, &rec)?;
    }
    file.extend(data_page.finish()?);

    debug_assert_eq!(file.len(), page_size * NUM_PAGES as usize);
    Ok(file)
}

/// Writes a built database to `path` with a single write, replacing any existing file.
pub fn write_database(path: impl AsRef<std::path::Path>, bytes: &[u8]) -> Result<(), Error> {
    std::fs::write(path.as_ref(), bytes)?;
    info!(path = %path.as_ref().display(), len = bytes.len(), "wrote database");
    Ok(())
}

#[cfg(test)]
fn mytable() -> TableDef {
    TableDef::new(
        "mytable",
        "CREATE TABLE mytable(id INTEGER PRIMARY KEY, name TEXT)",
    )
}

#[cfg(test)]
fn alice_and_bob() -> Vec<Vec<SqlValue>> {
    vec![
        vec![SqlValue::Int(1), "Alice".into()],
        vec![SqlValue::Int(2), "Bob".into()],
    ]
}

#[test]
fn test_build_is_deterministic() {
    let a = build_minimal_database(&mytable(), &alice_and_bob()).unwrap();
    let b = build_minimal_database(&mytable(), &alice_and_bob()).unwrap();
    assert_eq!(a.len(), 2048);
    assert_eq!(a, b);
}

#[test]
fn test_build_layout() {
    let db = build_minimal_database(&mytable(), &alice_and_bob()).unwrap();
    let header = DbHeader::parse(&db).unwrap();
    assert_eq!(header.page_size, 1024);
    assert_eq!(header.num_pages, 2);
    assert_eq!(header.schema_format, 4);
    // Page 1 btree header: table leaf with one cell.
    assert_eq!(db[100], 0x0d);
    assert_eq!(&db[103..105], &[0x00, 0x01]);
    // Page 2: table leaf with two cells, the first one packed at the very end of the page.
    let p2 = &db[1024..];
    assert_eq!(p2[0], 0x0d);
    assert_eq!(&p2[3..5], &[0x00, 0x02]);
    // Cell for (1, 'Alice'): length 9, rowid 1, header 03 01 17, body 01 "Alice".
    let alice = [0x09, 0x01, 0x03, 0x01, 0x17, 0x01, b'A', b'l', b'i', b'c', b'e'];
    assert_eq!(&p2[1024 - alice.len()..], &alice);
    assert_eq!(&p2[8..10], &((1024 - alice.len()) as u16).to_be_bytes());
}

#[test]
fn test_empty_table() {
    let db = build_minimal_database(&mytable(), &[]).unwrap();
    assert_eq!(&db[1024..1032], &[0x0d, 0, 0, 0, 0, 0x04, 0x00, 0]);
}

#[test]
fn test_page_size_option() {
    let options = BuildOptions { page_size: 4096 };
    let db = build_minimal_database_with(&options, &mytable(), &alice_and_bob()).unwrap();
    assert_eq!(db.len(), 8192);
    assert_eq!(DbHeader::parse(&db).unwrap().page_size, 4096);
    assert!(matches!(
        build_minimal_database_with(&BuildOptions { page_size: 1000 }, &mytable(), &[]),
        Err(Error::InvalidPageSize(dbheader::Error::InvalidPageSize(1000)))
    ));
}

#[test]
fn test_record_too_large() {
    let big = "x".repeat(1000);
    let rows = vec![vec![SqlValue::Int(1), big.as_str().into()]];
    assert!(matches!(
        build_minimal_database(&mytable(), &rows),
        Err(Error::RecordTooLarge { available: 989, .. })
    ));
    // Each row fits, but together they do not.
    let medium = "y".repeat(400);
    let rows: Vec<Vec<SqlValue>> = (1..=3)
        .map(|i| vec![SqlValue::Int(i), medium.as_str().into()])
        .collect();
    assert!(matches!(
        build_minimal_database(&mytable(), &rows),
        Err(Error::RecordTooLarge {
            available: 1024,
            ..
        })
    ));
}

#[test]
fn test_write_database() {
    let db = build_minimal_database(&mytable(), &alice_and_bob()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.db");
    write_database(&path, &db).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), db);
}
