//! schema reads the schema table, which lives on page 1 and lists the root page of every table.
//!
//! Each row of the schema table is `(type, name, tbl_name, rootpage, sql)`.
//! Only a schema that fits on page 1 is supported.

use tracing::{debug, warn};

use crate::btree::{self, leaf, PageNum};
use crate::dbheader::TextEncoding;
use crate::error::Error;
use crate::pager::Pager;
use crate::record::{self, Record};
use crate::sql_value::SqlValue;

// Page 1 (the first page) is always a btree page, and it is the root page of the schema table.
pub const SCHEMA_TABLE_NAME: &str = "sqlite_schema";
pub const LEGACY_SCHEMA_TABLE_NAME: &str = "sqlite_master";
pub const SCHEMA_BTREE_ROOT_PAGENUM: PageNum = 1;
pub const SCHEMA_SCHEMA: &str =
    "CREATE TABLE sqlite_schema (type text, name text, tbl_name text, rootpage integer, sql text)";
const SCHEMA_TABLE_TYPE_COLIDX: usize = 0;
const SCHEMA_TABLE_NAME_COLIDX: usize = 1;
const SCHEMA_TABLE_TBL_NAME_COLIDX: usize = 2;
const SCHEMA_TABLE_ROOTPAGE_COLIDX: usize = 3;
const SCHEMA_TABLE_SQL_COLIDX: usize = 4;

/// One row of the schema table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub object_type: String,
    pub name: String,
    pub tbl_name: String,
    /// Zero for objects without storage, such as views and triggers.
    pub rootpage: i64,
    /// NULL for automatically created indexes.
    pub sql: Option<String>,
}

/// Calls `f` with the record of each schema cell, skipping cells that cannot be split from the page.
fn for_each_schema_record<'a>(
    pager: &Pager<'a>,
    mut f: impl FnMut(&Record<'a>) -> Option<PageNum>,
) -> Result<Option<PageNum>, Error> {
    let page = pager.get_page_ro(SCHEMA_BTREE_ROOT_PAGENUM)?;
    let offsets =
        btree::leaf_cell_offsets(page, btree::btree_start_offset(SCHEMA_BTREE_ROOT_PAGENUM))?;
    debug!(num_entries = offsets.len(), "scanning schema table");
    for cell in leaf::Iterator::new(page, offsets) {
        let record = match cell
            .map_err(Error::from)
            .and_then(|c| Ok(Record::parse(c.payload)?))
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "skipping malformed schema cell");
                continue;
            }
        };
        if let Some(found) = f(&record) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn column(record: &Record, idx: usize, encoding: TextEncoding) -> Result<SqlValue, record::Error> {
    record.value(idx, encoding).unwrap_or_else(|| {
        Err(record::Error::CorruptHeader(format!(
            "schema row has {} columns, expected 5",
            record.num_columns()
        )))
    })
}

/// Finds the root page of the table named `table_name`, matched exactly and case-sensitively.
///
/// Returns `Ok(None)` when no schema row has that name. Only the name and rootpage columns are decoded.
pub fn find_table(file: &[u8], table_name: &str) -> Result<Option<PageNum>, Error> {
    let pager = Pager::new(file)?;
    if table_name == SCHEMA_TABLE_NAME || table_name == LEGACY_SCHEMA_TABLE_NAME {
        return Ok(Some(SCHEMA_BTREE_ROOT_PAGENUM));
    }
    let encoding = pager.header().text_encoding;
    for_each_schema_record(&pager, |record| {
        let name = match column(record, SCHEMA_TABLE_NAME_COLIDX, encoding) {
            Ok(SqlValue::Text(name)) => name,
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "skipping schema row with unreadable name");
                return None;
            }
        };
        if name != table_name {
            return None;
        }
        match column(record, SCHEMA_TABLE_ROOTPAGE_COLIDX, encoding) {
            Ok(SqlValue::Int(rootpage)) if rootpage > 0 => {
                debug!(table_name, rootpage, "found table");
                PageNum::try_from(rootpage).ok()
            }
            Ok(v) => {
                debug!(table_name, rootpage = %v, "passing over schema row without a root page");
                None
            }
            Err(e) => {
                warn!(error = %e, "skipping schema row with unreadable rootpage");
                None
            }
        }
    })
}

fn to_entry(record: &Record, encoding: TextEncoding) -> Result<SchemaEntry, record::Error> {
    let mut values = record.values(encoding)?;
    if values.len() < 5 {
        return Err(record::Error::CorruptHeader(format!(
            "schema row has {} columns, expected 5",
            values.len()
        )));
    }
    let text = |v: SqlValue| match v {
        SqlValue::Null => String::new(),
        SqlValue::Text(s) => s,
        other => other.to_string(),
    };
    let sql = match std::mem::replace(&mut values[SCHEMA_TABLE_SQL_COLIDX], SqlValue::Null) {
        SqlValue::Null => None,
        v => Some(text(v)),
    };
    let rootpage = values[SCHEMA_TABLE_ROOTPAGE_COLIDX]
        .as_int()
        .copied()
        .unwrap_or(0);
    let tbl_name = text(std::mem::replace(
        &mut values[SCHEMA_TABLE_TBL_NAME_COLIDX],
        SqlValue::Null,
    ));
    let name = text(std::mem::replace(
        &mut values[SCHEMA_TABLE_NAME_COLIDX],
        SqlValue::Null,
    ));
    let object_type = text(std::mem::replace(
        &mut values[SCHEMA_TABLE_TYPE_COLIDX],
        SqlValue::Null,
    ));
    Ok(SchemaEntry {
        object_type,
        name,
        tbl_name,
        rootpage,
        sql,
    })
}

/// Returns every well-formed row of the schema table, in page order.
pub fn schema_entries(file: &[u8]) -> Result<Vec<SchemaEntry>, Error> {
    let pager = Pager::new(file)?;
    let encoding = pager.header().text_encoding;
    let mut entries = vec![];
    for_each_schema_record(&pager, |record| {
        match to_entry(record, encoding) {
            Ok(e) => entries.push(e),
            Err(e) => warn!(error = %e, "skipping malformed schema row"),
        }
        None
    })?;
    Ok(entries)
}

#[cfg(test)]
use crate::builder::{build_minimal_database, TableDef};

#[cfg(test)]
fn mytable_db() -> Vec<u8> {
    build_minimal_database(
        &TableDef::new("mytable", "CREATE TABLE mytable(id INTEGER PRIMARY KEY, name TEXT)"),
        &[vec![SqlValue::Int(1), "Alice".into()]],
    )
    .unwrap()
}

/// Builds a 512 byte page database whose schema page holds the given records, with rowids from 1.
#[cfg(test)]
fn db_with_schema_records(records: &[Vec<u8>]) -> Vec<u8> {
    use crate::btree::page_builder::LeafPageBuilder;
    use crate::dbheader::DbHeader;
    let mut b = LeafPageBuilder::new(512, 100);
    for (i, rec) in records.iter().enumerate() {
        b.push_cell(i as u64 + 1, rec).unwrap();
    }
    let mut file = b.finish().unwrap();
    file[..100].copy_from_slice(&DbHeader::new(512, 1).unwrap().to_bytes().unwrap());
    file
}

#[cfg(test)]
fn db_with_schema_rows(rows: &[Vec<SqlValue>]) -> Vec<u8> {
    let records: Vec<Vec<u8>> = rows
        .iter()
        .map(|row| record::encode_values(row).unwrap())
        .collect();
    db_with_schema_records(&records)
}

#[test]
fn test_find_table() {
    let db = mytable_db();
    assert_eq!(find_table(&db, "mytable").unwrap(), Some(2));
    assert_eq!(find_table(&db, "MYTABLE").unwrap(), None);
    assert_eq!(find_table(&db, "othertable").unwrap(), None);
    assert_eq!(find_table(&db, "sqlite_schema").unwrap(), Some(1));
    assert_eq!(find_table(&db, "sqlite_master").unwrap(), Some(1));
}

#[test]
fn test_find_table_among_several() {
    let row = |t: &str, name: &str, root: i64| -> Vec<SqlValue> {
        vec![
            t.into(),
            name.into(),
            name.into(),
            SqlValue::Int(root),
            format!("CREATE {} {}", t, name).as_str().into(),
        ]
    };
    let db = db_with_schema_rows(&[
        row("table", "t1", 2),
        row("view", "v1", 0),
        row("table", "t2", 3),
        row("table", "t3", 4),
    ]);
    assert_eq!(find_table(&db, "t1").unwrap(), Some(2));
    assert_eq!(find_table(&db, "t3").unwrap(), Some(4));
    assert_eq!(find_table(&db, "v1").unwrap(), None);
    let entries = schema_entries(&db).unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[1].object_type, "view");
    assert_eq!(entries[1].rootpage, 0);
    assert_eq!(entries[2].sql.as_deref(), Some("CREATE table t2"));
}

#[test]
fn test_malformed_schema_row_is_skipped() {
    let db = db_with_schema_rows(&[
        vec![SqlValue::Int(7)],
        vec![
            "table".into(),
            "t1".into(),
            "t1".into(),
            SqlValue::Int(2),
            SqlValue::Null,
        ],
    ]);
    assert_eq!(find_table(&db, "t1").unwrap(), Some(2));
    let entries = schema_entries(&db).unwrap();
    assert_eq!(
        entries,
        vec![SchemaEntry {
            object_type: "table".to_string(),
            name: "t1".to_string(),
            tbl_name: "t1".to_string(),
            rootpage: 2,
            sql: None,
        }]
    );
}

#[test]
fn test_schema_row_with_overflowing_column_sizes_is_skipped() {
    let good = record::encode_values(&[
        "table".into(),
        "t1".into(),
        "t1".into(),
        SqlValue::Int(2),
        "CREATE TABLE t1(a)".into(),
    ])
    .unwrap();
    let db = db_with_schema_records(&[record::record_with_oversized_blobs()]);
    assert_eq!(find_table(&db, "mytable").unwrap(), None);
    assert!(schema_entries(&db).unwrap().is_empty());
    let db = db_with_schema_records(&[record::record_with_oversized_blobs(), good]);
    assert_eq!(find_table(&db, "t1").unwrap(), Some(2));
}

#[test]
fn test_find_table_rejects_bad_files() {
    use crate::dbheader;
    assert!(matches!(
        find_table(&[0_u8; 50], "mytable"),
        Err(Error::DbHdr(dbheader::Error::TruncatedFile { .. }))
    ));
    let mut db = mytable_db();
    db[0] = b'X';
    assert!(matches!(
        find_table(&db, "mytable"),
        Err(Error::DbHdr(dbheader::Error::NotASqliteFile))
    ));
}

#[test]
fn test_interior_schema_page_is_unsupported() {
    let mut db = mytable_db();
    db[100] = 0x05;
    assert!(matches!(
        find_table(&db, "mytable"),
        Err(Error::Btree(btree::Error::UnsupportedPageType(0x05)))
    ));
}
