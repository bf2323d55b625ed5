//! Defines `StoredDb` type, which represents one disk-backed database file.
//!
//! The whole file is read into memory when opened, and the file is closed again before `open` returns.
//! The sqlite3 file format is defined at https://www.sqlite.org/fileformat.html

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::btree::{PageNum, RowId};
use crate::dbheader::DbHeader;
use crate::error::Error;
use crate::pager::Pager;
use crate::scan::{self, Row, TableScan};
use crate::schema::{self, SchemaEntry};

/// A `StoredDb` owns the bytes of one database file and reads tables out of them.
///
/// Only single-threaded read-only access is supported.
///
/// # Examples
///
/// ```
/// use litefile::builder::{build_minimal_database, TableDef};
/// use litefile::stored_db::StoredDb;
///
/// let bytes = build_minimal_database(
///     &TableDef::new("t", "CREATE TABLE t(a)"),
///     &[vec![litefile::SqlValue::Int(5)]],
/// )
/// .unwrap();
/// let db = StoredDb::from_bytes(bytes).unwrap();
/// assert_eq!(db.root_pagenum("t").unwrap(), 2);
/// ```
pub struct StoredDb {
    bytes: Vec<u8>,
    header: DbHeader,
}

impl StoredDb {
    /// Opens a database file and verifies it is a SQLite db file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut bytes = vec![];
        {
            let mut f = std::fs::File::open(path.as_ref())?;
            f.read_to_end(&mut bytes)?;
        }
        debug!(path = %path.as_ref().display(), len = bytes.len(), "read database file");
        Self::from_bytes(bytes)
    }

    /// Wraps an in-memory database image, checking its header.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Error> {
        let header = Pager::new(&bytes)?.header().clone();
        Ok(StoredDb { bytes, header })
    }

    pub fn header(&self) -> &DbHeader {
        &self.header
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Looks up `table_name` in the schema table. `Ok(None)` means no such table.
    pub fn find_table(&self, table_name: &str) -> Result<Option<PageNum>, Error> {
        schema::find_table(&self.bytes, table_name)
    }

    /// Get the root page number for `table_name`, failing with `TableNotFound` if it does not exist.
    pub fn root_pagenum(&self, table_name: &str) -> Result<PageNum, Error> {
        self.find_table(table_name)?
            .ok_or_else(|| Error::TableNotFound(table_name.to_string()))
    }

    /// Every well-formed row of the schema table.
    pub fn tables(&self) -> Result<Vec<SchemaEntry>, Error> {
        schema::schema_entries(&self.bytes)
    }

    /// Typed rows of the table rooted at `root`.
    pub fn scan(&self, root: PageNum) -> Result<TableScan<'_>, Error> {
        TableScan::new(&self.bytes, root)
    }

    /// Rendered rows of the table named `table_name`.
    pub fn rows(
        &self,
        table_name: &str,
    ) -> Result<impl Iterator<Item = Result<(RowId, String), Error>> + '_, Error> {
        let root = self.root_pagenum(table_name)?;
        scan::scan_table(&self.bytes, root)
    }

    /// Reads every row of `table_name`, failing on the first row that cannot be decoded.
    pub fn read_table(&self, table_name: &str) -> Result<Vec<Row>, Error> {
        self.scan(self.root_pagenum(table_name)?)?.collect()
    }
}

#[cfg(test)]
fn mytable_db() -> StoredDb {
    use crate::builder::{build_minimal_database, TableDef};
    use crate::sql_value::SqlValue;
    let bytes = build_minimal_database(
        &TableDef::new("mytable", "CREATE TABLE mytable(id INTEGER PRIMARY KEY, name TEXT)"),
        &[
            vec![SqlValue::Int(1), "Alice".into()],
            vec![SqlValue::Int(2), "Bob".into()],
        ],
    )
    .unwrap();
    StoredDb::from_bytes(bytes).unwrap()
}

#[test]
fn test_root_pagenum() {
    let db = mytable_db();
    assert_eq!(db.root_pagenum("mytable").unwrap(), 2);
    assert_eq!(db.root_pagenum("sqlite_schema").unwrap(), 1);
    assert!(matches!(
        db.root_pagenum("nope"),
        Err(Error::TableNotFound(name)) if name == "nope"
    ));
}

#[test]
fn test_rows() {
    let db = mytable_db();
    let rows: Vec<(RowId, String)> = db.rows("mytable").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(
        rows,
        vec![(1, "1 | 'Alice'".to_string()), (2, "2 | 'Bob'".to_string())]
    );
}

#[test]
fn test_read_schema_table_as_a_table() {
    let db = mytable_db();
    let rows = db.read_table("sqlite_schema").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].render(),
        "'table' | 'mytable' | 'mytable' | 2 | 'CREATE TABLE mytable(id INTEGER PRIMARY KEY, name TEXT)'"
    );
}

#[test]
fn test_tables() {
    let db = mytable_db();
    let tables = db.tables().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "mytable");
    assert_eq!(tables[0].rootpage, 2);
}

#[test]
fn test_from_bytes_rejects_non_databases() {
    assert!(StoredDb::from_bytes(b"hello".to_vec()).is_err());
}
