//! formatting prints out tables.

use std::io::Write;

use tracing::warn;

use crate::btree::{PageNum, RowId};
use crate::error::Error;

/// Prints the rows of a table, one `rowid=<id>: <values>` line each, after a line naming the table.
///
/// Rows that failed to decode are logged and left out.
pub fn print_table<W: Write>(
    out: &mut W,
    table_name: &str,
    root_pagenum: PageNum,
    rows: impl Iterator<Item = Result<(RowId, String), Error>>,
) -> std::io::Result<()> {
    writeln!(out, "Found table {} at root page {}", table_name, root_pagenum)?;
    for row in rows {
        match row {
            Ok((rowid, rendered)) => writeln!(out, "rowid={}: {}", rowid, rendered)?,
            Err(e) => warn!(table_name, error = %e, "skipping row"),
        }
    }
    Ok(())
}

/// Prints schema rows as `<type> <name> at root page <n>`.
pub fn print_schema_entries<W: Write>(
    out: &mut W,
    entries: &[crate::schema::SchemaEntry],
) -> std::io::Result<()> {
    for e in entries {
        writeln!(out, "{} {} at root page {}", e.object_type, e.name, e.rootpage)?;
    }
    Ok(())
}

#[test]
fn test_print_table() {
    let rows = vec![
        Ok((1, "1 | 'Alice'".to_string())),
        Err(Error::TableNotFound("x".to_string())),
        Ok((2, "2 | 'Bob'".to_string())),
    ];
    let mut out = vec![];
    print_table(&mut out, "mytable", 2, rows.into_iter()).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Found table mytable at root page 2\nrowid=1: 1 | 'Alice'\nrowid=2: 2 | 'Bob'\n"
    );
}

#[test]
fn test_print_schema_entries() {
    let entries = vec![crate::schema::SchemaEntry {
        object_type: "table".to_string(),
        name: "t1".to_string(),
        tbl_name: "t1".to_string(),
        rootpage: 2,
        sql: Some("CREATE TABLE t1(a)".to_string()),
    }];
    let mut out = vec![];
    print_schema_entries(&mut out, &entries).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "table t1 at root page 2\n");
}
