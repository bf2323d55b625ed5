//! scan reads the rows of a table whose btree is a single leaf page.
//!
//! Rows come out in cell pointer array order.
//! A cell that cannot be decoded produces one `Err` item, and the scan goes on with the next cell.

use tracing::debug;

use crate::btree::{self, leaf, PageNum, RowId};
use crate::dbheader::TextEncoding;
use crate::error::Error;
use crate::pager::Pager;
use crate::record::{self, Record};
use crate::sql_value::SqlValue;

/// One decoded table row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub rowid: RowId,
    pub values: Vec<SqlValue>,
}

impl Row {
    /// The row's values joined with " | ".
    pub fn render(&self) -> String {
        record::render(&self.values)
    }
}

/// Iterator over the rows of one table leaf page.
pub struct TableScan<'a> {
    cells: leaf::Iterator<'a>,
    encoding: TextEncoding,
}

impl<'a> TableScan<'a> {
    /// Opens a scan of the table rooted at `root`.
    ///
    /// Fails up front if the file header is bad, the page is not in the file, or the page is not a table leaf.
    pub fn new(file: &'a [u8], root: PageNum) -> Result<TableScan<'a>, Error> {
        let pager = Pager::new(file)?;
        let page = pager.get_page_ro(root)?;
        let offsets = btree::leaf_cell_offsets(page, btree::btree_start_offset(root))?;
        debug!(root, num_cells = offsets.len(), "starting table scan");
        Ok(TableScan {
            cells: leaf::Iterator::new(page, offsets),
            encoding: pager.header().text_encoding,
        })
    }

    fn decode(&self, cell: leaf::LeafCell) -> Result<Row, Error> {
        let record = Record::parse(cell.payload)?;
        Ok(Row {
            rowid: cell.rowid,
            values: record.values(self.encoding)?,
        })
    }
}

impl<'a> Iterator for TableScan<'a> {
    type Item = Result<Row, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let cell = self.cells.next()?;
        Some(cell.map_err(Error::from).and_then(|c| self.decode(c)))
    }
}

/// Scans the table rooted at `root`, yielding each row's rowid and rendered values.
///
/// The scan holds no state outside the iterator; call again to read the table again.
pub fn scan_table(
    file: &[u8],
    root: PageNum,
) -> Result<impl Iterator<Item = Result<(RowId, String), Error>> + '_, Error> {
    Ok(TableScan::new(file, root)?.map(|r| r.map(|row| (row.rowid, row.render()))))
}

#[cfg(test)]
fn db_with_data_page(data_page: &[u8]) -> Vec<u8> {
    use crate::dbheader::DbHeader;
    let mut file = DbHeader::new(512, 2).unwrap().to_bytes().unwrap();
    file.resize(512, 0);
    file[100] = btree::TABLE_LEAF_PAGE_TYPE;
    file.extend_from_slice(data_page);
    file
}

#[test]
fn test_scan_test_page() {
    let file = db_with_data_page(&btree::cell::test_page());
    let rows: Vec<(RowId, String)> = scan_table(&file, 2)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0], (1, "'A'".to_string()));
    assert_eq!(rows[9], (10, "'J'".to_string()));
}

#[test]
fn test_scan_is_restartable() {
    let file = db_with_data_page(&btree::cell::test_page());
    let first: Vec<_> = scan_table(&file, 2).unwrap().map(|r| r.unwrap()).collect();
    let second: Vec<_> = scan_table(&file, 2).unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(first, second);
}

#[test]
fn test_bad_cell_is_reported_and_scan_continues() {
    let mut page = btree::cell::test_page();
    // Rowid 2's record claims a header longer than the record: 'B' at 0x1f6 becomes header length 9.
    page[0x1f6 + 2] = 0x09;
    let file = db_with_data_page(&page);
    let results: Vec<_> = TableScan::new(&file, 2).unwrap().collect();
    assert_eq!(results.len(), 10);
    assert!(matches!(
        results[1],
        Err(Error::Record(record::Error::CorruptHeader(_)))
    ));
    assert_eq!(
        results[2].as_ref().unwrap(),
        &Row {
            rowid: 3,
            values: vec![SqlValue::Text("C".to_string())]
        }
    );
}

#[test]
fn test_root_page_out_of_range() {
    let file = db_with_data_page(&btree::cell::test_page());
    assert!(matches!(
        TableScan::new(&file, 3),
        Err(Error::PageOutOfRange { page: 3, .. })
    ));
    assert!(matches!(
        TableScan::new(&file, 0),
        Err(Error::PageOutOfRange { page: 0, .. })
    ));
}

#[test]
fn test_truncated_root_page_is_out_of_range() {
    let file = db_with_data_page(&btree::cell::test_page());
    assert!(matches!(
        TableScan::new(&file[..812], 2),
        Err(Error::PageOutOfRange {
            page: 2,
            file_len: 812
        })
    ));
}

#[test]
fn test_interior_root_is_unsupported() {
    let mut page = btree::cell::test_page();
    page[0] = 0x05;
    let file = db_with_data_page(&page);
    assert!(matches!(
        TableScan::new(&file, 2),
        Err(Error::Btree(btree::Error::UnsupportedPageType(0x05)))
    ));
}

#[test]
fn test_row_render() {
    let row = Row {
        rowid: 7,
        values: vec![
            SqlValue::Int(7),
            SqlValue::Real(2.5),
            SqlValue::Null,
            SqlValue::Blob(vec![1, 2, 3]),
        ],
    };
    assert_eq!(row.render(), "7 | 2.5 |  | BLOB(3)");
}
