// Cell Formats from https://www.sqlite.org/fileformat2.html#b_tree_pages
//
// Table B-Tree Leaf Cell (header 0x0d):
// A varint which is the total number of bytes of payload, including any overflow
// A varint which is the integer key, a.k.a. "rowid"
// The initial portion of the payload that does not spill to overflow pages.
// A 4-byte big-endian integer page number for the first page of the overflow page list - omitted if all payload fits on the b-tree page.

use super::{Error, RowId};
use crate::varint;

/// One table leaf cell, borrowing its record bytes from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCell<'a> {
    pub offset: usize,
    pub rowid: RowId,
    pub payload: &'a [u8],
}

impl<'a> LeafCell<'a> {
    /// Splits the cell at `offset` into its rowid and record payload.
    ///
    /// Payloads that spill onto overflow pages are reported as `CellOverflow`.
    pub fn parse(page: &'a [u8], offset: usize) -> Result<LeafCell<'a>, Error> {
        let bytes = page.get(offset..).ok_or(Error::TruncatedPage {
            needed: offset + 1,
            len: page.len(),
        })?;
        let varint_err = |source| Error::CellVarint { offset, source };
        let (payload_len, n1) = varint::decode(bytes).map_err(varint_err)?;
        let (rowid, n2) = varint::decode(&bytes[n1..]).map_err(varint_err)?;
        let start = n1 + n2;
        let remaining = (bytes.len() - start) as u64;
        if payload_len > remaining {
            return Err(Error::CellOverflow {
                offset,
                payload_len,
            });
        }
        Ok(LeafCell {
            offset,
            rowid,
            payload: &bytes[start..start + payload_len as usize],
        })
    }
}

/// Iterates over the cells of a table leaf page, given the offsets from `leaf_cell_offsets`.
///
/// Each cell is parsed on its own, so a bad cell produces one `Err` and iteration continues.
pub struct Iterator<'a> {
    page: &'a [u8],
    offsets: std::vec::IntoIter<usize>,
}

impl<'a> Iterator<'a> {
    pub fn new(page: &'a [u8], offsets: Vec<usize>) -> Iterator<'a> {
        Iterator {
            page,
            offsets: offsets.into_iter(),
        }
    }
}

impl<'a> core::iter::Iterator for Iterator<'a> {
    type Item = Result<LeafCell<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offsets.next()?;
        Some(LeafCell::parse(self.page, offset))
    }
}

#[test]
fn test_leaf_iterator_on_test_page() {
    let p = super::cell::test_page();
    let offsets = super::leaf_cell_offsets(&p, 0).unwrap();
    let cells: Vec<LeafCell> = Iterator::new(&p, offsets)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(cells.len(), 10);
    assert_eq!(cells[0].rowid, 1);
    assert_eq!(cells[0].payload, &[0x02, 0x0f, 0x41]);
    assert_eq!(cells[9].rowid, 10);
    assert_eq!(cells[9].payload, &[0x02, 0x0f, 0x4a]);
}

#[test]
fn test_payload_past_page_end_is_overflow() {
    // Declares a 200 byte payload with only 3 bytes left on the page.
    let page = [0x81, 0x48, 0x01, 0x02, 0x0f, 0x41];
    assert_eq!(
        LeafCell::parse(&page, 0),
        Err(Error::CellOverflow {
            offset: 0,
            payload_len: 200
        })
    );
}

#[test]
fn test_truncated_rowid_varint() {
    let page = [0x03, 0xff];
    assert!(matches!(
        LeafCell::parse(&page, 0),
        Err(Error::CellVarint { offset: 0, .. })
    ));
}

#[test]
fn test_one_bad_cell_does_not_stop_iteration() {
    let page = [0x01, 0x05, 0x00, 0x7f, 0x01, 0x06, 0x00];
    let results: Vec<_> = Iterator::new(&page, vec![0, 3, 4]).collect();
    assert_eq!(results[0].as_ref().unwrap().rowid, 5);
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().rowid, 6);
}
