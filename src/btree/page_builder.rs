//! page_builder lays out a new table leaf page.
//!
//! Cells are packed from the end of the page toward the front, so the cell content area start
//! decreases as cells are added, while the cell pointer array after the header stays in insertion order.

use byteorder::{BigEndian, ByteOrder};
use tracing::trace;

use super::{Error, RowId, LEAF_HEADER_SIZE, TABLE_LEAF_PAGE_TYPE};
use crate::varint;

/// Bytes of a table leaf cell's payload that may be stored on the page itself: U - 35, for usable size U.
/// Larger payloads would need overflow pages.
pub fn max_local_payload(page_size: usize) -> usize {
    page_size - 35
}

pub struct LeafPageBuilder {
    page_size: usize,
    header_offset: usize,
    cells: Vec<Vec<u8>>,
}

impl LeafPageBuilder {
    /// `header_offset` is where the btree header goes: 100 on page 1, 0 elsewhere.
    pub fn new(page_size: usize, header_offset: usize) -> LeafPageBuilder {
        LeafPageBuilder {
            page_size,
            header_offset,
            cells: vec![],
        }
    }

    /// Adds a cell holding `record` under `rowid`.
    pub fn push_cell(&mut self, rowid: RowId, record: &[u8]) -> Result<(), Error> {
        let max_local = max_local_payload(self.page_size);
        if record.len() > max_local {
            return Err(Error::PageFull {
                needed: record.len(),
                available: max_local,
            });
        }
        let mut cell = varint::encode(record.len() as u64);
        cell.extend(varint::encode(rowid));
        cell.extend_from_slice(record);
        self.cells.push(cell);
        Ok(())
    }

    /// Bytes the page uses so far: header, pointer array and cell content.
    pub fn used_bytes(&self) -> usize {
        self.header_offset
            + LEAF_HEADER_SIZE
            + 2 * self.cells.len()
            + self.cells.iter().map(|c| c.len()).sum::<usize>()
    }

    /// Produces the full page image. On page 1 the first `header_offset` bytes are left zeroed
    /// for the database header.
    pub fn finish(self) -> Result<Vec<u8>, Error> {
        let needed = self.used_bytes();
        if needed > self.page_size || self.cells.len() > u16::MAX as usize {
            return Err(Error::PageFull {
                needed,
                available: self.page_size,
            });
        }
        let mut page = vec![0_u8; self.page_size];
        let ptr_start = self.header_offset + LEAF_HEADER_SIZE;
        let mut content_start = self.page_size;
        for (idx, cell) in self.cells.iter().enumerate() {
            content_start -= cell.len();
            page[content_start..content_start + cell.len()].copy_from_slice(cell);
            let ptr = ptr_start + 2 * idx;
            // Offsets below 65536 always fit: the largest page is 65536 bytes and a cell is never empty.
            BigEndian::write_u16(&mut page[ptr..ptr + 2], content_start as u16);
            trace!(idx, offset = content_start, len = cell.len(), "placed cell");
        }

        let h = self.header_offset;
        page[h] = TABLE_LEAF_PAGE_TYPE;
        // Bytes 1-2, the first freeblock, stay zero: a fresh page has no freeblocks.
        BigEndian::write_u16(&mut page[h + 3..h + 5], self.cells.len() as u16);
        // A content area starting at 65536 (an empty 64KiB page) is stored as zero.
        BigEndian::write_u16(&mut page[h + 5..h + 7], (content_start % 65536) as u16);
        // Byte 7, fragmented free bytes, stays zero.
        Ok(page)
    }
}

#[test]
fn test_rebuilds_test_page() {
    // The ten (n, letter) rows of the fixture page, inserted in rowid order, reproduce it byte for byte.
    let mut b = LeafPageBuilder::new(512, 0);
    for (i, letter) in (b'A'..=b'J').enumerate() {
        b.push_cell(i as u64 + 1, &[0x02, 0x0f, letter]).unwrap();
    }
    assert_eq!(b.finish().unwrap(), super::cell::test_page());
}

#[test]
fn test_empty_page() {
    let page = LeafPageBuilder::new(1024, 100).finish().unwrap();
    assert_eq!(&page[100..108], &[0x0d, 0, 0, 0, 0, 0x04, 0x00, 0]);
    assert!(page[..100].iter().all(|b| *b == 0));
    let page = LeafPageBuilder::new(65536, 0).finish().unwrap();
    assert_eq!(&page[..8], &[0x0d, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_page_full() {
    let mut b = LeafPageBuilder::new(512, 0);
    let record = vec![0_u8; 400];
    b.push_cell(1, &record).unwrap();
    b.push_cell(2, &record).unwrap();
    assert!(matches!(b.finish(), Err(Error::PageFull { available: 512, .. })));
}

#[test]
fn test_payload_larger_than_local_limit() {
    let mut b = LeafPageBuilder::new(512, 0);
    assert_eq!(
        b.push_cell(1, &vec![0_u8; 478]),
        Err(Error::PageFull {
            needed: 478,
            available: 477
        })
    );
    assert!(b.push_cell(1, &vec![0_u8; 477]).is_ok());
}
