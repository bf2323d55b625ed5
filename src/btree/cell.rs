//! cell finds the cells of a btree page through its cell pointer array.
//!
//! "The cell pointer array of a b-tree page immediately follows the b-tree page header.
//! Let K be the number of cells on the btree. The cell pointer array consists of K 2-byte
//! integer offsets to the cell contents. The cell pointers are arranged in key order with
//! left-most cell (the cell with the smallest key) first and the right-most cell (the cell
//! with the largest key) last."

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, warn};

use super::header::Header;
use super::{Error, PageType, LEAF_HEADER_SIZE};

/// Returns the first byte of the btree header: the page type flag.
pub fn page_type(page: &[u8], header_offset: usize) -> Result<u8, Error> {
    page.get(header_offset)
        .copied()
        .ok_or(Error::TruncatedPage {
            needed: header_offset + 1,
            len: page.len(),
        })
}

/// Returns the page-relative offsets of the cells of a table leaf page, in pointer array order.
///
/// A pointer array that does not fit on the page fails the whole page. A single pointer that
/// points outside the cell content area is skipped, since the rest of the page may still be readable.
pub fn leaf_cell_offsets(page: &[u8], header_offset: usize) -> Result<Vec<usize>, Error> {
    let hdr = Header::parse(page, header_offset)?;
    if hdr.btree_page_type != PageType::TableLeaf {
        return Err(Error::UnsupportedPageType(hdr.btree_page_type.to_byte()));
    }
    let ptr_start = header_offset + LEAF_HEADER_SIZE;
    let ptr_end = ptr_start + hdr.num_cells as usize * 2;
    if ptr_end > page.len() {
        return Err(Error::TruncatedPage {
            needed: ptr_end,
            len: page.len(),
        });
    }
    debug!(num_cells = hdr.num_cells, header_offset, "reading cell pointer array");

    let mut offsets = Vec::with_capacity(hdr.num_cells as usize);
    for (idx, ptr) in page[ptr_start..ptr_end].chunks_exact(2).enumerate() {
        let off = BigEndian::read_u16(ptr) as usize;
        if off < ptr_end || off >= page.len() {
            warn!(idx, off, "skipping cell pointer outside the cell content area");
            continue;
        }
        offsets.push(off);
    }
    Ok(offsets)
}

// From command: xxd resources/test/multipage-512B-page.db
// A 512 byte table leaf page with ten rows, (1, 'A') through (10, 'J').
#[cfg(test)]
pub(crate) const TEST_PAGE: &str = "0d00 0000 0a01 ce00 01fb 01f6 01f1 01ec
01e7 01e2 01dd 01d8 01d3 01ce 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 030a
020f 4a03 0902 0f49 0308 020f 4803 0702
0f47 0306 020f 4603 0502 0f45 0304 020f
4403 0302 0f43 0302 020f 4203 0102 0f41";

#[cfg(test)]
pub(crate) fn test_page() -> Vec<u8> {
    use hex::FromHex;
    Vec::from_hex(TEST_PAGE.replace(&[' ', '\n'][..], "")).expect("Invalid Hex String")
}

#[test]
fn test_leaf_cell_offsets() {
    let p = test_page();
    assert_eq!(p.len(), 512);
    assert_eq!(
        leaf_cell_offsets(&p, 0).unwrap(),
        vec![0x1fb, 0x1f6, 0x1f1, 0x1ec, 0x1e7, 0x1e2, 0x1dd, 0x1d8, 0x1d3, 0x1ce]
    );
    assert_eq!(&p[0x1fb..], &[0x03, 0x01, 0x02, 0x0f, 0x41]);
}

#[test]
fn test_page_type() {
    let p = test_page();
    assert_eq!(page_type(&p, 0).unwrap(), 0x0d);
    assert!(page_type(&p, 512).is_err());
}

#[test]
fn test_out_of_range_pointers_are_skipped() {
    let mut p = test_page();
    // Point the first cell past the page end and the second into the pointer array.
    p[8..10].copy_from_slice(&[0x02, 0x00]);
    p[10..12].copy_from_slice(&[0x00, 0x0a]);
    let offsets = leaf_cell_offsets(&p, 0).unwrap();
    assert_eq!(offsets.len(), 8);
    assert_eq!(offsets[0], 0x1f1);
}

#[test]
fn test_pointer_array_past_page_end_fails_the_page() {
    let mut p = test_page();
    p[3..5].copy_from_slice(&[0x01, 0x00]);
    assert_eq!(
        leaf_cell_offsets(&p, 0),
        Err(Error::TruncatedPage {
            needed: 8 + 512,
            len: 512
        })
    );
}

#[test]
fn test_interior_pages_are_rejected() {
    let mut p = test_page();
    p[0] = 0x05;
    assert_eq!(
        leaf_cell_offsets(&p, 0),
        Err(Error::UnsupportedPageType(0x05))
    );
}
