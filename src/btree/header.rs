//! header reads the header of a btree page.
//! A b-tree page is divided into regions in the following order
//! 1. The 100-byte database file header (found on page 1 only)
//! 2. The 8 or 12 byte b-tree page header
//! 3. The cell pointer array
//! 4. Unallocated space
//! 5. The cell content area
//! 6. The reserved region.  (assumed always 0)

use super::{Error, PageType, LEAF_HEADER_SIZE};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub btree_page_type: PageType,
    pub freeblock_start: u32,
    pub num_cells: u32,
    pub cell_content_start: u32,
    pub fragmented_free_bytes: u8,
    pub rightmost_pointer: Option<u32>,
}

impl Header {
    /// Size of this header on the page.
    pub fn size(&self) -> usize {
        match self.rightmost_pointer {
            Some(_) => LEAF_HEADER_SIZE + 4,
            None => LEAF_HEADER_SIZE,
        }
    }

    /// Reads the btree header starting at `header_offset` (100 on page 1, otherwise 0).
    pub fn parse(page: &[u8], header_offset: usize) -> Result<Header, Error> {
        let truncated = |needed: usize| Error::TruncatedPage {
            needed,
            len: page.len(),
        };
        if header_offset + LEAF_HEADER_SIZE > page.len() {
            return Err(truncated(header_offset + LEAF_HEADER_SIZE));
        }
        let mut c = Cursor::new(&page[header_offset..]);
        let short = |_: std::io::Error| truncated(header_offset + LEAF_HEADER_SIZE);

        // Offset	Size	Description
        // 0	1	The one-byte flag at offset 0 indicating the b-tree page type.
        let type_byte = c.read_u8().map_err(short)?;
        let btree_page_type =
            PageType::from_byte(type_byte).ok_or(Error::UnsupportedPageType(type_byte))?;
        // 1	2	The start of the first freeblock on the page, or zero if there are no freeblocks.
        let freeblock_start = c.read_u16::<BigEndian>().map_err(short)? as u32;
        // 3	2	The number of cells on the page.
        let num_cells = c.read_u16::<BigEndian>().map_err(short)? as u32;
        // 5	2	The start of the cell content area. A zero value for this integer is interpreted as 65536.
        let cell_content_start = match c.read_u16::<BigEndian>().map_err(short)? {
            0 => 65536,
            x => x as u32,
        };
        // 7	1	The number of fragmented free bytes within the cell content area.
        let fragmented_free_bytes = c.read_u8().map_err(short)?;
        // 8	4	The right-most pointer. Interior b-tree pages only.
        let rightmost_pointer = match btree_page_type {
            PageType::IndexInterior | PageType::TableInterior => Some(
                c.read_u32::<BigEndian>()
                    .map_err(|_| truncated(header_offset + LEAF_HEADER_SIZE + 4))?,
            ),
            PageType::IndexLeaf | PageType::TableLeaf => None,
        };

        Ok(Header {
            btree_page_type,
            freeblock_start,
            num_cells,
            cell_content_start,
            fragmented_free_bytes,
            rightmost_pointer,
        })
    }
}

#[test]
fn test_parse_leaf_header() {
    let mut page = vec![0_u8; 512];
    page[..8].copy_from_slice(&[0x0d, 0x00, 0x00, 0x00, 0x0a, 0x01, 0xce, 0x00]);
    let h = Header::parse(&page, 0).unwrap();
    assert_eq!(h.btree_page_type, PageType::TableLeaf);
    assert_eq!(h.num_cells, 10);
    assert_eq!(h.cell_content_start, 0x1ce);
    assert_eq!(h.rightmost_pointer, None);
    assert_eq!(h.size(), 8);
}

#[test]
fn test_parse_interior_header_after_db_header() {
    let mut page = vec![0_u8; 512];
    page[100..112].copy_from_slice(&[0x05, 0, 0, 0, 0x02, 0, 0, 0, 0, 0, 0, 0x07]);
    let h = Header::parse(&page, 100).unwrap();
    assert_eq!(h.btree_page_type, PageType::TableInterior);
    assert_eq!(h.cell_content_start, 65536);
    assert_eq!(h.rightmost_pointer, Some(7));
    assert_eq!(h.size(), 12);
}

#[test]
fn test_parse_rejects_bad_headers() {
    assert_eq!(
        Header::parse(&[0x0d, 0, 0], 0),
        Err(Error::TruncatedPage { needed: 8, len: 3 })
    );
    assert_eq!(
        Header::parse(&[0x07, 0, 0, 0, 0, 0, 0, 0], 0),
        Err(Error::UnsupportedPageType(0x07))
    );
}
