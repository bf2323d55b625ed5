/// SQLite btrees come in two types: Tables and Indexes.
/// Btree pages are either leaves or interior pages.
/// Each of these 4 combinations has a different cell format, but only table leaves are read or written here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    IndexInterior,
    TableInterior,
    IndexLeaf,
    TableLeaf,
}

impl PageType {
    pub fn from_byte(b: u8) -> Option<PageType> {
        match b {
            0x02 => Some(PageType::IndexInterior),
            0x05 => Some(PageType::TableInterior),
            0x0a => Some(PageType::IndexLeaf),
            0x0d => Some(PageType::TableLeaf),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            PageType::IndexInterior => 0x02,
            PageType::TableInterior => 0x05,
            PageType::IndexLeaf => 0x0a,
            PageType::TableLeaf => TABLE_LEAF_PAGE_TYPE,
        }
    }
}

pub const TABLE_LEAF_PAGE_TYPE: u8 = 0x0d;

/// Size of the btree page header on leaf pages. Interior pages add a 4 byte rightmost pointer.
pub const LEAF_HEADER_SIZE: usize = 8;

// SQLite row ids are 64b integers, read here as the unsigned varint they are stored as.
pub type RowId = u64;

// Page numbers are 1-based, to match how Sqlite numbers pages.
pub type PageNum = usize;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Page type {0:#04x} is not a table leaf page, the only type supported.")]
    UnsupportedPageType(u8),
    #[error("Page of {len} bytes is too short for a structure that needs {needed} bytes.")]
    TruncatedPage { needed: usize, len: usize },
    #[error("Cell at offset {offset} has a {payload_len} byte payload that runs past the page end; overflow pages are not supported.")]
    CellOverflow { offset: usize, payload_len: u64 },
    #[error("Cell at offset {offset}: {source}")]
    CellVarint {
        offset: usize,
        source: crate::varint::Error,
    },
    #[error("Page cannot hold its cells: {needed} bytes needed, {available} available.")]
    PageFull { needed: usize, available: usize },
}

/// Offset of the btree page header within a page: page 1 starts with the database header.
pub fn btree_start_offset(pgnum: PageNum) -> usize {
    match pgnum {
        1 => crate::dbheader::DB_HEADER_SIZE,
        _ => 0,
    }
}

/// module `header` reads btree page headers.
pub mod header;
// module `cell` finds where the cells of a page start, without interpreting them.
pub mod cell;
// module `leaf` splits table leaf cells into rowid and record.
pub mod leaf;
// module `page_builder` lays out new table leaf pages.
pub mod page_builder;

pub use cell::{leaf_cell_offsets, page_type};
