//! The crate-level error, which every layer's error converts into.

use crate::btree::PageNum;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Database header: {0}")]
    DbHdr(#[from] crate::dbheader::Error),
    #[error("Btree page: {0}")]
    Btree(#[from] crate::btree::Error),
    #[error("Record: {0}")]
    Record(#[from] crate::record::Error),
    #[error("Varint: {0}")]
    Varint(#[from] crate::varint::Error),
    #[error("Building database: {0}")]
    Build(#[from] crate::builder::Error),
    #[error("Table {0} not found in database.")]
    TableNotFound(String),
    #[error("Page {page} is not within the {file_len} byte database file.")]
    PageOutOfRange { page: PageNum, file_len: usize },
    #[error("Error accessing database file: {0}")]
    Io(#[from] std::io::Error),
}
