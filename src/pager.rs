// Hands out pages of an in-memory sqlite3 file image, as defined at https://www.sqlite.org/fileformat.html
// Supports a very simplified subset of the file format.
//
// Excerpts from above docs:
// - The complete state of an SQLite database is usually contained in a single file on disk called the "main database file".
// - The main database file consists of one or more pages.
// - All pages have the same size, given in the database header.
//
// The pager borrows the file image and gives callers page slices of it, without copying.

use crate::btree::PageNum;
use crate::dbheader::{self, DbHeader};
use crate::error::Error;

pub struct Pager<'a> {
    file: &'a [u8],
    header: DbHeader,
}

impl<'a> Pager<'a> {
    /// Validates the database header of `file`, and that the file holds at least one full page.
    pub fn new(file: &'a [u8]) -> Result<Pager<'a>, Error> {
        let header = DbHeader::parse(file)?;
        let page_size = header.page_size as usize;
        if file.len() < page_size {
            return Err(dbheader::Error::TruncatedFile {
                needed: page_size,
                actual: file.len(),
            }
            .into());
        }
        Ok(Pager { file, header })
    }

    pub fn header(&self) -> &DbHeader {
        &self.header
    }

    pub fn page_size(&self) -> usize {
        self.header.page_size as usize
    }

    /// Returns page `pn` (1-based). The whole page must lie within the file.
    pub fn get_page_ro(&self, pn: PageNum) -> Result<&'a [u8], Error> {
        let out_of_range = || Error::PageOutOfRange {
            page: pn,
            file_len: self.file.len(),
        };
        let start = pn
            .checked_sub(1)
            .and_then(|i| i.checked_mul(self.page_size()))
            .ok_or_else(out_of_range)?;
        let end = start
            .checked_add(self.page_size())
            .filter(|e| *e <= self.file.len())
            .ok_or_else(out_of_range)?;
        Ok(&self.file[start..end])
    }
}

#[cfg(test)]
fn two_page_image() -> Vec<u8> {
    let mut file = DbHeader::new(512, 2).unwrap().to_bytes().unwrap();
    file.resize(1024, 0);
    file[512] = 0x0d;
    file
}

#[test]
fn test_get_page_ro() {
    let file = two_page_image();
    let pager = Pager::new(&file).unwrap();
    assert_eq!(pager.page_size(), 512);
    assert_eq!(pager.get_page_ro(1).unwrap().len(), 512);
    assert_eq!(pager.get_page_ro(2).unwrap()[0], 0x0d);
    assert!(matches!(
        pager.get_page_ro(3),
        Err(Error::PageOutOfRange { page: 3, file_len: 1024 })
    ));
    assert!(matches!(
        pager.get_page_ro(0),
        Err(Error::PageOutOfRange { page: 0, .. })
    ));
}

#[test]
fn test_partial_last_page_is_out_of_range() {
    let file = two_page_image();
    let cut = &file[..812];
    let pager = Pager::new(cut).unwrap();
    assert_eq!(pager.get_page_ro(1).unwrap().len(), 512);
    assert!(matches!(
        pager.get_page_ro(2),
        Err(Error::PageOutOfRange { page: 2, file_len: 812 })
    ));
}

#[test]
fn test_file_shorter_than_one_page() {
    let file = DbHeader::new(4096, 1).unwrap().to_bytes().unwrap();
    assert!(matches!(
        Pager::new(&file),
        Err(Error::DbHdr(dbheader::Error::TruncatedFile {
            needed: 4096,
            actual: 100
        }))
    ));
}
