//! dbheader reads and writes the 100 byte database file header at the start of page 1.
//!
//! See <https://www.sqlite.org/fileformat.html#the_database_header>

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

pub const DB_HEADER_SIZE: usize = 100;

pub const SQLITE3_MAGIC_STRING: &[u8; 16] = b"SQLite format 3\0";

pub const MIN_PAGE_SIZE: u32 = 512;
pub const MAX_PAGE_SIZE: u32 = 65536;

// Version number written into headers we produce.
const SQLITE_VERSION_NUMBER: u32 = 3037000;
const SCHEMA_FORMAT: u32 = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("The magic bytes for this file are wrong: not a SQLite database.")]
    NotASqliteFile,
    #[error("File is {actual} bytes, too small to hold {needed} bytes.")]
    TruncatedFile { needed: usize, actual: usize },
    #[error("Page size {0} is not a power of two between 512 and 65536.")]
    InvalidPageSize(u32),
    #[error("Text encoding {0} is not one of UTF-8 (1), UTF-16le (2) or UTF-16be (3).")]
    UnsupportedTextEncoding(u32),
}

/// The encoding of every TEXT value in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16le,
    Utf16be,
}

impl TextEncoding {
    fn from_code(code: u32) -> Result<TextEncoding, Error> {
        match code {
            // Zero shows up in headers of databases that never had a schema written.
            0 | 1 => Ok(TextEncoding::Utf8),
            2 => Ok(TextEncoding::Utf16le),
            3 => Ok(TextEncoding::Utf16be),
            x => Err(Error::UnsupportedTextEncoding(x)),
        }
    }

    fn code(&self) -> u32 {
        match self {
            TextEncoding::Utf8 => 1,
            TextEncoding::Utf16le => 2,
            TextEncoding::Utf16be => 3,
        }
    }

    /// Decodes stored text. Invalid sequences become U+FFFD rather than failing the row.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Utf16le | TextEncoding::Utf16be => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|p| match self {
                        TextEncoding::Utf16le => u16::from_le_bytes([p[0], p[1]]),
                        _ => u16::from_be_bytes([p[0], p[1]]),
                    })
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }
}

/// The database file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbHeader {
    pub page_size: u32,
    pub write_version: u8,
    pub read_version: u8,
    pub reserved_space: u8,
    pub change_counter: u32,
    pub num_pages: u32,
    pub schema_cookie: u32,
    pub schema_format: u32,
    pub text_encoding: TextEncoding,
    pub version_valid_for: u32,
    pub sqlite_version: u32,
}

impl DbHeader {
    /// The header this crate writes for a fresh database of `num_pages` pages.
    pub fn new(page_size: u32, num_pages: u32) -> Result<DbHeader, Error> {
        check_page_size(page_size)?;
        Ok(DbHeader {
            page_size,
            write_version: 1,
            read_version: 1,
            reserved_space: 0,
            change_counter: 1,
            num_pages,
            schema_cookie: 1,
            schema_format: SCHEMA_FORMAT,
            text_encoding: TextEncoding::Utf8,
            version_valid_for: 1,
            sqlite_version: SQLITE_VERSION_NUMBER,
        })
    }

    /// Parses the header from the start of a database file image.
    ///
    /// Checks the minimum size, the magic string, and the page size. The rest of
    /// the fields are read but not validated.
    pub fn parse(file: &[u8]) -> Result<DbHeader, Error> {
        if file.len() < DB_HEADER_SIZE {
            return Err(Error::TruncatedFile {
                needed: DB_HEADER_SIZE,
                actual: file.len(),
            });
        }
        let mut c = Cursor::new(&file[..DB_HEADER_SIZE]);
        // These reads cannot fail once the 100 bytes are known to be present.
        let short = |_: std::io::Error| Error::TruncatedFile {
            needed: DB_HEADER_SIZE,
            actual: file.len(),
        };

        // Offset	Size	Description
        // 0	    16	    The header string: "SQLite format 3\000"
        let mut magic = [0_u8; 16];
        c.read_exact(&mut magic).map_err(short)?;
        if &magic != SQLITE3_MAGIC_STRING {
            return Err(Error::NotASqliteFile);
        }
        // 16	    2	    The database page size in bytes. Must be a power of two between 512 and 32768
        //                  inclusive, or the value 1 representing a page size of 65536.
        let page_size = match c.read_u16::<BigEndian>().map_err(short)? {
            1 => MAX_PAGE_SIZE,
            x => x as u32,
        };
        check_page_size(page_size)?;
        // 18	    1	    File format write version. 1 for legacy; 2 for WAL.
        // 19	    1	    File format read version. 1 for legacy; 2 for WAL.
        // 20	    1	    Bytes of unused "reserved" space at the end of each page.
        let write_version = c.read_u8().map_err(short)?;
        let read_version = c.read_u8().map_err(short)?;
        let reserved_space = c.read_u8().map_err(short)?;
        // 21-23 are the payload fractions, fixed at 64, 32, 32.
        c.set_position(24);
        // 24	    4	    File change counter.
        // 28	    4	    Size of the database file in pages.
        let change_counter = c.read_u32::<BigEndian>().map_err(short)?;
        let num_pages = c.read_u32::<BigEndian>().map_err(short)?;
        // 32 and 36 describe the freelist.
        // 40	    4	    The schema cookie.
        // 44	    4	    The schema format number.
        c.set_position(40);
        let schema_cookie = c.read_u32::<BigEndian>().map_err(short)?;
        let schema_format = c.read_u32::<BigEndian>().map_err(short)?;
        // 56	    4	    The database text encoding.
        c.set_position(56);
        let text_encoding = TextEncoding::from_code(c.read_u32::<BigEndian>().map_err(short)?)?;
        // 92	    4	    The version-valid-for number.
        // 96	    4	    SQLITE_VERSION_NUMBER
        c.set_position(92);
        let version_valid_for = c.read_u32::<BigEndian>().map_err(short)?;
        let sqlite_version = c.read_u32::<BigEndian>().map_err(short)?;

        Ok(DbHeader {
            page_size,
            write_version,
            read_version,
            reserved_space,
            change_counter,
            num_pages,
            schema_cookie,
            schema_format,
            text_encoding,
            version_valid_for,
            sqlite_version,
        })
    }

    /// Serializes the header into exactly `DB_HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        let mut out: Vec<u8> = Vec::with_capacity(DB_HEADER_SIZE);
        out.extend_from_slice(SQLITE3_MAGIC_STRING);
        out.write_u16::<BigEndian>(match self.page_size {
            MAX_PAGE_SIZE => 1,
            x => x as u16,
        })?;
        out.write_u8(self.write_version)?;
        out.write_u8(self.read_version)?;
        out.write_u8(self.reserved_space)?;
        // Maximum embedded payload fraction, minimum embedded payload fraction, leaf payload fraction.
        out.extend_from_slice(&[64, 32, 32]);
        out.write_u32::<BigEndian>(self.change_counter)?;
        out.write_u32::<BigEndian>(self.num_pages)?;
        // First freelist trunk page, and total freelist pages.
        out.write_u32::<BigEndian>(0)?;
        out.write_u32::<BigEndian>(0)?;
        out.write_u32::<BigEndian>(self.schema_cookie)?;
        out.write_u32::<BigEndian>(self.schema_format)?;
        // Default page cache size, largest root page for auto-vacuum.
        out.write_u32::<BigEndian>(0)?;
        out.write_u32::<BigEndian>(0)?;
        out.write_u32::<BigEndian>(self.text_encoding.code())?;
        // User version, incremental vacuum, application id.
        out.write_u32::<BigEndian>(0)?;
        out.write_u32::<BigEndian>(0)?;
        out.write_u32::<BigEndian>(0)?;
        // Reserved for expansion. Must be zero.
        out.extend_from_slice(&[0_u8; 20]);
        out.write_u32::<BigEndian>(self.version_valid_for)?;
        out.write_u32::<BigEndian>(self.sqlite_version)?;
        debug_assert_eq!(out.len(), DB_HEADER_SIZE);
        Ok(out)
    }
}

pub fn check_page_size(page_size: u32) -> Result<(), Error> {
    if page_size.is_power_of_two() && (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        Ok(())
    } else {
        Err(Error::InvalidPageSize(page_size))
    }
}

#[test]
fn test_header_round_trip() {
    let h = DbHeader::new(1024, 2).unwrap();
    let bytes = h.to_bytes().unwrap();
    assert_eq!(bytes.len(), DB_HEADER_SIZE);
    assert_eq!(&bytes[..16], SQLITE3_MAGIC_STRING);
    assert_eq!(&bytes[16..18], &[0x04, 0x00]);
    assert_eq!(&bytes[21..24], &[64, 32, 32]);
    assert_eq!(&bytes[56..60], &[0, 0, 0, 1]);
    assert_eq!(DbHeader::parse(&bytes).unwrap(), h);
}

#[test]
fn test_page_size_one_means_65536() {
    let bytes = DbHeader::new(65536, 1).unwrap().to_bytes().unwrap();
    assert_eq!(&bytes[16..18], &[0x00, 0x01]);
    assert_eq!(DbHeader::parse(&bytes).unwrap().page_size, 65536);
}

#[test]
fn test_parse_rejects_short_and_foreign_files() {
    assert_eq!(
        DbHeader::parse(b"SQLite format 3\0"),
        Err(Error::TruncatedFile {
            needed: 100,
            actual: 16
        })
    );
    let mut not_sqlite = DbHeader::new(4096, 1).unwrap().to_bytes().unwrap();
    not_sqlite[0] = b's';
    assert_eq!(DbHeader::parse(&not_sqlite), Err(Error::NotASqliteFile));
}

#[test]
fn test_parse_rejects_bad_page_sizes() {
    let mut bytes = DbHeader::new(4096, 1).unwrap().to_bytes().unwrap();
    bytes[16] = 0;
    bytes[17] = 0;
    assert_eq!(DbHeader::parse(&bytes), Err(Error::InvalidPageSize(0)));
    bytes[16] = 0x03;
    assert_eq!(DbHeader::parse(&bytes), Err(Error::InvalidPageSize(768)));
    assert!(DbHeader::new(100, 1).is_err());
}

#[test]
fn test_utf16_text_decoding() {
    assert_eq!(TextEncoding::Utf16le.decode(&[0x41, 0x00, 0x42, 0x00]), "AB");
    assert_eq!(TextEncoding::Utf16be.decode(&[0x00, 0x41, 0x00, 0x42]), "AB");
    assert_eq!(TextEncoding::Utf8.decode(b"caf\xc3\xa9"), "café");
}
