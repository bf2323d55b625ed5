//! Btree Cells hold Records, which contain SQL rows.
//! Each field in a row has a serial type which is not the same as the column SQL type, but varies by the value stored.
//!
//! "A record contains a header and a body, in that order.
//! The header begins with a single varint which determines the total number of bytes in the header"
//! - https://www.sqlite.org/fileformat.html#record_format

use itertools::Itertools;

use crate::dbheader::TextEncoding;
use crate::serial_type::{self, SerialType};
use crate::sql_value::SqlValue;
use crate::varint;

/// Upper bound on columns per record. Matches SQLite's default SQLITE_MAX_COLUMN.
pub const MAX_COLUMNS: usize = 2000;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Corrupt record header: {0}")]
    CorruptHeader(String),
    #[error("Record body needs {needed} bytes but the record is only {len} bytes long.")]
    TruncatedBody { needed: usize, len: usize },
    #[error("Column {colnum}: {detail}")]
    Value {
        colnum: usize,
        detail: serial_type::Error,
    },
    #[error("Row has {values} values but {types} serial types.")]
    ColumnCountMismatch { values: usize, types: usize },
}

/// Reads the record header: the declared header length and the serial type of each column.
pub fn decode_header(record: &[u8]) -> Result<(usize, Vec<SerialType>), Error> {
    let (hdr_len, hdr_len_len) = varint::decode(record)
        .map_err(|e| Error::CorruptHeader(format!("reading header length: {}", e)))?;
    let hdr_len = match usize::try_from(hdr_len) {
        Ok(n) if n >= hdr_len_len && n <= record.len() => n,
        _ => {
            return Err(Error::CorruptHeader(format!(
                "declared header length {} does not fit a {} byte record",
                hdr_len,
                record.len()
            )))
        }
    };
    let mut serial_types = vec![];
    let mut pos = hdr_len_len;
    while pos < hdr_len {
        if serial_types.len() >= MAX_COLUMNS {
            return Err(Error::CorruptHeader(format!(
                "more than {} columns",
                MAX_COLUMNS
            )));
        }
        let (code, n) = varint::decode(&record[pos..hdr_len]).map_err(|_| {
            Error::CorruptHeader(format!(
                "serial type at byte {} runs past the header end at {}",
                pos, hdr_len
            ))
        })?;
        let st = SerialType::from_code(code).map_err(|e| Error::CorruptHeader(e.to_string()))?;
        serial_types.push(st);
        pos += n;
    }
    Ok((hdr_len, serial_types))
}

/// Offset just past the payloads of `serial_types` when they start at `start`.
/// Sizes come from the file, so a sum that overflows is a corrupt header.
fn payload_end(start: usize, serial_types: &[SerialType]) -> Result<usize, Error> {
    serial_types
        .iter()
        .try_fold(start, |acc, st| acc.checked_add(st.content_size()))
        .ok_or_else(|| Error::CorruptHeader("declared column sizes overflow".to_string()))
}

/// Reads the column values of a record whose header was read with `decode_header`. Text is taken as UTF-8.
pub fn decode_body(
    record: &[u8],
    header_len: usize,
    serial_types: &[SerialType],
) -> Result<Vec<SqlValue>, Error> {
    decode_body_with_encoding(record, header_len, serial_types, TextEncoding::Utf8)
}

pub fn decode_body_with_encoding(
    record: &[u8],
    header_len: usize,
    serial_types: &[SerialType],
    encoding: TextEncoding,
) -> Result<Vec<SqlValue>, Error> {
    let mut values = Vec::with_capacity(serial_types.len());
    let mut cursor = header_len;
    for (colnum, st) in serial_types.iter().enumerate() {
        let end = payload_end(cursor, std::slice::from_ref(st))?;
        let data = record.get(cursor..end).ok_or(Error::TruncatedBody {
            needed: end,
            len: record.len(),
        })?;
        let v = serial_type::to_sql_value(*st, data, encoding)
            .map_err(|detail| Error::Value { colnum, detail })?;
        values.push(v);
        cursor = end;
    }
    Ok(values)
}

/// Renders a row as its values separated by " | ".
pub fn render(values: &[SqlValue]) -> String {
    values.iter().map(SqlValue::render).join(" | ")
}

/// Serializes a row: header length, serial types, then the payloads back to back.
///
/// `serial_types[i]` must be able to hold `values[i]`; see `SerialType::for_value`.
pub fn encode_row(values: &[SqlValue], serial_types: &[SerialType]) -> Result<Vec<u8>, Error> {
    if values.len() != serial_types.len() {
        return Err(Error::ColumnCountMismatch {
            values: values.len(),
            types: serial_types.len(),
        });
    }
    let codes: Vec<u64> = serial_types.iter().map(SerialType::code).collect();
    let types_len: usize = codes.iter().map(|c| varint::encoded_len(*c)).sum();
    // The header length counts its own varint, so grow it until it is consistent.
    let mut hdr_len = types_len + 1;
    loop {
        let n = types_len + varint::encoded_len(hdr_len as u64);
        if n == hdr_len {
            break;
        }
        hdr_len = n;
    }

    let mut out = Vec::with_capacity(hdr_len);
    out.extend(varint::encode(hdr_len as u64));
    for c in &codes {
        out.extend(varint::encode(*c));
    }
    for (colnum, (st, v)) in serial_types.iter().zip(values).enumerate() {
        serial_type::write_value(*st, v, &mut out).map_err(|detail| Error::Value { colnum, detail })?;
    }
    Ok(out)
}

/// Serializes a row choosing each column's serial type with `SerialType::for_value`.
pub fn encode_values(values: &[SqlValue]) -> Result<Vec<u8>, Error> {
    let serial_types: Vec<SerialType> = values.iter().map(SerialType::for_value).collect();
    encode_row(values, &serial_types)
}

/// A parsed record header over borrowed record bytes. Columns can be read one at a time,
/// so callers that need a few columns do not decode the rest.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    data: &'a [u8],
    header_len: usize,
    serial_types: Vec<SerialType>,
}

impl<'a> Record<'a> {
    /// Parses the header and checks that every column's payload lies within `data`.
    pub fn parse(data: &'a [u8]) -> Result<Record<'a>, Error> {
        let (header_len, serial_types) = decode_header(data)?;
        let needed = payload_end(header_len, &serial_types)?;
        if needed > data.len() {
            return Err(Error::TruncatedBody {
                needed,
                len: data.len(),
            });
        }
        Ok(Record {
            data,
            header_len,
            serial_types,
        })
    }

    pub fn num_columns(&self) -> usize {
        self.serial_types.len()
    }

    pub fn serial_types(&self) -> &[SerialType] {
        &self.serial_types
    }

    /// Reads column `idx` only, skipping earlier columns by their declared sizes.
    /// Returns `None` when the record has fewer columns.
    pub fn value(&self, idx: usize, encoding: TextEncoding) -> Option<Result<SqlValue, Error>> {
        let st = *self.serial_types.get(idx)?;
        let start = match payload_end(self.header_len, &self.serial_types[..idx]) {
            Ok(start) => start,
            Err(e) => return Some(Err(e)),
        };
        let end = match payload_end(start, std::slice::from_ref(&st)) {
            Ok(end) => end,
            Err(e) => return Some(Err(e)),
        };
        Some(match self.data.get(start..end) {
            Some(bytes) => serial_type::to_sql_value(st, bytes, encoding)
                .map_err(|detail| Error::Value { colnum: idx, detail }),
            None => Err(Error::TruncatedBody {
                needed: end,
                len: self.data.len(),
            }),
        })
    }

    pub fn values(&self, encoding: TextEncoding) -> Result<Vec<SqlValue>, Error> {
        decode_body_with_encoding(self.data, self.header_len, &self.serial_types, encoding)
    }
}

#[test]
fn test_decode_header_one_byte_int() {
    // 2 byte record header, record type is literal 1 (09), record body has zero bytes.
    let test_record: &[u8] = &[0x02, 0x09];
    let (hdr_len, types) = decode_header(test_record).unwrap();
    assert_eq!(hdr_len, 2);
    assert_eq!(types, vec![SerialType::One]);
    assert_eq!(
        decode_body(test_record, hdr_len, &types).unwrap(),
        vec![SqlValue::Int(1)]
    );
}

#[test]
fn test_decode_five_one_byte_ints_value_ten_to_fourteen() {
    let test_record: &[u8] = &[
        0x06, 0x01, 0x01, 0x01, 0x01, 0x01, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    ];
    let (hdr_len, types) = decode_header(test_record).unwrap();
    let values = decode_body(test_record, hdr_len, &types).unwrap();
    assert_eq!(
        values,
        (10..=14).map(SqlValue::Int).collect::<Vec<SqlValue>>()
    );
    assert_eq!(render(&values), "10 | 11 | 12 | 13 | 14");
}

#[test]
fn test_decode_various_types() {
    // literal 0 | literal 1 | float 3.1415 | "Ten" | NULL
    let test_record: &[u8] = &[
        0x06, 0x08, 0x09, 0x07, 0x13, 0x00, 0x40, 0x09, 0x21, 0xca, 0xc0, 0x83, 0x12, 0x6f, 0x54,
        0x65, 0x6e,
    ];
    let (hdr_len, types) = decode_header(test_record).unwrap();
    let values = decode_body(test_record, hdr_len, &types).unwrap();
    assert_eq!(
        values,
        vec![
            SqlValue::Int(0),
            SqlValue::Int(1),
            SqlValue::Real(3.1415),
            SqlValue::Text("Ten".to_string()),
            SqlValue::Null,
        ]
    );
    assert_eq!(render(&values), "0 | 1 | 3.1415 | 'Ten' | ");
}

#[test]
fn test_empty_text_and_blob_take_no_body_bytes() {
    // '' | x'' | 7
    let test_record: &[u8] = &[0x04, 0x0d, 0x0c, 0x01, 0x07];
    let (hdr_len, types) = decode_header(test_record).unwrap();
    assert_eq!(types, vec![SerialType::Text(0), SerialType::Blob(0), SerialType::Int8]);
    let values = decode_body(test_record, hdr_len, &types).unwrap();
    assert_eq!(
        values,
        vec![
            SqlValue::Text(String::new()),
            SqlValue::Blob(vec![]),
            SqlValue::Int(7)
        ]
    );
    assert_eq!(render(&values), "'' | BLOB(0) | 7");
}

#[test]
fn test_corrupt_headers() {
    // Header length larger than the record.
    assert!(matches!(
        decode_header(&[0x05, 0x01]),
        Err(Error::CorruptHeader(_))
    ));
    // Header length of zero cannot cover its own varint.
    assert!(matches!(decode_header(&[0x00]), Err(Error::CorruptHeader(_))));
    // Serial type varint continues past the declared header end.
    assert!(matches!(
        decode_header(&[0x02, 0x81, 0x01]),
        Err(Error::CorruptHeader(_))
    ));
    // Reserved serial type.
    assert!(matches!(
        decode_header(&[0x02, 0x0a]),
        Err(Error::CorruptHeader(_))
    ));
}

#[test]
fn test_column_cap() {
    let mut record = varint::encode(2 + MAX_COLUMNS as u64 + 1);
    record.extend(std::iter::repeat(0x00).take(MAX_COLUMNS + 1));
    assert!(matches!(decode_header(&record), Err(Error::CorruptHeader(_))));
}

#[test]
fn test_truncated_body() {
    // Declares a 3 byte string but only has 2 bytes.
    let test_record: &[u8] = &[0x02, 0x13, 0x41, 0x42];
    let (hdr_len, types) = decode_header(test_record).unwrap();
    assert!(matches!(
        decode_body(test_record, hdr_len, &types),
        Err(Error::TruncatedBody { needed: 5, len: 4 })
    ));
    assert!(matches!(
        Record::parse(test_record),
        Err(Error::TruncatedBody { needed: 5, len: 4 })
    ));
}

#[test]
fn test_encode_row_round_trips_every_class() {
    use SerialType::*;
    let values = vec![
        SqlValue::Null,
        SqlValue::Int(-5),
        SqlValue::Int(1000),
        SqlValue::Int(-70000),
        SqlValue::Int(1 << 30),
        SqlValue::Int(-(1 << 40)),
        SqlValue::Int(i64::MAX),
        SqlValue::Real(-0.125),
        SqlValue::Int(0),
        SqlValue::Int(1),
        SqlValue::Text("Alice".to_string()),
        SqlValue::Blob(vec![0xde, 0xad]),
        SqlValue::Text(String::new()),
    ];
    let types = vec![
        Null,
        Int8,
        Int16,
        Int24,
        Int32,
        Int48,
        Int64,
        Float64,
        Zero,
        One,
        Text(5),
        Blob(2),
        Text(0),
    ];
    let record = encode_row(&values, &types).unwrap();
    let (hdr_len, decoded_types) = decode_header(&record).unwrap();
    assert_eq!(decoded_types, types);
    assert_eq!(decode_body(&record, hdr_len, &decoded_types).unwrap(), values);
    assert_eq!(
        hdr_len + types.iter().map(SerialType::content_size).sum::<usize>(),
        record.len()
    );
}

#[test]
fn test_encode_values_matches_hand_built_record() {
    let record = encode_values(&[SqlValue::Int(2), "Bob".into()]).unwrap();
    assert_eq!(record, vec![0x03, 0x01, 0x13, 0x02, b'B', b'o', b'b']);
}

#[test]
fn test_header_length_varint_grows_with_many_columns() {
    // 127 one-byte serial types need a two byte header length varint: 127 + 2 = 129.
    let values = vec![SqlValue::Null; 127];
    let record = encode_values(&values).unwrap();
    assert_eq!(&record[..2], &[0x81, 0x01]);
    let (hdr_len, types) = decode_header(&record).unwrap();
    assert_eq!(hdr_len, 129);
    assert_eq!(types.len(), 127);
}

#[test]
fn test_record_reads_single_columns() {
    let record = encode_values(&[
        "table".into(),
        "mytable".into(),
        "mytable".into(),
        SqlValue::Int(2),
        "CREATE TABLE mytable(id)".into(),
    ])
    .unwrap();
    let r = Record::parse(&record).unwrap();
    assert_eq!(r.num_columns(), 5);
    assert_eq!(
        r.value(1, TextEncoding::Utf8).unwrap().unwrap(),
        SqlValue::Text("mytable".to_string())
    );
    assert_eq!(r.value(3, TextEncoding::Utf8).unwrap().unwrap(), SqlValue::Int(2));
    assert!(r.value(5, TextEncoding::Utf8).is_none());
}

#[cfg(test)]
pub(crate) fn record_with_oversized_blobs() -> Vec<u8> {
    // Two blob columns of about 2^63 bytes each: their sizes sum past usize::MAX.
    let code = u64::MAX - 1;
    let mut record = varint::encode(1 + 2 * varint::MAX_VARINT_LEN as u64);
    record.extend(varint::encode(code));
    record.extend(varint::encode(code));
    record
}

#[test]
fn test_overflowing_column_sizes_are_corrupt() {
    let record = record_with_oversized_blobs();
    assert_eq!(record.len(), 19);
    let (hdr_len, types) = decode_header(&record).unwrap();
    assert_eq!(hdr_len, 19);
    assert!(matches!(
        Record::parse(&record),
        Err(Error::CorruptHeader(_))
    ));
    assert!(matches!(
        decode_body(&record, hdr_len, &types),
        Err(Error::TruncatedBody { .. }) | Err(Error::CorruptHeader(_))
    ));
    assert!(matches!(
        encode_row(&[SqlValue::Null, SqlValue::Null], &types),
        Err(Error::Value { colnum: 0, .. })
    ));
}
