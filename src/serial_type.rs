//! serial_type maps the per-column serial type codes of a record to storage classes and sizes,
//! and converts column payloads to and from `SqlValue`s.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::dbheader::TextEncoding;
use crate::sql_value::SqlValue;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Serial type code {0} is reserved and never appears in a well-formed database.")]
    Reserved(u64),
    #[error("Serial type code {0} describes a value too large for this platform.")]
    TooLarge(u64),
    #[error("Value {value} cannot be stored with serial type {code}.")]
    TypeMismatch { value: String, code: u64 },
    #[error("Expected {expected} bytes of payload, got {actual}.")]
    WrongPayloadLength { expected: usize, actual: usize },
    #[error("Error reading payload: {0}")]
    Io(#[from] std::io::Error),
}

/// The storage class and size of one column value in a record.
///
/// See <https://www.sqlite.org/fileformat.html#record_format>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialType {
    // 0	0	Value is a NULL.
    Null,
    // 1	1	Value is an 8-bit twos-complement integer.
    Int8,
    // 2	2	Value is a big-endian 16-bit twos-complement integer.
    Int16,
    // 3	3	Value is a big-endian 24-bit twos-complement integer.
    Int24,
    // 4	4	Value is a big-endian 32-bit twos-complement integer.
    Int32,
    // 5	6	Value is a big-endian 48-bit twos-complement integer.
    Int48,
    // 6	8	Value is a big-endian 64-bit twos-complement integer.
    Int64,
    // 7	8	Value is a big-endian IEEE 754-2008 64-bit floating point number.
    Float64,
    // 8	0	Value is the integer 0.
    Zero,
    // 9	0	Value is the integer 1.
    One,
    // N≥12 and even	(N-12)/2	Value is a BLOB that is (N-12)/2 bytes in length.
    Blob(usize),
    // N≥13 and odd	(N-13)/2	Value is a string in the text encoding and (N-13)/2 bytes in length.
    Text(usize),
}

impl SerialType {
    pub fn from_code(code: u64) -> Result<SerialType, Error> {
        use SerialType::*;
        Ok(match code {
            0 => Null,
            1 => Int8,
            2 => Int16,
            3 => Int24,
            4 => Int32,
            5 => Int48,
            6 => Int64,
            7 => Float64,
            8 => Zero,
            9 => One,
            10 | 11 => return Err(Error::Reserved(code)),
            n => {
                let len = usize::try_from((n - 12) / 2).map_err(|_| Error::TooLarge(code))?;
                if n % 2 == 0 {
                    Blob(len)
                } else {
                    Text(len)
                }
            }
        })
    }

    pub fn code(&self) -> u64 {
        use SerialType::*;
        match self {
            Null => 0,
            Int8 => 1,
            Int16 => 2,
            Int24 => 3,
            Int32 => 4,
            Int48 => 5,
            Int64 => 6,
            Float64 => 7,
            Zero => 8,
            One => 9,
            Blob(n) => *n as u64 * 2 + 12,
            Text(n) => *n as u64 * 2 + 13,
        }
    }

    /// Number of body bytes the value occupies.
    pub fn content_size(&self) -> usize {
        use SerialType::*;
        match self {
            Null | Zero | One => 0,
            Int8 => 1,
            Int16 => 2,
            Int24 => 3,
            Int32 => 4,
            Int48 => 6,
            Int64 | Float64 => 8,
            Blob(n) | Text(n) => *n,
        }
    }

    /// Picks the serial type a value is written with: the narrowest integer width,
    /// a double for reals, and exactly-sized text and blob types.
    ///
    /// Never picks `Zero` or `One`; callers that want those pass them to `record::encode_row` explicitly.
    pub fn for_value(value: &SqlValue) -> SerialType {
        use SerialType::*;
        match value {
            SqlValue::Null => Null,
            SqlValue::Int(i) => match *i {
                -0x80..=0x7f => Int8,
                -0x8000..=0x7fff => Int16,
                -0x80_0000..=0x7f_ffff => Int24,
                -0x8000_0000..=0x7fff_ffff => Int32,
                -0x8000_0000_0000..=0x7fff_ffff_ffff => Int48,
                _ => Int64,
            },
            SqlValue::Real(_) => Float64,
            SqlValue::Text(s) => Text(s.len()),
            SqlValue::Blob(b) => Blob(b.len()),
        }
    }
}

/// Reads the value of type `serial_type` from `data`, which holds exactly its payload.
pub fn to_sql_value(
    serial_type: SerialType,
    data: &[u8],
    encoding: TextEncoding,
) -> Result<SqlValue, Error> {
    use SerialType::*;
    if data.len() != serial_type.content_size() {
        return Err(Error::WrongPayloadLength {
            expected: serial_type.content_size(),
            actual: data.len(),
        });
    }
    let mut c = Cursor::new(data);
    Ok(match serial_type {
        Null => SqlValue::Null,
        // read_int sign-extends, which covers the 24 and 48 bit widths.
        Int8 | Int16 | Int24 | Int32 | Int48 | Int64 => {
            SqlValue::Int(c.read_int::<BigEndian>(serial_type.content_size())?)
        }
        Float64 => SqlValue::Real(c.read_f64::<BigEndian>()?),
        Zero => SqlValue::Int(0),
        One => SqlValue::Int(1),
        Blob(_) => SqlValue::Blob(data.to_vec()),
        Text(_) => SqlValue::Text(encoding.decode(data)),
    })
}

/// Appends the payload of `value`, stored as `serial_type`, to `out`.
pub fn write_value(serial_type: SerialType, value: &SqlValue, out: &mut Vec<u8>) -> Result<(), Error> {
    use SerialType::*;
    let mismatch = || Error::TypeMismatch {
        value: format!("{:?}", value),
        code: serial_type.code(),
    };
    match (serial_type, value) {
        (Null, SqlValue::Null) => {}
        (Zero, SqlValue::Int(0)) | (One, SqlValue::Int(1)) => {}
        (Int8 | Int16 | Int24 | Int32 | Int48 | Int64, SqlValue::Int(i)) => {
            let nbytes = serial_type.content_size();
            let bits = nbytes as u32 * 8;
            if bits < 64 {
                let min = -(1_i64 << (bits - 1));
                let max = (1_i64 << (bits - 1)) - 1;
                if *i < min || *i > max {
                    return Err(mismatch());
                }
            }
            out.write_int::<BigEndian>(*i, nbytes)?;
        }
        (Float64, SqlValue::Real(f)) => out.write_f64::<BigEndian>(*f)?,
        (Text(n), SqlValue::Text(s)) if n == s.len() => out.extend_from_slice(s.as_bytes()),
        (Blob(n), SqlValue::Blob(b)) if n == b.len() => out.extend_from_slice(b),
        _ => return Err(mismatch()),
    }
    Ok(())
}

#[test]
fn test_from_code() {
    use SerialType::*;
    assert_eq!(SerialType::from_code(0).unwrap(), Null);
    assert_eq!(SerialType::from_code(5).unwrap(), Int48);
    assert_eq!(SerialType::from_code(9).unwrap(), One);
    assert_eq!(SerialType::from_code(12).unwrap(), Blob(0));
    assert_eq!(SerialType::from_code(13).unwrap(), Text(0));
    assert_eq!(SerialType::from_code(18).unwrap(), Blob(3));
    assert_eq!(SerialType::from_code(25).unwrap(), Text(6));
    assert!(matches!(SerialType::from_code(10), Err(Error::Reserved(10))));
    assert!(matches!(SerialType::from_code(11), Err(Error::Reserved(11))));
}

#[test]
fn test_code_inverts_from_code() {
    for code in (0..10).chain(12..40).chain([1001, 1002]) {
        assert_eq!(SerialType::from_code(code).unwrap().code(), code);
    }
}

#[test]
fn test_content_size() {
    let sizes: Vec<usize> = (0..10)
        .map(|c| SerialType::from_code(c).unwrap().content_size())
        .collect();
    assert_eq!(sizes, vec![0, 1, 2, 3, 4, 6, 8, 8, 0, 0]);
    assert_eq!(SerialType::Text(7).content_size(), 7);
}

#[test]
fn test_to_sql_value_integers() {
    use SerialType::*;
    let utf8 = TextEncoding::Utf8;
    assert_eq!(to_sql_value(Int8, &[0x7f], utf8).unwrap(), SqlValue::Int(127));
    assert_eq!(to_sql_value(Int8, &[0xff], utf8).unwrap(), SqlValue::Int(-1));
    assert_eq!(to_sql_value(Int16, &[0x01, 0x00], utf8).unwrap(), SqlValue::Int(256));
    assert_eq!(
        to_sql_value(Int24, &[0xff, 0xff, 0xff], utf8).unwrap(),
        SqlValue::Int(-1)
    );
    assert_eq!(
        to_sql_value(Int24, &[0x01, 0x00, 0x00], utf8).unwrap(),
        SqlValue::Int(65536)
    );
    assert_eq!(
        to_sql_value(Int48, &[0xff, 0xff, 0xff, 0xff, 0xff, 0xfe], utf8).unwrap(),
        SqlValue::Int(-2)
    );
    assert_eq!(
        to_sql_value(Int48, &[0x01, 0x00, 0x00, 0x00, 0x00, 0x00], utf8).unwrap(),
        SqlValue::Int(1 << 40)
    );
    assert_eq!(
        to_sql_value(Int64, &[0x80, 0, 0, 0, 0, 0, 0, 0], utf8).unwrap(),
        SqlValue::Int(i64::MIN)
    );
    assert_eq!(to_sql_value(Zero, &[], utf8).unwrap(), SqlValue::Int(0));
    assert_eq!(to_sql_value(One, &[], utf8).unwrap(), SqlValue::Int(1));
}

#[test]
fn test_to_sql_value_other_classes() {
    use SerialType::*;
    let utf8 = TextEncoding::Utf8;
    assert_eq!(to_sql_value(Null, &[], utf8).unwrap(), SqlValue::Null);
    assert_eq!(
        to_sql_value(Float64, &[0x40, 0x09, 0x21, 0xca, 0xc0, 0x83, 0x12, 0x6f], utf8).unwrap(),
        SqlValue::Real(3.1415)
    );
    assert_eq!(
        to_sql_value(Text(3), b"Foo", utf8).unwrap(),
        SqlValue::Text("Foo".to_string())
    );
    assert_eq!(
        to_sql_value(Blob(3), &[0x00, 0x01, 0xff], utf8).unwrap(),
        SqlValue::Blob(vec![0, 1, 255])
    );
    assert!(matches!(
        to_sql_value(Int32, &[0x00], utf8),
        Err(Error::WrongPayloadLength { expected: 4, actual: 1 })
    ));
}

#[test]
fn test_for_value_picks_narrowest_integer() {
    use SerialType::*;
    let st = |i: i64| SerialType::for_value(&SqlValue::Int(i));
    assert_eq!(st(0), Int8);
    assert_eq!(st(-128), Int8);
    assert_eq!(st(128), Int16);
    assert_eq!(st(-32769), Int24);
    assert_eq!(st(8_388_608), Int32);
    assert_eq!(st(1 << 31), Int48);
    assert_eq!(st(1 << 47), Int64);
    assert_eq!(st(i64::MIN), Int64);
    assert_eq!(SerialType::for_value(&SqlValue::Text("Bob".into())), Text(3));
}

#[test]
fn test_write_value_rejects_mismatches() {
    let mut out = vec![];
    assert!(write_value(SerialType::Int8, &SqlValue::Int(128), &mut out).is_err());
    assert!(write_value(SerialType::Text(2), &SqlValue::Text("abc".into()), &mut out).is_err());
    assert!(write_value(SerialType::One, &SqlValue::Int(0), &mut out).is_err());
    assert!(out.is_empty());
    write_value(SerialType::Int24, &SqlValue::Int(-2), &mut out).unwrap();
    assert_eq!(out, vec![0xff, 0xff, 0xfe]);
}
