//! Defines an enum of all the possible values that a column can hold, and how each one is rendered for display.

use enum_as_inner::EnumAsInner;

/// can hold any value that can be stored in a record.
/// These are the storage classes of the SQLite file format; the constant 0 and 1 serial types decode to `Int`.
#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum SqlValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Renders the value the way a row dump shows it.
    ///
    /// Text is quoted but not escaped, blobs only show their length, and NULL is empty.
    pub fn render(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Real(f) => format_general(*f),
            SqlValue::Text(s) => format!("'{}'", s),
            SqlValue::Blob(b) => format!("BLOB({})", b.len()),
        }
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.render().fmt(f)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Int(i)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

// Significant digits printed for doubles, as C's "%g" does by default.
const GENERAL_PRECISION: i32 = 6;

/// Formats a double like C's `printf("%g", x)`.
fn format_general(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return (if x > 0.0 { "inf" } else { "-inf" }).to_string();
    }
    if x == 0.0 {
        return (if x.is_sign_negative() { "-0" } else { "0" }).to_string();
    }
    // Round to the precision first; rounding can carry into the exponent (999999.5 -> 1e+06).
    let sci = format!("{:.*e}", (GENERAL_PRECISION - 1) as usize, x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= GENERAL_PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (GENERAL_PRECISION - 1 - exp) as usize;
        trim_fraction(&format!("{:.*}", decimals, x)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[test]
fn test_render() {
    assert_eq!(SqlValue::Null.render(), "");
    assert_eq!(SqlValue::Int(-42).render(), "-42");
    assert_eq!(SqlValue::Text("it's".into()).render(), "'it's'");
    assert_eq!(SqlValue::Text("".into()).render(), "''");
    assert_eq!(SqlValue::Blob(vec![1, 2, 3]).render(), "BLOB(3)");
    assert_eq!(SqlValue::Blob(vec![]).render(), "BLOB(0)");
}

#[test]
fn test_format_general() {
    assert_eq!(format_general(3.1415), "3.1415");
    assert_eq!(format_general(0.5), "0.5");
    assert_eq!(format_general(100.0), "100");
    assert_eq!(format_general(-2.5), "-2.5");
    assert_eq!(format_general(123456.0), "123456");
    assert_eq!(format_general(1234567.0), "1.23457e+06");
    assert_eq!(format_general(1e10), "1e+10");
    assert_eq!(format_general(0.0001), "0.0001");
    assert_eq!(format_general(0.00001), "1e-05");
    assert_eq!(format_general(1.0 / 3.0), "0.333333");
    assert_eq!(format_general(0.0), "0");
}

#[test]
fn test_accessors() {
    assert_eq!(SqlValue::Int(2).as_int(), Some(&2));
    assert_eq!(SqlValue::Text("t".into()).as_text().map(|s| s.as_str()), Some("t"));
    assert!(SqlValue::Null.is_null());
    assert!(SqlValue::Real(1.0).as_int().is_none());
}
