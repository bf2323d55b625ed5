//! varint encodes and decodes the variable-length integers used throughout the file format.
//!
//! From <https://www.sqlite.org/fileformat.html#varint>:
//! A variable-length integer or "varint" is a static Huffman encoding of 64-bit twos-complement integers
//! that uses less space for small positive values. A varint is between 1 and 9 bytes in length. The varint
//! consists of either zero or more bytes which have the high-order bit set followed by a single byte with the
//! high-order bit clear, or nine bytes, whichever is shorter. The lower seven bits of each of the first eight
//! bytes and all 8 bits of the ninth byte are used to reconstruct the 64-bit twos-complement integer.
//! Varints are big-endian: bits taken from the earlier byte of the varint are more significant than bits
//! taken from the later bytes.

pub const MAX_VARINT_LEN: usize = 9;

const CONTINUATION_BIT: u8 = 0x80;
const DATA_MASK: u8 = 0x7f;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Varint needs {needed} bytes but only {available} were available.")]
    TruncatedInput { needed: usize, available: usize },
}

/// Decodes the varint at the start of `bytes`.
///
/// Returns the value and the number of bytes it occupied (1 to 9).
/// Bytes after the end of the varint are ignored.
pub fn decode(bytes: &[u8]) -> Result<(u64, usize), Error> {
    let mut value: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        let b = *bytes.get(i).ok_or(Error::TruncatedInput {
            needed: i + 1,
            available: bytes.len(),
        })?;
        if i == MAX_VARINT_LEN - 1 {
            // The ninth byte contributes all 8 bits and always ends the varint.
            value = (value << 8) | b as u64;
            return Ok((value, MAX_VARINT_LEN));
        }
        value = (value << 7) | (b & DATA_MASK) as u64;
        if b & CONTINUATION_BIT == 0 {
            return Ok((value, i + 1));
        }
    }
    unreachable!("loop always returns by the ninth byte")
}

/// Encodes `value` in the fewest bytes possible.
pub fn encode(value: u64) -> Vec<u8> {
    let mut v = value;
    if v >> 56 != 0 {
        // Needs the full 9 bytes: the last byte holds 8 bits, the first eight hold 7 each.
        let mut out = vec![0_u8; MAX_VARINT_LEN];
        out[8] = v as u8;
        v >>= 8;
        for i in (0..8).rev() {
            out[i] = (v as u8 & DATA_MASK) | CONTINUATION_BIT;
            v >>= 7;
        }
        return out;
    }
    let mut groups: Vec<u8> = Vec::with_capacity(8);
    loop {
        groups.push(v as u8 & DATA_MASK);
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    let last = groups.len() - 1;
    groups
        .iter()
        .rev()
        .enumerate()
        .map(|(i, g)| if i == last { *g } else { g | CONTINUATION_BIT })
        .collect()
}

/// Number of bytes `encode(value)` produces.
pub fn encoded_len(value: u64) -> usize {
    if value >> 56 != 0 {
        return MAX_VARINT_LEN;
    }
    let bits = 64 - value.leading_zeros() as usize;
    std::cmp::max(1, (bits + 6) / 7)
}

#[cfg(test)]
const BOUNDARY_VALUES: [u64; 18] = [
    0,
    1,
    0x7f,
    0x80,
    0x3fff,
    0x4000,
    0x1f_ffff,
    0x20_0000,
    0xfff_ffff,
    0x1000_0000,
    0x7_ffff_ffff,
    0x8_0000_0000,
    0x3ff_ffff_ffff,
    0x1_ffff_ffff_ffff,
    0xff_ffff_ffff_ffff,
    0x100_0000_0000_0000,
    0x7fff_ffff_ffff_ffff,
    u64::MAX,
];

#[test]
fn test_decode_single_byte() {
    assert_eq!(decode(&[0x00]).unwrap(), (0, 1));
    assert_eq!(decode(&[0x7f]).unwrap(), (127, 1));
    // Trailing bytes are not part of the varint.
    assert_eq!(decode(&[0x05, 0xff, 0xff]).unwrap(), (5, 1));
}

#[test]
fn test_decode_multi_byte() {
    assert_eq!(decode(&[0x81, 0x00]).unwrap(), (128, 2));
    assert_eq!(decode(&[0x81, 0x80, 0x00]).unwrap(), (16384, 3));
    assert_eq!(decode(&[0xff, 0x7f]).unwrap(), (16383, 2));
}

#[test]
fn test_decode_nine_bytes_uses_all_bits_of_last_byte() {
    // The high bit of the ninth byte is data, not a continuation flag.
    let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x81, 0xff, 0x42];
    assert_eq!(decode(&bytes).unwrap(), ((1 << 8) | 0xff, 9));
    let all_ones = [0xff_u8; 9];
    assert_eq!(decode(&all_ones).unwrap(), (u64::MAX, 9));
}

#[test]
fn test_decode_truncated() {
    assert_eq!(
        decode(&[]),
        Err(Error::TruncatedInput {
            needed: 1,
            available: 0
        })
    );
    assert_eq!(
        decode(&[0x81, 0x81]),
        Err(Error::TruncatedInput {
            needed: 3,
            available: 2
        })
    );
    assert!(decode(&[0xff_u8; 8]).is_err());
}

#[test]
fn test_encode_known_values() {
    assert_eq!(encode(0), vec![0x00]);
    assert_eq!(encode(127), vec![0x7f]);
    assert_eq!(encode(128), vec![0x81, 0x00]);
    assert_eq!(encode(16383), vec![0xff, 0x7f]);
    assert_eq!(encode(16384), vec![0x81, 0x80, 0x00]);
    assert_eq!(encode(u64::MAX), vec![0xff_u8; 9]);
}

#[test]
fn test_round_trip_at_length_boundaries() {
    for v in BOUNDARY_VALUES {
        let bytes = encode(v);
        assert_eq!(bytes.len(), encoded_len(v), "length for {:#x}", v);
        assert_eq!(decode(&bytes).unwrap(), (v, bytes.len()), "value {:#x}", v);
    }
}

#[test]
fn test_values_from_two_to_the_56_take_nine_bytes() {
    assert_eq!(encode((1 << 56) - 1).len(), 8);
    assert_eq!(encode(1 << 56).len(), 9);
    assert_eq!(decode(&encode(1 << 56)).unwrap(), (1 << 56, 9));
}

#[test]
fn test_decode_agrees_with_sqlite_varint_crate() {
    for v in BOUNDARY_VALUES.iter().filter(|v| **v < (1 << 56)) {
        let bytes = encode(*v);
        let (expected, expected_len) = sqlite_varint::read_varint(&bytes);
        assert_eq!(decode(&bytes).unwrap(), (expected as u64, expected_len));
    }
}
