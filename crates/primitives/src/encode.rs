//! Canonical 32-byte word encoding for field elements and integers.
//!
//! Every value that crosses a boundary (witness, event log, public inputs) is a
//! fixed-width big-endian word, left-zero-padded. `Fp::to_repr` is
//! little-endian, so conversions here reverse the byte order.

use ff::{FromUniformBytes, PrimeField};
use pasta_curves::Fp;

use crate::error::{Error, Result};

pub const WORD_LEN: usize = 32;

/// Big-endian 32-byte encoding of a field element.
pub fn field_to_bytes(f: &Fp) -> [u8; WORD_LEN] {
    let mut out = f.to_repr();
    out.reverse();
    out
}

/// Decode a canonical big-endian encoding. Returns `None` for values >= ORDER.
pub fn field_from_bytes(bytes: &[u8; WORD_LEN]) -> Option<Fp> {
    let mut le = *bytes;
    le.reverse();
    Option::from(Fp::from_repr(le))
}

/// Interpret `bytes` as a big-endian integer and reduce it modulo ORDER.
pub fn reduce_bytes(bytes: &[u8; WORD_LEN]) -> Fp {
    let mut wide = [0u8; 64];
    for (dst, src) in wide[..WORD_LEN].iter_mut().zip(bytes.iter().rev()) {
        *dst = *src;
    }
    <Fp as FromUniformBytes<64>>::from_uniform_bytes(&wide)
}

/// Left-pad a short big-endian value to a full word.
pub fn pad_word(bytes: &[u8]) -> Result<[u8; WORD_LEN]> {
    if bytes.len() > WORD_LEN {
        return Err(Error::invalid_input(format!(
            "value is {} bytes, at most {WORD_LEN} allowed",
            bytes.len()
        )));
    }
    let mut out = [0u8; WORD_LEN];
    out[WORD_LEN - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

pub fn encode_u64_word(v: u64) -> [u8; WORD_LEN] {
    let mut out = [0u8; WORD_LEN];
    out[WORD_LEN - 8..].copy_from_slice(&v.to_be_bytes());
    out
}

/// Inverse of [`encode_u64_word`]; rejects words that do not fit in a u64.
pub fn decode_u64_word(word: &[u8; WORD_LEN]) -> Result<u64> {
    if word[..WORD_LEN - 8].iter().any(|&b| b != 0) {
        return Err(Error::invalid_input("word does not fit in 64 bits"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD_LEN - 8..]);
    Ok(u64::from_be_bytes(buf))
}

pub fn read_fixed<const N: usize>(data: &mut &[u8]) -> Result<[u8; N]> {
    if data.len() < N {
        return Err(Error::invalid_input("unexpected EOF"));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&data[..N]);
    *data = &data[N..];
    Ok(out)
}

pub fn read_word(data: &mut &[u8]) -> Result<[u8; WORD_LEN]> {
    read_fixed::<WORD_LEN>(data)
}

fn strip_hex_prefix(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

/// Parse a hex word with optional `0x` prefix. Short values are left-padded,
/// so minimal encodings such as `0x1` are accepted.
pub fn parse_hex_word(input: &str) -> Result<[u8; WORD_LEN]> {
    let stripped = strip_hex_prefix(input);
    if stripped.is_empty() || stripped.len() > WORD_LEN * 2 {
        return Err(Error::invalid_input(format!(
            "hex word must be 1..={} digits, got {}",
            WORD_LEN * 2,
            stripped.len()
        )));
    }
    let padded = if stripped.len() % 2 == 1 {
        format!("0{stripped}")
    } else {
        stripped.to_string()
    };
    let bytes = hex::decode(&padded)
        .map_err(|e| Error::invalid_input(format!("invalid hex '{input}': {e}")))?;
    pad_word(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff::Field;

    #[test]
    fn field_bytes_are_big_endian() {
        let bytes = field_to_bytes(&Fp::from(0x0102u64));
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert!(bytes[..30].iter().all(|&b| b == 0));
        assert_eq!(field_from_bytes(&bytes), Some(Fp::from(0x0102u64)));
    }

    #[test]
    fn non_canonical_encoding_is_rejected() {
        assert_eq!(field_from_bytes(&[0xff; 32]), None);
        // ORDER itself is not a canonical encoding.
        let order = field_to_bytes(&-Fp::ONE);
        let mut order_plus = order;
        order_plus[31] += 1;
        assert_eq!(field_from_bytes(&order_plus), None);
    }

    #[test]
    fn reduction_wraps_at_order() {
        let minus_one = field_to_bytes(&-Fp::ONE);
        assert_eq!(reduce_bytes(&minus_one), -Fp::ONE);
        let mut order = minus_one;
        order[31] += 1;
        assert_eq!(reduce_bytes(&order), Fp::ZERO);
    }

    #[test]
    fn pad_word_left_pads() {
        let word = pad_word(&[0xab, 0xcd]).unwrap();
        assert_eq!(&word[30..], &[0xab, 0xcd]);
        assert!(pad_word(&[0u8; 33]).is_err());
    }

    #[test]
    fn u64_words() {
        let w = encode_u64_word(0xdead_beef);
        assert_eq!(decode_u64_word(&w).unwrap(), 0xdead_beef);
        let mut big = w;
        big[0] = 1;
        assert!(decode_u64_word(&big).is_err());
    }

    #[test]
    fn read_fixed_advances_and_checks_length() {
        let data = [1u8, 2, 3];
        let mut cursor: &[u8] = &data;
        assert_eq!(read_fixed::<2>(&mut cursor).unwrap(), [1, 2]);
        assert_eq!(cursor, &[3]);
        assert!(read_fixed::<2>(&mut cursor).is_err());
    }

    #[test]
    fn hex_words() {
        assert_eq!(parse_hex_word("0x1").unwrap(), encode_u64_word(1));
        assert_eq!(parse_hex_word("  0XFF ").unwrap(), encode_u64_word(255));
        assert!(parse_hex_word("0x").is_err());
        assert!(parse_hex_word("0xzz").is_err());
        assert!(parse_hex_word(&format!("0x{}", "1".repeat(65))).is_err());
    }
}
