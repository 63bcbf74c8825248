//! 64-bit integer boundary marshalling
//!
//! WebAssembly `i64` values cross into the host as arbitrary-precision
//! integers and come back as exact 64-bit two's-complement patterns. Host
//! numbers are refused outright: they cannot carry every 64-bit value.

use super::{HostError, HostValue};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

/// Host → native. Accepts a `BigInt`, or a string holding an integer
/// literal. Values in `[2^63, 2^64)` wrap to their two's-complement pattern.
pub fn to_native64(value: &HostValue) -> Result<i64, HostError> {
    match value {
        HostValue::BigInt(big) => bigint_to_i64(big),
        HostValue::String(text) => {
            let big = parse_bigint(text)
                .ok_or_else(|| HostError::TypeConversion(format!("cannot convert {:?} to a BigInt", text)))?;
            bigint_to_i64(&big)
        }
        other => Err(HostError::TypeConversion(format!(
            "cannot convert a {} to a BigInt",
            other.type_name()
        ))),
    }
}

/// Native → host. Interprets the 64 bits as a signed integer; never fails.
pub fn to_host64(value: i64) -> HostValue {
    HostValue::BigInt(BigInt::from(value))
}

/// Two's-complement 64-bit pattern of `value`, or a range error when the
/// value needs more than 64 bits.
pub fn bigint_to_i64(value: &BigInt) -> Result<i64, HostError> {
    if let Some(v) = value.to_i64() {
        return Ok(v);
    }
    match value.to_u64() {
        Some(v) => Ok(v as i64),
        None => Err(HostError::RangeConversion(format!("{} does not fit in 64 bits", value))),
    }
}

/// Parse an integer literal the way host string-to-BigInt conversion does:
/// surrounding whitespace is ignored, an empty string is zero, decimal takes
/// an optional sign, and `0x`/`0o`/`0b` prefixes select a radix without a sign.
pub fn parse_bigint(text: &str) -> Option<BigInt> {
    let text = trim_host_whitespace(text);
    if text.is_empty() {
        return Some(BigInt::zero());
    }
    if let Some((digits, radix)) = split_radix_prefix(text) {
        return parse_digits(digits, radix);
    }

    let (negative, digits) = match text.as_bytes()[0] {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = parse_digits(digits, 10)?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Strip host whitespace, which includes the byte order mark.
pub(crate) fn trim_host_whitespace(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

/// Split a `0x`/`0o`/`0b` prefix (either case) off `text`.
pub(crate) fn split_radix_prefix(text: &str) -> Option<(&str, u32)> {
    [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)]
        .iter()
        .find_map(|(prefix, radix)| text.strip_prefix(prefix).map(|digits| (digits, *radix)))
}

/// Unsigned digits in `radix`; no separators, at least one digit.
pub(crate) fn parse_digits(digits: &str, radix: u32) -> Option<BigInt> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    BigInt::parse_bytes(digits.as_bytes(), radix)
}
