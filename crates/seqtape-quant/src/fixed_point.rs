//! Deterministic decimal-string ↔ mantissa conversion.
//!
//! Exchanges expose decimals as strings. Parsing walks the bytes directly
//! (sign, integer digits, one optional dot, fraction digits) so the result
//! is identical on every platform and independent of any float rounding
//! mode. Fractions longer than the target scale are truncated toward zero,
//! never rounded: rounding untrusted input would let a vendor's extra digit
//! flip a mantissa.

use crate::checked::{self, ArithmeticError};
use crate::{PriceMicros, QtySats, TimeStamp, PRICE_SCALE_DIGITS, QTY_SCALE_DIGITS};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixedPointError {
    #[error("malformed decimal: {0:?}")]
    Malformed(String),
    #[error("decimal out of range: {0:?}")]
    Overflow(String),
}

/// Parse a decimal string into an integer mantissa with `scale` fractional
/// digits.
///
/// The empty string and `"null"` parse to 0 (vendors send both for "no
/// value"). A second decimal point or any non-digit byte is malformed.
pub fn parse_fixed_point(s: &str, scale: u32) -> Result<i64, FixedPointError> {
    if s.is_empty() || s == "null" {
        return Ok(0);
    }

    let overflow = |_: ArithmeticError| FixedPointError::Overflow(s.to_string());
    let malformed = || FixedPointError::Malformed(s.to_string());

    let bytes = s.as_bytes();
    let mut i = 0;
    let negative = match bytes[0] {
        b'-' => {
            i = 1;
            true
        }
        b'+' => {
            i = 1;
            false
        }
        _ => false,
    };

    let mut mantissa: i64 = 0;
    let mut saw_digit = false;

    // Integer part, up to the optional dot.
    while i < bytes.len() && bytes[i] != b'.' {
        let d = bytes[i];
        if !d.is_ascii_digit() {
            return Err(malformed());
        }
        mantissa = checked::mul(mantissa, 10)
            .and_then(|m| checked::add(m, i64::from(d - b'0')))
            .map_err(overflow)?;
        saw_digit = true;
        i += 1;
    }

    let mut frac_digits: u32 = 0;
    if i < bytes.len() {
        i += 1; // consume '.'
        while i < bytes.len() {
            let d = bytes[i];
            if !d.is_ascii_digit() {
                // A second '.' lands here too.
                return Err(malformed());
            }
            saw_digit = true;
            if frac_digits < scale {
                mantissa = checked::mul(mantissa, 10)
                    .and_then(|m| checked::add(m, i64::from(d - b'0')))
                    .map_err(overflow)?;
                frac_digits += 1;
            }
            // Digits beyond `scale` are truncated toward zero.
            i += 1;
        }
    }

    if !saw_digit {
        return Err(malformed());
    }

    while frac_digits < scale {
        mantissa = checked::mul(mantissa, 10).map_err(overflow)?;
        frac_digits += 1;
    }

    Ok(if negative { -mantissa } else { mantissa })
}

/// Render a mantissa back to a decimal string with exactly `scale`
/// fractional digits (zero-padded).
pub fn format_fixed_point(v: i64, scale: u32) -> String {
    let sign = if v < 0 { "-" } else { "" };
    let mag = v.unsigned_abs();
    if scale == 0 {
        return format!("{sign}{mag}");
    }
    let pow = 10u64.pow(scale);
    let int = mag / pow;
    let frac = mag % pow;
    format!("{sign}{int}.{frac:0width$}", width = scale as usize)
}

/// Parse a quote-currency decimal into [`PriceMicros`].
pub fn price_from_str(s: &str) -> Result<PriceMicros, FixedPointError> {
    parse_fixed_point(s, PRICE_SCALE_DIGITS)
}

/// Parse a base-asset decimal into [`QtySats`].
pub fn qty_from_str(s: &str) -> Result<QtySats, FixedPointError> {
    parse_fixed_point(s, QTY_SCALE_DIGITS)
}

/// Unix-millisecond integer string → [`TimeStamp`] micros.
pub fn timestamp_from_millis_str(s: &str) -> Result<TimeStamp, FixedPointError> {
    let ms = parse_fixed_point(s, 0)?;
    checked::mul(ms, 1_000).map_err(|_| FixedPointError::Overflow(s.to_string()))
}

pub fn price_to_display(v: PriceMicros) -> String {
    format_fixed_point(v, PRICE_SCALE_DIGITS)
}

pub fn qty_to_display(v: QtySats) -> String {
    format_fixed_point(v, QTY_SCALE_DIGITS)
}

/// Display only. Never feed the result back into core math.
pub fn price_to_f64(v: PriceMicros) -> f64 {
    v as f64 / crate::PRICE_SCALE as f64
}

/// Display only. Never feed the result back into core math.
pub fn qty_to_f64(v: QtySats) -> f64 {
    v as f64 / crate::QTY_SCALE as f64
}
