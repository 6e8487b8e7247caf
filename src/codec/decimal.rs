//! Canonical decimal text
//!
//! Encodes an arbitrary-precision decimal as plain positional notation with
//! a `.` decimal point: no exponent, no grouping separators, no trailing
//! zeros. Decoding is the strict inverse and never fails loudly; anything
//! that is not canonical-looking decimal text is "no value".

use std::str::FromStr;

use rust_decimal::Decimal;

use super::CodecError;

/// Domain a caller restricts its values to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecimalDomain {
    /// Any finite decimal
    #[default]
    Unbounded,
    /// Closed interval `[0, 1]`
    UnitInterval,
}

impl DecimalDomain {
    /// Check whether `value` lies in this domain
    pub fn contains(&self, value: &Decimal) -> bool {
        match self {
            DecimalDomain::Unbounded => true,
            DecimalDomain::UnitInterval => *value >= Decimal::ZERO && *value <= Decimal::ONE,
        }
    }

    /// Fail with [`CodecError::OutOfRange`] if `value` is outside this domain
    pub fn check(&self, value: Decimal) -> Result<Decimal, CodecError> {
        if self.contains(&value) {
            Ok(value)
        } else {
            Err(CodecError::OutOfRange(value))
        }
    }
}

/// Encode a decimal to its canonical text form
pub fn encode(value: Decimal, domain: DecimalDomain) -> Result<String, CodecError> {
    let value = domain.check(value)?;
    // normalize() strips trailing zeros and folds -0 into 0
    Ok(value.normalize().to_string())
}

/// Decode canonical decimal text
///
/// Returns `None` for empty or whitespace-only input and for anything that
/// is not `[+-]digits[.digits]` once surrounding whitespace is removed.
/// Grouping separators, decimal commas and exponents are all rejected.
pub fn decode(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let mut canonical = String::with_capacity(unsigned.len() + 2);
    if negative {
        canonical.push('-');
    }
    canonical.push_str(if int_part.is_empty() { "0" } else { int_part });
    if !frac_part.is_empty() {
        canonical.push('.');
        canonical.push_str(frac_part);
    }

    Decimal::from_str(&canonical).ok()
}
