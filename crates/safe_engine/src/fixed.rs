//! Fixed-point amounts
//!
//! Every monetary quantity is held as an unsigned integer scaled by 10^45
//! (RAD), so WAD (18) and RAY (27) inputs convert without loss. Digits beyond
//! the target precision are truncated toward zero, both when parsing decimal
//! strings and after every multiplication or division.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uint::construct_uint;

construct_uint! {
    /// 512-bit integer backing every fixed-point amount.
    pub struct U512(8);
}

/// Decimal places of the internal representation
pub const RAD_DECIMALS: usize = 45;

/// On-chain fixed-point precisions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Precision {
    /// 18 decimals
    Wad,
    /// 27 decimals
    Ray,
    /// 45 decimals
    Rad,
}

impl Precision {
    pub const ALL: [Precision; 3] = [Precision::Wad, Precision::Ray, Precision::Rad];

    pub const fn decimals(self) -> usize {
        match self {
            Precision::Wad => 18,
            Precision::Ray => 27,
            Precision::Rad => 45,
        }
    }

    /// 10^decimals
    pub fn unit(self) -> U512 {
        U512::exp10(self.decimals())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixedPointError {
    #[error("empty numeric string")]
    Empty,
    #[error("malformed numeric string: {0:?}")]
    Malformed(String),
    #[error("numeric value out of range: {0}")]
    Overflow(String),
}

/// Non-negative decimal amount at 45-decimal precision
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(U512);

impl Amount {
    pub const ZERO: Amount = Amount(U512([0; 8]));
    pub const MAX: Amount = Amount(U512([u64::MAX; 8]));

    /// 1.0
    pub fn one() -> Self {
        Amount(Precision::Rad.unit())
    }

    /// Whole-number amount
    pub fn from_int(n: u64) -> Self {
        Amount(U512::from(n).saturating_mul(Precision::Rad.unit()))
    }

    /// Amount from a raw integer scaled at `precision`
    pub fn from_fixed(raw: U512, precision: Precision) -> Self {
        let factor = U512::exp10(RAD_DECIMALS - precision.decimals());
        Amount(raw.saturating_mul(factor))
    }

    /// Amount from a raw integer string scaled at `precision`
    pub fn from_fixed_str(raw: &str, precision: Precision) -> Result<Self, FixedPointError> {
        Ok(Self::from_fixed(parse_integer(raw)?, precision))
    }

    /// Raw integer at `precision`, truncated
    pub fn to_fixed(self, precision: Precision) -> U512 {
        self.0 / U512::exp10(RAD_DECIMALS - precision.decimals())
    }

    /// Raw 45-decimal integer
    pub fn raw(self) -> U512 {
        self.0
    }

    pub(crate) fn from_raw(raw: U512) -> Self {
        Amount(raw)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Parse user input, treating an empty or blank field as zero
    pub fn parse_input(s: &str) -> Result<Self, FixedPointError> {
        if s.trim().is_empty() {
            return Ok(Amount::ZERO);
        }
        s.parse()
    }

    /// Drop digits beyond `decimals` places
    pub fn truncate(self, decimals: usize) -> Self {
        if decimals >= RAD_DECIMALS {
            return self;
        }
        let step = U512::exp10(RAD_DECIMALS - decimals);
        Amount(self.0 - self.0 % step)
    }

    /// Smallest whole number not below this amount
    pub fn ceil(self) -> Self {
        let unit = Precision::Rad.unit();
        let whole = self.0 - self.0 % unit;
        if whole == self.0 {
            self
        } else {
            Amount(whole.saturating_add(unit))
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_scaled(self.0, RAD_DECIMALS))
    }
}

impl FromStr for Amount {
    type Err = FixedPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_scaled(s, RAD_DECIMALS).map(Amount)
    }
}

impl TryFrom<String> for Amount {
    type Error = FixedPointError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Amount> for String {
    fn from(a: Amount) -> String {
        a.to_string()
    }
}

/// Convert a decimal string to an integer string scaled by 10^precision
///
/// Fractional digits beyond the precision are truncated.
pub fn to_fixed_string(value: &str, precision: Precision) -> Result<String, FixedPointError> {
    parse_scaled(value, precision.decimals()).map(|raw| raw.to_string())
}

/// Convert an integer string scaled by 10^precision back to a decimal string
///
/// The result carries no trailing fractional zeros.
pub fn from_fixed_string(raw: &str, precision: Precision) -> Result<String, FixedPointError> {
    Ok(format_scaled(parse_integer(raw)?, precision.decimals()))
}

fn parse_integer(raw: &str) -> Result<U512, FixedPointError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FixedPointError::Empty);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FixedPointError::Malformed(raw.to_string()));
    }
    U512::from_dec_str(raw).map_err(|_| FixedPointError::Overflow(raw.to_string()))
}

fn parse_scaled(s: &str, decimals: usize) -> Result<U512, FixedPointError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(FixedPointError::Empty);
    }

    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(FixedPointError::Malformed(s.to_string()));
    }

    let kept = &frac_part[..frac_part.len().min(decimals)];
    let mut digits = String::with_capacity(int_part.len() + decimals);
    digits.push_str(int_part);
    digits.push_str(kept);
    digits.extend(std::iter::repeat('0').take(decimals - kept.len()));

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U512::zero());
    }
    U512::from_dec_str(digits).map_err(|_| FixedPointError::Overflow(s.to_string()))
}

fn format_scaled(raw: U512, decimals: usize) -> String {
    let digits = raw.to_string();
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}
