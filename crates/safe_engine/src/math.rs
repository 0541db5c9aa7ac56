//! Safe arithmetic on amounts - no unwrap, no panics
//!
//! Addition and multiplication saturate at `Amount::MAX`, subtraction at zero.
//! Division by zero yields `None` so callers must pick the special case.

use crate::fixed::{Amount, FixedPointError, Precision, U512};
use std::fmt;

impl Amount {
    /// Add with saturation at MAX
    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount::from_raw(self.raw().saturating_add(other.raw()))
    }

    /// Subtract with saturation at 0
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount::from_raw(self.raw().saturating_sub(other.raw()))
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.raw().checked_sub(other.raw()).map(Amount::from_raw)
    }

    /// Fixed-point product, truncated
    pub fn mul(self, other: Amount) -> Amount {
        match self.raw().checked_mul(other.raw()) {
            Some(product) => Amount::from_raw(product / Precision::Rad.unit()),
            None => Amount::MAX,
        }
    }

    /// Fixed-point quotient, truncated. `None` when dividing by zero.
    pub fn checked_div(self, other: Amount) -> Option<Amount> {
        if other.is_zero() {
            return None;
        }
        match self.raw().checked_mul(Precision::Rad.unit()) {
            Some(numerator) => Some(Amount::from_raw(numerator / other.raw())),
            None => Some(Amount::MAX),
        }
    }

    pub fn mul_int(self, n: u64) -> Amount {
        Amount::from_raw(self.raw().saturating_mul(U512::from(n)))
    }

    /// Integer division; zero divisor yields zero
    pub fn div_int(self, n: u64) -> Amount {
        if n == 0 {
            return Amount::ZERO;
        }
        Amount::from_raw(self.raw() / U512::from(n))
    }

    pub fn abs_diff(self, other: Amount) -> Amount {
        if self >= other {
            self.saturating_sub(other)
        } else {
            other.saturating_sub(self)
        }
    }

    /// `self^exp` by repeated squaring, truncating after every step
    pub fn pow(self, mut exp: u64) -> Amount {
        let mut base = self;
        let mut acc = Amount::one();
        while exp > 0 {
            if exp & 1 == 1 {
                acc = acc.mul(base);
            }
            exp >>= 1;
            if exp > 0 {
                base = base.mul(base);
            }
        }
        acc
    }
}

/// Signed percentage, used for rates that may sit below 1.0
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Percentage {
    pub negative: bool,
    pub magnitude: Amount,
}

impl Percentage {
    pub fn truncate(self, decimals: usize) -> Self {
        let magnitude = self.magnitude.truncate(decimals);
        Self {
            negative: self.negative && !magnitude.is_zero(),
            magnitude,
        }
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative && !self.magnitude.is_zero() {
            f.write_str("-")?;
        }
        write!(f, "{}", self.magnitude)
    }
}

/// `part / total * 100`, `None` when total is zero
pub fn percent_of(part: Amount, total: Amount) -> Option<Amount> {
    part.checked_div(total).map(|ratio| ratio.mul_int(100))
}

/// `(rate - 1) * 100`: 1.11 becomes 11, 0.98 becomes -2
pub fn rate_percentage(rate: Amount) -> Percentage {
    let one = Amount::one();
    if rate >= one {
        Percentage {
            negative: false,
            magnitude: rate.saturating_sub(one).mul_int(100),
        }
    } else {
        Percentage {
            negative: true,
            magnitude: one.saturating_sub(rate).mul_int(100),
        }
    }
}

/// Percentage ratio of two raw fixed-point integers at the same precision
///
/// Returns `Ok(None)` when the denominator is zero.
pub fn ratio_percentage(
    numerator: &str,
    denominator: &str,
    precision: Precision,
) -> Result<Option<Amount>, FixedPointError> {
    let numerator = Amount::from_fixed_str(numerator, precision)?;
    let denominator = Amount::from_fixed_str(denominator, precision)?;
    Ok(percent_of(numerator, denominator))
}
