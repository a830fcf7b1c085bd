use std::fmt;
use std::ops::Add;

use num_bigint::BigUint;
use num_rational::Ratio;
use num_traits::{ToPrimitive, Zero};

/// Non-negative exact fraction, always kept in lowest terms.
///
/// Validation weights are `correct / total` per pair; summing them as
/// fractions keeps `validated + not_validated == pairs` exact. The
/// denominator of a sum grows with the lcm of every pair total, so the
/// parts are arbitrary precision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fraction(Ratio<BigUint>);

impl Fraction {
    pub fn zero() -> Self {
        Self(Ratio::zero())
    }

    /// `den` of zero is treated as one.
    pub fn new(num: u64, den: u64) -> Self {
        if den == 0 {
            return Self::whole(num);
        }
        Self(Ratio::new(BigUint::from(num), BigUint::from(den)))
    }

    pub fn whole(n: u64) -> Self {
        Self(Ratio::from_integer(BigUint::from(n)))
    }

    pub fn numerator(&self) -> &BigUint {
        self.0.numer()
    }

    pub fn denominator(&self) -> &BigUint {
        self.0.denom()
    }

    /// `self - other`, or zero if `other` is larger.
    pub fn saturating_sub(&self, other: &Fraction) -> Fraction {
        if self.0 <= other.0 {
            return Self::zero();
        }
        Self(&self.0 - &other.0)
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Fraction {
    type Output = Fraction;

    fn add(self, other: Fraction) -> Fraction {
        Self(self.0 + other.0)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_integer() {
            write!(f, "{}", self.0.numer())
        } else {
            write!(f, "{}/{}", self.0.numer(), self.0.denom())
        }
    }
}
