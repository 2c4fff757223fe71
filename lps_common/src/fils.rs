use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const KWD_CURRENCY_CODE: &str = "KWD";
pub const KWD_CURRENCY_CODE_LOWER: &str = "kwd";

/// How many fils make up one dinar. Amounts are stored with three decimals.
pub const FILS_PER_DINAR: i64 = 1_000;

//--------------------------------------       Fils        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Fils(i64);

op!(binary Fils, Add, add);
op!(binary Fils, Sub, sub);
op!(inplace Fils, AddAssign, add_assign);
op!(inplace Fils, SubAssign, sub_assign);
op!(unary Fils, Neg, neg);

impl Mul<i64> for Fils {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Fils {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in fils: {0}")]
pub struct FilsConversionError(String);

impl From<i64> for Fils {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Fils {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Fils {}

impl TryFrom<u64> for Fils {
    type Error = FilsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(FilsConversionError(format!("Value {} is too large to convert to Fils", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Fils {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let dinars = (self.0 / FILS_PER_DINAR).abs();
        let rem = (self.0 % FILS_PER_DINAR).abs();
        write!(f, "{sign}{dinars}.{rem:03} KD")
    }
}

impl Fils {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_dinars(dinars: i64) -> Self {
        Self(dinars * FILS_PER_DINAR)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn zero() -> Self {
        Self(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Fils::from(2_500);
        let b = Fils::from_dinars(10);
        assert_eq!(a + b, Fils::from(12_500));
        assert_eq!(b - a, Fils::from(7_500));
        assert_eq!(-a, Fils::from(-2_500));
        assert_eq!(a * 4, Fils::from(10_000));
        let total: Fils = [a, b, a].into_iter().sum();
        assert_eq!(total, Fils::from(15_000));
    }

    #[test]
    fn display_uses_three_decimals() {
        assert_eq!(Fils::from(10_000).to_string(), "10.000 KD");
        assert_eq!(Fils::from(7_050).to_string(), "7.050 KD");
        assert_eq!(Fils::from(999).to_string(), "0.999 KD");
    }

    #[test]
    fn conversion_bounds() {
        assert!(Fils::try_from(u64::MAX).is_err());
        assert_eq!(Fils::try_from(42u64).unwrap(), Fils::from(42));
    }
}
