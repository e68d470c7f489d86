use std::{
    fmt::{self, Display},
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const USDC_CURRENCY_CODE: &str = "USDC";
pub const USDC_CURRENCY_CODE_LOWER: &str = "usdc";

const MICRO_PER_UNIT: i64 = 1_000_000;

//--------------------------------------     MicroUsdc       ---------------------------------------------------------
/// A USDC amount held as an integer count of 10^-6 USDC, which is the token's native precision.
///
/// On the wire (JSON) the value is a plain decimal number of whole USDC, e.g. `12.5`, since that is what the
/// settlement provider and the storefront exchange.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash)]
#[sqlx(transparent)]
pub struct MicroUsdc(i64);

op!(binary MicroUsdc, Add, add);
op!(binary MicroUsdc, Sub, sub);
op!(inplace MicroUsdc, AddAssign, add_assign);
op!(inplace MicroUsdc, SubAssign, sub_assign);
op!(unary MicroUsdc, Neg, neg);

impl Sum for MicroUsdc {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in micro-USDC: {0}")]
pub struct MicroUsdcConversionError(String);

impl From<i64> for MicroUsdc {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<f64> for MicroUsdc {
    type Error = MicroUsdcConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_usdc_f64(value)
    }
}

impl FromStr for MicroUsdc {
    type Err = MicroUsdcConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = s.trim().parse::<f64>().map_err(|e| MicroUsdcConversionError(format!("{s}: {e}")))?;
        Self::from_usdc_f64(v)
    }
}

impl Display for MicroUsdc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MICRO_PER_UNIT as u64;
        let frac = abs % MICRO_PER_UNIT as u64;
        write!(f, "{sign}{whole}.{frac:06} {USDC_CURRENCY_CODE}")
    }
}

impl MicroUsdc {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_usdc(usdc: i64) -> Self {
        Self(usdc * MICRO_PER_UNIT)
    }

    /// Converts a decimal USDC amount, rounding to the nearest micro unit.
    pub fn from_usdc_f64(usdc: f64) -> Result<Self, MicroUsdcConversionError> {
        if !usdc.is_finite() {
            return Err(MicroUsdcConversionError(format!("{usdc} is not a finite number")));
        }
        let micro = (usdc * MICRO_PER_UNIT as f64).round();
        if micro.abs() >= i64::MAX as f64 {
            return Err(MicroUsdcConversionError(format!("{usdc} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(micro as i64))
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_usdc_f64(&self) -> f64 {
        self.0 as f64 / MICRO_PER_UNIT as f64
    }

    pub fn abs_diff(&self, other: MicroUsdc) -> MicroUsdc {
        Self(self.0.abs_diff(other.0).min(i64::MAX as u64) as i64)
    }

    pub fn checked_add(self, rhs: MicroUsdc) -> Option<MicroUsdc> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: i64) -> Option<MicroUsdc> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Serialize for MicroUsdc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_usdc_f64())
    }
}

struct MicroUsdcVisitor;

impl<'de> de::Visitor<'de> for MicroUsdcVisitor {
    type Value = MicroUsdc;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a decimal USDC amount")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        MicroUsdc::from_usdc_f64(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        v.checked_mul(MICRO_PER_UNIT).map(MicroUsdc).ok_or_else(|| E::custom(format!("{v} USDC is out of range")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let v = i64::try_from(v).map_err(E::custom)?;
        self.visit_i64(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse::<MicroUsdc>().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for MicroUsdc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MicroUsdcVisitor)
    }
}
