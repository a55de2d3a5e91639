//! Token and native amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WttError;

/// Largest precision whose scale factor still fits in 128 bits.
pub const MAX_DECIMALS: u8 = 38;

/// An amount in base units.
///
/// Token units and native units are pegged 1:1, so the same type carries
/// both. `Wad::UNLIMITED` doubles as the unlimited-allowance sentinel and
/// is compared by equality, never decremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Wad(u128);

impl Wad {
    /// Zero.
    pub const ZERO: Wad = Wad(0);
    /// Largest representable amount.
    pub const MAX: Wad = Wad(u128::MAX);
    /// Unlimited-allowance sentinel.
    pub const UNLIMITED: Wad = Wad::MAX;

    /// Create from base units.
    pub const fn new(units: u128) -> Self {
        Self(units)
    }

    /// Get base units.
    pub const fn units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Check for the unlimited-allowance sentinel.
    pub fn is_unlimited(&self) -> bool {
        *self == Self::UNLIMITED
    }

    pub fn checked_add(self, other: Wad) -> Option<Wad> {
        self.0.checked_add(other.0).map(Wad)
    }

    pub fn checked_sub(self, other: Wad) -> Option<Wad> {
        self.0.checked_sub(other.0).map(Wad)
    }

    /// Convert a human decimal amount into base units at `decimals` precision.
    ///
    /// Rejects negative values and values with more fractional digits than
    /// `decimals` allows.
    pub fn from_decimal(value: Decimal, decimals: u8) -> Result<Self, WttError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(WttError::InvalidAmount(format!("negative amount {}", value)));
        }
        if decimals > MAX_DECIMALS {
            return Err(WttError::InvalidAmount(format!(
                "precision {} exceeds {}",
                decimals, MAX_DECIMALS
            )));
        }

        let value = value.normalize();
        let scale = value.scale();
        if scale > u32::from(decimals) {
            return Err(WttError::InvalidAmount(format!(
                "{} has more than {} fractional digits",
                value, decimals
            )));
        }

        let mantissa = value.mantissa().unsigned_abs();
        let factor = 10u128.pow(u32::from(decimals) - scale);
        mantissa
            .checked_mul(factor)
            .map(Wad)
            .ok_or_else(|| WttError::InvalidAmount(format!("{} out of range", value)))
    }

    /// Parse a human decimal string such as `"3.14"` at `decimals` precision.
    pub fn parse_decimal(s: &str, decimals: u8) -> Result<Self, WttError> {
        let value = Decimal::from_str_exact(s.trim())
            .map_err(|e| WttError::InvalidAmount(format!("{}: {}", s, e)))?;
        Self::from_decimal(value, decimals)
    }

    /// Render as a human decimal string at `decimals` precision.
    ///
    /// Trailing fractional zeros are dropped. The unlimited sentinel renders
    /// as its full numeric value.
    pub fn to_decimal_string(&self, decimals: u8) -> String {
        let decimals = decimals.min(MAX_DECIMALS);
        let factor = 10u128.pow(u32::from(decimals));
        let whole = self.0 / factor;
        let fraction = self.0 % factor;

        if fraction == 0 {
            return whole.to_string();
        }

        let digits = format!("{:0width$}", fraction, width = decimals as usize);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Wad {
    fn from(units: u128) -> Self {
        Self(units)
    }
}

impl From<Wad> for u128 {
    fn from(wad: Wad) -> Self {
        wad.0
    }
}

impl TryFrom<String> for Wad {
    type Error = WttError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse::<u128>()
            .map(Wad)
            .map_err(|e| WttError::InvalidAmount(format!("{}: {}", s, e)))
    }
}

impl From<Wad> for String {
    fn from(wad: Wad) -> Self {
        wad.0.to_string()
    }
}
