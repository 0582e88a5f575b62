//! Exact decimal parsing and base-unit scaling with no floating-point math.

use std::fmt::{self, Display};
use std::str::FromStr;

use alloy_primitives::U256;

use crate::error::AmountError;

/// Fractional digits of one ether expressed in wei.
pub const ETHER_DECIMALS: u8 = 18;

/// A non-negative decimal quantity kept exactly as `digits / 10^scale`.
///
/// Values are normalized on construction: trailing fractional zeros are dropped, so two
/// amounts that compare equal also render identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EtherAmount {
    digits: U256,
    scale: usize,
}

impl EtherAmount {
    pub const ZERO: Self = Self {
        digits: U256::ZERO,
        scale: 0,
    };

    fn normalized(mut digits: U256, mut scale: usize) -> Self {
        let ten = U256::from(10_u8);
        while scale > 0 && !digits.is_zero() && (digits % ten).is_zero() {
            digits /= ten;
            scale -= 1;
        }
        if digits.is_zero() {
            scale = 0;
        }
        Self { digits, scale }
    }

    /// Number of significant fractional digits.
    pub const fn scale(&self) -> usize {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.digits.is_zero()
    }

    pub fn checked_add(self, other: Self) -> Result<Self, AmountError> {
        let scale = self.scale.max(other.scale);
        let lhs = rescale(self.digits, scale - self.scale)?;
        let rhs = rescale(other.digits, scale - other.scale)?;
        let sum = lhs.checked_add(rhs).ok_or(AmountError::Overflow)?;
        Ok(Self::normalized(sum, scale))
    }

    /// Scales the amount into integer base units with `decimals` fractional digits.
    pub fn to_base_units(&self, decimals: u8) -> Result<U256, AmountError> {
        let decimals = usize::from(decimals);
        if self.scale > decimals {
            return Err(AmountError::TooManyDecimals {
                decimals: self.scale,
                max: decimals as u8,
            });
        }
        rescale(self.digits, decimals - self.scale)
    }

    pub fn from_base_units(value: U256, decimals: u8) -> Self {
        Self::normalized(value, usize::from(decimals))
    }
}

impl Default for EtherAmount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl FromStr for EtherAmount {
    type Err = AmountError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_decimal(input)
    }
}

impl Display for EtherAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.digits.to_string();
        if self.scale == 0 {
            return f.write_str(&digits);
        }

        let padded = if digits.len() <= self.scale {
            format!("{}{digits}", "0".repeat(self.scale + 1 - digits.len()))
        } else {
            digits
        };
        let (whole, fraction) = padded.split_at(padded.len() - self.scale);
        write!(f, "{whole}.{fraction}")
    }
}

/// Parses a human decimal string such as `"1"`, `"0.5"`, `".5"` or `"2."`.
pub fn parse_decimal(input: &str) -> Result<EtherAmount, AmountError> {
    let (whole, fraction) = split_decimal(input)?;
    let mut combined = String::with_capacity(whole.len() + fraction.len());
    combined.push_str(whole);
    combined.push_str(fraction);
    let digits = parse_u256_digits(&combined)?;
    Ok(EtherAmount::normalized(digits, fraction.len()))
}

/// Converts a decimal string into the integer base-unit string for `decimals` places.
///
/// Fails when the input is malformed or carries more significant fractional digits than
/// `decimals` can represent. Trailing zeros past the scale lose nothing and are accepted.
pub fn decimal_to_base_units(value: &str, decimals: u8) -> Result<String, AmountError> {
    scale_to_base_units(value, decimals).map(|units| units.to_string())
}

pub(crate) fn scale_to_base_units(value: &str, decimals: u8) -> Result<U256, AmountError> {
    let (whole, fraction) = split_decimal(value)?;
    let places = usize::from(decimals);
    if fraction.len() > places {
        return Err(AmountError::TooManyDecimals {
            decimals: fraction.len(),
            max: decimals,
        });
    }

    let mut combined = String::with_capacity(whole.len() + places);
    combined.push_str(whole);
    combined.push_str(fraction);
    combined.extend(std::iter::repeat('0').take(places - fraction.len()));
    parse_u256_digits(&combined)
}

pub fn format_base_units(value: U256, decimals: u8) -> String {
    EtherAmount::from_base_units(value, decimals).to_string()
}

/// Splits into whole digits and significant fractional digits (trailing zeros removed).
fn split_decimal(input: &str) -> Result<(&str, &str), AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::EmptyInput);
    }
    if trimmed.starts_with('-') || trimmed.starts_with('+') {
        return Err(AmountError::SignNotAllowed);
    }
    if !trimmed.bytes().all(|byte| byte.is_ascii_digit() || byte == b'.') {
        return Err(AmountError::InvalidCharacters);
    }
    if trimmed.bytes().filter(|byte| *byte == b'.').count() > 1 {
        return Err(AmountError::MultipleDecimalPoints);
    }

    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(AmountError::NoDigits);
    }

    Ok((whole, fraction.trim_end_matches('0')))
}

fn parse_u256_digits(digits: &str) -> Result<U256, AmountError> {
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(significant, 10).map_err(|_| AmountError::Overflow)
}

fn rescale(value: U256, places: usize) -> Result<U256, AmountError> {
    let ten = U256::from(10_u8);
    let mut factor = U256::from(1_u8);
    for _ in 0..places {
        factor = factor.checked_mul(ten).ok_or(AmountError::Overflow)?;
    }
    value.checked_mul(factor).ok_or(AmountError::Overflow)
}
