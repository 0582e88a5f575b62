use std::fmt::{self, Display};
use std::iter::Sum;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::AmountError;
use crate::units::{format_base_units, scale_to_base_units, ETHER_DECIMALS};

/// Call data carried by a plain value transfer.
pub const EMPTY_PAYLOAD: &str = "0x";

/// Integer amount of wei (1 ether = 10^18 wei).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Wei(U256);

impl Wei {
    pub const ZERO: Self = Self(U256::ZERO);

    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn from_ether_str(input: &str) -> Result<Self, AmountError> {
        scale_to_base_units(input, ETHER_DECIMALS).map(Self)
    }

    pub fn to_ether_string(&self) -> String {
        format_base_units(self.0, ETHER_DECIMALS)
    }

    pub const fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn checked_add(self, other: Wei) -> Result<Wei, AmountError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// `0x`-prefixed hex quantity with no leading zeros, as JSON-RPC expects.
    pub fn to_hex_quantity(&self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl From<U256> for Wei {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<u64> for Wei {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl TryFrom<String> for Wei {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !is_canonical_integer_string(&value) {
            return Err(AmountError::InvalidBaseUnitString { value });
        }
        U256::from_str_radix(&value, 10)
            .map(Self)
            .map_err(|_| AmountError::Overflow)
    }
}

impl From<Wei> for String {
    fn from(value: Wei) -> Self {
        value.0.to_string()
    }
}

impl Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sum for Wei {
    /// Saturates at `U256::MAX`; use [`Wei::checked_add`] where overflow must be reported.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Wei::ZERO, |acc, value| Self(acc.0.saturating_add(value.0)))
    }
}

impl<'a> Sum<&'a Wei> for Wei {
    fn sum<I: Iterator<Item = &'a Wei>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// One pending row of the composition: a trimmed recipient and the amount as entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEntry {
    pub recipient: String,
    pub amount: String,
}

impl TransferEntry {
    pub fn new(recipient: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }
}

/// Wire-level instruction in the schema the signing environment expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInstruction {
    #[serde(rename = "to")]
    pub destination: String,
    #[serde(rename = "value")]
    pub amount: Wei,
    #[serde(rename = "data")]
    pub payload: String,
}

impl TransferInstruction {
    pub fn value_transfer(destination: impl Into<String>, amount: Wei) -> Self {
        Self {
            destination: destination.into(),
            amount,
            payload: EMPTY_PAYLOAD.to_string(),
        }
    }
}

/// Opaque token returned by the signing environment for an accepted batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Pending,
    Confirmed,
    Failed,
    Unknown,
}

/// What the signing environment reports about a request after acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub request_id: RequestId,
    pub status: ResolutionStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction_hash: Option<String>,
}

fn is_canonical_integer_string(input: &str) -> bool {
    if input.is_empty() || !input.bytes().all(|byte| byte.is_ascii_digit()) {
        return false;
    }
    input == "0" || !input.starts_with('0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wei_from_ether_strings() {
        assert_eq!(
            Wei::from_ether_str("1").unwrap().to_string(),
            "1000000000000000000"
        );
        assert_eq!(Wei::from_ether_str("1.5").unwrap().to_ether_string(), "1.5");
        assert!(matches!(
            Wei::from_ether_str("0.0000000000000000001"),
            Err(AmountError::TooManyDecimals { .. })
        ));
    }

    #[test]
    fn wei_serializes_as_decimal_string() {
        let wei = Wei::from_ether_str("2").unwrap();
        let json = serde_json::to_string(&wei).unwrap();
        assert_eq!(json, "\"2000000000000000000\"");
        let parsed: Wei = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, wei);
    }

    #[test]
    fn wei_rejects_non_canonical_strings() {
        for input in ["", "01", "-1", "1.0", "0x10"] {
            assert!(
                Wei::try_from(input.to_string()).is_err(),
                "{input} should be rejected"
            );
        }
        assert_eq!(Wei::try_from("0".to_string()).unwrap(), Wei::ZERO);
    }

    #[test]
    fn wei_hex_quantity_has_no_leading_zeros() {
        assert_eq!(Wei::ZERO.to_hex_quantity(), "0x0");
        assert_eq!(
            Wei::from_ether_str("1").unwrap().to_hex_quantity(),
            "0xde0b6b3a7640000"
        );
    }

    #[test]
    fn instruction_uses_wire_field_names() {
        let instruction =
            TransferInstruction::value_transfer("0xabc", Wei::from_ether_str("1").unwrap());
        let value = serde_json::to_value(&instruction).unwrap();
        assert_eq!(value["to"], "0xabc");
        assert_eq!(value["value"], "1000000000000000000");
        assert_eq!(value["data"], "0x");
    }

    #[test]
    fn wei_sum_adds_all_values() {
        let values = [Wei::from(1_u64), Wei::from(2_u64), Wei::from(3_u64)];
        assert_eq!(values.iter().sum::<Wei>(), Wei::from(6_u64));
        assert_eq!(std::iter::empty::<Wei>().sum::<Wei>(), Wei::ZERO);
    }
}
