use serde::{Deserialize, Serialize};

use crate::error::{AmountError, ConversionError, Result};
use crate::types::{TransferEntry, TransferInstruction, Wei};

/// Ordered value transfers handed to the signing environment as one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub instructions: Vec<TransferInstruction>,
}

impl BatchRequest {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn total(&self) -> std::result::Result<Wei, AmountError> {
        self.instructions
            .iter()
            .try_fold(Wei::ZERO, |acc, instruction| acc.checked_add(instruction.amount))
    }

    /// Compact JSON of the instruction list with stable field order.
    pub fn canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.instructions)?)
    }
}

/// Converts entries into wei-denominated instructions, preserving their order.
///
/// Fails on the first entry whose amount cannot be expressed in whole wei.
pub fn build(entries: &[TransferEntry]) -> Result<BatchRequest> {
    let instructions = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| -> Result<TransferInstruction> {
            let amount = Wei::from_ether_str(&entry.amount).map_err(|source| ConversionError {
                index,
                recipient: entry.recipient.clone(),
                source,
            })?;
            Ok(TransferInstruction::value_transfer(
                entry.recipient.clone(),
                amount,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(BatchRequest { instructions })
}

#[cfg(test)]
mod tests {
    use crate::error::MultisendError;
    use crate::types::EMPTY_PAYLOAD;

    use super::*;

    #[test]
    fn empty_entries_build_an_empty_batch() {
        let batch = build(&[]).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.total().unwrap(), Wei::ZERO);
    }

    #[test]
    fn order_is_preserved() {
        let batch = build(&[TransferEntry::new("A", "1"), TransferEntry::new("B", "2")]).unwrap();
        let destinations: Vec<&str> = batch
            .instructions
            .iter()
            .map(|instruction| instruction.destination.as_str())
            .collect();
        assert_eq!(destinations, vec!["A", "B"]);
    }

    #[test]
    fn amounts_are_always_converted_to_wei() {
        let batch = build(&[TransferEntry::new("A", "1.5"), TransferEntry::new("B", "0")]).unwrap();
        assert_eq!(
            batch.instructions[0].amount.to_string(),
            "1500000000000000000"
        );
        assert_eq!(batch.instructions[1].amount.to_string(), "0");
        assert!(batch
            .instructions
            .iter()
            .all(|instruction| instruction.payload == EMPTY_PAYLOAD));

        let wire = serde_json::to_value(&batch.instructions).unwrap();
        assert_eq!(wire[0]["value"], "1500000000000000000");
        assert_ne!(wire[0]["value"], "1.5");
    }

    #[test]
    fn excess_precision_is_a_conversion_error() {
        let err = build(&[
            TransferEntry::new("A", "1"),
            TransferEntry::new("B", "1.0000000000000000001"),
        ])
        .unwrap_err();

        let MultisendError::Conversion(conversion) = err else {
            panic!("expected conversion error");
        };
        assert_eq!(conversion.index, 1);
        assert_eq!(conversion.recipient, "B");
        assert!(matches!(
            conversion.source,
            AmountError::TooManyDecimals { decimals: 19, max: 18 }
        ));
    }

    #[test]
    fn malformed_amount_is_a_conversion_error() {
        let err = build(&[TransferEntry::new("A", "one")]).unwrap_err();
        assert_eq!(err.code(), 4002);
    }

    #[test]
    fn total_and_canonical_json() {
        let batch = build(&[TransferEntry::new("A", "1"), TransferEntry::new("B", "2")]).unwrap();
        assert_eq!(batch.total().unwrap().to_ether_string(), "3");
        assert_eq!(
            batch.canonical_json().unwrap(),
            r#"[{"to":"A","value":"1000000000000000000","data":"0x"},{"to":"B","value":"2000000000000000000","data":"0x"}]"#
        );
    }
}
