use alloy_primitives::Address;
use tracing::debug;

use crate::config::ListConfig;
use crate::error::{
    BatchValidationError, MultisendError, Result, RowIssue, TaxonomyCode,
};
use crate::transfer_list::{AddOutcome, TransferList};
use crate::units::{parse_decimal, EtherAmount};

/// A batch-file row before validation. `row_number` counts data rows from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub row_number: usize,
    pub recipient: Option<String>,
    pub amount: Option<String>,
}

/// Result of folding imported rows into a [`TransferList`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedBatch {
    pub list: TransferList,
    pub row_count: usize,
    pub warnings: Vec<String>,
}

pub fn normalize_recipient(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn validate_recipient(recipient: &str, check_address: bool) -> Result<()> {
    if recipient.trim().is_empty() {
        return Err(MultisendError::validation(
            TaxonomyCode::Validation1001,
            "recipient cannot be empty",
        ));
    }
    if check_address && !is_hex_address(recipient) {
        return Err(MultisendError::validation(
            TaxonomyCode::Validation1001,
            format!("'{recipient}' is not a 0x-prefixed 20-byte hex address"),
        ));
    }
    Ok(())
}

fn is_hex_address(recipient: &str) -> bool {
    recipient.starts_with("0x") && recipient.parse::<Address>().is_ok()
}

pub fn validate_amount(raw: &str) -> Result<EtherAmount> {
    parse_decimal(raw).map_err(|err| {
        MultisendError::validation(
            TaxonomyCode::Validation1002,
            format!("invalid amount '{}': {err}", raw.trim()),
        )
    })
}

/// Adds every row to a fresh list. The whole batch is rejected if any row fails, and
/// every failing row is reported.
pub fn validate_rows(rows: Vec<RawRow>, config: ListConfig) -> Result<ImportedBatch> {
    let row_count = rows.len();
    let mut list = TransferList::new(config);
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    for row in rows {
        let recipient = row.recipient.as_deref().unwrap_or_default();
        if normalize_recipient(recipient).is_none() {
            issues.push(RowIssue {
                code: TaxonomyCode::Validation1001,
                row_number: row.row_number,
                column: "recipient",
                message: "recipient cannot be empty".to_string(),
            });
            continue;
        }
        let Some(amount) = row.amount.as_deref() else {
            issues.push(RowIssue {
                code: TaxonomyCode::Validation1002,
                row_number: row.row_number,
                column: "amount",
                message: "amount is empty".to_string(),
            });
            continue;
        };

        match list.add(recipient, amount) {
            Ok(AddOutcome::Merged { index }) => warnings.push(format!(
                "W001 duplicate recipient {} at row {} merged into entry {}",
                recipient.trim(),
                row.row_number,
                index + 1
            )),
            Ok(_) => {}
            Err(MultisendError::Validation(err)) => issues.push(RowIssue {
                code: err.code,
                row_number: row.row_number,
                column: if err.code == TaxonomyCode::Validation1001 {
                    "recipient"
                } else {
                    "amount"
                },
                message: err.message,
            }),
            Err(other) => return Err(other),
        }
    }

    if !issues.is_empty() {
        debug!(issue_count = issues.len(), "batch rejected");
        return Err(BatchValidationError { issues }.into());
    }

    Ok(ImportedBatch {
        list,
        row_count,
        warnings,
    })
}
