use tracing::debug;

use crate::config::ListConfig;
use crate::error::{MultisendError, Result, TaxonomyCode};
use crate::types::TransferEntry;
use crate::units::EtherAmount;
use crate::validation::{normalize_recipient, validate_amount, validate_recipient};

/// Where an [`TransferList::add`] call left its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new row was appended at `index`.
    Appended { index: usize },
    /// The amount was folded into the existing row at `index`.
    Merged { index: usize },
    /// The recipient was empty after trimming; nothing changed.
    Ignored,
}

/// Ordered pending transfers for one editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferList {
    config: ListConfig,
    entries: Vec<TransferEntry>,
}

impl TransferList {
    pub fn new(config: ListConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    pub fn config(&self) -> ListConfig {
        self.config
    }

    /// Adds `amount` for `recipient`, merging into an existing row when configured to.
    ///
    /// An empty recipient is ignored. A malformed recipient or amount is rejected with a
    /// validation error and leaves the list untouched.
    pub fn add(&mut self, recipient: &str, amount: &str) -> Result<AddOutcome> {
        let Some(recipient) = normalize_recipient(recipient) else {
            return Ok(AddOutcome::Ignored);
        };
        validate_recipient(&recipient, self.config.check_addresses)?;
        let added = validate_amount(amount)?;

        if self.config.merge_duplicate_recipients {
            if let Some(index) = self.position(&recipient) {
                let existing = validate_amount(&self.entries[index].amount)?;
                let merged = existing.checked_add(added).map_err(|err| {
                    MultisendError::validation(
                        TaxonomyCode::Validation1002,
                        format!("merged amount for {recipient} is out of range: {err}"),
                    )
                })?;
                debug!(%recipient, index, amount = %merged, "merged duplicate recipient");
                self.entries[index].amount = merged.to_string();
                return Ok(AddOutcome::Merged { index });
            }
        }

        self.entries
            .push(TransferEntry::new(recipient, amount.trim()));
        let index = self.entries.len() - 1;
        debug!(index, "appended transfer entry");
        Ok(AddOutcome::Appended { index })
    }

    /// Removes the row at `index`; later rows shift down by one.
    pub fn remove_at(&mut self, index: usize) -> Result<TransferEntry> {
        if index >= self.entries.len() {
            return Err(MultisendError::validation(
                TaxonomyCode::Validation1003,
                format!(
                    "index {index} is out of range for a list of {} entries",
                    self.entries.len()
                ),
            ));
        }
        Ok(self.entries.remove(index))
    }

    /// Copy of the current rows, detached from the list.
    pub fn snapshot(&self) -> Vec<TransferEntry> {
        self.entries.clone()
    }

    pub fn entries(&self) -> &[TransferEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Exact decimal sum of every row.
    pub fn total(&self) -> Result<EtherAmount> {
        self.entries.iter().try_fold(EtherAmount::ZERO, |acc, entry| {
            let amount = validate_amount(&entry.amount)?;
            acc.checked_add(amount).map_err(MultisendError::from)
        })
    }

    fn position(&self, recipient: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.recipient == recipient)
    }
}
