//! Event surface for a composing front end.
//!
//! A front end forwards field edits and button presses to an [`EditingSession`] and
//! renders [`EditingSession::view`] afterwards. Every handler takes `&self`, so
//! `on_cancel` can run while `on_submit` is suspended on the collaborator.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::batch::build;
use crate::collaborator::SigningCollaborator;
use crate::config::SessionConfig;
use crate::error::{MultisendError, Result, TaxonomyCode};
use crate::submitter::{BatchSubmitter, SubmissionState, SubmitOutcome};
use crate::transfer_list::{AddOutcome, TransferList};
use crate::types::TransferEntry;

/// Everything a front end needs to render the composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub entries: Vec<TransferEntry>,
    pub address_input: String,
    pub amount_input: String,
    #[serde(serialize_with = "serialize_state")]
    pub state: SubmissionState,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct Fields {
    list: TransferList,
    address_input: String,
    amount_input: String,
    last_error: Option<String>,
}

pub struct EditingSession {
    fields: Mutex<Fields>,
    submitter: BatchSubmitter,
}

impl EditingSession {
    pub fn new(collaborator: Arc<dyn SigningCollaborator>, config: SessionConfig) -> Self {
        Self {
            fields: Mutex::new(Fields {
                list: TransferList::new(config.list),
                address_input: String::new(),
                amount_input: config.default_amount,
                last_error: None,
            }),
            submitter: BatchSubmitter::new(collaborator, config.submitter),
        }
    }

    pub fn submitter(&self) -> &BatchSubmitter {
        &self.submitter
    }

    /// Replaces the pending transfers, e.g. with rows imported from a batch file.
    pub fn load_list(&self, list: TransferList) {
        let mut fields = self.lock();
        debug!(entries = list.len(), "loaded transfer list");
        fields.list = list;
        fields.last_error = None;
    }

    pub fn on_address_input(&self, text: &str) {
        self.lock().address_input = text.trim().to_string();
    }

    pub fn on_amount_input(&self, text: &str) {
        self.lock().amount_input = text.trim().to_string();
    }

    /// Adds the typed pair. On success the recipient field is cleared and the amount
    /// field keeps its value for the next row.
    pub fn on_add_entry(&self) -> Result<AddOutcome> {
        let mut fields = self.lock();
        let Fields {
            list,
            address_input,
            amount_input,
            last_error,
        } = &mut *fields;

        match list.add(address_input, amount_input) {
            Ok(AddOutcome::Ignored) => Ok(AddOutcome::Ignored),
            Ok(outcome) => {
                address_input.clear();
                *last_error = None;
                Ok(outcome)
            }
            Err(err) => {
                *last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn on_remove_entry(&self, index: usize) -> Result<TransferEntry> {
        let mut fields = self.lock();
        let removed = fields.list.remove_at(index);
        match &removed {
            Ok(_) => fields.last_error = None,
            Err(err) => fields.last_error = Some(err.to_string()),
        }
        removed
    }

    /// Builds the current list and hands it to the submitter.
    ///
    /// Nothing reaches the collaborator when the list is empty or an amount cannot be
    /// converted. The list is left as it was whatever the outcome.
    pub async fn on_submit(&self) -> Result<SubmitOutcome> {
        let batch = {
            let mut fields = self.lock();
            let prepared = if fields.list.is_empty() {
                Err(MultisendError::validation(
                    TaxonomyCode::Validation1004,
                    "add at least one transfer before submitting",
                ))
            } else {
                build(fields.list.entries())
            };
            match prepared {
                Ok(batch) => {
                    fields.last_error = None;
                    batch
                }
                Err(err) => {
                    warn!(code = err.code(), "batch not submitted");
                    fields.last_error = Some(err.to_string());
                    return Err(err);
                }
            }
        };

        let outcome = self.submitter.submit(&batch).await;
        if let Err(err) = &outcome {
            self.lock().last_error = Some(err.to_string());
        }
        outcome
    }

    /// Stops waiting on an in-flight submission. Returns `false` when nothing was in flight.
    pub fn on_cancel(&self) -> bool {
        self.submitter.cancel()
    }

    pub fn view(&self) -> SessionView {
        let fields = self.lock();
        SessionView {
            entries: fields.list.snapshot(),
            address_input: fields.address_input.clone(),
            amount_input: fields.amount_input.clone(),
            state: self.submitter.state(),
            last_error: fields.last_error.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Fields> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn serialize_state<S>(state: &SubmissionState, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match state {
        SubmissionState::Idle => serializer.serialize_str("idle"),
        SubmissionState::Submitting => serializer.serialize_str("submitting"),
        SubmissionState::Resolved(request_id) => {
            serializer.serialize_str(&format!("resolved:{request_id}"))
        }
    }
}
