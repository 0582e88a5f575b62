use std::io;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub ok: bool,
    pub command: String,
    pub message: String,
    pub details: Vec<String>,
    pub payload: Option<serde_json::Value>,
}

impl CommandOutput {
    pub fn success(
        command: &str,
        message: &str,
        details: Vec<String>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            ok: true,
            command: command.to_string(),
            message: message.to_string(),
            details,
            payload,
        }
    }

    pub fn from_core_error(err: &multisend_core::MultisendError, command: &str) -> Self {
        Self {
            ok: false,
            command: command.to_string(),
            message: err.to_string(),
            details: Vec::new(),
            payload: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub transfer_count: usize,
    pub total_ether: String,
    pub total_wei: String,
    pub chain_id: Option<u64>,
}

/// What the signing environment reported for a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionInfo {
    pub request_id: String,
    pub status: Option<String>,
    pub transaction_hash: Option<String>,
}

#[derive(Debug)]
pub enum OutputError {
    StdinBlocked,
    Io(io::Error),
}

pub trait OutputHandler {
    fn start_operation(&mut self, operation: &str);
    fn progress(&mut self, message: &str);
    fn display_batch_summary(&mut self, summary: &BatchSummary);
    fn display_validation_errors(&mut self, errors: &[String]);
    fn confirm_proceed(&mut self, prompt: &str) -> Result<bool, OutputError>;
    fn display_submission(&mut self, info: &SubmissionInfo);
    fn complete(&mut self, output: &CommandOutput);
}
