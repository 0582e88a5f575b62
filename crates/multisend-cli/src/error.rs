use multisend_core::{MultisendError, TaxonomyCode};
use serde_json::{json, Value};

use crate::agent::AgentError;
use crate::output::{CommandOutput, OutputError};

/// Process exit status for each failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub(crate) enum ExitCode {
    Success = 0,
    Validation = 1,
    Config = 2,
    Io = 3,
    Internal = 4,
    Submission = 5,
    ConfirmationRequired = 10,
    StdinBlocked = 11,
}

impl ExitCode {
    pub(crate) const fn as_i32(self) -> i32 {
        self as i32
    }

    fn for_code(code: u16) -> Self {
        match code {
            1000..=1999 | 4000..=4999 => Self::Validation,
            2000..=2999 => Self::Config,
            3000..=3999 => Self::Io,
            5000..=5999 => Self::Submission,
            _ => Self::Internal,
        }
    }
}

#[derive(Debug)]
pub(crate) enum CliError {
    Core(MultisendError),
    ConfirmationRequired,
    StdinBlocked,
    /// Ctrl-C while the wallet still held the request.
    Cancelled,
    Internal(String),
}

impl From<MultisendError> for CliError {
    fn from(value: MultisendError) -> Self {
        Self::Core(value)
    }
}

impl From<OutputError> for CliError {
    fn from(value: OutputError) -> Self {
        match value {
            OutputError::StdinBlocked => Self::StdinBlocked,
            OutputError::Io(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<&clap::Error> for CliError {
    fn from(err: &clap::Error) -> Self {
        use clap::error::ErrorKind;

        let code = match err.kind() {
            ErrorKind::ArgumentConflict
            | ErrorKind::UnknownArgument
            | ErrorKind::InvalidValue
            | ErrorKind::ValueValidation
            | ErrorKind::TooManyValues
            | ErrorKind::InvalidSubcommand => TaxonomyCode::Cli2002,
            _ => TaxonomyCode::Cli2001,
        };
        Self::Core(MultisendError::validation(code, err.to_string().trim()))
    }
}

impl CliError {
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::Core(core) => ExitCode::for_code(core.code()),
            Self::ConfirmationRequired => ExitCode::ConfirmationRequired,
            Self::StdinBlocked => ExitCode::StdinBlocked,
            Self::Cancelled => ExitCode::Submission,
            Self::Internal(_) => ExitCode::Internal,
        }
    }

    pub(crate) fn to_agent_error(&self) -> AgentError {
        match self {
            Self::Core(core) => core_agent_error(core),
            Self::ConfirmationRequired => coded(
                TaxonomyCode::Cli2003,
                "confirmation required".to_string(),
                json!({ "hint": "pass --force to run without a prompt" }),
            ),
            Self::StdinBlocked => coded(
                TaxonomyCode::Cli2004,
                "stdin is not a terminal, cannot ask for confirmation".to_string(),
                json!({ "hint": "pass --force or run from an interactive terminal" }),
            ),
            Self::Cancelled => coded(
                TaxonomyCode::Submission5004,
                "stopped waiting for the wallet; it may still process the request".to_string(),
                json!({ "hint": "check the wallet before submitting this batch again" }),
            ),
            Self::Internal(message) => AgentError {
                code: 9999,
                name: "INTERNAL_ERROR".to_string(),
                message: message.clone(),
                details: None,
            },
        }
    }

    /// Failed command output carrying the structured error in its payload.
    pub(crate) fn to_output(&self, command: &str) -> CommandOutput {
        let error = self.to_agent_error();
        CommandOutput {
            ok: false,
            command: command.to_string(),
            message: match self {
                Self::Core(core) => core.to_string(),
                _ => error.message.clone(),
            },
            details: Vec::new(),
            payload: Some(json!({ "error": error })),
        }
    }
}

fn coded(code: TaxonomyCode, message: String, details: Value) -> AgentError {
    AgentError {
        code: code.code(),
        name: code.name().to_string(),
        message,
        details: Some(details),
    }
}

fn core_agent_error(err: &MultisendError) -> AgentError {
    match err {
        MultisendError::BatchValidation(batch) => {
            let issues: Vec<Value> = batch
                .issues
                .iter()
                .map(|issue| {
                    json!({
                        "code": issue.code.code(),
                        "name": issue.code.name(),
                        "row": issue.row_number,
                        "column": issue.column,
                        "message": issue.message,
                    })
                })
                .collect();
            coded(err.taxonomy(), err.to_string(), json!({ "issues": issues }))
        }
        MultisendError::Conversion(conversion) => coded(
            err.taxonomy(),
            conversion.source.to_string(),
            json!({ "entry": conversion.index, "recipient": conversion.recipient }),
        ),
        MultisendError::Validation(inner) => coded(inner.code, inner.message.clone(), json!({})),
        MultisendError::Submission(inner) => coded(inner.code, inner.message.clone(), json!({})),
        other => coded(other.taxonomy(), other.to_string(), json!({})),
    }
}

#[cfg(test)]
mod tests {
    use multisend_core::error::{AmountError, BatchValidationError, ConversionError, RowIssue};

    use super::*;

    #[test]
    fn every_failure_class_has_its_exit_code() {
        let cases = [
            (
                CliError::from(MultisendError::validation(TaxonomyCode::Validation1001, "x")),
                ExitCode::Validation,
            ),
            (CliError::from(MultisendError::from(AmountError::Overflow)), ExitCode::Validation),
            (
                CliError::from(MultisendError::validation(TaxonomyCode::Cli2001, "x")),
                ExitCode::Config,
            ),
            (CliError::from(MultisendError::Config("bad".to_string())), ExitCode::Config),
            (
                CliError::from(MultisendError::Io(std::io::Error::other("disk"))),
                ExitCode::Io,
            ),
            (
                CliError::from(MultisendError::submission(TaxonomyCode::Submission5002, "slow")),
                ExitCode::Submission,
            ),
            (CliError::Cancelled, ExitCode::Submission),
            (CliError::ConfirmationRequired, ExitCode::ConfirmationRequired),
            (CliError::StdinBlocked, ExitCode::StdinBlocked),
            (CliError::Internal("runtime".to_string()), ExitCode::Internal),
        ];
        for (err, expected) in cases {
            assert_eq!(err.exit_code(), expected, "{err:?}");
        }
        assert_eq!(ExitCode::StdinBlocked.as_i32(), 11);
    }

    #[test]
    fn lookup_failures_exit_as_internal() {
        let err = CliError::from(MultisendError::from(
            multisend_core::error::ResolutionLookupError {
                request_id: multisend_core::RequestId::new("0x1"),
                message: "gone".to_string(),
            },
        ));
        assert_eq!(err.exit_code(), ExitCode::Internal);
    }

    #[test]
    fn batch_issues_are_listed_in_the_agent_error() {
        let err = CliError::from(MultisendError::from(BatchValidationError {
            issues: vec![
                RowIssue {
                    code: TaxonomyCode::Validation1001,
                    row_number: 2,
                    column: "recipient",
                    message: "recipient is empty".to_string(),
                },
                RowIssue {
                    code: TaxonomyCode::Validation1002,
                    row_number: 5,
                    column: "amount",
                    message: "amount contains a sign".to_string(),
                },
            ],
        }));
        let agent = err.to_agent_error();
        assert_eq!(agent.code, 1001);
        assert_eq!(agent.name, "INVALID_RECIPIENT");
        let details = agent.details.unwrap();
        assert_eq!(details["issues"][1]["row"], 5);
        assert_eq!(details["issues"][1]["column"], "amount");
    }

    #[test]
    fn conversion_error_names_the_entry() {
        let err = CliError::from(MultisendError::from(ConversionError {
            index: 3,
            recipient: "0xabc".to_string(),
            source: AmountError::TooManyDecimals { decimals: 19, max: 18 },
        }));
        let agent = err.to_agent_error();
        assert_eq!(agent.code, 4001);
        assert_eq!(agent.name, "PRECISION_LOSS");
        assert_eq!(agent.details.unwrap()["entry"], 3);
    }

    #[test]
    fn cancellation_has_its_own_code() {
        let agent = CliError::Cancelled.to_agent_error();
        assert_eq!(agent.code, 5004);
        assert_eq!(agent.name, "SUBMISSION_CANCELLED");
    }

    #[test]
    fn failed_output_carries_the_structured_error() {
        let output = CliError::ConfirmationRequired.to_output("submit");
        assert!(!output.ok);
        assert_eq!(output.command, "submit");
        let payload = output.payload.unwrap();
        assert_eq!(payload["error"]["code"], 2003);
        assert_eq!(payload["error"]["name"], "CONFIRMATION_REQUIRED");
    }
}
