use std::fmt::{self, Display};

use thiserror::Error;

use crate::types::RequestId;

/// Stable numeric error codes shared by the library and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TaxonomyCode {
    Validation1001 = 1001,
    Validation1002 = 1002,
    Validation1003 = 1003,
    Validation1004 = 1004,
    Validation1005 = 1005,
    Validation1006 = 1006,
    Validation1007 = 1007,
    Validation1008 = 1008,
    Validation1009 = 1009,
    Cli2001 = 2001,
    Cli2002 = 2002,
    Cli2003 = 2003,
    Cli2004 = 2004,
    Cli2005 = 2005,
    Io3001 = 3001,
    Conversion4001 = 4001,
    Conversion4002 = 4002,
    Conversion4003 = 4003,
    Submission5001 = 5001,
    Submission5002 = 5002,
    Submission5003 = 5003,
    Submission5004 = 5004,
    Lookup6001 = 6001,
}

impl TaxonomyCode {
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Validation1001 => "INVALID_RECIPIENT",
            Self::Validation1002 => "INVALID_AMOUNT",
            Self::Validation1003 => "INDEX_OUT_OF_RANGE",
            Self::Validation1004 => "EMPTY_BATCH",
            Self::Validation1005 => "MALFORMED_INPUT",
            Self::Validation1006 => "CSV_FORMULA_INJECTION",
            Self::Validation1007 => "INPUT_TOO_LARGE",
            Self::Validation1008 => "TOO_MANY_ROWS",
            Self::Validation1009 => "MISSING_REQUIRED_COLUMN",
            Self::Cli2001 => "MISSING_REQUIRED_ARGUMENT",
            Self::Cli2002 => "INVALID_FLAG_COMBINATION",
            Self::Cli2003 => "CONFIRMATION_REQUIRED",
            Self::Cli2004 => "STDIN_BLOCKED",
            Self::Cli2005 => "INVALID_CONFIG",
            Self::Io3001 => "IO_FAILURE",
            Self::Conversion4001 => "PRECISION_LOSS",
            Self::Conversion4002 => "INVALID_DECIMAL",
            Self::Conversion4003 => "AMOUNT_OVERFLOW",
            Self::Submission5001 => "SUBMISSION_REJECTED",
            Self::Submission5002 => "SUBMISSION_TIMEOUT",
            Self::Submission5003 => "SUBMISSION_IN_PROGRESS",
            Self::Submission5004 => "SUBMISSION_CANCELLED",
            Self::Lookup6001 => "RESOLUTION_LOOKUP_FAILED",
        }
    }

    pub const fn is_validation(self) -> bool {
        matches!(self.code(), 1001..=1999)
    }
}

impl Display for TaxonomyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.code(), self.name())
    }
}

/// Failure to read a decimal ether amount or to scale it into base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    EmptyInput,
    #[error("amount contains a sign; negative/positive signs are not allowed")]
    SignNotAllowed,
    #[error("amount contains invalid characters")]
    InvalidCharacters,
    #[error("amount has more than one decimal point")]
    MultipleDecimalPoints,
    #[error("amount has no digits")]
    NoDigits,
    #[error("amount has {decimals} significant decimal places, at most {max} are supported")]
    TooManyDecimals { decimals: usize, max: u8 },
    #[error("amount does not fit into 256-bit base units")]
    Overflow,
    #[error("'{value}' is not a canonical base-unit integer string")]
    InvalidBaseUnitString { value: String },
}

impl AmountError {
    pub const fn taxonomy(&self) -> TaxonomyCode {
        match self {
            Self::TooManyDecimals { .. } => TaxonomyCode::Conversion4001,
            Self::Overflow => TaxonomyCode::Conversion4003,
            _ => TaxonomyCode::Conversion4002,
        }
    }
}

/// Rejected user input. Prior state is never modified when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation error [{code}]: {message}")]
pub struct ValidationError {
    pub code: TaxonomyCode,
    pub message: String,
}

/// An entry whose amount cannot be represented in base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conversion error [{}] at entry {index} ({recipient}): {source}", .source.taxonomy())]
pub struct ConversionError {
    pub index: usize,
    pub recipient: String,
    #[source]
    pub source: AmountError,
}

/// The signing collaborator rejected, failed or did not answer the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("submission error [{code}]: {message}")]
pub struct SubmissionError {
    pub code: TaxonomyCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resolution lookup for {request_id} failed: {message}")]
pub struct ResolutionLookupError {
    pub request_id: RequestId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub code: TaxonomyCode,
    pub row_number: usize,
    pub column: &'static str,
    pub message: String,
}

impl Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] row {} {}: {}",
            self.code, self.row_number, self.column, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("batch validation failed with {} issue(s)", .issues.len())]
pub struct BatchValidationError {
    pub issues: Vec<RowIssue>,
}

#[derive(Debug, Error)]
pub enum MultisendError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    ResolutionLookup(#[from] ResolutionLookupError),

    #[error(transparent)]
    BatchValidation(#[from] BatchValidationError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MultisendError {
    pub fn validation(code: TaxonomyCode, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError {
            code,
            message: message.into(),
        })
    }

    pub fn submission(code: TaxonomyCode, message: impl Into<String>) -> Self {
        Self::Submission(SubmissionError {
            code,
            message: message.into(),
        })
    }

    pub fn taxonomy(&self) -> TaxonomyCode {
        match self {
            Self::Validation(err) => err.code,
            Self::Amount(err) => err.taxonomy(),
            Self::Conversion(err) => err.source.taxonomy(),
            Self::Submission(err) => err.code,
            Self::ResolutionLookup(_) => TaxonomyCode::Lookup6001,
            Self::BatchValidation(err) => err
                .issues
                .first()
                .map(|issue| issue.code)
                .unwrap_or(TaxonomyCode::Validation1005),
            Self::Config(_) => TaxonomyCode::Cli2005,
            Self::Io(_) => TaxonomyCode::Io3001,
            Self::Csv(_) | Self::Json(_) => TaxonomyCode::Validation1005,
        }
    }

    pub fn code(&self) -> u16 {
        self.taxonomy().code()
    }
}

pub type Result<T> = std::result::Result<T, MultisendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_display_includes_code_and_name() {
        assert_eq!(
            TaxonomyCode::Validation1001.to_string(),
            "1001:INVALID_RECIPIENT"
        );
        assert_eq!(TaxonomyCode::Submission5002.code(), 5002);
    }

    #[test]
    fn amount_errors_map_to_conversion_codes() {
        assert_eq!(
            AmountError::TooManyDecimals { decimals: 19, max: 18 }.taxonomy(),
            TaxonomyCode::Conversion4001
        );
        assert_eq!(AmountError::Overflow.taxonomy(), TaxonomyCode::Conversion4003);
        assert_eq!(
            AmountError::SignNotAllowed.taxonomy(),
            TaxonomyCode::Conversion4002
        );
    }

    #[test]
    fn conversion_error_names_the_entry() {
        let err = MultisendError::from(ConversionError {
            index: 2,
            recipient: "0xabc".to_string(),
            source: AmountError::TooManyDecimals { decimals: 19, max: 18 },
        });
        assert_eq!(err.code(), 4001);
        let text = err.to_string();
        assert!(text.contains("entry 2"));
        assert!(text.contains("0xabc"));
    }

    #[test]
    fn batch_validation_reports_first_issue_code() {
        let err = MultisendError::from(BatchValidationError {
            issues: vec![RowIssue {
                code: TaxonomyCode::Validation1002,
                row_number: 3,
                column: "amount",
                message: "amount is empty".to_string(),
            }],
        });
        assert_eq!(err.code(), 1002);
        assert!(TaxonomyCode::Validation1002.is_validation());
        assert!(!TaxonomyCode::Submission5001.is_validation());
    }
}
