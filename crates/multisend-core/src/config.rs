//! Session configuration, loadable from TOML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MultisendError, Result};

pub const DEFAULT_AMOUNT: &str = "1";
pub const DEFAULT_MAX_ROWS: usize = 1000;
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Duplicate handling and address checks for a [`crate::TransferList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ListConfig {
    /// Fold a repeated recipient into its existing row instead of appending a new one.
    pub merge_duplicate_recipients: bool,
    /// Require recipients to be 20-byte hex addresses.
    pub check_addresses: bool,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            merge_duplicate_recipients: true,
            check_addresses: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SubmitterConfig {
    #[serde(with = "humantime_serde")]
    pub submit_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub resolution_timeout: Duration,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            resolution_timeout: DEFAULT_RESOLUTION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    #[serde(flatten)]
    pub list: ListConfig,
    #[serde(flatten)]
    pub submitter: SubmitterConfig,
    /// Amount pre-filled in the amount field of a fresh session.
    pub default_amount: String,
    /// Upper bound on data rows accepted from a batch file.
    pub max_rows: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            list: ListConfig::default(),
            submitter: SubmitterConfig::default(),
            default_amount: DEFAULT_AMOUNT.to_string(),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl SessionConfig {
    pub fn import_config(&self, source_name: impl Into<String>) -> ImportConfig {
        ImportConfig {
            source_name: source_name.into(),
            max_rows: self.max_rows,
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(input).map_err(|err| MultisendError::Config(err.to_string()))?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|err| match err {
            MultisendError::Config(message) => {
                MultisendError::Config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    fn check(&self) -> Result<()> {
        if self.max_rows == 0 {
            return Err(MultisendError::Config(
                "max-rows must be greater than zero".to_string(),
            ));
        }
        if self.submitter.submit_timeout.is_zero() {
            return Err(MultisendError::Config(
                "submit-timeout must be greater than zero".to_string(),
            ));
        }
        crate::units::parse_decimal(&self.default_amount).map_err(|err| {
            MultisendError::Config(format!(
                "default-amount '{}' is invalid: {err}",
                self.default_amount
            ))
        })?;
        Ok(())
    }
}

/// Limits applied while reading a batch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Name used in error messages, usually the file path or `-` for stdin.
    pub source_name: String,
    pub max_rows: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            source_name: "-".to_string(),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}
