pub mod batch;
pub mod collaborator;
pub mod config;
pub mod csv_parser;
pub mod error;
pub mod json_parser;
pub mod receipt;
pub mod session;
pub mod submitter;
pub mod transfer_list;
pub mod types;
pub mod units;
pub mod validation;

pub use batch::{build, BatchRequest};
pub use collaborator::SigningCollaborator;
pub use config::{ImportConfig, ListConfig, SessionConfig, SubmitterConfig};
pub use error::{MultisendError, Result, TaxonomyCode};
pub use session::{EditingSession, SessionView};
pub use submitter::{BatchSubmitter, SubmissionState, SubmitOutcome};
pub use transfer_list::{AddOutcome, TransferList};
pub use types::{RequestId, ResolutionRecord, ResolutionStatus, TransferEntry, TransferInstruction, Wei};

#[cfg(any(test, feature = "test-util"))]
pub use collaborator::MockSigningCollaborator;
