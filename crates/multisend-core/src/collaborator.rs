//! Seam to the external environment that signs and broadcasts a batch.

use anyhow::Result;

use crate::types::{RequestId, ResolutionRecord, TransferInstruction};

#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait SigningCollaborator: Send + Sync + 'static {
    /// Submits the instructions as one atomic request and returns its identifier.
    async fn send_batch(&self, instructions: &[TransferInstruction]) -> Result<RequestId>;

    /// Looks up what became of a previously accepted request.
    async fn get_request_status(&self, request_id: &RequestId) -> Result<ResolutionRecord>;
}
