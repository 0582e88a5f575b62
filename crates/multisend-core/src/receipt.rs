//! Local record of an accepted batch, written next to the input by the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::batch::BatchRequest;
use crate::error::Result;
use crate::types::{RequestId, TransferInstruction, Wei};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    /// Derived from the request id and batch digest, so the same acceptance always
    /// produces the same receipt id.
    pub receipt_id: Uuid,
    pub request_id: RequestId,
    pub created_at: DateTime<Utc>,
    pub transfer_count: usize,
    pub total_wei: Wei,
    pub total_ether: String,
    /// Lowercase hex SHA-256 of the batch's canonical JSON.
    pub batch_digest: String,
    pub instructions: Vec<TransferInstruction>,
}

pub fn generate_receipt(
    batch: &BatchRequest,
    request_id: &RequestId,
    created_at: DateTime<Utc>,
) -> Result<SubmissionReceipt> {
    let batch_digest = format!("{:x}", Sha256::digest(batch.canonical_json()?.as_bytes()));
    let receipt_id = Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{request_id}:{batch_digest}").as_bytes(),
    );
    let total_wei = batch.total()?;

    Ok(SubmissionReceipt {
        receipt_id,
        request_id: request_id.clone(),
        created_at,
        transfer_count: batch.len(),
        total_wei,
        total_ether: total_wei.to_ether_string(),
        batch_digest,
        instructions: batch.instructions.clone(),
    })
}

pub fn receipt_to_json(receipt: &SubmissionReceipt) -> Result<String> {
    Ok(serde_json::to_string_pretty(receipt)?)
}

pub fn default_receipt_filename(receipt: &SubmissionReceipt) -> String {
    format!(
        "multisend-receipt-{}-{}.json",
        receipt.created_at.format("%Y%m%dT%H%M%SZ"),
        &receipt.batch_digest[..8]
    )
}
