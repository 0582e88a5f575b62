use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use clap::Args;
use multisend_core::receipt::{default_receipt_filename, generate_receipt, receipt_to_json};
use multisend_core::{build, EditingSession, MultisendError, SessionConfig, SubmitOutcome};
use reqwest::{Client, Url};
use serde_json::json;

use crate::commands::{batch_summary, entry_rows, read_and_validate_file};
use crate::output::{CommandOutput, OutputHandler, SubmissionInfo};
use crate::rpc::JsonRpcCollaborator;
use crate::{maybe_confirm, CliError};

#[derive(Debug, Clone, Args, PartialEq, Eq)]
pub struct WalletArgs {
    /// JSON-RPC endpoint of the wallet that signs the batch.
    #[arg(long, env = "MULTISEND_RPC_URL")]
    pub rpc_url: String,
    /// Account the transfers are sent from.
    #[arg(long, env = "MULTISEND_FROM")]
    pub from: String,
    #[arg(long, env = "MULTISEND_CHAIN_ID")]
    pub chain_id: u64,
}

/// Sends the batch to the wallet, waits for acceptance and writes a receipt.
///
/// Ctrl-C while waiting stops tracking the request locally and exits.
pub async fn run(
    file: &Path,
    config: &SessionConfig,
    wallet: &WalletArgs,
    output_dir: Option<&Path>,
    force: bool,
    output: &mut dyn OutputHandler,
) -> Result<CommandOutput, CliError> {
    let imported = read_and_validate_file(file, config)?;
    let batch = build(imported.list.entries())?;
    let summary = batch_summary(&batch, Some(wallet.chain_id))?;
    output.display_batch_summary(&summary);
    maybe_confirm(
        output,
        force,
        &format!(
            "Submit {} transfers totaling {} ETH from {} on chain {}?",
            summary.transfer_count, summary.total_ether, wallet.from, wallet.chain_id
        ),
    )?;

    let url = Url::parse(&wallet.rpc_url).map_err(|err| {
        MultisendError::Config(format!("invalid --rpc-url '{}': {err}", wallet.rpc_url))
    })?;
    let collaborator = Arc::new(JsonRpcCollaborator::new(
        Client::new(),
        url,
        wallet.from.clone(),
        wallet.chain_id,
    ));
    let session = EditingSession::new(collaborator, config.clone());
    session.load_list(imported.list.clone());

    output.progress("waiting for the wallet to accept the batch");
    let submission = session.on_submit();
    tokio::pin!(submission);
    let outcome = tokio::select! {
        outcome = &mut submission => outcome?,
        () = interrupted() => {
            session.on_cancel();
            return Err(CliError::Cancelled);
        }
    };

    let SubmitOutcome::Resolved { request_id, lookup } = outcome else {
        return Err(CliError::Cancelled);
    };

    output.progress("looking up request status");
    let record = lookup.wait().await.ok();
    let status = record
        .as_ref()
        .and_then(|record| serde_json::to_value(record.status).ok())
        .and_then(|value| value.as_str().map(ToOwned::to_owned));
    let transaction_hash = record.and_then(|record| record.transaction_hash);
    output.display_submission(&SubmissionInfo {
        request_id: request_id.to_string(),
        status: status.clone(),
        transaction_hash: transaction_hash.clone(),
    });

    let receipt = generate_receipt(&batch, &request_id, Utc::now())?;
    let receipt_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_dir(file));
    fs::create_dir_all(&receipt_dir).map_err(MultisendError::from)?;
    let receipt_path = receipt_dir.join(default_receipt_filename(&receipt));
    fs::write(&receipt_path, receipt_to_json(&receipt)?).map_err(MultisendError::from)?;
    tracing::info!(path = %receipt_path.display(), "wrote submission receipt");

    let payload = json!({
        "result": {
            "requestId": request_id.as_str(),
            "status": status,
            "transactionHash": transaction_hash,
            "chainId": wallet.chain_id,
            "transferCount": summary.transfer_count,
            "totalWei": summary.total_wei,
            "totalEther": summary.total_ether,
            "receiptId": receipt.receipt_id.to_string(),
            "receiptFile": receipt_path.display().to_string(),
        },
        "rows": entry_rows(&imported, Some(&batch)),
        "timestamp": receipt.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        "warnings": imported.warnings,
    });

    Ok(CommandOutput::success(
        "submit",
        &format!("batch accepted as {request_id}"),
        imported.warnings.clone(),
        Some(payload),
    ))
}

fn default_output_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
