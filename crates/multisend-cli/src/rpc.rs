//! Wallet connection over JSON-RPC using `wallet_sendCalls` / `wallet_getCallsStatus`.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, bail, Context, Result};
use multisend_core::{
    RequestId, ResolutionRecord, ResolutionStatus, SigningCollaborator, TransferInstruction,
};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};

const CALLS_VERSION: &str = "2.0.0";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug)]
pub struct JsonRpcCollaborator {
    client: Client,
    url: Url,
    from: String,
    chain_id: u64,
    id: AtomicU64,
}

impl JsonRpcCollaborator {
    pub fn new(client: Client, url: Url, from: String, chain_id: u64) -> Self {
        Self {
            client,
            url,
            from,
            chain_id,
            id: AtomicU64::new(0),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.id.fetch_add(1, Ordering::SeqCst);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::debug!(id, method, "sending wallet request");

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("failed to send {method} to {}", self.url))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("failed to read {method} response body"))?;
        tracing::debug!(id, method, body = ?text.trim(), "received wallet response");
        if !status.is_success() {
            bail!("{method} returned HTTP status {status}");
        }

        let response: RpcResponse = serde_json::from_str(&text)
            .with_context(|| format!("{method} returned a malformed JSON-RPC response"))?;
        if let Some(error) = response.error {
            bail!("{method} failed with code {}: {}", error.code, error.message);
        }
        response
            .result
            .ok_or_else(|| anyhow!("{method} returned neither result nor error"))
    }
}

#[async_trait::async_trait]
impl SigningCollaborator for JsonRpcCollaborator {
    async fn send_batch(&self, instructions: &[TransferInstruction]) -> Result<RequestId> {
        let params = send_calls_params(&self.from, self.chain_id, instructions);
        let result = self.call("wallet_sendCalls", params).await?;
        parse_send_calls_result(&result)
    }

    async fn get_request_status(&self, request_id: &RequestId) -> Result<ResolutionRecord> {
        let result = self
            .call("wallet_getCallsStatus", json!([request_id.as_str()]))
            .await?;
        Ok(parse_calls_status(request_id, &result))
    }
}

pub(crate) fn send_calls_params(
    from: &str,
    chain_id: u64,
    instructions: &[TransferInstruction],
) -> Value {
    let calls: Vec<Value> = instructions
        .iter()
        .map(|instruction| {
            json!({
                "to": instruction.destination,
                "value": instruction.amount.to_hex_quantity(),
                "data": instruction.payload,
            })
        })
        .collect();

    json!([{
        "version": CALLS_VERSION,
        "chainId": format!("0x{chain_id:x}"),
        "from": from,
        "atomicRequired": true,
        "calls": calls,
    }])
}

pub(crate) fn parse_send_calls_result(result: &Value) -> Result<RequestId> {
    let id = match result {
        Value::String(id) => id.as_str(),
        Value::Object(object) => object
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("wallet_sendCalls result has no string id"))?,
        other => bail!("unexpected wallet_sendCalls result: {other}"),
    };
    if id.is_empty() {
        bail!("wallet_sendCalls returned an empty id");
    }
    Ok(RequestId::new(id))
}

pub(crate) fn parse_calls_status(request_id: &RequestId, result: &Value) -> ResolutionRecord {
    let status = match result.get("status") {
        Some(Value::Number(number)) => match number.as_u64() {
            Some(100..=199) => ResolutionStatus::Pending,
            Some(200..=299) => ResolutionStatus::Confirmed,
            Some(400..=699) => ResolutionStatus::Failed,
            _ => ResolutionStatus::Unknown,
        },
        Some(Value::String(text)) => match text.to_ascii_uppercase().as_str() {
            "PENDING" => ResolutionStatus::Pending,
            "CONFIRMED" => ResolutionStatus::Confirmed,
            "FAILED" => ResolutionStatus::Failed,
            _ => ResolutionStatus::Unknown,
        },
        _ => ResolutionStatus::Unknown,
    };
    let transaction_hash = result
        .get("receipts")
        .and_then(Value::as_array)
        .and_then(|receipts| receipts.first())
        .and_then(|receipt| receipt.get("transactionHash"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    ResolutionRecord {
        request_id: request_id.clone(),
        status,
        transaction_hash,
    }
}
