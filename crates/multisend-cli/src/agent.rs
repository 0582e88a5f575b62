use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::output::{BatchSummary, CommandOutput, OutputError, OutputHandler, SubmissionInfo};

/// Used when a payload carries no timestamp, so identical input renders identically.
pub(crate) const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

const GENERIC_ERROR_CODE: u16 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentError {
    pub code: u16,
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The single JSON document an agent-mode run writes to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Envelope {
    success: bool,
    multisend_version: &'static str,
    mode: &'static str,
    operation: String,
    timestamp: String,
    result: Option<Value>,
    error: Option<AgentError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl From<&CommandOutput> for Envelope {
    fn from(output: &CommandOutput) -> Self {
        let field = |key: &str| output.payload.as_ref().and_then(|payload| payload.get(key));

        let error = match field("error").map(AgentError::deserialize) {
            Some(Ok(error)) => Some(error),
            _ if output.ok => None,
            _ => Some(AgentError {
                code: GENERIC_ERROR_CODE,
                name: "INTERNAL_ERROR".to_string(),
                message: output.message.clone(),
                details: (!output.details.is_empty())
                    .then(|| json!({ "messages": output.details })),
            }),
        };

        Self {
            success: output.ok,
            multisend_version: env!("CARGO_PKG_VERSION"),
            mode: "agent",
            operation: output.command.clone(),
            timestamp: field("timestamp")
                .and_then(Value::as_str)
                .unwrap_or(EPOCH_TIMESTAMP)
                .to_string(),
            result: field("result").filter(|value| !value.is_null()).cloned(),
            error,
            warnings: field("warnings")
                .and_then(|value| Vec::<String>::deserialize(value).ok())
                .unwrap_or_default(),
        }
    }
}

/// Rebuilds every object with its keys in byte order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            Value::Object(ordered.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        scalar => scalar,
    }
}

pub(crate) fn render_agent_json(output: &CommandOutput) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(Envelope::from(output))?;
    serde_json::to_string_pretty(&canonicalize(value))
}

/// Machine output: no prompts, no progress, one JSON document per run.
#[derive(Debug, Default)]
pub struct AgentOutputHandler;

impl AgentOutputHandler {
    pub fn new() -> Self {
        Self
    }
}

impl OutputHandler for AgentOutputHandler {
    fn start_operation(&mut self, _operation: &str) {}

    fn progress(&mut self, _message: &str) {}

    fn display_batch_summary(&mut self, _summary: &BatchSummary) {}

    fn display_validation_errors(&mut self, _errors: &[String]) {}

    fn confirm_proceed(&mut self, _prompt: &str) -> Result<bool, OutputError> {
        Ok(true)
    }

    fn display_submission(&mut self, _info: &SubmissionInfo) {}

    fn complete(&mut self, output: &CommandOutput) {
        match render_agent_json(output) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => {
                tracing::error!(error = %err, "failed to render agent output");
                let fallback = json!({
                    "error": {
                        "code": GENERIC_ERROR_CODE,
                        "message": format!("serialization failed: {err}"),
                        "name": "INTERNAL_ERROR",
                    },
                    "mode": "agent",
                    "multisend_version": env!("CARGO_PKG_VERSION"),
                    "operation": output.command,
                    "result": null,
                    "success": false,
                    "timestamp": EPOCH_TIMESTAMP,
                });
                println!("{fallback}");
            }
        }
    }
}
