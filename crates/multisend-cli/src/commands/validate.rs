use std::path::Path;

use multisend_core::{build, MultisendError, SessionConfig};
use serde_json::json;

use crate::commands::{entry_rows, read_and_validate_file};
use crate::output::{CommandOutput, OutputHandler};

/// Checks every row and that each amount converts to whole wei.
pub fn run(
    file: &Path,
    config: &SessionConfig,
    output: &mut dyn OutputHandler,
) -> Result<CommandOutput, MultisendError> {
    output.progress(&format!("validating {}", file.display()));
    let imported = read_and_validate_file(file, config)?;
    let batch = build(imported.list.entries())?;
    let total = batch.total()?;

    let payload = json!({
        "result": {
            "rowCount": imported.row_count,
            "transferCount": batch.len(),
            "totalEther": total.to_ether_string(),
            "valid": true,
        },
        "rows": entry_rows(&imported, None),
        "warnings": imported.warnings,
    });

    Ok(CommandOutput::success(
        "validate",
        &format!(
            "{} rows valid: {} transfers totaling {} ETH",
            imported.row_count,
            batch.len(),
            total.to_ether_string()
        ),
        imported.warnings.clone(),
        Some(payload),
    ))
}
