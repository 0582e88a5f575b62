use std::fs;
use std::path::{Path, PathBuf};

use multisend_core::{build, BatchRequest, MultisendError, SessionConfig};
use serde_json::json;

use crate::commands::{batch_to_agent_result, entry_rows, read_and_validate_file};
use crate::output::{CommandOutput, OutputHandler};

pub const BATCH_FILENAME: &str = "multisend-batch.json";

/// Builds the wei-denominated batch and optionally writes its canonical JSON.
pub fn run(
    file: &Path,
    config: &SessionConfig,
    output_dir: Option<&Path>,
    output: &mut dyn OutputHandler,
) -> Result<CommandOutput, MultisendError> {
    output.progress(&format!("constructing from {}", file.display()));
    let imported = read_and_validate_file(file, config)?;
    let batch = build(imported.list.entries())?;

    let batch_file = output_dir
        .map(|dir| write_batch_file(dir, &batch))
        .transpose()?;

    let mut result = batch_to_agent_result(&batch)?;
    result["batchFile"] = json!(batch_file.as_ref().map(|path| path.display().to_string()));

    let payload = json!({
        "result": result,
        "rows": entry_rows(&imported, Some(&batch)),
        "warnings": imported.warnings,
    });

    Ok(CommandOutput::success(
        "construct",
        "construction completed",
        imported.warnings.clone(),
        Some(payload),
    ))
}

fn write_batch_file(dir: &Path, batch: &BatchRequest) -> Result<PathBuf, MultisendError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(BATCH_FILENAME);
    fs::write(&path, batch.canonical_json()?)?;
    tracing::info!(path = %path.display(), "wrote batch file");
    Ok(path)
}
