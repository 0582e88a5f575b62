pub mod construct;
pub mod submit;
pub mod validate;

use std::path::Path;

use multisend_core::validation::{validate_rows, ImportedBatch};
use multisend_core::{
    csv_parser, json_parser, BatchRequest, MultisendError, SessionConfig, TaxonomyCode,
};
use serde_json::{json, Value};

use crate::output::BatchSummary;

pub(crate) fn load_config(path: Option<&Path>) -> Result<SessionConfig, MultisendError> {
    match path {
        Some(path) => SessionConfig::load(path),
        None => Ok(SessionConfig::default()),
    }
}

pub(crate) fn read_and_validate_file(
    file: &Path,
    config: &SessionConfig,
) -> Result<ImportedBatch, MultisendError> {
    let import_config = config.import_config(file.display().to_string());
    let bytes = std::fs::read(file)?;
    let extension = file
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "csv" => csv_parser::parse_csv(&bytes, &import_config)?,
        "json" => json_parser::parse_json(&bytes, &import_config)?,
        _ => {
            return Err(MultisendError::validation(
                TaxonomyCode::Cli2001,
                format!(
                    "unsupported input extension for '{}': expected .csv or .json",
                    file.display()
                ),
            ))
        }
    };

    let imported = validate_rows(rows, config.list)?;
    tracing::info!(
        rows = imported.row_count,
        entries = imported.list.len(),
        "batch file validated"
    );
    Ok(imported)
}

pub(crate) fn batch_summary(
    batch: &BatchRequest,
    chain_id: Option<u64>,
) -> Result<BatchSummary, MultisendError> {
    let total = batch.total()?;
    Ok(BatchSummary {
        transfer_count: batch.len(),
        total_ether: total.to_ether_string(),
        total_wei: total.to_string(),
        chain_id,
    })
}

/// Table rows for the operator view; `wei` is present once the batch is built.
pub(crate) fn entry_rows(imported: &ImportedBatch, batch: Option<&BatchRequest>) -> Vec<Value> {
    imported
        .list
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let merged = imported
                .warnings
                .iter()
                .any(|warning| warning.ends_with(&format!("merged into entry {}", index + 1)));
            json!({
                "row": index + 1,
                "recipient": entry.recipient,
                "amount": entry.amount,
                "wei": batch
                    .and_then(|batch| batch.instructions.get(index))
                    .map(|instruction| instruction.amount.to_string()),
                "status": if merged { "merged" } else { "valid" },
            })
        })
        .collect()
}

pub(crate) fn batch_to_agent_result(batch: &BatchRequest) -> Result<Value, MultisendError> {
    let total = batch.total()?;
    Ok(json!({
        "transferCount": batch.len(),
        "totalWei": total.to_string(),
        "totalEther": total.to_ether_string(),
        "transfers": batch.instructions.iter().map(|instruction| {
            json!({
                "to": instruction.destination,
                "valueWei": instruction.amount.to_string(),
                "valueEther": instruction.amount.to_ether_string(),
                "data": instruction.payload,
            })
        }).collect::<Vec<_>>(),
    }))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use multisend_core::build;
    use tempfile::Builder;

    use super::*;

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_csv_and_json_by_extension() {
        let config = SessionConfig::default();
        let csv = write_file(".csv", "address,amount\n0xabc,1\n0xabc,2\n");
        let imported = read_and_validate_file(csv.path(), &config).unwrap();
        assert_eq!(imported.list.entries()[0].amount, "3");

        let json = write_file(".JSON", r#"[{"to":"0xabc","value":"1"}]"#);
        assert_eq!(read_and_validate_file(json.path(), &config).unwrap().list.len(), 1);
    }

    #[test]
    fn unknown_extension_is_a_cli_error() {
        let txt = write_file(".txt", "address,amount\n");
        let err = read_and_validate_file(txt.path(), &SessionConfig::default()).unwrap_err();
        assert_eq!(err.code(), 2001);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_and_validate_file(Path::new("does-not-exist.csv"), &SessionConfig::default())
            .unwrap_err();
        assert_eq!(err.code(), 3001);
    }

    #[test]
    fn config_file_controls_merge_mode() {
        let config_file = write_file(".toml", "merge-duplicate-recipients = false\n");
        let config = load_config(Some(config_file.path())).unwrap();
        let csv = write_file(".csv", "address,amount\n0xabc,1\n0xabc,2\n");
        assert_eq!(read_and_validate_file(csv.path(), &config).unwrap().list.len(), 2);
    }

    #[test]
    fn rows_mark_merged_entries_and_carry_wei() {
        let csv = write_file(".csv", "address,amount\n0xabc,1\n0xdef,2\n0xabc,0.5\n");
        let imported = read_and_validate_file(csv.path(), &SessionConfig::default()).unwrap();
        let batch = build(imported.list.entries()).unwrap();
        let rows = entry_rows(&imported, Some(&batch));
        assert_eq!(rows[0]["status"], "merged");
        assert_eq!(rows[0]["wei"], "1500000000000000000");
        assert_eq!(rows[1]["status"], "valid");

        let result = batch_to_agent_result(&batch).unwrap();
        assert_eq!(result["totalEther"], "3.5");
        assert_eq!(result["transfers"][1]["valueWei"], "2000000000000000000");
    }
}
