use csv::{ReaderBuilder, StringRecord};

use crate::config::ImportConfig;
use crate::error::{MultisendError, Result, TaxonomyCode};
use crate::validation::RawRow;

pub const MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Spreadsheet apps evaluate cells starting with these characters.
const FORMULA_PREFIXES: &[char] = &['=', '+', '-', '@', '\t', '\r'];

/// Positions of the recipient and amount columns in the header row.
struct Columns {
    recipient: usize,
    amount: usize,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self> {
        let find = |alias: fn(&str) -> bool| {
            headers
                .iter()
                .position(|header| alias(&header.trim().to_ascii_lowercase()))
        };
        let missing = |names: &str| {
            MultisendError::validation(
                TaxonomyCode::Validation1009,
                format!("missing required CSV column: {names}"),
            )
        };

        Ok(Self {
            recipient: find(recipient_alias).ok_or_else(|| missing("address|recipient|to"))?,
            amount: find(amount_alias).ok_or_else(|| missing("amount|value|ether|eth"))?,
        })
    }

    fn row(&self, row_number: usize, record: &StringRecord) -> RawRow {
        let cell = |index: usize| {
            record
                .get(index)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
        };
        RawRow {
            row_number,
            recipient: cell(self.recipient),
            amount: cell(self.amount),
        }
    }
}

/// Reads `recipient,amount` rows from CSV bytes.
///
/// Cells are trimmed but otherwise unvalidated; see [`crate::validation::validate_rows`].
pub fn parse_csv(input: &[u8], config: &ImportConfig) -> Result<Vec<RawRow>> {
    check_input_size(input, &config.source_name)?;

    let body = input.strip_prefix(UTF8_BOM).unwrap_or(input);
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(body);
    let malformed = |context: String| {
        move |err: csv::Error| {
            MultisendError::validation(TaxonomyCode::Validation1005, format!("{context}: {err}"))
        }
    };

    let headers = reader
        .headers()
        .map_err(malformed(format!(
            "failed reading CSV headers of '{}'",
            config.source_name
        )))?
        .clone();
    reject_formulas(&headers, 1, &headers)?;
    let columns = Columns::locate(&headers)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row_number = index + 1;
        // Physical line numbers count the header.
        let line = row_number + 1;
        if row_number > config.max_rows {
            return Err(MultisendError::validation(
                TaxonomyCode::Validation1008,
                format!("CSV has more than {} data rows", config.max_rows),
            ));
        }
        let record = record.map_err(malformed(format!("failed parsing CSV row {line}")))?;
        reject_formulas(&record, line, &headers)?;
        rows.push(columns.row(row_number, &record));
    }

    Ok(rows)
}

pub(crate) fn check_input_size(input: &[u8], source_name: &str) -> Result<()> {
    if input.len() > MAX_FILE_SIZE_BYTES {
        return Err(MultisendError::validation(
            TaxonomyCode::Validation1007,
            format!(
                "input '{source_name}' exceeds maximum file size of {MAX_FILE_SIZE_BYTES} bytes"
            ),
        ));
    }
    Ok(())
}

pub(crate) fn recipient_alias(key: &str) -> bool {
    matches!(key, "address" | "recipient" | "to")
}

pub(crate) fn amount_alias(key: &str) -> bool {
    matches!(key, "amount" | "value" | "ether" | "eth")
}

fn reject_formulas(record: &StringRecord, line: usize, headers: &StringRecord) -> Result<()> {
    let Some(index) = record
        .iter()
        .position(|cell| cell.starts_with(FORMULA_PREFIXES))
    else {
        return Ok(());
    };
    let column = headers
        .get(index)
        .map(str::to_string)
        .unwrap_or_else(|| format!("column#{}", index + 1));
    Err(MultisendError::validation(
        TaxonomyCode::Validation1006,
        format!("formula injection detected at row {line}, column {column}"),
    ))
}
