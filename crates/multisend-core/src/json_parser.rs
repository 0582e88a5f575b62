use serde_json::{Map, Value};

use crate::config::ImportConfig;
use crate::csv_parser::{amount_alias, check_input_size, recipient_alias};
use crate::error::{MultisendError, Result, TaxonomyCode};
use crate::validation::RawRow;

/// Reads transfers from either a bare array of objects or `{ "transfers": [...] }`.
///
/// Keys use the same aliases as CSV headers. JSON numbers are kept by their literal text,
/// so `0.1` stays `0.1`.
pub fn parse_json(input: &[u8], config: &ImportConfig) -> Result<Vec<RawRow>> {
    check_input_size(input, &config.source_name)?;

    let document: Value = serde_json::from_slice(input).map_err(|err| {
        MultisendError::validation(
            TaxonomyCode::Validation1005,
            format!("'{}' is not valid JSON: {err}", config.source_name),
        )
    })?;

    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("transfers") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(MultisendError::validation(
                    TaxonomyCode::Validation1009,
                    "JSON object must contain a \"transfers\" array",
                ))
            }
        },
        _ => {
            return Err(MultisendError::validation(
                TaxonomyCode::Validation1005,
                "JSON batch must be an array or an object with a \"transfers\" array",
            ))
        }
    };

    if items.len() > config.max_rows {
        return Err(MultisendError::validation(
            TaxonomyCode::Validation1008,
            format!("JSON has more than {} transfers", config.max_rows),
        ));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let row_number = idx + 1;
            let Value::Object(object) = item else {
                return Err(MultisendError::validation(
                    TaxonomyCode::Validation1005,
                    format!("transfer {row_number} is not a JSON object"),
                ));
            };
            Ok(RawRow {
                row_number,
                recipient: field(&object, recipient_alias, row_number)?,
                amount: field(&object, amount_alias, row_number)?,
            })
        })
        .collect()
}

fn field(
    object: &Map<String, Value>,
    alias: fn(&str) -> bool,
    row_number: usize,
) -> Result<Option<String>> {
    let Some(value) = object
        .iter()
        .find(|(key, _)| alias(&key.trim().to_ascii_lowercase()))
        .map(|(_, value)| value)
    else {
        return Ok(None);
    };

    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Null => return Ok(None),
        _ => {
            return Err(MultisendError::validation(
                TaxonomyCode::Validation1005,
                format!("transfer {row_number} has a non-scalar field"),
            ))
        }
    };
    Ok(Some(text).filter(|text| !text.is_empty()))
}
