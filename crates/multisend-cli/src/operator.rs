use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

use colored::{Color, Colorize};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use crate::output::{BatchSummary, CommandOutput, OutputError, OutputHandler, SubmissionInfo};

const RECIPIENT_WIDTH: usize = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Valid,
    Merged,
}

/// One row of the entry table, as carried in a command payload's `rows`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntryRow {
    pub row: usize,
    pub recipient: String,
    pub amount: String,
    #[serde(default)]
    pub wei: Option<String>,
    #[serde(default)]
    pub status: EntryStatus,
}

/// Terminal output for a person at the keyboard.
pub struct OperatorOutput {
    quiet: bool,
    no_color: bool,
    spinner: Option<ProgressBar>,
}

impl OperatorOutput {
    pub fn new(quiet: bool, no_color: bool) -> Self {
        Self {
            quiet,
            no_color,
            spinner: None,
        }
    }

    fn paint(&self, color: Color, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.color(color).to_string()
        }
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    pub fn entry_table(&self, rows: &[EntryRow]) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["#", "Recipient", "Ether", "Wei", ""]);

        for row in rows {
            let status = match row.status {
                EntryStatus::Valid => String::new(),
                EntryStatus::Merged => self.paint(Color::Yellow, "merged"),
            };
            table.add_row(vec![
                Cell::new(row.row).set_alignment(CellAlignment::Right),
                Cell::new(shorten_middle(&row.recipient, RECIPIENT_WIDTH)),
                Cell::new(&row.amount).set_alignment(CellAlignment::Right),
                Cell::new(row.wei.as_deref().unwrap_or("")).set_alignment(CellAlignment::Right),
                Cell::new(status),
            ]);
        }

        table.to_string()
    }
}

/// Keeps both ends of an over-long recipient, joined by an ellipsis.
fn shorten_middle(value: &str, width: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= width || width < 5 {
        return value.to_string();
    }
    let keep = (width - 1) / 2;
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{head}…{tail}")
}

fn rows_from_payload(payload: &serde_json::Value) -> Vec<EntryRow> {
    payload
        .get("rows")
        .and_then(serde_json::Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| EntryRow::deserialize(row).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn accepts(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// Hint keyed by the `[code:NAME]` prefix of a rendered row issue.
fn hint_for(issue: &str) -> Option<&'static str> {
    let code = issue.strip_prefix('[')?.split(':').next()?;
    match code {
        "1001" => Some("every row needs a recipient; with address checks on it must be 0x + 40 hex"),
        "1002" => Some("amounts are plain decimals like 0.25, with no sign or thousands separator"),
        "1006" => Some("cells must not start with = + - @ or a tab"),
        "4001" => Some("ether has 18 decimal places; drop the extra digits"),
        _ => None,
    }
}

impl OutputHandler for OperatorOutput {
    fn start_operation(&mut self, operation: &str) {
        if self.quiet {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(operation.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn progress(&mut self, message: &str) {
        if self.quiet {
            return;
        }
        match &self.spinner {
            Some(spinner) => spinner.set_message(message.to_string()),
            None => eprintln!("{message}"),
        }
    }

    fn display_batch_summary(&mut self, summary: &BatchSummary) {
        self.clear_spinner();
        if self.quiet {
            return;
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.add_row(vec!["transfers".to_string(), summary.transfer_count.to_string()]);
        table.add_row(vec!["total".to_string(), format!("{} ETH", summary.total_ether)]);
        table.add_row(vec!["total (wei)".to_string(), summary.total_wei.clone()]);
        if let Some(chain_id) = summary.chain_id {
            table.add_row(vec!["chain id".to_string(), chain_id.to_string()]);
        }
        println!("{table}");
    }

    fn display_validation_errors(&mut self, errors: &[String]) {
        self.clear_spinner();
        for issue in errors {
            eprintln!("{}", self.paint(Color::Red, issue));
            if let Some(hint) = hint_for(issue) {
                eprintln!("    hint: {hint}");
            }
        }
    }

    fn confirm_proceed(&mut self, prompt: &str) -> Result<bool, OutputError> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Err(OutputError::StdinBlocked);
        }
        self.clear_spinner();

        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt} [y/N] ").map_err(OutputError::Io)?;
        stdout.flush().map_err(OutputError::Io)?;

        let mut answer = String::new();
        stdin.lock().read_line(&mut answer).map_err(OutputError::Io)?;
        Ok(accepts(&answer))
    }

    fn display_submission(&mut self, info: &SubmissionInfo) {
        self.clear_spinner();
        if self.quiet {
            return;
        }
        println!("request {}", info.request_id);
        let status = info.status.as_deref().unwrap_or("unknown");
        match &info.transaction_hash {
            Some(hash) => println!("status  {status}, tx {hash}"),
            None => println!("status  {status}"),
        }
    }

    fn complete(&mut self, output: &CommandOutput) {
        self.clear_spinner();

        let rows = output
            .payload
            .as_ref()
            .map(rows_from_payload)
            .unwrap_or_default();
        if !rows.is_empty() && !self.quiet {
            println!("{}", self.entry_table(&rows));
        }

        for warning in &output.details {
            eprintln!("{}", self.paint(Color::Yellow, warning));
        }

        if output.ok {
            println!("{}", self.paint(Color::Green, &output.message));
        } else {
            eprintln!("{}", self.paint(Color::Red, &output.message));
        }
    }
}
