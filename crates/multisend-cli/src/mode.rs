use std::io::{self, IsTerminal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Operator,
    Agent,
}

/// `--output json` always wins; `--interactive` forces operator mode even when piped.
pub fn detect_mode(output_json: bool, interactive: bool) -> Mode {
    detect_mode_with_terminal(output_json, interactive, io::stdout().is_terminal())
}

fn detect_mode_with_terminal(output_json: bool, interactive: bool, stdout_is_terminal: bool) -> Mode {
    if output_json {
        Mode::Agent
    } else if interactive || stdout_is_terminal {
        Mode::Operator
    } else {
        Mode::Agent
    }
}
