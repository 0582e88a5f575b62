mod agent;
mod commands;
mod error;
mod logging;
mod mode;
mod operator;
mod output;
mod rpc;

use std::path::{Path, PathBuf};

use clap::{error::ErrorKind, Parser, Subcommand, ValueEnum};
use multisend_core::MultisendError;

use commands::submit::WalletArgs;
use mode::Mode;
use output::{CommandOutput, OutputHandler};

pub(crate) use error::{CliError, ExitCode};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "multisend", version, about = "Compose and submit batched ether transfers")]
struct Cli {
    /// Emit one JSON document instead of tables and prompts.
    #[arg(long = "output", value_enum, global = true)]
    output_format: Option<OutputFormat>,

    /// Stay in operator mode even when stdout is piped.
    #[arg(long, global = true)]
    interactive: bool,

    /// Skip the confirmation prompt.
    #[arg(long, global = true)]
    force: bool,

    #[arg(long, global = true)]
    quiet: bool,

    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// TOML file with session settings.
    #[arg(long, global = true, env = "MULTISEND_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
enum Commands {
    /// Check every row of a CSV or JSON batch file.
    Validate { file: PathBuf },
    /// Build the wei-denominated batch without sending it.
    Construct {
        file: PathBuf,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Send the batch to a wallet as one atomic request.
    Submit {
        file: PathBuf,
        #[command(flatten)]
        wallet: WalletArgs,
        /// Where the receipt is written; defaults to the directory of FILE.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

impl Commands {
    const NAMES: [&'static str; 3] = ["validate", "construct", "submit"];

    fn name(&self) -> &'static str {
        match self {
            Self::Validate { .. } => Self::NAMES[0],
            Self::Construct { .. } => Self::NAMES[1],
            Self::Submit { .. } => Self::NAMES[2],
        }
    }
}

/// What can be read from the raw arguments when clap itself rejects them.
#[derive(Debug, PartialEq, Eq)]
struct RawArgs {
    mode: Mode,
    operation: &'static str,
}

impl RawArgs {
    fn scan(args: &[String]) -> Self {
        let rest = args.get(1..).unwrap_or_default();
        let json = rest.iter().enumerate().any(|(index, arg)| {
            arg.eq_ignore_ascii_case("--output=json")
                || (arg == "--output"
                    && rest
                        .get(index + 1)
                        .is_some_and(|value| value.eq_ignore_ascii_case("json")))
        });
        let interactive = rest.iter().any(|arg| arg == "--interactive");
        let operation = rest
            .iter()
            .find_map(|arg| {
                Commands::NAMES
                    .into_iter()
                    .find(|name| arg.as_str() == *name)
            })
            .unwrap_or(Commands::NAMES[0]);

        Self {
            mode: mode::detect_mode(json, interactive),
            operation,
        }
    }
}

fn output_handler(mode: Mode, quiet: bool, no_color: bool) -> Box<dyn OutputHandler> {
    match mode {
        Mode::Agent => Box::new(agent::AgentOutputHandler::new()),
        Mode::Operator => Box::new(operator::OperatorOutput::new(quiet, no_color)),
    }
}

/// Asks before anything irreversible happens unless `--force` was given.
pub(crate) fn maybe_confirm(
    output: &mut dyn OutputHandler,
    force: bool,
    prompt: &str,
) -> Result<(), CliError> {
    if force || output.confirm_proceed(prompt)? {
        Ok(())
    } else {
        Err(CliError::ConfirmationRequired)
    }
}

async fn dispatch(
    command: &Commands,
    config_path: Option<&Path>,
    force: bool,
    output: &mut dyn OutputHandler,
) -> Result<CommandOutput, CliError> {
    let config = commands::load_config(config_path)?;
    let outcome = match command {
        Commands::Validate { file } => commands::validate::run(file, &config, output)?,
        Commands::Construct { file, output_dir } => {
            commands::construct::run(file, &config, output_dir.as_deref(), output)?
        }
        Commands::Submit {
            file,
            wallet,
            output_dir,
        } => {
            commands::submit::run(file, &config, wallet, output_dir.as_deref(), force, output)
                .await?
        }
    };
    Ok(outcome)
}

fn run(cli: Cli) -> ExitCode {
    let mode = mode::detect_mode(
        cli.output_format == Some(OutputFormat::Json),
        cli.interactive,
    );
    let mut output = output_handler(mode, cli.quiet, cli.no_color);
    let command = cli.command.name();
    output.start_operation(command);

    let result = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(dispatch(
            &cli.command,
            cli.config.as_deref(),
            cli.force,
            output.as_mut(),
        )),
        Err(err) => Err(CliError::Internal(format!(
            "cannot start async runtime: {err}"
        ))),
    };

    match result {
        Ok(done) => {
            output.complete(&done);
            ExitCode::Success
        }
        Err(err) => {
            if let CliError::Core(MultisendError::BatchValidation(batch)) = &err {
                let issues: Vec<String> = batch.issues.iter().map(ToString::to_string).collect();
                output.display_validation_errors(&issues);
            }
            tracing::debug!(command, error = ?err, "command failed");
            output.complete(&err.to_output(command));
            err.exit_code()
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    logging::init_logging(args.iter().any(|arg| arg == "--no-color"));

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            std::process::exit(ExitCode::Success.as_i32());
        }
        Err(err) => {
            let raw = RawArgs::scan(&args);
            let cli_error = CliError::from(&err);
            if raw.mode == Mode::Agent {
                agent::AgentOutputHandler::new().complete(&cli_error.to_output(raw.operation));
            } else {
                let _ = err.print();
            }
            std::process::exit(cli_error.exit_code().as_i32());
        }
    };

    std::process::exit(run(cli).as_i32());
}
