// compensa - environmental compensation batches from the command line

mod batch;
mod exit_codes;
mod rules;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use compensa_engine::{CompensationError, Mode, UngroupedPolicy};
use tracing_subscriber::EnvFilter;

use exit_codes::{engine_exit_code, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "compensa")]
#[command(about = "Compute environmental compensation for batches of trees and vegetation patches")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch of line items against the configured rule tables
    #[command(after_help = "\
Examples:
  compensa run compensation.toml batch.json
  compensa run compensation.toml batch.json --json
  compensa run compensation.toml - --output result.json < batch.json
  compensa run compensation.toml batch.json --policy reject_ambiguous")]
    Run {
        /// Path to the compensation TOML config
        config: PathBuf,

        /// Batch JSON file (`{"items": [...]}` or a bare list), `-` for stdin
        batch: PathBuf,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override the config's policy for items without a group
        #[arg(long)]
        policy: Option<PolicyArg>,
    },

    /// Load the rule tables and report what was read
    #[command(after_help = "\
Examples:
  compensa validate compensation.toml
  compensa validate compensation.toml --json")]
    Validate {
        /// Path to the compensation TOML config
        config: PathBuf,

        /// Print the load report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the municipalities that have rules
    #[command(after_help = "\
Examples:
  compensa municipalities compensation.toml
  compensa municipalities compensation.toml --mode patches --json")]
    Municipalities {
        /// Path to the compensation TOML config
        config: PathBuf,

        /// Rule table to list
        #[arg(long, default_value = "trees")]
        mode: ModeArg,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Spelled the way the TOML config and the report spell it.
#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "snake_case")]
enum PolicyArg {
    FirstLoaded,
    RejectAmbiguous,
}

impl From<PolicyArg> for UngroupedPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::FirstLoaded => Self::FirstLoaded,
            PolicyArg::RejectAmbiguous => Self::RejectAmbiguous,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Trees,
    Patches,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Trees => Self::Trees,
            ModeArg::Patches => Self::Patches,
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<CompensationError> for CliError {
    fn from(err: CompensationError) -> Self {
        let hint = match &err {
            CompensationError::MissingColumn { .. } => {
                Some("set the column name under [trees.columns] or [patches.columns]".to_string())
            }
            CompensationError::InvalidBatch(_) => {
                Some("send {\"items\": [...]} with at least one item".to_string())
            }
            _ => None,
        };
        Self { code: engine_exit_code(&err), message: err.to_string(), hint }
    }
}

/// Logs go to stderr. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // The fmt subscriber also installs the `log` bridge for the engine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, batch, json, output, policy } => {
            batch::cmd_run(config, batch, json, output, policy.map(Into::into))
        }
        Commands::Validate { config, json } => rules::cmd_validate(config, json),
        Commands::Municipalities { config, mode, json } => {
            rules::cmd_municipalities(config, mode.into(), json)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
