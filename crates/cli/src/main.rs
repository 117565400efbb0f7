// tally - project line-item rollups for the estimating dashboard

mod audit;
mod context;
mod exit_codes;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_SOURCE, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Resolve competing project claims and publish the dashboard summary")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Config file (default: ./tally.toml, then the user config dir)
    #[arg(long, short = 'c', global = true, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read all records, recompute the summary and publish it
    #[command(after_help = "\
Examples:
  tally run
  tally run --dry-run --report
  tally run --input export.csv --input extra.json --dry-run --json
  tally run --as-of 2026-10-19T06:00:00Z --output summary.json")]
    Run {
        /// Read these CSV/JSON exports instead of the configured source
        #[arg(long, short = 'i', value_name = "FILE")]
        input: Vec<PathBuf>,

        /// Compute everything but do not publish
        #[arg(long)]
        dry_run: bool,

        /// Print summary, projects and run report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Also write the summary document to this file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Print exclusion and conflict details to stderr
        #[arg(long)]
        report: bool,

        /// Timestamp stamped as lastUpdated (RFC 3339, default: now)
        #[arg(long, value_name = "RFC3339")]
        as_of: Option<String>,
    },

    /// Parse and validate the config without reading records
    Validate,

    /// List competing customer claims and how each was resolved
    #[command(after_help = "\
Examples:
  tally conflicts
  tally conflicts --input export.csv --json")]
    Conflicts {
        #[arg(long, short = 'i', value_name = "FILE")]
        input: Vec<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Report duplicate line items (same customer, project, category, item)
    #[command(after_help = "\
Examples:
  tally audit
  tally audit --input export.csv --fail-on-duplicates")]
    Audit {
        #[arg(long, short = 'i', value_name = "FILE")]
        input: Vec<PathBuf>,

        #[arg(long)]
        json: bool,

        /// Exit 6 when any duplicate group is found
        #[arg(long)]
        fail_on_duplicates: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("TALLY_GIT_HASH"), ")",
        "\nengine:  tally-rollup ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TALLY_TARGET"),
    )
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run { input, dry_run, json, output, report, as_of } => run::cmd_run(
            config,
            run::RunArgs { inputs: input, dry_run, json, output, report, as_of },
        ),
        Commands::Validate => run::cmd_validate(config),
        Commands::Conflicts { input, json } => run::cmd_conflicts(config, &input, json),
        Commands::Audit { input, json, fail_on_duplicates } => {
            audit::cmd_audit(config, &input, json, fail_on_duplicates)
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

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn source(msg: impl Into<String>) -> Self {
        Self { code: EXIT_SOURCE, message: msg.into(), hint: None }
    }
}
