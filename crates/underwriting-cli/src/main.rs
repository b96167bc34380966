mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::analysis::{AnalyzeArgs, FingerprintArgs, SensitivityArgs};
use commands::debt::AmortizeArgs;
use commands::returns::{IrrArgs, WaterfallArgs};

/// Multifamily deal underwriting
#[derive(Parser)]
#[command(
    name = "uw",
    version,
    about = "Multifamily deal underwriting",
    long_about = "Underwrite an apartment acquisition from a JSON or YAML scenario: \
                  rent-roll revenue, expense and NOI projections, a blended debt stack, \
                  sale reversion, levered and unlevered returns, the LP/GP waterfall, \
                  and an exit cap x rent growth sensitivity grid."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log pipeline stages to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full underwriting analysis on a scenario
    Analyze(AnalyzeArgs),
    /// Exit cap x rent growth grid of 5-year levered IRR
    Sensitivity(SensitivityArgs),
    /// Distribute a cash flow vector through the LP/GP waterfall
    Waterfall(WaterfallArgs),
    /// Level-payment amortization schedule
    Amortize(AmortizeArgs),
    /// IRR, NPV and equity multiple for a cash flow vector
    Irr(IrrArgs),
    /// Print the SHA-256 fingerprint of a scenario
    Fingerprint(FingerprintArgs),
    /// Print a complete example scenario
    Template,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Analyze(args) => commands::analysis::run_analyze(args),
        Commands::Sensitivity(args) => commands::analysis::run_grid(args),
        Commands::Waterfall(args) => commands::returns::run_waterfall(args),
        Commands::Amortize(args) => commands::debt::run_amortize(args),
        Commands::Irr(args) => commands::returns::run_irr(args),
        Commands::Fingerprint(args) => commands::analysis::run_fingerprint(args),
        Commands::Template => commands::analysis::run_template(),
        Commands::Version => {
            println!("uw {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
