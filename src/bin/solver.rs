//! Command-line entry point: `solver <path-to-json> [--pretty]`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use itinera::format::{ItineraryOutput, ProblemInput};
use itinera::model::validate;
use itinera::{solve, SolveConfig};

#[derive(Parser)]
#[command(
    name = "solver",
    about = "Builds per-worker itineraries for a multi-job routing problem"
)]
struct Cli {
    /// Path to the JSON problem document.
    input: PathBuf,

    /// Pretty-print the result document.
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(document) => {
            println!("{document}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String, String> {
    let raw = std::fs::read_to_string(&cli.input)
        .map_err(|e| format!("cannot read {}: {e}", cli.input.display()))?;
    let input: ProblemInput = serde_json::from_str(&raw)
        .map_err(|e| format!("cannot parse {}: {e}", cli.input.display()))?;

    let model = validate(&input).map_err(|e| e.to_string())?;
    let itinerary = solve(&model, &SolveConfig::default()).map_err(|e| e.to_string())?;

    ItineraryOutput::new(&model, &itinerary)
        .to_json(cli.pretty)
        .map_err(|e| e.to_string())
}
