use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pagediff::imaging::{CompareOptions, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_FILE_SIZE};
use pagediff::worker::worker_main;

/// Isolated comparison worker for the pagediff engine.
///
/// Invoked by the orchestrator as `pagediff --worker <original> <upgraded>`;
/// prints one line of JSON to stdout on success and diagnostics to stderr
/// on failure.
#[derive(Parser, Debug)]
#[command(name = "pagediff", version, about)]
struct Cli {
    /// Run as the isolated comparison worker
    #[arg(long)]
    worker: bool,

    /// Path to the original screenshot PNG
    original: PathBuf,

    /// Path to the upgraded screenshot PNG
    upgraded: PathBuf,

    /// Perceptual color-distance threshold in [0, 1]
    #[arg(long, default_value_t = 0.1)]
    threshold: f64,

    /// Rows per processing strip
    #[arg(long, default_value_t = 25)]
    chunk_rows: u32,

    /// Do not count anti-aliasing artifacts as mismatches
    #[arg(long)]
    aa_tolerance: bool,

    /// Downscale inputs larger than this in either axis
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION)]
    max_dimension: u32,

    /// Refuse input files larger than this many bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    max_file_size: u64,
}

fn main() -> ExitCode {
    // Logging goes to stderr; stdout carries only the JSON result line
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if !cli.worker {
        eprintln!("pagediff: run with --worker <original.png> <upgraded.png>");
        return ExitCode::from(2);
    }

    let opts = CompareOptions {
        threshold: cli.threshold,
        chunk_rows: cli.chunk_rows,
        aa_tolerance: cli.aa_tolerance,
        max_dimension: cli.max_dimension,
        max_file_size: cli.max_file_size,
        ..Default::default()
    };

    match worker_main(&cli.original, &cli.upgraded, &opts) {
        Ok(result) => match serde_json::to_string(&result) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to serialize result: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Comparison failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
