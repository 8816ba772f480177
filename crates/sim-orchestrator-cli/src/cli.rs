use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sim-orchestrator", version, about = "Prediction-market Monte Carlo simulation orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the full pipeline (research -> generate -> calibrate -> Monte Carlo) over a batch of markets.
    Run {
        /// Path to a JSON array of MarketDescriptor, or "-" to read from stdin.
        #[arg(long)]
        markets: String,
        /// Batch label used in the results directory name. Defaults to "batch".
        #[arg(long, default_value = "batch")]
        label: String,
        /// Directory under which the results directory is created.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Re-run the Monte Carlo driver against a previously-saved artifact, without regenerating code.
    Replay {
        /// Market slug, used only for labeling the output.
        #[arg(long)]
        market: String,
        /// Path to a saved model.py artifact.
        #[arg(long)]
        artifact: PathBuf,
        /// Fixed threshold to use instead of a freshly calibrated one.
        #[arg(long)]
        threshold: f64,
        /// Number of Monte Carlo trials to run.
        #[arg(long, default_value_t = 200)]
        runs: usize,
    },
}
