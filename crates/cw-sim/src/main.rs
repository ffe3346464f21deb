use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    analyse::{self, AnalyseArgs},
    ledger::{self, LedgerArgs},
    simulate::{self, SimulateArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "cw-sim", about = "Circular weighing analysis and simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-analyse a stored run and replace its analysis record.
    Analyse(AnalyseArgs),
    /// Print the good-run ledger reconstructed from a document.
    Ledger(LedgerArgs),
    /// Weigh a scheme entry against a simulated balance and logger.
    Simulate(SimulateArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyse(args) => analyse::run(&args),
        Command::Ledger(args) => ledger::run(&args),
        Command::Simulate(args) => simulate::run(&args),
    }
}
