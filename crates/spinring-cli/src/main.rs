use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    resonance::{self, ResonanceArgs},
    template::{self, TemplateArgs},
    track::{self, TrackArgs},
};

mod commands;
mod logging;
mod output;
mod progress;

#[derive(Parser, Debug)]
#[command(name = "spinring", about = "Electron spin tracking in storage rings")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track the spins of all particles and write the polarization.
    Track(TrackArgs),
    /// Estimate resonance strengths over the configured spin tune grid.
    Resonance(ResonanceArgs),
    /// Write a default configuration (and optionally a sample lattice).
    Template(TemplateArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose)?;
    match cli.command {
        Command::Track(args) => track::run(&args),
        Command::Resonance(args) => resonance::run(&args),
        Command::Template(args) => template::run(&args),
    }
}
