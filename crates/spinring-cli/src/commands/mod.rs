pub mod resonance;
pub mod template;
pub mod track;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use spinring_lattice::{Lattice, RingLattice};
use spinring_track::{Configuration, CsvDirectoryTracking, PreparedTracking};
use tracing::info;

use crate::output;

/// Inputs shared by the `track` and `resonance` commands.
#[derive(Args, Debug)]
pub struct RunInputs {
    /// YAML run configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// YAML lattice description.
    #[arg(long)]
    pub lattice: PathBuf,
    /// Directory with per-particle `energy/` and `trajectory/` CSV tables.
    #[arg(long)]
    pub external: Option<PathBuf>,
    /// Output directory.
    #[arg(long)]
    pub out: PathBuf,
    /// Worker threads; defaults to the available parallelism.
    #[arg(long)]
    pub threads: Option<usize>,
    /// Draw a progress bar on stderr.
    #[arg(long)]
    pub progress: bool,
    /// Also write the element table and the closed orbit as CSV.
    #[arg(long)]
    pub dump_lattice: bool,
}

pub struct LoadedInputs {
    pub config: Configuration,
    pub lattice: Arc<dyn Lattice>,
    pub external: Option<Arc<PreparedTracking>>,
    pub threads: usize,
}

impl RunInputs {
    pub fn load(&self) -> Result<LoadedInputs, Box<dyn Error>> {
        let config = Configuration::load(&self.config)?;
        println!("{}", config.summary());
        let lattice: Arc<dyn Lattice> = Arc::new(RingLattice::load(&self.lattice)?);
        let external = match &self.external {
            Some(root) => Some(Arc::new(prepare_external(root)?)),
            None => None,
        };
        let threads = self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|threads| threads.get())
                .unwrap_or(1)
        });
        Ok(LoadedInputs {
            config,
            lattice,
            external,
            threads,
        })
    }
}

impl LoadedInputs {
    /// Writes `lattice.csv` and `orbit.csv` below `out` when requested.
    pub fn dump_lattice(&self, inputs: &RunInputs) -> Result<(), Box<dyn Error>> {
        if !inputs.dump_lattice {
            return Ok(());
        }
        output::write_lattice(&inputs.out.join("lattice.csv"), self.lattice.as_ref())?;
        output::write_orbit(&inputs.out.join("orbit.csv"), self.lattice.as_ref())?;
        info!(out = %inputs.out.display(), "lattice tables written");
        Ok(())
    }
}

fn prepare_external(root: &Path) -> Result<PreparedTracking, Box<dyn Error>> {
    Ok(PreparedTracking::new(Box::new(CsvDirectoryTracking::new(root)))?)
}
