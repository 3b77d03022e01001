use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use spinring_lattice::LatticeDescription;
use spinring_track::Configuration;
use tracing::info;

#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Destination of the default configuration.
    #[arg(long)]
    pub out: PathBuf,
    /// Also write a sample FODO ring lattice to this file.
    #[arg(long)]
    pub lattice: Option<PathBuf>,
    /// Number of cells of the sample lattice.
    #[arg(long, default_value_t = 16)]
    pub cells: usize,
}

pub fn run(args: &TemplateArgs) -> Result<(), Box<dyn Error>> {
    Configuration::default().save(&args.out)?;
    info!(path = %args.out.display(), "default configuration written");
    if let Some(path) = &args.lattice {
        let yaml = serde_yaml::to_string(&LatticeDescription::sample_ring(args.cells))?;
        fs::write(path, yaml)?;
        info!(path = %path.display(), cells = args.cells, "sample lattice written");
    }
    Ok(())
}
