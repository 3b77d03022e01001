use std::error::Error;
use std::fs;

use clap::Args;
use spinring_track::TrackingRun;
use tracing::{info, warn};

use super::RunInputs;
use crate::output;
use crate::progress::{self, ProgressDisplay};

#[derive(Args, Debug)]
pub struct TrackArgs {
    #[command(flatten)]
    pub inputs: RunInputs,
}

pub fn run(args: &TrackArgs) -> Result<(), Box<dyn Error>> {
    let loaded = args.inputs.load()?;
    fs::create_dir_all(&args.inputs.out)?;
    loaded.dump_lattice(&args.inputs)?;
    let mut display = ProgressDisplay::new(args.inputs.progress);
    let report = TrackingRun::new(loaded.config, loaded.lattice, loaded.external)
        .run_with_progress(loaded.threads, progress::INTERVAL, |report| {
            display.update(report)
        })?;
    for (id, message) in &report.errors {
        warn!(particle = id, error = %message, "particle failed");
    }
    output::write_tracking_report(&args.inputs.out, &report)?;
    info!(
        out = %args.inputs.out.display(),
        successful = report.successful,
        total = report.total,
        "tracking results written"
    );
    println!(
        "{} of {} particles tracked successfully",
        report.successful, report.total
    );
    Ok(())
}
