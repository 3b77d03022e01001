use std::error::Error;
use std::fs;

use clap::Args;
use spinring_track::ResonanceRun;
use tracing::info;

use super::RunInputs;
use crate::output::{self, Summary};
use crate::progress::{self, ProgressDisplay};

#[derive(Args, Debug)]
pub struct ResonanceArgs {
    #[command(flatten)]
    pub inputs: RunInputs,
    /// Evaluate this spin tune only instead of the configured scan.
    #[arg(long)]
    pub agamma: Option<f64>,
}

pub fn run(args: &ResonanceArgs) -> Result<(), Box<dyn Error>> {
    let mut loaded = args.inputs.load()?;
    if let Some(agamma) = args.agamma {
        loaded.config.select_spin_tune(agamma);
    }
    let out = &args.inputs.out;
    fs::create_dir_all(out)?;
    loaded.dump_lattice(&args.inputs)?;
    let label = loaded.config.seed_policy.label.clone();
    let run = ResonanceRun::new(
        loaded.config.clone(),
        loaded.lattice.clone(),
        loaded.external.clone(),
    );
    let mut display = ProgressDisplay::new(args.inputs.progress);
    let mut estimator = run.run_with_progress(loaded.threads, progress::INTERVAL, |report| {
        display.update(report)
    })?;
    let strengths = estimator.scan()?;
    if let (Some(_), [(agamma, strength)]) = (args.agamma, strengths.as_slice()) {
        println!(
            "agamma {agamma}: strength {:.6e} (re {:.6e}, im {:.6e})",
            strength.norm(),
            strength.re,
            strength.im
        );
    }
    output::write_strengths(
        &out.join("resonance-strengths.csv"),
        strengths
            .iter()
            .map(|(agamma, strength)| (*agamma, strength.re, strength.im)),
    )?;
    let summary = Summary {
        command: "resonance",
        total: estimator.total(),
        successful: estimator.num_successful(),
        errors: estimator.errors().clone(),
        samples: Some(strengths.len()),
        max_norm_drift: None,
        turns: Some(estimator.turns()),
        label,
    };
    output::write_json(&out.join("summary.json"), &summary)?;
    loaded.config.save(&out.join("currentconfig.yaml"))?;
    info!(
        out = %out.display(),
        spin_tunes = strengths.len(),
        "resonance strengths written"
    );
    println!(
        "{} spin tunes from {} of {} particles",
        strengths.len(),
        estimator.num_successful(),
        estimator.total()
    );
    Ok(())
}
