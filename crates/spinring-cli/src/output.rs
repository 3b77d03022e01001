//! CSV and JSON sinks for run results.

use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Serialize;
use spinring_core::{PhaseSpaceSeries, SpinMotion};
use spinring_lattice::{ElementKind, Lattice};
use spinring_track::{ErrorLedger, TrackingReport};

#[derive(Serialize)]
struct SpinRow {
    t: f64,
    sx: f64,
    ss: f64,
    sz: f64,
}

#[derive(Serialize)]
struct PhaseSpaceRow {
    t: f64,
    gamma: f64,
    delta: f64,
    phase: Option<f64>,
}

#[derive(Serialize)]
struct StrengthRow {
    agamma: f64,
    re: f64,
    im: f64,
    abs: f64,
}

#[derive(Serialize)]
struct ElementRow<'a> {
    name: &'a str,
    kind: ElementKind,
    start: f64,
    length: f64,
    bend_radius: Option<f64>,
    theta_start: f64,
}

#[derive(Serialize)]
struct OrbitRow {
    pos: f64,
    x: f64,
    z: f64,
}

/// Run summary written as `summary.json`.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub command: &'static str,
    pub total: usize,
    pub successful: usize,
    pub errors: ErrorLedger,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_norm_drift: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Summary {
    pub fn tracking(report: &TrackingReport) -> Self {
        Self {
            command: "track",
            total: report.total,
            successful: report.successful,
            errors: report.errors.clone(),
            samples: Some(report.polarization.len()),
            max_norm_drift: Some(report.max_norm_drift),
            turns: None,
            label: report.config.seed_policy.label.clone(),
        }
    }
}

pub fn write_spin_motion(path: &Path, motion: &SpinMotion) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for (t, spin) in motion.iter() {
        writer.serialize(SpinRow {
            t,
            sx: spin.x,
            ss: spin.y,
            sz: spin.z,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_phase_space(path: &Path, series: &PhaseSpaceSeries) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for point in series {
        writer.serialize(PhaseSpaceRow {
            t: point.time,
            gamma: point.gamma,
            delta: point.delta,
            phase: point.phase,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_strengths<I>(path: &Path, strengths: I) -> Result<(), Box<dyn Error>>
where
    I: IntoIterator<Item = (f64, f64, f64)>,
{
    let mut writer = csv::Writer::from_path(path)?;
    for (agamma, re, im) in strengths {
        writer.serialize(StrengthRow {
            agamma,
            re,
            im,
            abs: re.hypot(im),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_lattice(path: &Path, lattice: &dyn Lattice) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for element in lattice.elements() {
        writer.serialize(ElementRow {
            name: &element.name,
            kind: element.kind,
            start: element.start,
            length: element.length,
            bend_radius: element.bend_radius,
            theta_start: element.theta_start,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Closed orbit sampled at every element centre.
pub fn write_orbit(path: &Path, lattice: &dyn Lattice) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for element in lattice.elements() {
        let pos = element.center();
        let orbit = lattice.closed_orbit(pos);
        writer.serialize(OrbitRow {
            pos,
            x: orbit.x,
            z: orbit.z,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Writes every artefact of a tracking run below `out`.
pub fn write_tracking_report(out: &Path, report: &TrackingReport) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(out.join("spins"))?;
    write_spin_motion(&out.join("polarization.csv"), &report.polarization)?;
    for (id, motion) in &report.motions {
        write_spin_motion(&out.join("spins").join(format!("{id:04}.csv")), motion)?;
    }
    if !report.phase_space.is_empty() {
        fs::create_dir_all(out.join("phasespace"))?;
        for (id, series) in &report.phase_space {
            write_phase_space(&out.join("phasespace").join(format!("{id:04}.csv")), series)?;
        }
    }
    write_json(&out.join("summary.json"), &Summary::tracking(report))?;
    report.config.save(&out.join("currentconfig.yaml"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinring_core::SpinVector;

    #[test]
    fn spin_rows_have_a_header_and_one_line_per_sample() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("spins.csv");
        let mut motion = SpinMotion::new();
        motion.insert(0.0, SpinVector::new(0.0, 0.0, 1.0));
        motion.insert(0.25, SpinVector::new(0.0, 0.5, 0.5));
        write_spin_motion(&path, &motion).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "t,sx,ss,sz");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "0.25,0.0,0.5,0.5");
    }

    #[test]
    fn strength_rows_carry_the_modulus() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("strengths.csv");
        write_strengths(&path, [(0.5, 3.0, 4.0)]).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        assert_eq!(text.lines().nth(1), Some("0.5,3.0,4.0,5.0"));
    }

    #[test]
    fn lattice_table_lists_every_element() {
        let lattice = spinring_lattice::RingLattice::new(
            spinring_lattice::LatticeDescription::sample_ring(4),
        )
        .expect("lattice");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lattice.csv");
        write_lattice(&path, &lattice).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("name,kind,start,length,bend_radius,theta_start")
        );
        assert_eq!(lines.count(), lattice.elements().len());
        assert!(text.contains(",dipole,"));
    }
}
