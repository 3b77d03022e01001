use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use spinring_core::constants::SPEED_OF_LIGHT;
use spinring_core::errors::{ErrorInfo, SpinError};
use spinring_core::{Boundary, PositionTable, TransversePoint};
use tracing::debug;

use crate::machine::MachineParameters;
use crate::{Element, ElementKind, Lattice};

/// One entry of a lattice description. Lengths are in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ElementSpec {
    /// Field-free gap.
    Drift {
        /// Length.
        length: f64,
    },
    /// Sector bend with optional pole face rotation.
    Dipole {
        /// Element name.
        #[serde(default)]
        name: String,
        /// Arc length.
        length: f64,
        /// Signed bending radius.
        radius: f64,
        /// Entrance pole face angle in radians.
        #[serde(default)]
        entry_edge: f64,
        /// Exit pole face angle in radians.
        #[serde(default)]
        exit_edge: f64,
    },
    /// Normal quadrupole with normalised gradient `strength` in 1/m².
    Quadrupole {
        /// Element name.
        #[serde(default)]
        name: String,
        /// Length.
        length: f64,
        /// Normalised gradient.
        strength: f64,
    },
    /// Thin steerer with integrated normalised kicks.
    Corrector {
        /// Element name.
        #[serde(default)]
        name: String,
        /// Length.
        #[serde(default)]
        length: f64,
        /// Integrated horizontal field.
        #[serde(default)]
        bx: f64,
        /// Integrated vertical field.
        #[serde(default)]
        bz: f64,
    },
    /// Longitudinal field with integrated normalised strength `field`.
    Solenoid {
        /// Element name.
        #[serde(default)]
        name: String,
        /// Length.
        length: f64,
        /// Integrated longitudinal field.
        field: f64,
    },
    /// RF cavity. Field free for the spin.
    Cavity {
        /// Element name.
        #[serde(default)]
        name: String,
        /// Length.
        #[serde(default)]
        length: f64,
    },
}

impl ElementSpec {
    /// Length of the entry in metres.
    pub fn length(&self) -> f64 {
        match self {
            ElementSpec::Drift { length }
            | ElementSpec::Dipole { length, .. }
            | ElementSpec::Quadrupole { length, .. }
            | ElementSpec::Corrector { length, .. }
            | ElementSpec::Solenoid { length, .. }
            | ElementSpec::Cavity { length, .. } => *length,
        }
    }
}

/// RF system parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfSpec {
    /// RF frequency in Hz.
    pub frequency_hz: f64,
    /// Total peak voltage in kV (energy gain in keV).
    pub voltage_kev: f64,
}

/// Optics quantities a plain element list cannot provide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpticsSpec {
    /// First order momentum compaction.
    #[serde(default)]
    pub momentum_compaction: f64,
    /// Second order momentum compaction.
    #[serde(default)]
    pub momentum_compaction_2: f64,
    /// Longitudinal damping partition; zero selects the isomagnetic value.
    #[serde(default)]
    pub damping_partition: f64,
}

/// Closed orbit sample at a position within the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitSample {
    /// Position within the turn.
    pub pos: f64,
    /// Horizontal offset.
    #[serde(default)]
    pub x: f64,
    /// Vertical offset.
    #[serde(default)]
    pub z: f64,
}

/// Serialized form of a [`RingLattice`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeDescription {
    /// Elements in beam order, starting at position zero.
    pub elements: Vec<ElementSpec>,
    /// RF system, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rf: Option<RfSpec>,
    /// Optics quantities.
    #[serde(default)]
    pub optics: OpticsSpec,
    /// Closed orbit samples; an empty list means the design orbit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub closed_orbit: Vec<OrbitSample>,
}

impl LatticeDescription {
    /// Parses a YAML lattice description.
    pub fn from_yaml_str(contents: &str) -> Result<Self, SpinError> {
        serde_yaml::from_str(contents)
            .map_err(|err| SpinError::Serde(ErrorInfo::new("lattice-parse", err.to_string())))
    }

    /// Reads a YAML lattice description from disk.
    pub fn load(path: &Path) -> Result<Self, SpinError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            SpinError::Io(
                ErrorInfo::new("lattice-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        Self::from_yaml_str(&contents).map_err(|err| match err {
            SpinError::Serde(info) => SpinError::Serde(info.with_context("path", path.display())),
            other => other,
        })
    }

    /// Small isomagnetic ring of `cells` identical FODO cells closing to 2π.
    pub fn sample_ring(cells: usize) -> Self {
        let cells = cells.max(1);
        let dipole_length = 1.0;
        let radius = cells as f64 * dipole_length / std::f64::consts::TAU;
        let mut elements = Vec::with_capacity(cells * 6 + 1);
        for cell in 0..cells {
            elements.push(ElementSpec::Quadrupole {
                name: format!("QF{cell}"),
                length: 0.2,
                strength: 1.2,
            });
            elements.push(ElementSpec::Drift { length: 0.4 });
            elements.push(ElementSpec::Dipole {
                name: format!("B{cell}"),
                length: dipole_length,
                radius,
                entry_edge: 0.0,
                exit_edge: 0.0,
            });
            elements.push(ElementSpec::Drift { length: 0.4 });
            elements.push(ElementSpec::Quadrupole {
                name: format!("QD{cell}"),
                length: 0.2,
                strength: -1.2,
            });
            elements.push(ElementSpec::Drift { length: 0.4 });
        }
        elements.push(ElementSpec::Cavity {
            name: "RF".into(),
            length: 0.0,
        });
        let circumference: f64 = elements.iter().map(ElementSpec::length).sum();
        Self {
            elements,
            rf: Some(RfSpec {
                frequency_hz: 100.0 * SPEED_OF_LIGHT / circumference,
                voltage_kev: 400.0,
            }),
            optics: OpticsSpec {
                momentum_compaction: 0.05,
                momentum_compaction_2: 0.0,
                damping_partition: 0.0,
            },
            closed_orbit: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldModel {
    Uniform(Vector3<f64>),
    Gradient(f64),
}

/// Lattice built from an ordered list of element descriptions.
#[derive(Debug, Clone)]
pub struct RingLattice {
    circumference: f64,
    elements: Vec<Element>,
    fields: Vec<FieldModel>,
    rf: Option<RfSpec>,
    optics: OpticsSpec,
    orbit: Option<(PositionTable, PositionTable)>,
}

fn invalid(code: &str, message: &str, position: usize) -> SpinError {
    SpinError::Config(ErrorInfo::new(code, message).with_context("element", position))
}

impl RingLattice {
    /// Validates a description and lays out the element positions.
    pub fn new(description: LatticeDescription) -> Result<Self, SpinError> {
        let mut elements = Vec::new();
        let mut fields = Vec::new();
        let mut pos = 0.0;
        let mut theta = 0.0;
        for (index, spec) in description.elements.iter().enumerate() {
            let length = spec.length();
            if !length.is_finite() || length < 0.0 {
                return Err(invalid(
                    "lattice-length",
                    "element lengths must be finite and non-negative",
                    index,
                ));
            }
            let (name, kind, bend_radius, edges, field) = match spec {
                ElementSpec::Drift { .. } => {
                    pos += length;
                    continue;
                }
                ElementSpec::Dipole {
                    name,
                    radius,
                    entry_edge,
                    exit_edge,
                    ..
                } => {
                    if !radius.is_finite() || *radius == 0.0 {
                        return Err(invalid(
                            "lattice-radius",
                            "dipole radius must be finite and non-zero",
                            index,
                        ));
                    }
                    (
                        name,
                        ElementKind::Dipole,
                        Some(*radius),
                        (*entry_edge, *exit_edge),
                        FieldModel::Uniform(Vector3::new(0.0, 0.0, length / radius)),
                    )
                }
                ElementSpec::Quadrupole { name, strength, .. } => (
                    name,
                    ElementKind::Other,
                    None,
                    (0.0, 0.0),
                    FieldModel::Gradient(strength * length),
                ),
                ElementSpec::Corrector { name, bx, bz, .. } => (
                    name,
                    ElementKind::Other,
                    None,
                    (0.0, 0.0),
                    FieldModel::Uniform(Vector3::new(*bx, 0.0, *bz)),
                ),
                ElementSpec::Solenoid { name, field, .. } => (
                    name,
                    ElementKind::Other,
                    None,
                    (0.0, 0.0),
                    FieldModel::Uniform(Vector3::new(0.0, *field, 0.0)),
                ),
                ElementSpec::Cavity { name, .. } => (
                    name,
                    ElementKind::Cavity,
                    None,
                    (0.0, 0.0),
                    FieldModel::Uniform(Vector3::zeros()),
                ),
            };
            let element = Element {
                name: if name.is_empty() {
                    format!("E{index}")
                } else {
                    name.clone()
                },
                kind,
                start: pos,
                length,
                bend_radius,
                entry_edge: edges.0,
                exit_edge: edges.1,
                theta_start: theta,
            };
            theta = element.theta_end();
            pos += length;
            elements.push(element);
            fields.push(field);
        }
        let circumference = pos;
        if elements.is_empty() || circumference <= 0.0 {
            return Err(SpinError::config(
                "lattice-empty",
                "lattice needs at least one field element and a positive circumference",
            ));
        }
        if let Some(rf) = &description.rf {
            if !(rf.frequency_hz > 0.0) || !rf.voltage_kev.is_finite() {
                return Err(SpinError::config(
                    "lattice-rf",
                    "rf frequency must be positive and the voltage finite",
                ));
            }
        }
        let orbit = if description.closed_orbit.is_empty() {
            None
        } else {
            let periodic = Boundary::Periodic {
                period: circumference,
            };
            let xs = description
                .closed_orbit
                .iter()
                .map(|sample| (sample.pos, sample.x))
                .collect();
            let zs = description
                .closed_orbit
                .iter()
                .map(|sample| (sample.pos, sample.z))
                .collect();
            Some((
                PositionTable::new(xs, periodic)?,
                PositionTable::new(zs, periodic)?,
            ))
        };
        debug!(
            elements = elements.len(),
            circumference,
            total_bend = theta,
            "ring lattice laid out"
        );
        Ok(Self {
            circumference,
            elements,
            fields,
            rf: description.rf,
            optics: description.optics,
            orbit,
        })
    }

    /// Parses and validates a YAML description.
    pub fn from_yaml_str(contents: &str) -> Result<Self, SpinError> {
        Self::new(LatticeDescription::from_yaml_str(contents)?)
    }

    /// Loads and validates a YAML description from disk.
    pub fn load(path: &Path) -> Result<Self, SpinError> {
        Self::new(LatticeDescription::load(path)?)
    }

    /// Sum of the signed bending angles of all dipoles.
    pub fn total_bend(&self) -> f64 {
        self.elements.iter().map(Element::bend_angle).sum()
    }

    /// Isomagnetic bending radius, zero without dipoles.
    pub fn mean_bending_radius(&self) -> f64 {
        let (length, angle) = self
            .elements
            .iter()
            .filter(|element| element.kind == ElementKind::Dipole)
            .fold((0.0, 0.0), |(length, angle), element| {
                (length + element.length, angle + element.bend_angle().abs())
            });
        if angle > 0.0 {
            length / angle
        } else {
            0.0
        }
    }
}

impl Lattice for RingLattice {
    fn circumference(&self) -> f64 {
        self.circumference
    }

    fn elements(&self) -> &[Element] {
        &self.elements
    }

    fn field(&self, index: usize, at: &TransversePoint) -> Vector3<f64> {
        match self.fields.get(index) {
            Some(FieldModel::Uniform(field)) => *field,
            Some(FieldModel::Gradient(integrated)) => {
                Vector3::new(integrated * at.z, 0.0, integrated * at.x)
            }
            None => Vector3::zeros(),
        }
    }

    fn closed_orbit(&self, pos_in_turn: f64) -> TransversePoint {
        match &self.orbit {
            Some((x, z)) => TransversePoint::new(x.interp(pos_in_turn), z.interp(pos_in_turn)),
            None => TransversePoint::default(),
        }
    }

    fn machine_parameters(&self, gamma: f64) -> MachineParameters {
        let has_dipoles = self.count(ElementKind::Dipole) > 0;
        let loss = self.energy_loss_per_turn_kev(gamma);
        let (overvoltage, harmonic_number) = match &self.rf {
            Some(rf) => (
                if loss > 0.0 { rf.voltage_kev / loss } else { 0.0 },
                (rf.frequency_hz * self.circumference / SPEED_OF_LIGHT).round(),
            ),
            None => (0.0, 0.0),
        };
        let damping_partition = if self.optics.damping_partition != 0.0 {
            self.optics.damping_partition
        } else if has_dipoles {
            2.0
        } else {
            0.0
        };
        MachineParameters {
            overvoltage,
            momentum_compaction: self.optics.momentum_compaction,
            momentum_compaction_2: self.optics.momentum_compaction_2,
            harmonic_number,
            bending_radius: self.mean_bending_radius(),
            damping_partition,
        }
    }
}
