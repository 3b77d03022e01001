#![deny(missing_docs)]
#![doc = "Lattice provider interface consumed by the spinring tracking engine."]

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use spinring_core::TransversePoint;

/// Machine parameters derived from a lattice (or supplied by configuration).
pub mod machine;
/// Element list ring model described in YAML.
pub mod ring;
/// Synchrotron radiation quantities of single elements.
pub mod synchrotron;

pub use machine::MachineParameters;
pub use ring::{ElementSpec, LatticeDescription, OpticsSpec, OrbitSample, RfSpec, RingLattice};

/// Tolerance used when matching positions to element boundaries, in metres.
pub const POSITION_TOLERANCE: f64 = 1e-9;

/// Coarse element classification used by the spin and energy models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    /// Bending magnet. Radiates and carries the bending angle.
    Dipole,
    /// RF cavity. Restores energy.
    Cavity,
    /// Everything else (quadrupoles, correctors, solenoids, ...).
    Other,
}

/// One field segment of the ring. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Element name as given in the lattice description.
    pub name: String,
    /// Element classification.
    pub kind: ElementKind,
    /// Position of the entrance within the turn, in metres.
    pub start: f64,
    /// Length in metres.
    pub length: f64,
    /// Bending radius in metres (dipoles only).
    pub bend_radius: Option<f64>,
    /// Entrance pole face angle in radians.
    pub entry_edge: f64,
    /// Exit pole face angle in radians.
    pub exit_edge: f64,
    /// Bending angle accumulated from the start of the turn to the entrance.
    pub theta_start: f64,
}

impl Element {
    /// Position of the exit within the turn.
    pub fn end(&self) -> f64 {
        self.start + self.length
    }

    /// Position of the element centre within the turn.
    pub fn center(&self) -> f64 {
        self.start + 0.5 * self.length
    }

    /// Signed bending angle of the element (zero for non-dipoles).
    pub fn bend_angle(&self) -> f64 {
        match self.bend_radius {
            Some(radius) if self.kind == ElementKind::Dipole => self.length / radius,
            _ => 0.0,
        }
    }

    /// Accumulated bending angle at the exit.
    pub fn theta_end(&self) -> f64 {
        self.theta_start + self.bend_angle()
    }
}

/// Position of the next element to be crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementCursor {
    /// Revolution count.
    pub turn: i64,
    /// Index into [`Lattice::elements`].
    pub index: usize,
}

impl ElementCursor {
    /// Moves to the following element, wrapping into the next turn.
    pub fn advance(&mut self, num_elements: usize) {
        self.index += 1;
        if self.index >= num_elements {
            self.index = 0;
            self.turn += 1;
        }
    }
}

/// Read-only lattice model shared by all particle tasks.
///
/// Integrated fields are normalised to the beam rigidity, so a dipole of
/// length `L` and radius `R` has `B_z = L / R`. Components are ordered
/// (x, s, z).
pub trait Lattice: Send + Sync {
    /// Ring circumference in metres.
    fn circumference(&self) -> f64;

    /// Field elements ordered by position. Field-free gaps are not listed.
    fn elements(&self) -> &[Element];

    /// Integrated field of element `index` seen at the given transverse offset.
    fn field(&self, index: usize, at: &TransversePoint) -> Vector3<f64>;

    /// Closed orbit at a position within the turn.
    fn closed_orbit(&self, _pos_in_turn: f64) -> TransversePoint {
        TransversePoint::default()
    }

    /// Machine parameters derivable from the lattice at the given energy.
    /// Unknown quantities are reported as zero.
    fn machine_parameters(&self, _gamma: f64) -> MachineParameters {
        MachineParameters::default()
    }

    /// Number of elements of a kind.
    fn count(&self, kind: ElementKind) -> usize {
        self.elements().iter().filter(|e| e.kind == kind).count()
    }

    /// Revolution count at an absolute position.
    fn turn(&self, pos: f64) -> i64 {
        (pos / self.circumference()).floor() as i64
    }

    /// Absolute position folded into the first turn.
    fn pos_in_turn(&self, pos: f64) -> f64 {
        pos.rem_euclid(self.circumference())
    }

    /// First element whose entrance lies at or after `pos`.
    fn next_element(&self, pos: f64) -> ElementCursor {
        let mut turn = self.turn(pos);
        let in_turn = self.pos_in_turn(pos);
        let elements = self.elements();
        let mut index =
            elements.partition_point(|element| element.start < in_turn - POSITION_TOLERANCE);
        if index >= elements.len() {
            index = 0;
            turn += 1;
        }
        ElementCursor { turn, index }
    }

    /// Absolute entrance position of the element under the cursor.
    fn absolute_start(&self, cursor: &ElementCursor) -> f64 {
        cursor.turn as f64 * self.circumference() + self.elements()[cursor.index].start
    }

    /// Energy radiated per turn by an electron of energy `gamma`, in keV.
    fn energy_loss_per_turn_kev(&self, gamma: f64) -> f64 {
        self.elements()
            .iter()
            .filter_map(|element| element.energy_loss_kev(gamma))
            .sum()
    }
}
