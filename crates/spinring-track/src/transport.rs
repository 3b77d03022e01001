//! Thomas-BMT spin rotation across a single field element.

use nalgebra::{Matrix3, Vector3};
use spinring_core::constants::A_GYRO;
use spinring_lattice::{Element, ElementKind};

/// Rotation angles below this threshold are treated as no rotation.
pub const MIN_ROTATION: f64 = 1e-11;

/// Scaled precession triple `a * gamma * B` for an integrated field.
pub fn precession_vector(field: &Vector3<f64>, gamma: f64) -> Vector3<f64> {
    field * (A_GYRO * gamma)
}

/// Adds the pole face contribution `z (tan e1 + tan e2) / R` to the horizontal field.
///
/// Only dipoles are affected.
pub fn edge_focusing(field: &mut Vector3<f64>, element: &Element, z: f64) {
    if element.kind != ElementKind::Dipole {
        return;
    }
    if let Some(radius) = element.bend_radius {
        field.x += z * (element.entry_edge.tan() + element.exit_edge.tan()) / radius;
    }
}

/// Finite rotation matrix for the precession triple `omega` in the (x, s, z) basis.
///
/// The longitudinal component is divided by `gamma` before the axis and
/// angle are formed.
pub fn rotation(omega: &Vector3<f64>, gamma: f64) -> Matrix3<f64> {
    let scaled = Vector3::new(omega.x, omega.y / gamma, omega.z);
    let angle = scaled.norm();
    if !(angle >= MIN_ROTATION) {
        return Matrix3::identity();
    }
    let axis = scaled / angle;
    let (sin, cos) = angle.sin_cos();
    axis * axis.transpose() * (1.0 - cos) + Matrix3::identity() * cos + axis.cross_matrix() * sin
}
