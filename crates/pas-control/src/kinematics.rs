// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Stewart-platform kinematics of a mirror panel.
//!
//! Six actuators join a fixed base triangle to the three pads of the panel
//! payload. Actuators `2k` and `2k + 1` share pad `k`.
//!
//! # Conventions
//!
//! - Base joints lie in the `z = 0` plane at radius [`BASE_RADIUS`], at
//!   0°, 120° and 240°, each shared by two actuators.
//! - Pads lie at radius [`PAYLOAD_RADIUS`] at 60°, 180° and 300° in the
//!   payload frame. The payload `x` axis runs from pad 1 to the pad
//!   barycentre and `z` points from the base towards the panel.
//! - A pose is `(x, y, z, rx, ry, rz)`: the payload origin in the base frame
//!   (mm) followed by rotations expressed as arc length at the payload
//!   radius (mm), applied in X, Z, Y order.
//! - An actuator length is the axis-to-axis distance minus two bracket
//!   heights. Actuator axes sit `jointT + padT + panelT` behind each pad
//!   along the pad normal of the panel type.
//!
//! [`StewartPlatform::inverse`] is closed form. [`StewartPlatform::forward`]
//! solves the inverse with Newton-Raphson using a central-difference
//! Jacobian and LU decomposition.

use nalgebra::{Matrix3, Matrix6, Rotation3, Vector3, Vector6};
use serde::{Deserialize, Serialize};

/// Base triangle radius, mm.
pub const BASE_RADIUS: f64 = 320.0;
/// Payload (pad) radius, mm.
pub const PAYLOAD_RADIUS: f64 = 320.0;
/// Nominal actuator length, mm.
pub const NOMINAL_LENGTH: f64 = 427.919;
/// Bracket height, mm. Two brackets separate actuator length from axis distance.
pub const BRACKET_THICKNESS: f64 = 25.4 * 1.875;
/// Joint thickness between actuator axis and pad, mm.
pub const JOINT_THICKNESS: f64 = 73.254;
/// Pad thickness, mm.
pub const PAD_THICKNESS: f64 = 6.2;
/// Panel thickness, mm.
pub const PANEL_THICKNESS: f64 = 33.4;

const AXIS_OFFSET: f64 = JOINT_THICKNESS + PAD_THICKNESS + PANEL_THICKNESS;

/// Default convergence tolerance on actuator lengths, mm.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;
/// Default iteration cap for the forward solver.
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

const JACOBIAN_STEP: f64 = 1e-6;

// =============================================================================
// PanelType
// =============================================================================

/// Mirror panel type. Selects the pad normals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelType {
    /// Primary mirror, inner ring.
    P1,
    /// Primary mirror, outer ring.
    P2,
    /// Secondary mirror, inner ring.
    S1,
    /// Secondary mirror, outer ring.
    S2,
    /// Optical table test panel with flat pads.
    #[default]
    Opt,
}

impl PanelType {
    /// Returns the pad normals in the payload frame, one row per pad.
    ///
    /// The normals point out of the back surface of the panel.
    pub fn pad_normals(&self) -> [[f64; 3]; 3] {
        match self {
            PanelType::P1 => [
                [5.097668129476970e-03, 1.047654179548714e-02, -9.999321256223591e-01],
                [-1.139023920803046e-02, 0.0, -9.999351291212767e-01],
                [5.097668129476970e-03, -1.047654179548714e-02, -9.999321256223591e-01],
            ],
            PanelType::P2 => [
                [2.282953930408088e-03, 9.607558782302985e-03, -9.999512402790428e-01],
                [-8.576078760768602e-03, 0.0, -9.999632247603353e-01],
                [2.282953930408088e-03, -9.607558782302985e-03, -9.999512402790428e-01],
            ],
            PanelType::S1 => [
                [2.416787326798328e-02, 4.165752266588766e-02, -9.988396091000016e-01],
                [-4.825925442124093e-02, 0.0, -9.988348433863861e-01],
                [2.416787326798328e-02, -4.165752266588766e-02, -9.988396091000016e-01],
            ],
            PanelType::S2 => [
                [2.207153924068211e-02, 4.109652812313958e-02, -9.989113687068392e-01],
                [-4.637346218008032e-02, 0.0, -9.989241723000966e-01],
                [2.207153924068211e-02, -4.109652812313958e-02, -9.989113687068392e-01],
            ],
            PanelType::Opt => [[0.0, 0.0, -1.0], [0.0, 0.0, -1.0], [0.0, 0.0, -1.0]],
        }
    }
}

// =============================================================================
// PlatformSolution
// =============================================================================

/// Result of a forward kinematics solve.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformSolution {
    /// Panel pose `(x, y, z, rx, ry, rz)`.
    pub pose: Vector6<f64>,
    /// Pad coordinates in the base frame, one column per pad.
    pub pads: Matrix3<f64>,
    /// Newton iterations performed.
    pub iterations: usize,
    /// Largest remaining length residual, mm.
    pub residual: f64,
    /// Whether the residual fell below the tolerance.
    pub converged: bool,
}

// =============================================================================
// StewartPlatform
// =============================================================================

/// Geometric model of one panel's actuator platform.
#[derive(Debug, Clone)]
pub struct StewartPlatform {
    panel_type: PanelType,
    base: [Vector3<f64>; 6],
    pads: [Vector3<f64>; 3],
    axes: [Vector3<f64>; 3],
    tolerance: f64,
    max_iterations: usize,
}

impl StewartPlatform {
    /// Creates the platform model for a panel type.
    pub fn new(panel_type: PanelType) -> Self {
        let mut base = [Vector3::zeros(); 6];
        let mut pads = [Vector3::zeros(); 3];
        for i in 0..3 {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / 3.0;
            let joint = Vector3::new(BASE_RADIUS * angle.cos(), BASE_RADIUS * angle.sin(), 0.0);
            // Base joint i is shared by actuators 2i and 2i - 1 (mod 6).
            base[2 * i] = joint;
            base[(2 * i + 5) % 6] = joint;

            let pad_angle = angle + std::f64::consts::PI / 3.0;
            pads[i] = Vector3::new(
                PAYLOAD_RADIUS * pad_angle.cos(),
                PAYLOAD_RADIUS * pad_angle.sin(),
                0.0,
            );
        }

        let normals = panel_type.pad_normals();
        let mut axes = [Vector3::zeros(); 3];
        for k in 0..3 {
            let n = Vector3::from(normals[k]);
            axes[k] = pads[k] + n * AXIS_OFFSET;
        }

        Self {
            panel_type,
            base,
            pads,
            axes,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Sets the solver tolerance and iteration cap.
    pub fn with_solver(mut self, tolerance: f64, max_iterations: usize) -> Self {
        self.tolerance = tolerance;
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Returns the panel type.
    pub fn panel_type(&self) -> PanelType {
        self.panel_type
    }

    fn rotation(pose: &Vector6<f64>) -> Rotation3<f64> {
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), pose[3] / PAYLOAD_RADIUS);
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), pose[4] / PAYLOAD_RADIUS);
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), pose[5] / PAYLOAD_RADIUS);
        ry * rz * rx
    }

    fn translation(pose: &Vector6<f64>) -> Vector3<f64> {
        Vector3::new(pose[0], pose[1], pose[2])
    }

    /// Computes actuator lengths from a panel pose.
    pub fn inverse(&self, pose: &Vector6<f64>) -> Vector6<f64> {
        let rot = Self::rotation(pose);
        let t = Self::translation(pose);
        let mut lengths = Vector6::zeros();
        for i in 0..6 {
            let axis = t + rot * self.axes[i / 2];
            lengths[i] = (axis - self.base[i]).norm() - 2.0 * BRACKET_THICKNESS;
        }
        lengths
    }

    /// Computes pad coordinates in the base frame for a pose.
    pub fn pad_coords(&self, pose: &Vector6<f64>) -> Matrix3<f64> {
        let rot = Self::rotation(pose);
        let t = Self::translation(pose);
        Matrix3::from_columns(&[
            t + rot * self.pads[0],
            t + rot * self.pads[1],
            t + rot * self.pads[2],
        ])
    }

    /// Returns the payload height with all actuators at `length` and no tilt.
    pub fn neutral_height(&self, length: f64) -> f64 {
        // Mean in-plane and vertical offsets of the axis points from the pads.
        let axis = self.axes[0];
        let horizontal = (Vector3::new(axis.x, axis.y, 0.0) - self.base[0]).norm();
        let reach = length + 2.0 * BRACKET_THICKNESS;
        let vertical = (reach * reach - horizontal * horizontal).max(0.0).sqrt();
        vertical - axis.z
    }

    /// Computes the panel pose and pad coordinates from actuator lengths.
    pub fn forward(&self, lengths: &Vector6<f64>) -> PlatformSolution {
        let mean = lengths.mean();
        let mut pose = Vector6::new(0.0, 0.0, self.neutral_height(mean), 0.0, 0.0, 0.0);

        let mut residual = self.inverse(&pose) - lengths;
        let mut iterations = 0;

        while residual.amax() > self.tolerance && iterations < self.max_iterations {
            let jacobian = self.jacobian(&pose);
            let Some(step) = jacobian.lu().solve(&(-residual)) else {
                tracing::warn!(
                    iterations,
                    residual = residual.amax(),
                    "Stewart platform Jacobian is singular"
                );
                break;
            };
            pose += step;
            residual = self.inverse(&pose) - lengths;
            iterations += 1;
        }

        let max_residual = residual.amax();
        let converged = max_residual <= self.tolerance;
        if !converged {
            tracing::warn!(
                iterations,
                residual = max_residual,
                "Forward kinematics did not converge"
            );
        }

        PlatformSolution {
            pads: self.pad_coords(&pose),
            pose,
            iterations,
            residual: max_residual,
            converged,
        }
    }

    fn jacobian(&self, pose: &Vector6<f64>) -> Matrix6<f64> {
        let mut jacobian = Matrix6::zeros();
        for j in 0..6 {
            let mut plus = *pose;
            let mut minus = *pose;
            plus[j] += JACOBIAN_STEP;
            minus[j] -= JACOBIAN_STEP;
            let column = (self.inverse(&plus) - self.inverse(&minus)) / (2.0 * JACOBIAN_STEP);
            jacobian.set_column(j, &column);
        }
        jacobian
    }
}

impl Default for StewartPlatform {
    fn default() -> Self {
        Self::new(PanelType::default())
    }
}

// =============================================================================
// Tests
// =============================================================================
