// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built test data for consistent and reproducible testing.

use nalgebra::Vector6;

use pas_control::collision::SENSOR_CENTER;
use pas_control::kinematics::NOMINAL_LENGTH;
use pas_control::ResponseBlock;
use pas_core::Value;

// =============================================================================
// Identities and Offsets
// =============================================================================

/// Position of the panel under test.
pub const PANEL_POSITION: u32 = 1001;

/// Position of its neighbour across the shared edge.
pub const NEIGHBOUR_POSITION: u32 = 1002;

/// Serial of the panel under test.
pub const PANEL_SERIAL: u32 = 1;

/// Name of the shared edge.
pub const EDGE_NAME: &str = "1001+1002";

/// Panel field offset of the pose x component.
pub const PANEL_FIELD_X: u32 = 0;

/// Panel field offset of the pose z component.
pub const PANEL_FIELD_Z: u32 = 2;

/// Panel field offset of the safety radius.
pub const PANEL_FIELD_SAFETY_RADIUS: u32 = 8;

/// Panel operation offset of `MoveDeltaLengths`.
pub const PANEL_OP_MOVE_DELTA_LENGTHS: u32 = 0;

/// Panel operation offset of `MoveToLengths`.
pub const PANEL_OP_MOVE_TO_LENGTHS: u32 = 1;

/// Panel operation offset of `MoveToCoords`.
pub const PANEL_OP_MOVE_TO_COORDS: u32 = 2;

/// Panel operation offset of `ReadAll`.
pub const PANEL_OP_READ_ALL: u32 = 4;

/// Panel operation offset of `Stop`.
pub const PANEL_OP_STOP: u32 = 5;

// =============================================================================
// Geometry
// =============================================================================

/// Six actuators at the nominal length.
pub fn nominal_lengths() -> Vector6<f64> {
    Vector6::repeat(NOMINAL_LENGTH)
}

/// The same delta on every actuator, as operation arguments.
pub fn deltas(delta: f64) -> Vec<Value> {
    vec![Value::Float64(delta); 6]
}

/// A vector as operation arguments.
pub fn vector_args(v: &Vector6<f64>) -> Vec<Value> {
    v.iter().copied().map(Value::Float64).collect()
}

/// A response block moving x with actuator 1 and y with actuator 2.
pub fn diagonal_block(gain: f64) -> ResponseBlock {
    let mut block = ResponseBlock::zeros();
    block[(0, 0)] = gain;
    block[(1, 1)] = gain;
    block
}

/// A response block moving x and y with every actuator.
pub fn uniform_block(gain: f64) -> ResponseBlock {
    ResponseBlock::repeat(gain)
}

// =============================================================================
// Sensor Spots
// =============================================================================

/// Spot positions of the sensors on an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Readings {
    /// `(x, y)` centroid per sensor.
    pub spots: Vec<(f64, f64)>,
}

impl Readings {
    /// `count` sensors with their spot at the camera centre.
    pub fn centred(count: usize) -> Self {
        Self {
            spots: vec![SENSOR_CENTER; count],
        }
    }

    /// Adds a sensor with its spot at `(x, y)`.
    pub fn with_spot(mut self, x: f64, y: f64) -> Self {
        self.spots.push((x, y));
        self
    }
}

// =============================================================================
// Configuration Files
// =============================================================================

/// Configuration documents for the file-driven tests.
pub struct ConfigFixtures;

impl ConfigFixtures {
    fn actuators(base: u32) -> String {
        (1..=6)
            .map(|p| format!("      - {{ position: {}, serial: {} }}\n", p, base + p))
            .collect()
    }

    /// Two panels sharing one edge with one sensor. The response of each
    /// panel is `gain` on two of its actuators.
    pub fn two_panel_yaml(gain: f64, safety_radius: f64) -> String {
        format!(
            "panel_defaults:\n  safety_radius: {radius}\n\
             panels:\n  - position: 1001\n    serial: 1\n    actuators:\n{a1}\
             \x20 - position: 1002\n    serial: 2\n    actuators:\n{a2}\
             mpes:\n  - serial: 500\n    sides: {{ 1001: l, 1002: w }}\n    response:\n\
             \x20     l: [[{g}, 0, 0, 0, 0, 0], [0, {g}, 0, 0, 0, 0]]\n\
             \x20     w: [[0, 0, {g}, 0, 0, 0], [0, 0, 0, {g}, 0, 0]]\n\
             edges:\n  - {{ name: \"1001+1002\", panels: [1001, 1002], mpes: [500] }}\n",
            radius = safety_radius,
            g = gain,
            a1 = Self::actuators(10),
            a2 = Self::actuators(20),
        )
    }

    /// One panel without sensors, in TOML.
    pub fn single_panel_toml() -> &'static str {
        r#"
[port]
namespace = 3

[panel_defaults]
update_interval_ms = 1000
motion_policy = "reject"

[[panels]]
position = 1001
serial = 7
actuators = [
    { position = 1, serial = 71 },
    { position = 2, serial = 72 },
    { position = 3, serial = 73 },
    { position = 4, serial = 74 },
    { position = 5, serial = 75 },
    { position = 6, serial = 76 },
]

[logging]
level = "debug"
format = "json"
"#
    }

    /// One panel without actuators, in JSON.
    pub fn bare_panel_json() -> &'static str {
        r#"{
  "panels": [{ "position": 1001, "serial": 7 }],
  "logging": { "level": "warn", "format": "compact" }
}"#
    }
}
