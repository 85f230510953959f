// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Collision prediction from edge sensor response matrices.
//!
//! Each edge shared by a panel maps a change in that panel's actuator
//! lengths to a change in its sensors' spot positions through a linear
//! response matrix. For a proposed length delta the predictor computes
//!
//! ```text
//! S_new = M * delta + S_current
//! ```
//!
//! and measures each sensor's distance from the camera centre. A motion is
//! vetoed if any sensor of any edge would land farther than the safety
//! radius. Every sensor is evaluated and reported; the check never stops at
//! the first violation.
//!
//! The model is linear and only valid for small deltas.

use nalgebra::{DMatrix, DVector, Vector2, Vector6};

use pas_core::error::{CollisionViolation, ControllerError, ControllerResult};
use pas_core::types::Identity;

/// Camera centre in sensor pixel coordinates.
pub const SENSOR_CENTER: (f64, f64) = (160.0, 120.0);

// =============================================================================
// EdgeResponse
// =============================================================================

/// Snapshot of one edge as seen from one panel.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeResponse {
    /// The edge.
    pub edge: Identity,
    /// Response matrix, `2n x 6` for `n` sensors.
    pub response: DMatrix<f64>,
    /// Current readings `(x0, y0, x1, y1, ...)`.
    pub readings: DVector<f64>,
}

impl EdgeResponse {
    /// Returns the number of sensors.
    pub fn sensor_count(&self) -> usize {
        self.readings.len() / 2
    }

    /// Returns `true` if the edge has no usable readings.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

// =============================================================================
// SensorDeviation / CollisionReport
// =============================================================================

/// Predicted deviation of one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDeviation {
    /// The edge.
    pub edge: Identity,
    /// Sensor index within the edge.
    pub sensor: usize,
    /// Predicted spot position.
    pub predicted: Vector2<f64>,
    /// Distance from the camera centre.
    pub deviation: f64,
    /// Safety radius in force.
    pub limit: f64,
}

impl SensorDeviation {
    /// Returns `true` if the sensor leaves the safety zone.
    #[inline]
    pub fn violates(&self) -> bool {
        self.deviation > self.limit
    }
}

/// Outcome of a collision prediction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    /// Every evaluated sensor.
    pub deviations: Vec<SensorDeviation>,
    /// Edges skipped for lack of readings.
    pub skipped: Vec<Identity>,
}

impl CollisionReport {
    /// Returns `true` if any sensor violates its safety radius.
    pub fn collision(&self) -> bool {
        self.deviations.iter().any(SensorDeviation::violates)
    }

    /// Returns the violating sensors.
    pub fn violations(&self) -> Vec<CollisionViolation> {
        self.deviations
            .iter()
            .filter(|d| d.violates())
            .map(|d| CollisionViolation {
                edge: d.edge.clone(),
                sensor: d.sensor,
                deviation: d.deviation,
                limit: d.limit,
            })
            .collect()
    }

    /// Returns the largest predicted deviation, if any sensor was evaluated.
    pub fn max_deviation(&self) -> Option<f64> {
        self.deviations
            .iter()
            .map(|d| d.deviation)
            .reduce(f64::max)
    }

    /// Converts a colliding report into the veto error.
    pub fn into_result(self) -> ControllerResult<CollisionReport> {
        if self.collision() {
            Err(ControllerError::CollisionPredicted {
                violations: self.violations(),
            })
        } else {
            Ok(self)
        }
    }
}

// =============================================================================
// CollisionPredictor
// =============================================================================

/// Predicts sensor excursions for a proposed actuator delta.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionPredictor {
    safety_radius: f64,
    center: Vector2<f64>,
}

impl CollisionPredictor {
    /// Creates a predictor with the given safety radius (pixels).
    pub fn new(safety_radius: f64) -> Self {
        Self {
            safety_radius,
            center: Vector2::new(SENSOR_CENTER.0, SENSOR_CENTER.1),
        }
    }

    /// Overrides the camera centre.
    pub fn with_center(mut self, x: f64, y: f64) -> Self {
        self.center = Vector2::new(x, y);
        self
    }

    /// Returns the safety radius.
    pub fn safety_radius(&self) -> f64 {
        self.safety_radius
    }

    /// Evaluates every sensor of every edge.
    ///
    /// Edges with no readings are skipped. A response matrix whose shape does
    /// not match its readings makes the prediction unavailable.
    pub fn predict(
        &self,
        edges: &[EdgeResponse],
        delta: &Vector6<f64>,
    ) -> ControllerResult<CollisionReport> {
        let mut report = CollisionReport::default();

        for edge in edges {
            if edge.is_empty() {
                tracing::info!(edge = %edge.edge, "No sensor readings on edge; skipping");
                report.skipped.push(edge.edge.clone());
                continue;
            }

            let (rows, cols) = edge.response.shape();
            if cols != 6 || rows != edge.readings.len() || rows % 2 != 0 {
                return Err(ControllerError::collision_check_unavailable(format!(
                    "edge {}: response matrix is {}x{} for {} readings",
                    edge.edge,
                    rows,
                    cols,
                    edge.readings.len()
                )));
            }

            let delta = DVector::from_column_slice(delta.as_slice());
            let predicted = &edge.response * delta + &edge.readings;

            for sensor in 0..rows / 2 {
                let spot = Vector2::new(predicted[2 * sensor], predicted[2 * sensor + 1]);
                let deviation = (spot - self.center).norm();
                let entry = SensorDeviation {
                    edge: edge.edge.clone(),
                    sensor,
                    predicted: spot,
                    deviation,
                    limit: self.safety_radius,
                };

                if entry.violates() {
                    tracing::warn!(
                        edge = %edge.edge,
                        sensor,
                        deviation,
                        limit = self.safety_radius,
                        "Predicted sensor deviation exceeds safety radius"
                    );
                } else {
                    tracing::debug!(
                        edge = %edge.edge,
                        sensor,
                        deviation,
                        limit = self.safety_radius,
                        "Predicted sensor deviation"
                    );
                }
                report.deviations.push(entry);
            }
        }

        Ok(report)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn centred_edge(gain: f64) -> EdgeResponse {
        EdgeResponse {
            edge: Identity::named("1001+1002"),
            response: DMatrix::identity(6, 6) * gain,
            readings: DVector::from_vec(vec![160.0, 120.0, 160.0, 120.0, 160.0, 120.0]),
        }
    }

    #[test]
    fn test_small_move_passes() {
        let predictor = CollisionPredictor::new(10.0);
        let report = predictor
            .predict(&[centred_edge(0.4)], &Vector6::repeat(5.0))
            .unwrap();

        assert!(!report.collision());
        assert_eq!(report.deviations.len(), 3);
        for d in &report.deviations {
            assert_relative_eq!(d.deviation, 8f64.sqrt(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_large_move_collides_and_reports_all() {
        let predictor = CollisionPredictor::new(10.0);
        let report = predictor
            .predict(&[centred_edge(4.0)], &Vector6::repeat(5.0))
            .unwrap();

        assert!(report.collision());
        assert_eq!(report.violations().len(), 3);
        assert!(matches!(
            report.into_result(),
            Err(ControllerError::CollisionPredicted { violations }) if violations.len() == 3
        ));
    }

    #[test]
    fn test_no_edges_never_collides() {
        let report = CollisionPredictor::new(0.0)
            .predict(&[], &Vector6::repeat(100.0))
            .unwrap();
        assert!(!report.collision());
        assert_eq!(report.max_deviation(), None);
    }

    #[test]
    fn test_empty_edge_is_skipped() {
        let empty = EdgeResponse {
            edge: Identity::named("empty"),
            response: DMatrix::zeros(0, 6),
            readings: DVector::zeros(0),
        };
        let report = CollisionPredictor::new(1.0)
            .predict(&[empty, centred_edge(0.0)], &Vector6::repeat(1.0))
            .unwrap();
        assert_eq!(report.skipped, vec![Identity::named("empty")]);
        assert_eq!(report.deviations.len(), 3);
    }

    #[test]
    fn test_shape_mismatch_is_unavailable() {
        let mut edge = centred_edge(1.0);
        edge.response = DMatrix::zeros(4, 6);
        let err = CollisionPredictor::new(10.0)
            .predict(&[edge], &Vector6::zeros())
            .unwrap_err();
        assert!(matches!(err, ControllerError::CollisionCheckUnavailable { .. }));
    }

    #[test]
    fn test_violation_on_one_sensor_only() {
        let mut edge = centred_edge(0.0);
        edge.readings[2] = 175.0;
        let report = CollisionPredictor::new(10.0)
            .predict(&[edge], &Vector6::zeros())
            .unwrap();
        let violations = report.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].sensor, 1);
        assert_relative_eq!(violations[0].deviation, 15.0);
    }
}
