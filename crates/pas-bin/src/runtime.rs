// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Runtime driving the configured topology.
//!
//! [`PlantRuntime`] owns the configuration and a [`SimulatedPlant`]. Every
//! panel command goes through the device tree dispatch surface, so the same
//! state checks, coordinate refreshes and collision gate apply as for any
//! other caller.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use pas_config::PasConfig;
use pas_control::{DeviceTree, NodeIndex, OperateOutcome, PasController};
use pas_core::{ControllerError, DeviceState, Value};

use crate::error::{BinError, BinResult};
use crate::sim::SimulatedPlant;

/// Operation offset of `MoveDeltaLengths` on a panel.
const MOVE_DELTA_LENGTHS: u32 = 0;

/// Operation offset of `Stop` on a panel.
const STOP: u32 = 5;

// =============================================================================
// Reports
// =============================================================================

/// Geometry of one panel as read from its actuators.
#[derive(Debug, Clone, Serialize)]
pub struct PanelReadout {
    /// Panel position.
    pub position: u32,
    /// Panel serial number.
    pub serial: Option<u32>,
    /// Device state.
    pub state: String,
    /// Actuator lengths by position 1..=6, mm.
    pub lengths: Vec<f64>,
    /// Pose `(x, y, z, rx, ry, rz)`.
    pub pose: Vec<f64>,
    /// Pad coordinates `(x, y, z)`, one entry per pad.
    pub pads: Vec<[f64; 3]>,
    /// Number of edges the panel shares.
    pub edges: usize,
}

/// What happened to one panel move.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// The device reported completion.
    Completed,
    /// The collision predictor refused the motion.
    Vetoed {
        /// Why.
        reason: String,
    },
    /// The command or its completion failed.
    Failed {
        /// Why.
        reason: String,
    },
    /// The panel had nothing to move.
    NoOp,
}

/// One panel move of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct MoveRecord {
    /// Step number, from 0.
    pub step: u32,
    /// Panel position.
    pub panel: u32,
    /// Length change sent to every actuator, mm.
    pub delta: f64,
    /// Result.
    #[serde(flatten)]
    pub outcome: MoveOutcome,
}

/// Result of a simulation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationReport {
    /// Every attempted move, in order.
    pub moves: Vec<MoveRecord>,
}

impl SimulationReport {
    /// Counts moves with a given outcome kind.
    pub fn count(&self, pred: impl Fn(&MoveOutcome) -> bool) -> usize {
        self.moves.iter().filter(|m| pred(&m.outcome)).count()
    }

    /// Number of completed moves.
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, MoveOutcome::Completed))
    }

    /// Number of vetoed moves.
    pub fn vetoed(&self) -> usize {
        self.count(|o| matches!(o, MoveOutcome::Vetoed { .. }))
    }

    /// Number of failed moves.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MoveOutcome::Failed { .. }))
    }
}

// =============================================================================
// PlantRuntime
// =============================================================================

/// The configured topology running against a simulated device server.
#[derive(Debug)]
pub struct PlantRuntime {
    config: Arc<PasConfig>,
    plant: SimulatedPlant,
}

impl PlantRuntime {
    /// Validates `config` and starts the simulated plant.
    pub fn start(config: PasConfig, motion_delay: Duration) -> BinResult<Self> {
        config.validate()?;
        let plant = SimulatedPlant::start(&config, motion_delay)?;
        Ok(Self {
            config: Arc::new(config),
            plant,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PasConfig {
        &self.config
    }

    /// Returns the device tree.
    pub fn tree(&self) -> &Arc<DeviceTree> {
        self.plant.tree()
    }

    /// Returns the simulated plant.
    pub fn plant(&self) -> &SimulatedPlant {
        &self.plant
    }

    fn panel_index(&self, position: u32) -> BinResult<NodeIndex> {
        self.tree()
            .panel_at(position)
            .map(|(index, _)| index)
            .ok_or_else(|| BinError::config(format!("panel {} is not configured", position)))
    }

    /// Refreshes and reports the geometry of one panel. A panel without
    /// actuators reports no geometry.
    pub async fn read_panel(&self, position: u32) -> BinResult<PanelReadout> {
        let tree = self.tree();
        let index = self.panel_index(position)?;
        let panel = tree
            .panel(index)
            .ok_or_else(|| BinError::runtime(format!("node {} is not a panel", index)))?;

        let state = tree.get_state(index).await?;
        if panel.actuator_count() == 0 {
            return Ok(PanelReadout {
                position,
                serial: panel.identity().serial,
                state: state.to_string(),
                lengths: Vec::new(),
                pose: Vec::new(),
                pads: Vec::new(),
                edges: panel.edge_count(),
            });
        }
        let snapshot = panel.update_coords(tree).await?;

        Ok(PanelReadout {
            position,
            serial: panel.identity().serial,
            state: state.to_string(),
            lengths: snapshot.lengths.iter().copied().collect(),
            pose: snapshot.pose.iter().copied().collect(),
            pads: snapshot
                .pads
                .column_iter()
                .map(|c| [c[0], c[1], c[2]])
                .collect(),
            edges: panel.edge_count(),
        })
    }

    /// Reads every panel, then moves each by `delta_mm` per actuator for
    /// `steps` rounds.
    ///
    /// The sign alternates between steps so the panels oscillate around
    /// where they started. Each dispatched move is awaited up to `timeout`.
    pub async fn simulate(
        &self,
        steps: u32,
        delta_mm: f64,
        timeout: Duration,
    ) -> BinResult<SimulationReport> {
        let mut report = SimulationReport::default();
        let positions: Vec<u32> = self.config.panels.iter().map(|p| p.position).collect();

        for &position in &positions {
            let readout = self.read_panel(position).await?;
            info!(panel = position, pose = ?readout.pose, "Initial pose");
        }

        for step in 0..steps {
            let delta = if step % 2 == 0 { delta_mm } else { -delta_mm };
            for &position in &positions {
                let outcome = self.move_panel(position, delta, timeout).await?;
                info!(step, panel = position, delta, ?outcome, "Panel move finished");
                report.moves.push(MoveRecord {
                    step,
                    panel: position,
                    delta,
                    outcome,
                });
            }
        }
        Ok(report)
    }

    async fn move_panel(&self, position: u32, delta: f64, timeout: Duration) -> BinResult<MoveOutcome> {
        let index = self.panel_index(position)?;
        let args: Vec<Value> = (0..6).map(|_| Value::Float64(delta)).collect();

        let outcome = match self.tree().operate(index, MOVE_DELTA_LENGTHS, &args).await {
            Ok(outcome) => outcome,
            Err(e @ ControllerError::CollisionPredicted { .. }) => {
                return Ok(MoveOutcome::Vetoed {
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                warn!(panel = position, error = %e, "Panel move failed");
                return Ok(MoveOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        };

        let handle = match outcome {
            OperateOutcome::NoOp => return Ok(MoveOutcome::NoOp),
            OperateOutcome::Done(_) => return Ok(MoveOutcome::Completed),
            OperateOutcome::Dispatched(handle) => handle,
        };

        Ok(match tokio::time::timeout(timeout, handle.completion()).await {
            Ok(Some(event)) if event.is_good() => MoveOutcome::Completed,
            Ok(Some(event)) => MoveOutcome::Failed {
                reason: format!("{} completed with {}", event.method, event.status),
            },
            Ok(None) => MoveOutcome::Failed {
                reason: "client dropped before completion".to_string(),
            },
            Err(_) => MoveOutcome::Failed {
                reason: format!("no completion within {} ms", timeout.as_millis()),
            },
        })
    }

    /// Sends `Stop` to every panel. Failures are logged and counted.
    pub async fn stop_all(&self) -> usize {
        let mut failures = 0;
        for (index, panel) in self.tree().panels() {
            if let Err(e) = self.tree().operate(index, STOP, &[]).await {
                warn!(panel = %panel.identity(), error = %e, "Stop failed");
                failures += 1;
            }
        }
        failures
    }

    /// Returns `true` if every panel reads back as `On`.
    pub async fn all_panels_on(&self) -> BinResult<bool> {
        for (index, _) in self.tree().panels() {
            if self.tree().get_state(index).await? != DeviceState::On {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pas_config::{load_config_str, ConfigFormat};
    use pas_control::kinematics::NOMINAL_LENGTH;

    fn config(response: f64) -> PasConfig {
        let yaml = format!(
            r#"
panels:
  - position: 1001
    serial: 1
    actuators:
      - {{ position: 1, serial: 11 }}
      - {{ position: 2, serial: 12 }}
      - {{ position: 3, serial: 13 }}
      - {{ position: 4, serial: 14 }}
      - {{ position: 5, serial: 15 }}
      - {{ position: 6, serial: 16 }}
  - position: 1002
    serial: 2
    actuators:
      - {{ position: 1, serial: 21 }}
      - {{ position: 2, serial: 22 }}
      - {{ position: 3, serial: 23 }}
      - {{ position: 4, serial: 24 }}
      - {{ position: 5, serial: 25 }}
      - {{ position: 6, serial: 26 }}
mpes:
  - serial: 500
    sides: {{ 1001: l, 1002: w }}
    response:
      l: [[{r}, 0, 0, 0, 0, 0], [0, {r}, 0, 0, 0, 0]]
      w: [[0, 0, {r}, 0, 0, 0], [0, 0, 0, {r}, 0, 0]]
edges:
  - {{ name: "1001+1002", panels: [1001, 1002], mpes: [500] }}
"#,
            r = response
        );
        load_config_str(&yaml, ConfigFormat::Yaml).unwrap()
    }

    #[tokio::test]
    async fn test_read_panel() {
        let runtime = PlantRuntime::start(config(0.4), Duration::ZERO).unwrap();
        let readout = runtime.read_panel(1001).await.unwrap();

        assert_eq!(readout.position, 1001);
        assert_eq!(readout.serial, Some(1));
        assert_eq!(readout.lengths.len(), 6);
        assert!((readout.lengths[0] - NOMINAL_LENGTH).abs() < 1e-9);
        assert_eq!(readout.pads.len(), 3);
        assert_eq!(readout.edges, 1);

        assert!(runtime.read_panel(9999).await.is_err());
    }

    #[tokio::test]
    async fn test_simulate_completes_small_moves() {
        let runtime = PlantRuntime::start(config(0.4), Duration::from_millis(1)).unwrap();
        let report = runtime
            .simulate(2, 0.5, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(report.moves.len(), 4);
        assert_eq!(report.completed(), 4);

        // +0.5 then -0.5 returns every actuator to where it started.
        let readout = runtime.read_panel(1002).await.unwrap();
        for length in readout.lengths {
            assert!((length - NOMINAL_LENGTH).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_simulate_vetoes_large_moves() {
        let runtime = PlantRuntime::start(config(0.4), Duration::ZERO).unwrap();

        // 0.4 * 100 along both axes is ~56.6 px, beyond the 40 px radius.
        let report = runtime
            .simulate(1, 100.0, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(report.vetoed(), 2);
        assert_eq!(runtime.plant().port().async_call_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_all() {
        let runtime = PlantRuntime::start(config(0.4), Duration::ZERO).unwrap();
        assert_eq!(runtime.stop_all().await, 0);
        assert_eq!(runtime.plant().port().calls_to("Stop").len(), 2);
        assert!(runtime.all_panels_on().await.unwrap());
    }
}
