// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Simulated device server backing the CLI.
//!
//! [`SimulatedPlant`] wires a [`SimulatedPort`] to the device tree of a
//! configuration and seeds one variable set and one method table per device:
//!
//! - actuators start at the nominal length and move on `MoveDeltaLength`
//!   and `MoveToLength`
//! - panels move their six actuators on `MoveDeltaLengths` and `MoveToLengths`
//! - sensors recompute their spot on `Read` from the actuator lengths of the
//!   panels they face, through their response blocks

use std::sync::Arc;
use std::time::Duration;

use nalgebra::{Vector2, Vector6};
use tracing::{debug, info};

use pas_config::PasConfig;
use pas_control::collision::SENSOR_CENTER;
use pas_control::controllers::{NOMINAL_INTENSITY, NOMINAL_SPOT_WIDTH};
use pas_control::kinematics::NOMINAL_LENGTH;
use pas_control::{DeviceNode, DeviceTree, MpesController, PanelController, ResponseBlock};
use pas_core::{DeviceState, DeviceType, ErrorState, NodeName, StatusCode, Value};
use pas_opcua::{completion_channel, DeviceClient, SimulatedPort, Variables};

use crate::error::BinResult;
use crate::topology::build_tree;

/// Panel temperature reported by the simulation, degrees Celsius.
pub const SIMULATED_TEMPERATURE: f64 = 20.0;

/// Exposure reported by simulated sensors.
pub const SIMULATED_EXPOSURE: i32 = 500;

// =============================================================================
// SimulatedPlant
// =============================================================================

/// A device tree bound to a seeded in-memory device server.
pub struct SimulatedPlant {
    port: SimulatedPort,
    client: Arc<DeviceClient>,
    tree: Arc<DeviceTree>,
}

impl SimulatedPlant {
    /// Builds the topology of `config` over a fresh simulated port.
    ///
    /// Async calls complete after `motion_delay`. Must be called inside a
    /// Tokio runtime.
    pub fn start(config: &PasConfig, motion_delay: Duration) -> BinResult<Self> {
        let (tx, rx) = completion_channel();
        let port = SimulatedPort::new(tx);
        port.set_completion_delay(motion_delay);

        let client = Arc::new(DeviceClient::new(Arc::new(port.clone())));
        client.spawn_completion_listener(rx);

        let tree = build_tree(config, Arc::clone(&client))?;
        seed(&port, &tree);

        info!(
            devices = tree.len(),
            motion_delay_ms = motion_delay.as_millis() as u64,
            "Simulated plant started"
        );
        Ok(Self { port, client, tree })
    }

    /// Returns the simulated port.
    pub fn port(&self) -> &SimulatedPort {
        &self.port
    }

    /// Returns the shared client.
    pub fn client(&self) -> &Arc<DeviceClient> {
        &self.client
    }

    /// Returns the device tree.
    pub fn tree(&self) -> &Arc<DeviceTree> {
        &self.tree
    }
}

impl std::fmt::Debug for SimulatedPlant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedPlant")
            .field("port", &self.port)
            .field("devices", &self.tree.len())
            .finish()
    }
}

// =============================================================================
// Seeding
// =============================================================================

/// Seeds variables and method handlers for every device of `tree`.
pub fn seed(port: &SimulatedPort, tree: &DeviceTree) {
    for (_, device) in tree.iter() {
        match device {
            DeviceNode::Actuator(_) => seed_actuator(port, device),
            DeviceNode::Panel(panel) => seed_panel(port, tree, device, panel),
            DeviceNode::Mpes(mpes) => seed_mpes(port, tree, device, mpes),
            DeviceNode::Edge(_) => {}
        }
    }
    debug!(devices = tree.len(), "Simulated port seeded");
}

fn seed_common(port: &SimulatedPort, device: &DeviceNode) {
    let node = device.node();
    let identity = device.identity();
    if device.device_type() != DeviceType::Mpes {
        port.set(node.member("State"), DeviceState::On.code());
    }
    port.set(node.member("ErrorState"), ErrorState::default().code());
    port.set(node.member("Position"), identity.position.unwrap_or(0));
    port.set(node.member("SerialNumber"), identity.serial.unwrap_or(0));
}

fn seed_actuator(port: &SimulatedPort, device: &DeviceNode) {
    seed_common(port, device);
    let node = device.node().clone();
    port.set(node.member("CurrentLength"), NOMINAL_LENGTH);
    port.set(node.member("DeltaLength"), 0.0_f64);
    port.set(node.member("TargetLength"), NOMINAL_LENGTH);

    let target = node.clone();
    port.on_method(node.clone(), "MoveDeltaLength", move |vars, args| {
        let delta = single_arg(args)?;
        let current = vars.get_f64(&target.member("CurrentLength")).unwrap_or(NOMINAL_LENGTH);
        move_actuator(vars, &target, current + delta);
        Ok(Vec::new())
    });

    let target = node.clone();
    port.on_method(node, "MoveToLength", move |vars, args| {
        move_actuator(vars, &target, single_arg(args)?);
        Ok(Vec::new())
    });
}

fn seed_panel(port: &SimulatedPort, tree: &DeviceTree, device: &DeviceNode, panel: &PanelController) {
    seed_common(port, device);
    let node = device.node().clone();
    port.set(node.member("InternalTemperature"), SIMULATED_TEMPERATURE);
    port.set(node.member("ExternalTemperature"), SIMULATED_TEMPERATURE);

    let actuators = actuator_nodes(tree, panel);

    let targets = actuators.clone();
    port.on_method(node.clone(), "MoveDeltaLengths", move |vars, args| {
        let deltas = six_args(args)?;
        for (actuator, delta) in targets.iter().zip(deltas.iter()) {
            let current = vars
                .get_f64(&actuator.member("CurrentLength"))
                .unwrap_or(NOMINAL_LENGTH);
            move_actuator(vars, actuator, current + delta);
        }
        Ok(Vec::new())
    });

    let targets = actuators;
    port.on_method(node, "MoveToLengths", move |vars, args| {
        let lengths = six_args(args)?;
        for (actuator, &length) in targets.iter().zip(lengths.iter()) {
            move_actuator(vars, actuator, length);
        }
        Ok(Vec::new())
    });
}

fn seed_mpes(port: &SimulatedPort, tree: &DeviceTree, device: &DeviceNode, mpes: &MpesController) {
    seed_common(port, device);
    let node = device.node().clone();
    let (cx, cy) = SENSOR_CENTER;
    port.set(node.member("xCentroidAvg"), cx);
    port.set(node.member("yCentroidAvg"), cy);
    port.set(node.member("xCentroidSpotWidth"), NOMINAL_SPOT_WIDTH / 2.0);
    port.set(node.member("yCentroidSpotWidth"), NOMINAL_SPOT_WIDTH / 2.0);
    port.set(node.member("CleanedIntensity"), NOMINAL_INTENSITY);
    port.set(node.member("xCentroidNominal"), cx);
    port.set(node.member("yCentroidNominal"), cy);
    port.set(node.member("Exposure"), SIMULATED_EXPOSURE);

    // One (response block, actuator nodes) pair per facing panel.
    let facing: Vec<(ResponseBlock, Vec<NodeName>)> = mpes
        .calibration()
        .sides
        .keys()
        .filter_map(|&position| {
            let (_, panel) = tree.panel_at(position)?;
            Some((mpes.response_block(position), actuator_nodes(tree, panel)))
        })
        .collect();

    let target = node.clone();
    port.on_method(node, "Read", move |vars, _args| {
        let mut spot = Vector2::new(cx, cy);
        for (block, actuators) in &facing {
            let mut offsets = Vector6::zeros();
            for (i, actuator) in actuators.iter().enumerate().take(6) {
                let length = vars
                    .get_f64(&actuator.member("CurrentLength"))
                    .unwrap_or(NOMINAL_LENGTH);
                offsets[i] = length - NOMINAL_LENGTH;
            }
            spot += block * offsets;
        }
        vars.set(target.member("xCentroidAvg"), spot[0]);
        vars.set(target.member("yCentroidAvg"), spot[1]);
        Ok(Vec::new())
    });
}

// =============================================================================
// Helpers
// =============================================================================

fn actuator_nodes(tree: &DeviceTree, panel: &PanelController) -> Vec<NodeName> {
    use pas_control::PasController;

    panel
        .children()
        .map(|children| {
            children
                .by_position_ordered(DeviceType::Actuator)
                .into_iter()
                .filter_map(|(_, &index)| tree.get(index).map(|d| d.node().clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn move_actuator(vars: Variables<'_>, actuator: &NodeName, length: f64) {
    let current = vars
        .get_f64(&actuator.member("CurrentLength"))
        .unwrap_or(NOMINAL_LENGTH);
    vars.set(actuator.member("DeltaLength"), length - current);
    vars.set(actuator.member("TargetLength"), length);
    vars.set(actuator.member("CurrentLength"), length);
}

fn single_arg(args: &[Value]) -> Result<f64, StatusCode> {
    match args {
        [value] => value.as_f64().ok_or(StatusCode::BAD_INVALID_ARGUMENT),
        _ => Err(StatusCode::BAD_INVALID_ARGUMENT),
    }
}

fn six_args(args: &[Value]) -> Result<[f64; 6], StatusCode> {
    if args.len() != 6 {
        return Err(StatusCode::BAD_INVALID_ARGUMENT);
    }
    let mut out = [0.0; 6];
    for (slot, value) in out.iter_mut().zip(args) {
        *slot = value.as_f64().ok_or(StatusCode::BAD_INVALID_ARGUMENT)?;
    }
    Ok(out)
}
