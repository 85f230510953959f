// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Builders
//!
//! [`PanelRigBuilder`] wires one panel, its actuators and optionally an edge
//! with sensors over a [`SimulatedPort`] whose variables the test controls
//! directly. Unlike the CLI plant, sensor spots here stay where the test put
//! them.

use std::sync::Arc;
use std::time::Duration;

use nalgebra::Vector6;

use pas_control::{
    DeviceTree, MotionPolicy, MpesCalibration, NodeIndex, OperateOutcome, PanelController,
    PanelSettings, PanelSide, ResponseBlock, TopologyBuilder,
};
use pas_core::{
    ControllerResult, DeviceState, DeviceType, Identity, NodeName, Value, DEFAULT_NAMESPACE,
};
use pas_opcua::{completion_channel, DeviceClient, SimulatedPort};

use super::fixtures::{
    diagonal_block, nominal_lengths, Readings, EDGE_NAME, PANEL_POSITION, PANEL_SERIAL,
};

// =============================================================================
// PanelRigBuilder
// =============================================================================

/// Builder for a [`PanelRig`].
#[derive(Debug, Clone)]
pub struct PanelRigBuilder {
    lengths: Vector6<f64>,
    with_actuators: bool,
    settings: PanelSettings,
    readings: Option<Readings>,
    response: ResponseBlock,
    completions: bool,
    completion_delay: Duration,
}

impl Default for PanelRigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelRigBuilder {
    /// A panel with six actuators at the nominal length and no edges.
    pub fn new() -> Self {
        Self {
            lengths: nominal_lengths(),
            with_actuators: true,
            settings: PanelSettings::default(),
            readings: None,
            response: diagonal_block(0.4),
            completions: true,
            completion_delay: Duration::ZERO,
        }
    }

    /// Sets the actuator lengths.
    pub fn lengths(mut self, lengths: Vector6<f64>) -> Self {
        self.lengths = lengths;
        self
    }

    /// Builds the panel without actuators.
    pub fn without_actuators(mut self) -> Self {
        self.with_actuators = false;
        self
    }

    /// Sets the safety radius.
    pub fn safety_radius(mut self, radius: f64) -> Self {
        self.settings.safety_radius = radius;
        self
    }

    /// Sets the coordinate cache lifetime.
    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.settings.update_interval = interval;
        self
    }

    /// Sets the busy policy.
    pub fn motion_policy(mut self, policy: MotionPolicy) -> Self {
        self.settings.motion_policy = policy;
        self
    }

    /// Adds an edge with one sensor per spot.
    pub fn with_edge(mut self, readings: Readings) -> Self {
        self.readings = Some(readings);
        self
    }

    /// Sets the response block every sensor uses for the panel.
    pub fn response(mut self, block: ResponseBlock) -> Self {
        self.response = block;
        self
    }

    /// Accepts async calls without ever completing them.
    pub fn without_completions(mut self) -> Self {
        self.completions = false;
        self
    }

    /// Delays async completions.
    pub fn completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    /// Builds the rig. Must be called inside a Tokio runtime.
    pub fn build(self) -> PanelRig {
        let (port, completions) = if self.completions {
            let (tx, rx) = completion_channel();
            (SimulatedPort::new(tx), Some(rx))
        } else {
            (SimulatedPort::without_completions(), None)
        };
        let client = Arc::new(DeviceClient::new(Arc::new(port.clone())));
        if let Some(rx) = completions {
            client.spawn_completion_listener(rx);
        }
        self.assemble(port, client)
    }

    fn assemble(self, port: SimulatedPort, client: Arc<DeviceClient>) -> PanelRig {
        port.set_completion_delay(self.completion_delay);
        let mut builder = TopologyBuilder::new(Arc::clone(&client), DEFAULT_NAMESPACE);

        let panel_id = Identity::new(PANEL_SERIAL, PANEL_POSITION);
        let panel_node = builder.default_node(DeviceType::Panel, &panel_id);
        seed_device(&port, &panel_node, &panel_id);
        let panel = builder
            .add_panel(panel_id, self.settings.clone())
            .expect("add panel");

        let mut actuators = Vec::new();
        if self.with_actuators {
            for position in 1..=6u32 {
                let id = Identity::new(100 + position, position);
                let node = builder.default_node(DeviceType::Actuator, &id);
                seed_device(&port, &node, &id);
                port.set(
                    node.member("CurrentLength"),
                    self.lengths[(position - 1) as usize],
                );
                let index = builder.add_actuator(id).expect("add actuator");
                builder.link(panel, index).expect("link actuator");
                actuators.push(index);
            }
        }

        let mut edge = None;
        let mut sensors = Vec::new();
        if let Some(readings) = &self.readings {
            let edge_index = builder
                .add_edge(Identity::named(EDGE_NAME))
                .expect("add edge");
            for (i, &(x, y)) in readings.spots.iter().enumerate() {
                let id = Identity::from_serial(500 + i as u32);
                let node = builder.default_node(DeviceType::Mpes, &id);
                seed_device(&port, &node, &id);
                seed_spot(&port, &node, x, y);
                let calibration = MpesCalibration::default()
                    .with_side(PANEL_POSITION, PanelSide::L)
                    .with_response(PanelSide::L, self.response);
                let index = builder.add_mpes(id, calibration).expect("add mpes");
                builder.link(edge_index, index).expect("link mpes");
                sensors.push(index);
            }
            builder.link(edge_index, panel).expect("link panel to edge");
            builder.link(panel, edge_index).expect("link edge to panel");
            edge = Some(edge_index);
        }

        PanelRig {
            port,
            client,
            tree: builder.build(),
            panel,
            actuators,
            edge,
            sensors,
        }
    }
}

fn seed_device(port: &SimulatedPort, node: &NodeName, id: &Identity) {
    port.set(node.member("State"), DeviceState::On.code());
    port.set(node.member("ErrorState"), 0_i32);
    port.set(node.member("Position"), id.position.unwrap_or(0));
    port.set(node.member("SerialNumber"), id.serial.unwrap_or(0));
}

fn seed_spot(port: &SimulatedPort, node: &NodeName, x: f64, y: f64) {
    port.set(node.member("xCentroidAvg"), x);
    port.set(node.member("yCentroidAvg"), y);
    port.set(node.member("xCentroidSpotWidth"), 10.0_f64);
    port.set(node.member("yCentroidSpotWidth"), 10.0_f64);
    port.set(node.member("CleanedIntensity"), 150_000.0_f64);
    port.set(node.member("xCentroidNominal"), x);
    port.set(node.member("yCentroidNominal"), y);
}

// =============================================================================
// PanelRig
// =============================================================================

/// A panel topology over a simulated port.
pub struct PanelRig {
    /// The simulated device server.
    pub port: SimulatedPort,
    /// The shared client.
    pub client: Arc<DeviceClient>,
    /// The device tree.
    pub tree: Arc<DeviceTree>,
    /// The panel.
    pub panel: NodeIndex,
    /// Actuators in position order.
    pub actuators: Vec<NodeIndex>,
    /// The edge, if any.
    pub edge: Option<NodeIndex>,
    /// Sensors on the edge, in registration order.
    pub sensors: Vec<NodeIndex>,
}

impl PanelRig {
    /// Returns the panel controller.
    pub fn panel(&self) -> &PanelController {
        self.tree.panel(self.panel).expect("panel node")
    }

    /// Returns the panel's node name.
    pub fn panel_node(&self) -> NodeName {
        self.tree.get(self.panel).expect("panel node").node().clone()
    }

    /// Runs a panel operation through the tree.
    pub async fn operate_panel(
        &self,
        offset: u32,
        args: &[Value],
    ) -> ControllerResult<OperateOutcome> {
        self.tree.operate(self.panel, offset, args).await
    }

    /// Sets the state the panel reports.
    pub fn set_panel_state(&self, state: DeviceState) {
        self.port
            .set(self.panel_node().member("State"), state.code());
    }

    /// Moves a sensor's spot.
    pub fn set_spot(&self, sensor: usize, x: f64, y: f64) {
        let node = self
            .tree
            .get(self.sensors[sensor])
            .expect("sensor node")
            .node()
            .clone();
        self.port.set(node.member("xCentroidAvg"), x);
        self.port.set(node.member("yCentroidAvg"), y);
    }

    /// Sets an actuator's length, by position 1..=6.
    pub fn set_length(&self, position: usize, length: f64) {
        let node = self
            .tree
            .get(self.actuators[position - 1])
            .expect("actuator node")
            .node()
            .clone();
        self.port.set(node.member("CurrentLength"), length);
    }

    /// Number of async calls the port accepted.
    pub fn dispatch_count(&self) -> usize {
        self.port.async_call_count()
    }
}
