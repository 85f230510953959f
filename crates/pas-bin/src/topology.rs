// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Builds the device tree described by a configuration.

use std::sync::Arc;

use tracing::{debug, info};

use pas_config::PasConfig;
use pas_control::{DeviceTree, TopologyBuilder};
use pas_core::{DeviceType, Identity};
use pas_opcua::DeviceClient;

use crate::error::{BinError, BinResult};

/// Builds the device tree of a validated configuration.
///
/// - each panel gets its actuators
/// - each MPES is added with its calibration and linked to the panels it has a side for
/// - each edge links its MPES and panels, and every panel of the edge links the edge back
pub fn build_tree(config: &PasConfig, client: Arc<DeviceClient>) -> BinResult<Arc<DeviceTree>> {
    let mut builder = TopologyBuilder::new(client, config.port.namespace);

    for panel in &config.panels {
        let identity = Identity::new(panel.serial, panel.position);
        let settings = config.panel_settings(panel);
        let panel_index = match config.node_override(panel.node.as_deref()) {
            Some(node) => builder.add_panel_at(identity, node, settings)?,
            None => builder.add_panel(identity, settings)?,
        };

        for actuator in &panel.actuators {
            let identity = Identity::new(actuator.serial, actuator.position);
            let index = match config.node_override(actuator.node.as_deref()) {
                Some(node) => builder.add_actuator_at(identity, node)?,
                None => builder.add_actuator(identity)?,
            };
            builder.link(panel_index, index)?;
        }
        debug!(
            panel = panel.position,
            actuators = panel.actuators.len(),
            "Panel added"
        );
    }

    for mpes in &config.mpes {
        let mut identity = Identity::from_serial(mpes.serial);
        if let Some(position) = mpes.position {
            identity = identity.with_position(position);
        }
        let calibration = mpes.calibration()?;
        let index = match config.node_override(mpes.node.as_deref()) {
            Some(node) => builder.add_mpes_at(identity, node, calibration)?,
            None => builder.add_mpes(identity, calibration)?,
        };

        for &panel_position in mpes.sides.keys() {
            let panel = find_panel(&builder, config, panel_position)?;
            builder.link(panel, index)?;
        }
    }

    for edge in &config.edges {
        let edge_index = builder.add_edge(Identity::named(edge.name.as_str()))?;

        for &serial in &edge.mpes {
            let mpes = builder
                .find(DeviceType::Mpes, &mpes_identity(config, serial))
                .ok_or_else(|| {
                    BinError::config(format!("edge {} references unknown MPES {}", edge.name, serial))
                })?;
            builder.link(edge_index, mpes)?;
        }
        for &position in &edge.panels {
            let panel = find_panel(&builder, config, position)?;
            builder.link(edge_index, panel)?;
            builder.link(panel, edge_index)?;
        }
    }

    let tree = builder.build();
    info!(
        panels = config.panels.len(),
        actuators = config.actuator_count(),
        mpes = config.mpes.len(),
        edges = config.edges.len(),
        "Topology built"
    );
    Ok(tree)
}

fn find_panel(
    builder: &TopologyBuilder,
    config: &PasConfig,
    position: u32,
) -> BinResult<pas_control::NodeIndex> {
    config
        .panel(position)
        .and_then(|panel| {
            builder.find(DeviceType::Panel, &Identity::new(panel.serial, panel.position))
        })
        .ok_or_else(|| BinError::config(format!("panel {} is not configured", position)))
}

fn mpes_identity(config: &PasConfig, serial: u32) -> Identity {
    let identity = Identity::from_serial(serial);
    match config.mpes_by_serial(serial).and_then(|m| m.position) {
        Some(position) => identity.with_position(position),
        None => identity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pas_config::{load_config_str, ConfigFormat};
    use pas_opcua::SimulatedPort;

    const TOPOLOGY: &str = r#"
panels:
  - position: 1001
    serial: 1
    actuators:
      - { position: 1, serial: 11 }
      - { position: 2, serial: 12 }
      - { position: 3, serial: 13 }
      - { position: 4, serial: 14 }
      - { position: 5, serial: 15 }
      - { position: 6, serial: 16, node: "Act_Special" }
  - position: 1002
    serial: 2
mpes:
  - serial: 500
    sides: { 1001: l, 1002: w }
    response:
      l: [[0.4, 0, 0, 0, 0, 0], [0, 0.4, 0, 0, 0, 0]]
      w: [[0, 0, 0.4, 0, 0, 0], [0, 0, 0, 0.4, 0, 0]]
edges:
  - { name: "1001+1002", panels: [1001, 1002], mpes: [500] }
"#;

    #[test]
    fn test_build_tree() {
        let config = load_config_str(TOPOLOGY, ConfigFormat::Yaml).unwrap();
        let client = Arc::new(DeviceClient::new(Arc::new(SimulatedPort::without_completions())));
        let tree = build_tree(&config, client).unwrap();

        // 2 panels, 6 actuators, 1 MPES, 1 edge
        assert_eq!(tree.len(), 10);

        let (_, panel) = tree.panel_at(1001).unwrap();
        assert_eq!(panel.actuator_count(), 6);
        assert_eq!(panel.edge_count(), 1);

        let special = tree
            .find(DeviceType::Actuator, &Identity::new(16, 6))
            .and_then(|i| tree.get(i))
            .unwrap();
        assert_eq!(special.node().as_str(), "ns=2;s=Act_Special");

        let edge = tree
            .find(DeviceType::Edge, &Identity::named("1001+1002"))
            .and_then(|i| tree.get(i))
            .unwrap();
        let children = edge.children().unwrap();
        assert_eq!(children.child_count(DeviceType::Panel), 2);
        assert_eq!(children.child_count(DeviceType::Mpes), 1);
    }
}
