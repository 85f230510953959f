// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Registry Integration Tests
//!
//! Integration tests for assembling device trees:
//!
//! - Idempotent child registration
//! - Child type policy per parent type
//! - Registration order and lookups by identity and position
//!
//! ## Test Categories
//!
//! - `test_link_*`: Linking children under parents
//! - `test_lookup_*`: Finding children after assembly

use std::sync::Arc;

use pas_control::{MpesCalibration, NodeIndex, PanelSettings, TopologyBuilder};
use pas_core::{DeviceType, Identity, Registered, RegistrationError, DEFAULT_NAMESPACE};
use pas_opcua::{DeviceClient, SimulatedPort};

use pas_tests::prelude::*;

fn builder() -> TopologyBuilder {
    let client = Arc::new(DeviceClient::new(Arc::new(SimulatedPort::without_completions())));
    TopologyBuilder::new(client, DEFAULT_NAMESPACE)
}

fn panel(builder: &mut TopologyBuilder) -> NodeIndex {
    builder
        .add_panel(Identity::new(PANEL_SERIAL, PANEL_POSITION), PanelSettings::default())
        .unwrap()
}

// =============================================================================
// Linking
// =============================================================================

#[test]
fn test_link_twice_is_already_present() {
    init_test_logging();
    let mut builder = builder();
    let panel = panel(&mut builder);
    let actuator = builder.add_actuator(Identity::new(101, 1)).unwrap();

    assert_eq!(builder.link(panel, actuator).unwrap(), Registered::Added(0));
    let again = builder.link(panel, actuator).unwrap();
    assert_eq!(again, Registered::AlreadyPresent(0));
    assert!(!again.is_new());

    let tree = builder.build();
    let children = tree.get(panel).unwrap().children().unwrap();
    assert_eq!(children.child_count(DeviceType::Actuator), 1);
    assert_eq!(children.total_count(), 1);
}

#[test]
fn test_link_under_leaf_is_unsupported() {
    init_test_logging();
    let mut builder = builder();
    let first = builder.add_actuator(Identity::new(101, 1)).unwrap();
    let second = builder.add_actuator(Identity::new(102, 2)).unwrap();

    let err = builder.link(first, second).unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::UnsupportedChildType {
            parent: DeviceType::Actuator,
            child: DeviceType::Actuator,
            ..
        }
    ));

    let tree = builder.build();
    assert!(tree.get(first).unwrap().children().is_none());
}

#[test]
fn test_link_disallowed_type_changes_nothing() {
    init_test_logging();
    let mut builder = builder();
    let panel = panel(&mut builder);
    let neighbour = builder
        .add_panel(Identity::new(2, NEIGHBOUR_POSITION), PanelSettings::default())
        .unwrap();
    let actuator = builder.add_actuator(Identity::new(101, 1)).unwrap();
    builder.link(panel, actuator).unwrap();

    let err = builder.link(panel, neighbour).unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::UnsupportedChildType {
            parent: DeviceType::Panel,
            child: DeviceType::Panel,
            ..
        }
    ));

    let tree = builder.build();
    let children = tree.get(panel).unwrap().children().unwrap();
    assert_eq!(children.total_count(), 1);
    assert_eq!(children.child_count(DeviceType::Panel), 0);
}

#[test]
fn test_link_unknown_node() {
    let mut builder = builder();
    let panel = panel(&mut builder);

    let err = builder.link(panel, NodeIndex(42)).unwrap_err();
    assert_eq!(err, RegistrationError::UnknownNode { index: 42 });
}

#[test]
fn test_add_duplicate_device() {
    let mut builder = builder();
    builder.add_actuator(Identity::new(101, 1)).unwrap();

    let err = builder.add_actuator(Identity::new(101, 1)).unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::DuplicateDevice {
            device_type: DeviceType::Actuator,
            ..
        }
    ));
}

#[test]
fn test_link_edge_accepts_sensors_and_panels() {
    init_test_logging();
    let mut builder = builder();
    let panel = panel(&mut builder);
    let edge = builder.add_edge(Identity::named(EDGE_NAME)).unwrap();
    let mpes = builder
        .add_mpes(Identity::from_serial(500), MpesCalibration::default())
        .unwrap();

    assert!(builder.link(edge, mpes).unwrap().is_new());
    assert!(builder.link(edge, panel).unwrap().is_new());
    assert!(builder.link(panel, edge).unwrap().is_new());

    let tree = builder.build();
    let edge_children = tree.get(edge).unwrap().children().unwrap();
    assert_eq!(edge_children.child_count(DeviceType::Mpes), 1);
    assert_eq!(edge_children.child_count(DeviceType::Panel), 1);
    assert_eq!(tree.panel(panel).unwrap().edge_count(), 1);
}

// =============================================================================
// Lookups
// =============================================================================

#[test]
fn test_lookup_registration_order_and_positions() {
    init_test_logging();
    let mut builder = builder();
    let panel = panel(&mut builder);

    // Registered out of position order.
    let mut by_position = Vec::new();
    for position in [4u32, 1, 6, 2, 5, 3] {
        let index = builder.add_actuator(Identity::new(100 + position, position)).unwrap();
        builder.link(panel, index).unwrap();
        by_position.push((position, index));
    }

    let tree = builder.build();
    let children = tree.get(panel).unwrap().children().unwrap();

    let order: Vec<u32> = children
        .children(DeviceType::Actuator)
        .iter()
        .map(|entry| entry.identity.position.unwrap())
        .collect();
    assert_eq!(order, vec![4, 1, 6, 2, 5, 3]);

    let ordered: Vec<u32> = children
        .by_position_ordered(DeviceType::Actuator)
        .iter()
        .map(|(position, _)| *position)
        .collect();
    assert_eq!(ordered, vec![1, 2, 3, 4, 5, 6]);

    for (position, index) in by_position {
        assert_eq!(children.by_position(DeviceType::Actuator, position), Some(&index));
        let identity = Identity::new(100 + position, position);
        assert_eq!(children.by_identity(DeviceType::Actuator, &identity), Some(&index));
        assert_eq!(tree.find(DeviceType::Actuator, &identity), Some(index));
    }

    assert!(children.by_position(DeviceType::Actuator, 7).is_none());
    assert!(children.children(DeviceType::Edge).is_empty());
}

#[test]
fn test_lookup_occupied_position_keeps_first() {
    init_test_logging();
    let mut builder = builder();
    let panel = panel(&mut builder);
    let first = builder.add_actuator(Identity::new(101, 1)).unwrap();
    let second = builder.add_actuator(Identity::new(201, 1)).unwrap();

    assert_eq!(builder.link(panel, first).unwrap(), Registered::Added(0));
    assert_eq!(builder.link(panel, second).unwrap(), Registered::Added(1));

    let tree = builder.build();
    let children = tree.get(panel).unwrap().children().unwrap();
    assert_eq!(children.child_count(DeviceType::Actuator), 2);
    assert_eq!(children.by_position(DeviceType::Actuator, 1), Some(&first));
}

#[test]
fn test_lookup_tree_panels_by_position() {
    let mut builder = builder();
    let panel = panel(&mut builder);
    let neighbour = builder
        .add_panel(Identity::new(2, NEIGHBOUR_POSITION), PanelSettings::default())
        .unwrap();

    let tree = builder.build();
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.panel_at(PANEL_POSITION).map(|(i, _)| i), Some(panel));
    assert_eq!(tree.panel_at(NEIGHBOUR_POSITION).map(|(i, _)| i), Some(neighbour));
    assert!(tree.panel_at(9999).is_none());
    assert_eq!(tree.indices_of(DeviceType::Panel), vec![panel, neighbour]);
}
