// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Dispatch Integration Tests
//!
//! Integration tests for commands leaving the controllers:
//!
//! - Async dispatch and completion correlation
//! - Pose targets converted to actuator lengths
//! - Synchronous maintenance calls
//!
//! ## Test Categories
//!
//! - `test_completion_*`: Completion events
//! - `test_coords_*`: Pose moves
//! - `test_maintenance_*`: Non-motion commands

use std::sync::Arc;
use std::time::Duration;

use nalgebra::Vector6;

use pas_control::{OperateOutcome, PasController};
use pas_core::{DeviceState, Identity, StatusCode, Value};

use pas_tests::prelude::*;

const ACTUATOR_OP_MOVE_DELTA_LENGTH: u32 = 0;
const ACTUATOR_OP_STOP: u32 = 2;
const PANEL_OP_MOVE_DELTA_COORDS: u32 = 3;
const PANEL_OP_FIND_HOME: u32 = 8;
const PANEL_OP_CLEAR_ERROR: u32 = 9;
const EDGE_OP_STOP: u32 = 1;

// =============================================================================
// Completions
// =============================================================================

#[tokio::test]
async fn test_completion_event_carries_correlation() {
    init_test_logging();
    let rig = PanelRigBuilder::new()
        .completion_delay(Duration::from_millis(20))
        .build();
    let mut events = rig.client.subscribe();

    let outcome = rig
        .operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .unwrap();
    let correlation = outcome.correlation().expect("motion is dispatched");
    assert!(rig.client.is_pending(&correlation));
    assert_eq!(rig.client.pending_count(), 1);

    let event = within(Duration::from_secs(5), events.recv()).await.unwrap();
    assert_eq!(event.correlation, correlation);
    assert_eq!(event.origin, Identity::new(PANEL_SERIAL, PANEL_POSITION));
    assert_eq!(event.method, "MoveDeltaLengths");
    assert!(event.is_good());
    assert!(event.completed_at >= event.issued_at);

    assert!(!rig.client.is_pending(&correlation));
    assert_eq!(rig.client.pending_count(), 0);
}

#[tokio::test]
async fn test_completion_through_handle() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();

    let handle = rig
        .operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .unwrap()
        .into_handle()
        .expect("motion is dispatched");
    let correlation = handle.correlation;

    let event = within(Duration::from_secs(5), handle.completion())
        .await
        .expect("client alive");
    assert_eq!(event.correlation, correlation);
    assert_eq!(event.status, StatusCode::GOOD);
    assert_eq!(rig.client.stats().async_calls, 1);
}

#[tokio::test]
async fn test_completion_failure_is_reported() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();
    rig.port.on_method(rig.panel_node(), "MoveDeltaLengths", |_, _| {
        Err(StatusCode::BAD_INVALID_STATE)
    });

    // The dispatch itself succeeds; the failure arrives with the completion.
    let handle = rig
        .operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .unwrap()
        .into_handle()
        .unwrap();
    let event = within(Duration::from_secs(5), handle.completion())
        .await
        .unwrap();
    assert!(!event.is_good());
    assert_eq!(event.status, StatusCode::BAD_INVALID_STATE);
}

#[tokio::test]
async fn test_completion_never_arrives_stays_pending() {
    init_test_logging();
    let rig = PanelRigBuilder::new().without_completions().build();

    let first = rig
        .operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .unwrap();
    let second = rig
        .operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(-1.0))
        .await
        .unwrap();

    let (a, b) = (first.correlation().unwrap(), second.correlation().unwrap());
    assert_ne!(a, b);
    assert!(rig.client.is_pending(&a));
    assert!(rig.client.is_pending(&b));
    assert_eq!(rig.client.pending_count(), 2);

    let transactions: Vec<_> = rig
        .port
        .calls()
        .iter()
        .filter_map(|call| call.transaction)
        .collect();
    assert_eq!(transactions.len(), 2);
    assert_ne!(transactions[0], transactions[1]);
}

#[tokio::test]
async fn test_completion_dispatch_failure_is_not_pending() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();
    rig.port.fail_all_calls(true);

    rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .assert_status(StatusCode::BAD_COMMUNICATION_ERROR);
    assert_eq!(rig.client.pending_count(), 0);
    assert_eq!(rig.client.stats().errors, 1);
}

#[tokio::test]
async fn test_completion_for_actuator_moves() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();
    let actuator = rig.actuators[2];
    let mut events = rig.client.subscribe();

    let outcome = rig
        .tree
        .operate(actuator, ACTUATOR_OP_MOVE_DELTA_LENGTH, &[Value::Float64(0.25)])
        .await
        .unwrap();
    let correlation = outcome.correlation().unwrap();

    let event = within(Duration::from_secs(5), events.recv()).await.unwrap();
    assert_eq!(event.correlation, correlation);
    assert_eq!(event.origin, Identity::new(103, 3));
    assert_eq!(event.method, "MoveDeltaLength");

    let call = assert_dispatched_once(&rig.port, "MoveDeltaLength");
    assert_eq!(call.args, vec![Value::Float64(0.25)]);

    // Actuator stop is synchronous.
    let stop = rig.tree.operate(actuator, ACTUATOR_OP_STOP, &[]).await.unwrap();
    assert!(matches!(stop, OperateOutcome::Done(_)));
}

// =============================================================================
// Pose Moves
// =============================================================================

#[tokio::test]
async fn test_coords_move_to_dispatches_inverse_lengths() {
    init_test_logging();
    let rig = PanelRigBuilder::new()
        .with_edge(Readings::centred(1))
        .build();
    let current = rig.panel().update_coords(&rig.tree).await.unwrap();
    let mut target = current.pose;
    target[0] += 0.5;
    target[2] += 1.0;

    rig.operate_panel(PANEL_OP_MOVE_TO_COORDS, &vector_args(&target))
        .await
        .assert_good();

    let call = assert_dispatched_once(&rig.port, "MoveToLengths");
    assert!(call.is_async());
    let sent = Vector6::from_iterator(call.numeric_args());
    assert_vector_approx(&sent, &rig.panel().platform().inverse(&target), 1e-12);
    assert!(rig.port.calls_to("MoveToCoords").is_empty());
}

#[tokio::test]
async fn test_coords_move_delta_is_relative_to_current_pose() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();
    let current = rig.panel().update_coords(&rig.tree).await.unwrap();
    let delta = Vector6::new(0.0, 0.0, 1.5, 0.0, 0.0, 0.0);

    rig.operate_panel(PANEL_OP_MOVE_DELTA_COORDS, &vector_args(&delta))
        .await
        .assert_good();

    let call = assert_dispatched_once(&rig.port, "MoveToLengths");
    let sent = Vector6::from_iterator(call.numeric_args());
    let expected = rig.panel().platform().inverse(&(current.pose + delta));
    assert_vector_approx(&sent, &expected, 1e-9);

    // A pure lift lengthens every actuator equally.
    for length in sent.iter() {
        approx::assert_relative_eq!(*length, sent[0], epsilon = 1e-9);
        assert!(*length > nominal_lengths()[0]);
    }
}

#[tokio::test]
async fn test_coords_large_pose_change_is_vetoed() {
    init_test_logging();
    let rig = PanelRigBuilder::new()
        .with_edge(Readings::centred(1))
        .build();
    let current = rig.panel().update_coords(&rig.tree).await.unwrap();
    let mut target = current.pose;
    target[2] += 150.0;

    rig.operate_panel(PANEL_OP_MOVE_TO_COORDS, &vector_args(&target))
        .await
        .assert_status(StatusCode::BAD);
    assert_no_dispatch(&rig.port);
}

// =============================================================================
// Maintenance
// =============================================================================

#[tokio::test]
async fn test_maintenance_find_home_is_async() {
    init_test_logging();
    let rig = PanelRigBuilder::new()
        .with_edge(Readings::centred(1))
        .build();

    let outcome = rig
        .operate_panel(PANEL_OP_FIND_HOME, &[Value::Int32(-1)])
        .await
        .unwrap();
    assert!(outcome.correlation().is_some());

    let call = assert_dispatched_once(&rig.port, "FindHome");
    assert_eq!(call.args, vec![Value::Int32(-1)]);
    // Homing skips both the coordinate refresh and the gate.
    assert_eq!(rig.panel().refresh_count(), 0);
    assert!(rig.port.calls_to("Read").is_empty());
}

#[tokio::test]
async fn test_maintenance_clear_error_is_sync() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();

    let outcome = rig
        .operate_panel(PANEL_OP_CLEAR_ERROR, &[Value::Int32(3)])
        .await
        .unwrap();
    assert!(matches!(outcome, OperateOutcome::Done(_)));

    let call = assert_dispatched_once(&rig.port, "ClearError");
    assert!(!call.is_async());
    assert_eq!(call.args, vec![Value::Int32(3)]);

    rig.operate_panel(PANEL_OP_CLEAR_ERROR, &[Value::Float64(3.5)])
        .await
        .assert_status(StatusCode::BAD_INVALID_ARGUMENT);
}

#[tokio::test]
async fn test_maintenance_stop_while_device_unreadable() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();
    rig.port.remove(&rig.panel_node().member("State"));

    rig.operate_panel(PANEL_OP_STOP, &[]).await.assert_good();
    assert_dispatched_once(&rig.port, "Stop");

    rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .assert_status(StatusCode::BAD_NODE_ID_UNKNOWN);
    assert_no_dispatch(&rig.port);
}

#[tokio::test]
async fn test_maintenance_stop_not_blocked_by_stalled_move() {
    init_test_logging();
    let rig = PanelRigBuilder::new()
        .with_edge(Readings::centred(1))
        .build();
    rig.port.stall_reads("CurrentLength", true);

    let tree = Arc::clone(&rig.tree);
    let panel = rig.panel;
    let mover = tokio::spawn(async move {
        tree.operate(panel, PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
            .await
    });
    // The move holds the coordinate lock while its refresh hangs.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!mover.is_finished());

    within(Duration::from_secs(5), rig.operate_panel(PANEL_OP_STOP, &[]))
        .await
        .assert_good();
    assert_dispatched_once(&rig.port, "Stop");

    let edge = rig.edge.unwrap();
    within(Duration::from_secs(5), rig.tree.operate(edge, EDGE_OP_STOP, &[]))
        .await
        .assert_good();
    assert_eq!(rig.port.calls_to("Stop").len(), 2);

    assert!(!mover.is_finished());
    assert_eq!(rig.dispatch_count(), 0);
    mover.abort();
}

#[tokio::test]
async fn test_maintenance_actuator_state_not_writable() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();
    let actuator = rig.tree.actuator(rig.actuators[0]).unwrap();

    actuator
        .set_state(DeviceState::Off)
        .await
        .assert_status(StatusCode::BAD_NOT_WRITABLE);
    assert_eq!(actuator.state(), DeviceState::On);
}
