// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Panel Integration Tests
//!
//! Integration tests for the panel controller through the device tree:
//!
//! - Panels without actuators
//! - Coordinate cache staleness
//! - State guards and the busy policy
//! - Pose reads against the platform model
//!
//! ## Test Categories
//!
//! - `test_empty_*`: Panels with no actuators
//! - `test_cache_*`: Coordinate cache
//! - `test_state_*`: State transitions and motion policy
//! - `test_pose_*`: Kinematics through the controller
//! - `test_data_*`: Field reads and writes

use std::time::Duration;

use nalgebra::Vector6;

use pas_control::kinematics::NOMINAL_LENGTH;
use pas_control::{MotionPolicy, OperateOutcome, PanelType, PasController, StewartPlatform};
use pas_core::{DeviceState, StatusCode, Value};

use pas_tests::prelude::*;

// =============================================================================
// Panels Without Actuators
// =============================================================================

#[tokio::test]
async fn test_empty_panel_has_no_pose() {
    init_test_logging();
    let rig = PanelRigBuilder::new().without_actuators().build();

    for offset in PANEL_FIELD_X..=PANEL_FIELD_Z {
        let value = rig.tree.get_data(rig.panel, offset).await.unwrap();
        assert!(value.is_null(), "offset {} returned {:?}", offset, value);
    }
    assert_eq!(rig.panel().refresh_count(), 0);
}

#[tokio::test]
async fn test_empty_panel_motion_is_noop() {
    init_test_logging();
    let rig = PanelRigBuilder::new().without_actuators().build();

    assert_no_op(&rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0)).await);
    assert_no_op(
        &rig.operate_panel(PANEL_OP_MOVE_TO_LENGTHS, &vector_args(&nominal_lengths()))
            .await,
    );
    assert_no_op(&rig.operate_panel(PANEL_OP_READ_ALL, &[]).await);

    assert_eq!(rig.port.call_count(), 0);
    assert_no_dispatch(&rig.port);
}

#[tokio::test]
async fn test_empty_panel_still_stops() {
    init_test_logging();
    let rig = PanelRigBuilder::new().without_actuators().build();

    let outcome = rig.operate_panel(PANEL_OP_STOP, &[]).await;
    outcome.assert_good();
    assert!(matches!(outcome, Ok(OperateOutcome::Done(_))));

    let stop = assert_dispatched_once(&rig.port, "Stop");
    assert_eq!(stop.object, rig.panel_node());
    assert!(!stop.is_async());
}

#[tokio::test]
async fn test_empty_panel_argument_errors_still_reported() {
    init_test_logging();
    let rig = PanelRigBuilder::new().without_actuators().build();

    rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0)[..3])
        .await
        .assert_status(StatusCode::BAD_INVALID_ARGUMENT);
    rig.operate_panel(42, &[])
        .await
        .assert_status(StatusCode::BAD_INVALID_ARGUMENT);
}

// =============================================================================
// Coordinate Cache
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cache_reused_until_stale() {
    init_test_logging();
    let rig = PanelRigBuilder::new()
        .update_interval(Duration::from_secs(1))
        .build();

    let first = rig.tree.get_data(rig.panel, PANEL_FIELD_Z).await.unwrap();
    assert_eq!(rig.panel().refresh_count(), 1);

    // A change on the device is not seen while the cache is fresh.
    rig.set_length(1, NOMINAL_LENGTH + 5.0);
    tokio::time::advance(Duration::from_millis(500)).await;
    let cached = rig.tree.get_data(rig.panel, PANEL_FIELD_Z).await.unwrap();
    assert_eq!(cached, first);
    assert_eq!(rig.panel().refresh_count(), 1);

    tokio::time::advance(Duration::from_millis(500)).await;
    let refreshed = rig.tree.get_data(rig.panel, PANEL_FIELD_Z).await.unwrap();
    assert_eq!(rig.panel().refresh_count(), 2);
    assert_ne!(refreshed, first);
}

#[tokio::test(start_paused = true)]
async fn test_cache_refreshed_by_every_move() {
    init_test_logging();
    let rig = PanelRigBuilder::new()
        .update_interval(Duration::from_secs(3600))
        .build();

    rig.tree.get_data(rig.panel, PANEL_FIELD_X).await.unwrap();
    assert_eq!(rig.panel().refresh_count(), 1);

    rig.operate_panel(PANEL_OP_READ_ALL, &[]).await.assert_good();
    assert_eq!(rig.panel().refresh_count(), 2);

    rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(0.5))
        .await
        .assert_good();
    assert_eq!(rig.panel().refresh_count(), 3);

    // Stop never reads the actuators.
    rig.operate_panel(PANEL_OP_STOP, &[]).await.assert_good();
    assert_eq!(rig.panel().refresh_count(), 3);
}

#[tokio::test]
async fn test_cache_read_all_reports_snapshot() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();

    let outcome = rig.operate_panel(PANEL_OP_READ_ALL, &[]).await.unwrap();
    let outputs = outcome.outputs().expect("ReadAll returns outputs").to_vec();
    assert_eq!(outputs.len(), 3);

    let snapshot = rig.panel().cached().await;
    let pose: Vec<f64> = outputs[0]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    let lengths: Vec<f64> = outputs[1]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    assert_eq!(pose, snapshot.pose.as_slice());
    assert_eq!(lengths, nominal_lengths().as_slice());
    assert_eq!(outputs[2].as_array().unwrap().len(), 9);
    assert_no_dispatch(&rig.port);
}

// =============================================================================
// State and Motion Policy
// =============================================================================

#[tokio::test]
async fn test_state_error_states_not_settable() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();

    for state in [DeviceState::OperableError, DeviceState::FatalError] {
        rig.tree
            .set_state(rig.panel, state)
            .await
            .assert_status(StatusCode::BAD_INVALID_ARGUMENT);
        assert_eq!(rig.tree.get(rig.panel).unwrap().state(), DeviceState::On);
    }
}

#[tokio::test]
async fn test_state_busy_is_recorded_locally() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();

    rig.tree.set_state(rig.panel, DeviceState::Busy).await.assert_good();
    assert_eq!(rig.tree.get(rig.panel).unwrap().state(), DeviceState::Busy);

    // The device still reports On; reading refreshes the local copy.
    assert_eq!(rig.tree.get_state(rig.panel).await.unwrap(), DeviceState::On);
    assert_eq!(rig.tree.get(rig.panel).unwrap().state(), DeviceState::On);
}

#[tokio::test]
async fn test_state_unknown_code_keeps_local_state() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();
    rig.tree.set_state(rig.panel, DeviceState::Busy).await.assert_good();
    rig.port.set(rig.panel_node().member("State"), 9_i32);

    rig.tree
        .get_state(rig.panel)
        .await
        .assert_status(StatusCode::BAD_INVALID_STATE);
    assert_eq!(rig.panel().state(), DeviceState::Busy);

    rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .assert_status(StatusCode::BAD_INVALID_STATE);
    assert_no_dispatch(&rig.port);
    assert_eq!(rig.panel().refresh_count(), 0);
}

#[tokio::test]
async fn test_state_reject_policy_refuses_busy_motion() {
    init_test_logging();
    let rig = PanelRigBuilder::new()
        .motion_policy(MotionPolicy::Reject)
        .build();
    rig.set_panel_state(DeviceState::Busy);

    rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .assert_status(StatusCode::BAD_INVALID_STATE);
    rig.operate_panel(PANEL_OP_MOVE_TO_LENGTHS, &vector_args(&nominal_lengths()))
        .await
        .assert_status(StatusCode::BAD_INVALID_STATE);
    assert_no_dispatch(&rig.port);
    assert_eq!(rig.panel().refresh_count(), 0);

    rig.operate_panel(PANEL_OP_STOP, &[]).await.assert_good();
    assert_dispatched_once(&rig.port, "Stop");
}

#[tokio::test]
async fn test_state_reject_policy_covers_fatal_error() {
    init_test_logging();
    let rig = PanelRigBuilder::new()
        .motion_policy(MotionPolicy::Reject)
        .build();
    rig.set_panel_state(DeviceState::FatalError);

    rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .assert_status(StatusCode::BAD_INVALID_STATE);
    assert_no_dispatch(&rig.port);

    // Not a motion: allowed under either policy.
    rig.operate_panel(PANEL_OP_READ_ALL, &[]).await.assert_good();
}

#[tokio::test]
async fn test_state_warn_policy_dispatches_while_busy() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();
    rig.set_panel_state(DeviceState::Busy);

    let outcome = rig
        .operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .unwrap();
    assert!(outcome.correlation().is_some());
    assert_eq!(rig.dispatch_count(), 1);
}

#[tokio::test]
async fn test_state_policy_can_change_at_runtime() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();
    rig.set_panel_state(DeviceState::Busy);

    rig.panel().set_motion_policy(MotionPolicy::Reject);
    rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .assert_status(StatusCode::BAD_INVALID_STATE);

    rig.panel().set_motion_policy(MotionPolicy::Warn);
    rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .assert_good();
    assert_eq!(rig.dispatch_count(), 1);
}

// =============================================================================
// Pose
// =============================================================================

#[tokio::test]
async fn test_pose_matches_platform_model() {
    init_test_logging();
    let platform = StewartPlatform::new(PanelType::default());
    let z = platform.neutral_height(NOMINAL_LENGTH);
    let pose = Vector6::new(1.0, -1.5, z + 2.0, 0.5, -0.3, 0.2);
    let lengths = platform.inverse(&pose);

    let rig = PanelRigBuilder::new().lengths(lengths).build();
    let snapshot = rig.panel().update_coords(&rig.tree).await.unwrap();

    assert_vector_approx(&snapshot.lengths, &lengths, 1e-12);
    assert_vector_approx(&snapshot.pose, &pose, 1e-6);
    assert_vector_approx(&rig.panel().platform().inverse(&snapshot.pose), &lengths, 1e-6);

    let x = rig.tree.get_data(rig.panel, PANEL_FIELD_X).await.unwrap();
    approx::assert_relative_eq!(x.as_f64().unwrap(), 1.0, epsilon = 1e-6);
}

#[tokio::test]
async fn test_pose_unreadable_actuator_fails_read() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();
    let sixth = rig.tree.get(rig.actuators[5]).unwrap().node().clone();
    rig.port.remove(&sixth.member("CurrentLength"));

    let result = rig.tree.get_data(rig.panel, PANEL_FIELD_X).await;
    result.assert_status(StatusCode::BAD_NODE_ID_UNKNOWN);
    assert!(!result.unwrap_err().is_local());
    assert_eq!(rig.panel().refresh_count(), 0);

    rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0))
        .await
        .assert_status(StatusCode::BAD_NODE_ID_UNKNOWN);
    assert_no_dispatch(&rig.port);
}

// =============================================================================
// Fields
// =============================================================================

#[tokio::test]
async fn test_data_safety_radius_round_trip() {
    init_test_logging();
    let rig = PanelRigBuilder::new().safety_radius(25.0).build();

    let radius = rig.tree.get_data(rig.panel, PANEL_FIELD_SAFETY_RADIUS).await.unwrap();
    assert_eq!(radius, Value::Float64(25.0));

    rig.tree
        .set_data(rig.panel, PANEL_FIELD_SAFETY_RADIUS, Value::Float64(12.5))
        .await
        .assert_good();
    assert_eq!(rig.panel().safety_radius(), 12.5);

    rig.tree
        .set_data(rig.panel, PANEL_FIELD_SAFETY_RADIUS, Value::Float64(-1.0))
        .await
        .assert_status(StatusCode::BAD_INVALID_ARGUMENT);
    assert_eq!(rig.panel().safety_radius(), 12.5);
}

#[tokio::test]
async fn test_data_pose_fields_are_read_only() {
    init_test_logging();
    let rig = PanelRigBuilder::new().build();

    rig.tree
        .set_data(rig.panel, PANEL_FIELD_X, Value::Float64(1.0))
        .await
        .assert_status(StatusCode::BAD_INVALID_ARGUMENT);
    rig.tree
        .get_data(rig.panel, 99)
        .await
        .assert_status(StatusCode::BAD_INVALID_ARGUMENT);
    assert_eq!(rig.port.write_count(), 0);
}
