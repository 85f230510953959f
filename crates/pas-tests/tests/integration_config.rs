// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Config Integration Tests
//!
//! Integration tests for configuration files and the runtime built on them:
//!
//! - YAML, TOML and JSON documents loaded from disk
//! - Validation errors surfaced by the loader
//! - Simulated plant runs over a loaded topology
//!
//! ## Test Categories
//!
//! - `test_load_*`: File formats and resolved settings
//! - `test_reject_*`: Invalid documents
//! - `test_runtime_*`: End-to-end runs of the simulated plant
//! - `test_warnings_*`: Valid but suspicious setups

use std::time::Duration;

use pas_bin::commands::collect_warnings;
use pas_bin::{BinError, MoveOutcome};
use pas_config::{ConfigError, LogFormat, LogLevel, DEFAULT_SAFETY_RADIUS};
use pas_control::{MotionPolicy, PanelType};

use pas_tests::prelude::*;

const TWO_PANEL: &str = "two_panel.yaml";

fn panel_with_actuators(positions: &[u32]) -> String {
    let actuators: String = positions
        .iter()
        .map(|p| format!("      - {{ position: {}, serial: {} }}\n", p, 10 + p))
        .collect();
    format!(
        "panels:\n  - position: 1001\n    serial: 1\n    actuators:\n{}",
        actuators
    )
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_two_panel_yaml() {
    let harness = ConfigHarness::new("config_yaml");
    harness.write(TWO_PANEL, &ConfigFixtures::two_panel_yaml(0.4, 40.0));

    let config = harness.load(TWO_PANEL).unwrap();
    assert_eq!(config.panels.len(), 2);
    assert_eq!(config.actuator_count(), 12);
    assert_eq!(config.edges.len(), 1);
    assert_eq!(config.edges[0].name, EDGE_NAME);

    let mpes = config.mpes_by_serial(500).unwrap();
    assert_eq!(mpes.sides.len(), 2);
    assert!(mpes.calibration().is_ok());

    let panel = config.panel(PANEL_POSITION).unwrap();
    let settings = config.panel_settings(panel);
    assert_eq!(settings.safety_radius, 40.0);
    assert_eq!(settings.motion_policy, MotionPolicy::Warn);
}

#[test]
fn test_load_single_panel_toml() {
    let harness = ConfigHarness::new("config_toml");
    harness.write("single.toml", ConfigFixtures::single_panel_toml());

    let config = harness.load("single.toml").unwrap();
    assert_eq!(config.port.namespace, 3);
    assert_eq!(config.panel_defaults.motion_policy, MotionPolicy::Reject);
    assert_eq!(config.actuator_count(), 6);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, LogFormat::Json);

    let panel = config.panel(PANEL_POSITION).unwrap();
    let settings = config.panel_settings(panel);
    assert_eq!(settings.update_interval, Duration::from_millis(1000));
    assert_eq!(settings.safety_radius, DEFAULT_SAFETY_RADIUS);
    assert_eq!(settings.panel_type, PanelType::default());
    assert!(config.mpes.is_empty());
}

#[test]
fn test_load_bare_panel_json() {
    let harness = ConfigHarness::new("config_json");
    harness.write("bare.json", ConfigFixtures::bare_panel_json());

    let config = harness.load("bare.json").unwrap();
    assert_eq!(config.panels.len(), 1);
    assert_eq!(config.actuator_count(), 0);
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(config.logging.format, LogFormat::Compact);
}

#[test]
fn test_load_missing_file() {
    let harness = ConfigHarness::new("config_missing");

    let err = harness.load("absent.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
    assert!(err.is_io_error());
    assert_eq!(err.error_type(), "file_not_found");
}

#[test]
fn test_load_unsupported_extension() {
    let harness = ConfigHarness::new("config_ext");
    harness.write("plant.ini", "[panels]\n");

    let err = harness.load("plant.ini").unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
}

#[test]
fn test_load_parse_error_names_the_file() {
    let harness = ConfigHarness::new("config_parse");
    let path = harness.write("broken.yaml", "panels: [position: {");

    let err = harness.load("broken.yaml").unwrap_err();
    match err {
        ConfigError::Parse { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected a parse error, got {:?}", other),
    }
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_reject_duplicate_panel_position() {
    let harness = ConfigHarness::new("config_dup");
    harness.write(
        "dup.yaml",
        "panels:\n  - { position: 1001, serial: 1 }\n  - { position: 1001, serial: 2 }\n",
    );

    let err = harness.load("dup.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::DuplicatePanel { position: 1001 }));
    assert!(err.is_validation_error());
}

#[test]
fn test_reject_actuator_position_out_of_range() {
    let harness = ConfigHarness::new("config_range");
    harness.write("range.yaml", &panel_with_actuators(&[1, 2, 3, 4, 5, 7]));

    let err = harness.load("range.yaml").unwrap_err();
    match &err {
        ConfigError::OutOfRange { field, value, .. } => {
            assert_eq!(field, "panels[0].actuators[5].position");
            assert_eq!(value, "7");
        }
        other => panic!("expected an out of range error, got {:?}", other),
    }
}

#[test]
fn test_reject_partial_actuator_set() {
    let harness = ConfigHarness::new("config_partial");
    harness.write("partial.yaml", &panel_with_actuators(&[1, 2, 3]));

    let err = harness.load("partial.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "panels[0].actuators"));
}

#[test]
fn test_reject_malformed_response_block() {
    let harness = ConfigHarness::new("config_block");
    let yaml = ConfigFixtures::two_panel_yaml(0.4, 40.0)
        .replace("[0, 0, 0, 0.4, 0, 0]]", "[0, 0, 0, 0.4, 0]]");
    harness.write(TWO_PANEL, &yaml);

    let err = harness.load(TWO_PANEL).unwrap_err();
    match err {
        ConfigError::Validation { field, message } => {
            assert!(field.starts_with("mpes[0].response"));
            assert!(message.contains("2 rows of 6 values"));
        }
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[test]
fn test_reject_unknown_edge_reference() {
    let harness = ConfigHarness::new("config_ref");
    let yaml = ConfigFixtures::two_panel_yaml(0.4, 40.0)
        .replace("panels: [1001, 1002]", "panels: [1001, 1003]");
    harness.write(TWO_PANEL, &yaml);

    let err = harness.load(TWO_PANEL).unwrap_err();
    match err {
        ConfigError::UnknownReference { edge, kind, key } => {
            assert_eq!(edge, EDGE_NAME);
            assert_eq!(kind, "panel");
            assert_eq!(key, 1003);
        }
        other => panic!("expected an unknown reference, got {:?}", other),
    }
}

#[test]
fn test_reject_surfaces_through_runtime() {
    let harness = ConfigHarness::new("config_runtime_err");
    harness.write(
        "dup.yaml",
        "panels:\n  - { position: 1001, serial: 1 }\n  - { position: 1001, serial: 2 }\n",
    );

    let err = harness.runtime("dup.yaml", Duration::ZERO).unwrap_err();
    assert!(matches!(err, BinError::Config(ConfigError::DuplicatePanel { .. })));
    assert_eq!(err.exit_code(), 1);
}

// =============================================================================
// Runtime
// =============================================================================

#[tokio::test]
async fn test_runtime_small_moves_complete() {
    let harness = ConfigHarness::new("runtime_small");
    harness.write(TWO_PANEL, &ConfigFixtures::two_panel_yaml(0.4, 40.0));
    let runtime = harness
        .runtime(TWO_PANEL, Duration::from_millis(1))
        .unwrap();

    let report = harness
        .within(runtime.simulate(2, 0.5, Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(report.moves.len(), 4);
    assert_eq!(report.completed(), 4);
    assert_eq!(report.vetoed(), 0);
    assert_eq!(report.failed(), 0);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["moves"][0]["outcome"], "completed");
    assert_eq!(json["moves"][0]["panel"], PANEL_POSITION);
    assert_eq!(json["moves"][3]["delta"], -0.5);

    // Out and back leaves every actuator where it started.
    let readout = runtime.read_panel(PANEL_POSITION).await.unwrap();
    assert_eq!(readout.edges, 1);
    for (length, nominal) in readout.lengths.iter().zip(nominal_lengths().iter()) {
        approx::assert_relative_eq!(*length, *nominal, epsilon = 1e-9);
    }
    assert!(runtime.all_panels_on().await.unwrap());
}

#[tokio::test]
async fn test_runtime_large_moves_vetoed() {
    let harness = ConfigHarness::new("runtime_large");
    harness.write(TWO_PANEL, &ConfigFixtures::two_panel_yaml(0.4, 40.0));
    let runtime = harness.runtime(TWO_PANEL, Duration::ZERO).unwrap();

    let report = harness
        .within(runtime.simulate(1, 100.0, Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(report.vetoed(), 2);
    for record in &report.moves {
        match &record.outcome {
            MoveOutcome::Vetoed { reason } => assert!(!reason.is_empty()),
            other => panic!("panel {} was not vetoed: {:?}", record.panel, other),
        }
    }
    assert_eq!(runtime.plant().port().async_call_count(), 0);
}

#[tokio::test]
async fn test_runtime_without_edges_is_unchecked() {
    let harness = ConfigHarness::new("runtime_no_edges");
    harness.write("single.toml", ConfigFixtures::single_panel_toml());
    let runtime = harness.runtime("single.toml", Duration::ZERO).unwrap();

    let report = harness
        .within(runtime.simulate(1, 100.0, Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(report.moves.len(), 1);
    assert_eq!(report.completed(), 1);
}

#[tokio::test]
async fn test_runtime_bare_panel_reports_nothing() {
    let harness = ConfigHarness::new("runtime_bare");
    harness.write("bare.json", ConfigFixtures::bare_panel_json());
    let runtime = harness.runtime("bare.json", Duration::ZERO).unwrap();

    let readout = runtime.read_panel(PANEL_POSITION).await.unwrap();
    assert_eq!(readout.serial, Some(7));
    assert!(readout.lengths.is_empty());
    assert!(readout.pose.is_empty());
    assert!(readout.pads.is_empty());
    assert_eq!(readout.edges, 0);

    let report = runtime
        .simulate(1, 1.0, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(report.count(|o| matches!(o, MoveOutcome::NoOp)), 1);
    assert_eq!(runtime.plant().port().async_call_count(), 0);
}

#[tokio::test]
async fn test_runtime_stop_all() {
    let harness = ConfigHarness::new("runtime_stop");
    harness.write(TWO_PANEL, &ConfigFixtures::two_panel_yaml(0.4, 40.0));
    let runtime = harness.runtime(TWO_PANEL, Duration::ZERO).unwrap();

    assert_eq!(runtime.stop_all().await, 0);
    assert_eq!(runtime.plant().port().calls_to("Stop").len(), 2);
    assert!(runtime.read_panel(9999).await.is_err());
}

// =============================================================================
// Warnings
// =============================================================================

#[test]
fn test_warnings_clean_topology() {
    let harness = ConfigHarness::new("warnings_clean");
    harness.write(TWO_PANEL, &ConfigFixtures::two_panel_yaml(0.4, 40.0));

    let config = harness.load(TWO_PANEL).unwrap();
    assert!(collect_warnings(&config).is_empty());
}

#[test]
fn test_warnings_unchecked_and_idle_panels() {
    let harness = ConfigHarness::new("warnings_flagged");
    harness.write("single.toml", ConfigFixtures::single_panel_toml());
    harness.write("bare.json", ConfigFixtures::bare_panel_json());

    let single = collect_warnings(&harness.load("single.toml").unwrap());
    assert_eq!(single.len(), 1);
    assert!(single[0].contains("not collision checked"));

    let bare = collect_warnings(&harness.load("bare.json").unwrap());
    assert_eq!(bare.len(), 1);
    assert!(bare[0].contains("no actuators"));
}
