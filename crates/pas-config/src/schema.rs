// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for PAS.
//!
//! # Schema Structure
//!
//! ```text
//! PasConfig
//! ├── port: PortConfig
//! ├── panel_defaults: PanelDefaults
//! ├── panels: Vec<PanelConfig>
//! │   └── actuators: Vec<ActuatorConfig>
//! ├── mpes: Vec<MpesConfig>
//! ├── edges: Vec<EdgeConfig>
//! └── logging: LoggingConfig
//! ```

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pas_control::{
    MotionPolicy, MpesCalibration, PanelSettings, PanelSide, PanelType, ResponseBlock,
};
use pas_core::node::{NodeName, DEFAULT_NAMESPACE};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default coordinate cache lifetime in milliseconds.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 5000;

/// Default collision safety radius in pixels.
pub const DEFAULT_SAFETY_RADIUS: f64 = 40.0;

/// Number of actuators on a panel.
pub const ACTUATORS_PER_PANEL: u32 = 6;

/// Rows of a response block.
pub const RESPONSE_ROWS: usize = 2;

/// Columns of a response block.
pub const RESPONSE_COLS: usize = 6;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for PAS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasConfig {
    /// Device server settings.
    #[serde(default)]
    pub port: PortConfig,

    /// Settings applied to every panel unless overridden.
    #[serde(default)]
    pub panel_defaults: PanelDefaults,

    /// Mirror panels.
    #[serde(default)]
    pub panels: Vec<PanelConfig>,

    /// Edge sensors.
    #[serde(default)]
    pub mpes: Vec<MpesConfig>,

    /// Panel edges.
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PasConfig {
    /// Validates the entire configuration.
    ///
    /// Checks value ranges, unique panel positions and MPES serials, and
    /// that every reference between devices resolves.
    pub fn validate(&self) -> ConfigResult<()> {
        self.panel_defaults.validate()?;

        let mut positions = HashSet::new();
        let mut serials = HashSet::new();
        for (i, panel) in self.panels.iter().enumerate() {
            if !positions.insert(panel.position) {
                return Err(ConfigError::DuplicatePanel {
                    position: panel.position,
                });
            }
            if !serials.insert(panel.serial) {
                return Err(ConfigError::validation(
                    format!("panels[{}].serial", i),
                    format!("serial {} is used by another panel", panel.serial),
                ));
            }
            panel.validate(i)?;
        }

        let mut mpes_serials = HashSet::new();
        for (i, mpes) in self.mpes.iter().enumerate() {
            if !mpes_serials.insert(mpes.serial) {
                return Err(ConfigError::validation(
                    format!("mpes[{}].serial", i),
                    format!("serial {} is used by another MPES", mpes.serial),
                ));
            }
            mpes.validate(i, &positions)?;
        }

        let mut edge_names = HashSet::new();
        for (i, edge) in self.edges.iter().enumerate() {
            if !edge_names.insert(edge.name.as_str()) {
                return Err(ConfigError::validation(
                    format!("edges[{}].name", i),
                    format!("edge '{}' is defined twice", edge.name),
                ));
            }
            edge.validate(i, &positions, &mpes_serials)?;
        }

        Ok(())
    }

    /// Returns a panel configuration by position.
    pub fn panel(&self, position: u32) -> Option<&PanelConfig> {
        self.panels.iter().find(|p| p.position == position)
    }

    /// Returns an MPES configuration by serial.
    pub fn mpes_by_serial(&self, serial: u32) -> Option<&MpesConfig> {
        self.mpes.iter().find(|m| m.serial == serial)
    }

    /// Returns the total number of actuators.
    pub fn actuator_count(&self) -> usize {
        self.panels.iter().map(|p| p.actuators.len()).sum()
    }

    /// Resolves the effective settings of a panel.
    pub fn panel_settings(&self, panel: &PanelConfig) -> PanelSettings {
        let defaults = &self.panel_defaults;
        PanelSettings {
            safety_radius: panel.safety_radius.unwrap_or(defaults.safety_radius),
            update_interval: Duration::from_millis(
                panel
                    .update_interval_ms
                    .unwrap_or(defaults.update_interval_ms),
            ),
            motion_policy: defaults.motion_policy,
            panel_type: panel.panel_type.unwrap_or(defaults.panel_type),
        }
    }

    /// Resolves an optional node override against the configured namespace.
    ///
    /// A value starting with `ns=` is taken verbatim; anything else is a
    /// string path in the configured namespace.
    pub fn node_override(&self, node: Option<&str>) -> Option<NodeName> {
        node.map(|raw| {
            if raw.starts_with("ns=") {
                NodeName::new(raw)
            } else {
                NodeName::string(self.port.namespace, raw)
            }
        })
    }
}

// =============================================================================
// Port
// =============================================================================

/// Device server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortConfig {
    /// Namespace of default device node names.
    #[serde(default = "default_namespace")]
    pub namespace: u16,
}

fn default_namespace() -> u16 {
    DEFAULT_NAMESPACE
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE,
        }
    }
}

// =============================================================================
// Panels
// =============================================================================

/// Settings applied to every panel unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelDefaults {
    /// Coordinate cache lifetime in milliseconds.
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,

    /// Collision safety radius in pixels.
    #[serde(default = "default_safety_radius")]
    pub safety_radius: f64,

    /// Handling of motion commands while Busy or in FatalError.
    #[serde(default)]
    pub motion_policy: MotionPolicy,

    /// Platform geometry.
    #[serde(default)]
    pub panel_type: PanelType,
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL_MS
}

fn default_safety_radius() -> f64 {
    DEFAULT_SAFETY_RADIUS
}

impl Default for PanelDefaults {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            safety_radius: DEFAULT_SAFETY_RADIUS,
            motion_policy: MotionPolicy::default(),
            panel_type: PanelType::default(),
        }
    }
}

impl PanelDefaults {
    /// Validates the defaults.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_interval("panel_defaults.update_interval_ms", self.update_interval_ms)?;
        validate_radius("panel_defaults.safety_radius", self.safety_radius)
    }
}

/// A mirror panel and its actuators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelConfig {
    /// Mounting position, e.g. 1001.
    pub position: u32,

    /// Serial number.
    pub serial: u32,

    /// Node path override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// Actuators, one per position 1..=6.
    #[serde(default)]
    pub actuators: Vec<ActuatorConfig>,

    /// Safety radius override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_radius: Option<f64>,

    /// Cache lifetime override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval_ms: Option<u64>,

    /// Platform geometry override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_type: Option<PanelType>,
}

impl PanelConfig {
    /// Validates the panel configuration.
    pub fn validate(&self, index: usize) -> ConfigResult<()> {
        let field = |name: &str| format!("panels[{}].{}", index, name);

        if let Some(radius) = self.safety_radius {
            validate_radius(&field("safety_radius"), radius)?;
        }
        if let Some(interval) = self.update_interval_ms {
            validate_interval(&field("update_interval_ms"), interval)?;
        }

        let mut seen = HashSet::new();
        for (j, actuator) in self.actuators.iter().enumerate() {
            if !(1..=ACTUATORS_PER_PANEL).contains(&actuator.position) {
                return Err(ConfigError::out_of_range(
                    format!("panels[{}].actuators[{}].position", index, j),
                    actuator.position,
                    1,
                    ACTUATORS_PER_PANEL,
                ));
            }
            if !seen.insert(actuator.position) {
                return Err(ConfigError::validation(
                    format!("panels[{}].actuators[{}].position", index, j),
                    format!("position {} is used twice", actuator.position),
                ));
            }
        }
        if !self.actuators.is_empty() && seen.len() != ACTUATORS_PER_PANEL as usize {
            return Err(ConfigError::validation(
                field("actuators"),
                format!(
                    "panel {} has {} actuators; a panel needs all {} or none",
                    self.position,
                    seen.len(),
                    ACTUATORS_PER_PANEL
                ),
            ));
        }
        Ok(())
    }
}

/// An actuator of a panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActuatorConfig {
    /// Position on the panel, 1..=6.
    pub position: u32,

    /// Serial number.
    pub serial: u32,

    /// Node path override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

// =============================================================================
// Sensors and Edges
// =============================================================================

/// An edge sensor with its calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MpesConfig {
    /// Serial number.
    pub serial: u32,

    /// Mounting position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,

    /// Node path override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// Side facing each panel, keyed by panel position.
    #[serde(default)]
    pub sides: BTreeMap<u32, PanelSide>,

    /// One 2x6 response block per side, row-major.
    #[serde(default)]
    pub response: BTreeMap<PanelSide, Vec<Vec<f64>>>,
}

impl MpesConfig {
    /// Validates the sensor configuration.
    pub fn validate(&self, index: usize, panel_positions: &HashSet<u32>) -> ConfigResult<()> {
        for (&panel, side) in &self.sides {
            if !panel_positions.contains(&panel) {
                return Err(ConfigError::validation(
                    format!("mpes[{}].sides", index),
                    format!("panel {} is not configured", panel),
                ));
            }
            if !self.response.contains_key(side) {
                return Err(ConfigError::validation(
                    format!("mpes[{}].response", index),
                    format!("side {:?} of panel {} has no response block", side, panel),
                ));
            }
        }

        for (side, rows) in &self.response {
            let field = format!("mpes[{}].response.{:?}", index, side);
            let well_formed = rows.len() == RESPONSE_ROWS
                && rows.iter().all(|row| row.len() == RESPONSE_COLS);
            if !well_formed {
                return Err(ConfigError::validation(
                    field,
                    format!(
                        "expected {} rows of {} values",
                        RESPONSE_ROWS, RESPONSE_COLS
                    ),
                ));
            }
            if rows.iter().flatten().any(|v| !v.is_finite()) {
                return Err(ConfigError::validation(field, "values must be finite"));
            }
        }
        Ok(())
    }

    /// Builds the calibration of a validated sensor.
    pub fn calibration(&self) -> ConfigResult<MpesCalibration> {
        let mut calibration = MpesCalibration::default();
        for (&panel, &side) in &self.sides {
            calibration = calibration.with_side(panel, side);
        }
        for (&side, rows) in &self.response {
            calibration = calibration.with_response(side, response_block(rows)?);
        }
        Ok(calibration)
    }
}

fn response_block(rows: &[Vec<f64>]) -> ConfigResult<ResponseBlock> {
    if rows.len() != RESPONSE_ROWS || rows.iter().any(|row| row.len() != RESPONSE_COLS) {
        return Err(ConfigError::validation(
            "response",
            format!("expected {} rows of {} values", RESPONSE_ROWS, RESPONSE_COLS),
        ));
    }
    Ok(ResponseBlock::from_fn(|r, c| rows[r][c]))
}

/// A panel edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeConfig {
    /// Edge name, e.g. `1001+1002`.
    pub name: String,

    /// Positions of the panels sharing the edge.
    pub panels: Vec<u32>,

    /// Serials of the sensors mounted across the edge.
    #[serde(default)]
    pub mpes: Vec<u32>,
}

impl EdgeConfig {
    /// Validates the edge against the configured panels and sensors.
    pub fn validate(
        &self,
        index: usize,
        panel_positions: &HashSet<u32>,
        mpes_serials: &HashSet<u32>,
    ) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation(
                format!("edges[{}].name", index),
                "must not be empty",
            ));
        }
        if !(2..=3).contains(&self.panels.len()) {
            return Err(ConfigError::validation(
                format!("edges[{}].panels", index),
                format!("an edge joins 2 or 3 panels, got {}", self.panels.len()),
            ));
        }
        if let Some(&missing) = self.panels.iter().find(|p| !panel_positions.contains(p)) {
            return Err(ConfigError::unknown_reference(&self.name, "panel", missing));
        }
        if let Some(&missing) = self.mpes.iter().find(|m| !mpes_serials.contains(m)) {
            return Err(ConfigError::unknown_reference(&self.name, "MPES", missing));
        }
        Ok(())
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON lines.
    Json,
}

impl LogFormat {
    /// Returns the format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_interval(field: &str, interval_ms: u64) -> ConfigResult<()> {
    if interval_ms == 0 {
        return Err(ConfigError::validation(field, "must be positive"));
    }
    Ok(())
}

fn validate_radius(field: &str, radius: f64) -> ConfigResult<()> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(ConfigError::validation(
            field,
            format!("must be a positive number of pixels, got {}", radius),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(position: u32, serial: u32) -> PanelConfig {
        PanelConfig {
            position,
            serial,
            node: None,
            actuators: (1..=6)
                .map(|p| ActuatorConfig {
                    position: p,
                    serial: serial * 10 + p,
                    node: None,
                })
                .collect(),
            safety_radius: None,
            update_interval_ms: None,
            panel_type: None,
        }
    }

    fn mpes(serial: u32, sides: &[(u32, PanelSide)]) -> MpesConfig {
        let block = vec![vec![0.4, 0.0, 0.0, 0.0, 0.0, 0.0], vec![0.0, 0.4, 0.0, 0.0, 0.0, 0.0]];
        MpesConfig {
            serial,
            position: None,
            node: None,
            sides: sides.iter().copied().collect(),
            response: [(PanelSide::L, block.clone()), (PanelSide::W, block)]
                .into_iter()
                .collect(),
        }
    }

    fn config() -> PasConfig {
        PasConfig {
            panels: vec![panel(1001, 1), panel(1002, 2)],
            mpes: vec![mpes(500, &[(1001, PanelSide::L), (1002, PanelSide::W)])],
            edges: vec![EdgeConfig {
                name: "1001+1002".to_string(),
                panels: vec![1001, 1002],
                mpes: vec![500],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = PasConfig::default();
        assert_eq!(config.port.namespace, 2);
        assert_eq!(config.panel_defaults.update_interval_ms, 5000);
        assert_eq!(config.panel_defaults.safety_radius, 40.0);
        assert_eq!(config.panel_defaults.motion_policy, MotionPolicy::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_valid_topology() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.actuator_count(), 12);
    }

    #[test]
    fn test_duplicate_panel_position() {
        let mut config = config();
        config.panels[1].position = 1001;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicatePanel { position: 1001 })
        ));
    }

    #[test]
    fn test_actuator_position_out_of_range() {
        let mut config = config();
        config.panels[0].actuators[5].position = 7;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_partial_actuator_set_rejected() {
        let mut config = config();
        config.panels[0].actuators.pop();
        assert!(config.validate().is_err());

        config.panels[0].actuators.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_response_block() {
        let mut config = config();
        config.mpes[0]
            .response
            .insert(PanelSide::L, vec![vec![1.0; 6]]);
        let err = config.validate().unwrap_err();
        assert!(err.is_validation_error());

        let mut config = self::config();
        config.mpes[0]
            .response
            .insert(PanelSide::W, vec![vec![1.0; 5], vec![1.0; 6]]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_edge_reference_must_resolve() {
        let mut config = config();
        config.edges[0].panels.push(1003);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownReference { kind: "panel", key: 1003, .. })
        ));

        let mut config = self::config();
        config.edges[0].mpes.push(999);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownReference { kind: "MPES", key: 999, .. })
        ));
    }

    #[test]
    fn test_non_positive_values_rejected() {
        let mut config = config();
        config.panel_defaults.safety_radius = 0.0;
        assert!(config.validate().is_err());

        let mut config = self::config();
        config.panels[0].update_interval_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_panel_settings_overrides() {
        let mut config = config();
        config.panels[0].safety_radius = Some(25.0);
        let settings = config.panel_settings(&config.panels[0]);
        assert_eq!(settings.safety_radius, 25.0);
        assert_eq!(settings.update_interval, Duration::from_millis(5000));

        let settings = config.panel_settings(&config.panels[1]);
        assert_eq!(settings.safety_radius, 40.0);
    }

    #[test]
    fn test_calibration() {
        let config = config();
        let calibration = config.mpes[0].calibration().unwrap();
        assert_eq!(calibration.sides.get(&1002), Some(&PanelSide::W));
        assert_eq!(calibration.response[&PanelSide::L][(1, 1)], 0.4);
    }

    #[test]
    fn test_node_override() {
        let config = PasConfig::default();
        assert_eq!(
            config.node_override(Some("Panel_X")).unwrap().as_str(),
            "ns=2;s=Panel_X"
        );
        assert_eq!(
            config.node_override(Some("ns=3;s=P")).unwrap().as_str(),
            "ns=3;s=P"
        );
        assert!(config.node_override(None).is_none());
    }
}
