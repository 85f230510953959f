// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # pas-config
//!
//! Configuration management for the PAS panel alignment system.
//!
//! ## Features
//!
//! - **Schema Definition**: panels, actuators, MPES calibration and edges
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `PAS_*` variables for panel defaults and logging
//! - **Validation**: value ranges and cross-references between devices
//!
//! ## Quick Start
//!
//! ```no_run
//! use pas_config::loader::load_config;
//!
//! let config = load_config("pas.yaml").unwrap();
//! println!("Panels: {}", config.panels.len());
//! println!("Edges: {}", config.edges.len());
//! ```
//!
//! ## Configuration Schema
//!
//! ```yaml
//! port:
//!   namespace: 2
//! panel_defaults:
//!   update_interval_ms: 5000
//!   safety_radius: 40.0
//!   motion_policy: warn
//!   panel_type: opt
//! panels:
//!   - position: 1001
//!     serial: 0
//!     actuators: [{ position: 1, serial: 2001 }]
//! mpes:
//!   - serial: 500
//!     sides: { 1001: l }
//!     response: { l: [[0.4, 0, 0, 0, 0, 0], [0, 0.4, 0, 0, 0, 0]] }
//! edges:
//!   - { name: "1001+1002", panels: [1001, 1002], mpes: [500] }
//! logging: { level: info, format: text }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    ActuatorConfig, EdgeConfig, LogFormat, LogLevel, LoggingConfig, MpesConfig, PanelConfig,
    PanelDefaults, PasConfig, PortConfig, ACTUATORS_PER_PANEL, DEFAULT_SAFETY_RADIUS,
    DEFAULT_UPDATE_INTERVAL_MS,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pas-config");
    }
}
