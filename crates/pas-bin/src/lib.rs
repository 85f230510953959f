// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # pas-bin
//!
//! CLI binary for the PAS panel alignment system.
//!
//! - CLI argument parsing with clap
//! - Topology assembly from the configuration
//! - A simulated device server to drive the topology against
//! - Logging initialization
//! - Command implementations (validate, simulate, panel, version)
//!
//! ## Architecture
//!
//! ```text
//!                     ┌─────────────┐
//!                     │   main.rs   │
//!                     └──────┬──────┘
//!                            │
//!                     ┌──────▼──────┐
//!                     │    cli.rs   │
//!                     └──────┬──────┘
//!                            │
//!               ┌────────────┼────────────┐
//!               ▼            ▼            ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └──────────┘ └────┬─────┘ └──────────┘
//!                          │
//!                   ┌──────▼──────┐
//!                   │ sim/topology│
//!                   └──────┬──────┘
//!                          │
//!                   ┌──────▼──────┐
//!                   │   pas-*     │
//!                   │  (crates)   │
//!                   └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Validate configuration
//! pas -c pas.yaml validate
//!
//! # Move every panel 0.5 mm out and back
//! pas simulate --steps 2 --delta 0.5
//!
//! # Read one panel
//! pas panel 1001 read -f json
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;
pub mod sim;
pub mod topology;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{MoveOutcome, MoveRecord, PanelReadout, PlantRuntime, SimulationReport};
pub use sim::SimulatedPlant;
pub use topology::build_tree;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
