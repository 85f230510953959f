// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # pas-control
//!
//! The composite controller tree of the PAS panel alignment system.
//!
//! - **Controller**: the `get_state`/`set_state`/`get_data`/`set_data`/`operate`
//!   contract and the typed offsets behind it
//! - **Controllers**: panel, actuator, MPES and edge controllers
//! - **Tree**: the arena holding every controller and the builder that links them
//! - **Kinematics**: Stewart-platform inverse and forward kinematics
//! - **Collision**: prediction of edge-sensor spot motion from a length change
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  get_data / set_data / operate (offsets)
//! │  DeviceTree  │────────────────────────────────────────┐
//! └──────┬───────┘                                        │
//!        │ NodeIndex                                      ▼
//! ┌──────▼───────┐  actuators  ┌──────────┐       ┌──────────────┐
//! │    Panel     │────────────►│ Actuator │──────►│ DeviceClient │
//! │ (cache, IK)  │  edges      └──────────┘       └──────┬───────┘
//! │              │──────┐      ┌──────────┐              │
//! └──────────────┘      └─────►│   Edge   │──► MPES ─────┘
//!                              └──────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod collision;
pub mod controller;
pub mod controllers;
pub mod kinematics;
pub mod tree;

pub use collision::{CollisionPredictor, CollisionReport, EdgeResponse, SensorDeviation};
pub use controller::{
    status_of, Children, DeviceField, DeviceOperation, NodeIndex, OperateOutcome, PasController,
};
pub use controllers::{
    ActuatorController, ActuatorField, ActuatorOperation, EdgeController, EdgeField,
    EdgeOperation, MotionPolicy, MpesCalibration, MpesController, MpesField, MpesOperation,
    MpesReading, PanelController, PanelField, PanelOperation, PanelSettings, PanelSide,
    PanelSnapshot, ResponseBlock, DEFAULT_SAFETY_RADIUS, DEFAULT_UPDATE_INTERVAL,
};
pub use kinematics::{PanelType, PlatformSolution, StewartPlatform};
pub use tree::{DeviceNode, DeviceTree, TopologyBuilder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
