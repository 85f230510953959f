// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # PAS Integration Tests
//!
//! Integration tests for the PAS panel alignment system, with the fixtures,
//! builders and harness they share.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Pre-built calibrations, lengths and configuration files
//!   - `builders`: [`PanelRigBuilder`](common::builders::PanelRigBuilder) for
//!     hand-wired device trees over a simulated port
//!   - `assertions`: Status and geometry assertion helpers
//!   - `harness`: Config-file driven runs of the full CLI runtime
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p pas-tests
//!
//! # Run specific test suite
//! cargo test -p pas-tests --test integration_registry
//! cargo test -p pas-tests --test integration_panel
//! cargo test -p pas-tests --test integration_collision
//! cargo test -p pas-tests --test integration_dispatch
//! cargo test -p pas-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Registry Tests (`integration_registry.rs`)
//! - Idempotent registration and the child type policy
//! - Registration order and identity lookups
//!
//! ### Panel Tests (`integration_panel.rs`)
//! - Panels without actuators
//! - Coordinate cache staleness
//! - State guards and the busy policy
//! - Kinematics round trips
//!
//! ### Collision Tests (`integration_collision.rs`)
//! - Vetoed and allowed motions
//! - Sensor visibility
//!
//! ### Dispatch Tests (`integration_dispatch.rs`)
//! - Async completion delivery
//! - Pose targets dispatched as lengths
//!
//! ### Config Tests (`integration_config.rs`)
//! - File formats and validation
//! - End-to-end runs of the simulated plant
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use pas_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let rig = PanelRigBuilder::new().with_edge(Readings::centred(1)).build();
//!     let status = rig.operate_panel(PANEL_OP_MOVE_DELTA_LENGTHS, &deltas(1.0)).await;
//!     // ...
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::builders::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::{init_test_logging, temp_test_dir};
}
