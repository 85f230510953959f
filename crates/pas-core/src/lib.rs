// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # pas-core
//!
//! Core abstractions and shared types for the PAS panel alignment system.
//!
//! This crate provides the foundational types used across all PAS components:
//!
//! - **Types**: `DeviceType`, `Identity`, `DeviceState`, `ErrorState`, `Value`
//! - **Node**: Opaque `ns=<n>;s=<path>` node names on the device server
//! - **Status**: OPC UA style status codes
//! - **Error**: Unified error hierarchy mapped onto status codes
//! - **Registry**: The per-node child registry of the composite controller tree
//!
//! ## Example
//!
//! ```rust
//! use pas_core::node::NodeName;
//! use pas_core::types::{DeviceType, Identity};
//!
//! let panel = Identity::new(0, 1001);
//! let node = NodeName::for_device(2, DeviceType::Panel, &panel).member("State");
//! assert_eq!(node.as_str(), "ns=2;s=Panel_0.State");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod node;
pub mod registry;
pub mod status;
pub mod types;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::{
    CollisionViolation, ControllerError, ControllerResult, PasError, PasResult, PortError,
    PortResult, RegistrationError,
};
pub use node::{NodeName, DEFAULT_NAMESPACE};
pub use registry::{ChildEntry, ChildRegistry, Registered};
pub use status::StatusCode;
pub use types::{DeviceState, DeviceType, ErrorState, Identity, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
