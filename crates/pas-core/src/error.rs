// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for the panel alignment system.
//!
//! Every error maps onto the status-code space the device server speaks, so
//! that a controller call always resolves to a single [`StatusCode`].
//!
//! # Error Hierarchy
//!
//! ```text
//! PasError (root)
//! ├── ControllerError    - getData/setData/operate failures
//! │   └── PortError      - remote data port failures, propagated unchanged
//! ├── PortError
//! └── RegistrationError  - child registration policy violations
//! ```
//!
//! # Examples
//!
//! ```
//! use pas_core::error::{ControllerError, PortError};
//! use pas_core::status::StatusCode;
//!
//! let err = ControllerError::invalid_argument("unknown offset 99");
//! assert_eq!(err.status_code(), StatusCode::BAD_INVALID_ARGUMENT);
//!
//! let err: ControllerError = PortError::NotConnected.into();
//! assert_eq!(err.status_code(), StatusCode::BAD_SERVER_NOT_CONNECTED);
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::StatusCode;
use crate::types::{DeviceType, Identity};

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Result type for remote data port operations.
pub type PortResult<T> = Result<T, PortError>;

/// Result type for the crate-level error.
pub type PasResult<T> = Result<T, PasError>;

// =============================================================================
// PasError - Root Error Type
// =============================================================================

/// The root error type.
#[derive(Debug, Error)]
pub enum PasError {
    /// Controller error.
    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    /// Remote data port error.
    #[error("Port error: {0}")]
    Port(#[from] PortError),

    /// Child registration error.
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),
}

impl PasError {
    /// Returns the status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PasError::Controller(e) => e.status_code(),
            PasError::Port(e) => e.status_code(),
            PasError::Registration(_) => StatusCode::BAD_INVALID_ARGUMENT,
        }
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            PasError::Controller(e) => e.error_type(),
            PasError::Port(e) => e.error_type(),
            PasError::Registration(_) => "registration",
        }
    }
}

// =============================================================================
// PortError
// =============================================================================

/// Errors raised by the remote data port.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PortError {
    /// No session to the device server.
    #[error("Not connected to device server")]
    NotConnected,

    /// The request timed out.
    #[error("Request timed out after {duration:?}")]
    Timeout {
        /// The elapsed duration.
        duration: Duration,
    },

    /// The node does not exist on the server.
    #[error("Unknown node: {node}")]
    NodeUnknown {
        /// The node name.
        node: String,
    },

    /// The server answered a read or write with a bad status.
    #[error("Bad status for '{node}': {status}")]
    BadStatus {
        /// The node name.
        node: String,
        /// The returned status.
        status: StatusCode,
    },

    /// A method call failed.
    #[error("Method '{method}' on '{object}' failed: {status}")]
    MethodFailed {
        /// The object node.
        object: String,
        /// The method name.
        method: String,
        /// The returned status.
        status: StatusCode,
    },

    /// A value of an unexpected type was returned.
    #[error("Type mismatch for '{node}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// The node name.
        node: String,
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        actual: &'static str,
    },

    /// The request was malformed before it reached the server.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },

    /// Transport failure.
    #[error("Communication error: {message}")]
    Communication {
        /// Error message.
        message: String,
    },
}

impl PortError {
    /// Creates a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Creates an unknown node error.
    pub fn node_unknown(node: impl fmt::Display) -> Self {
        Self::NodeUnknown {
            node: node.to_string(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node: impl fmt::Display, status: StatusCode) -> Self {
        Self::BadStatus {
            node: node.to_string(),
            status,
        }
    }

    /// Creates a method failure.
    pub fn method_failed(
        object: impl fmt::Display,
        method: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self::MethodFailed {
            object: object.to_string(),
            method: method.into(),
            status,
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(
        node: impl fmt::Display,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            node: node.to_string(),
            expected,
            actual,
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// Returns the status code carried by this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortError::NotConnected => StatusCode::BAD_SERVER_NOT_CONNECTED,
            PortError::Timeout { .. } => StatusCode::BAD_TIMEOUT,
            PortError::NodeUnknown { .. } => StatusCode::BAD_NODE_ID_UNKNOWN,
            PortError::BadStatus { status, .. } | PortError::MethodFailed { status, .. } => *status,
            PortError::TypeMismatch { .. } => StatusCode::BAD_INTERNAL_ERROR,
            PortError::InvalidRequest { .. } => StatusCode::BAD_INVALID_ARGUMENT,
            PortError::Communication { .. } => StatusCode::BAD_COMMUNICATION_ERROR,
        }
    }

    /// Returns `true` if a later attempt could succeed.
    ///
    /// Nothing in the controller layer retries; this is reported for
    /// operators and logs only.
    pub fn is_retryable(&self) -> bool {
        match self {
            PortError::NotConnected | PortError::Timeout { .. } | PortError::Communication { .. } => {
                true
            }
            PortError::BadStatus { status, .. } | PortError::MethodFailed { status, .. } => matches!(
                *status,
                StatusCode::BAD_TIMEOUT
                    | StatusCode::BAD_COMMUNICATION_ERROR
                    | StatusCode::BAD_SERVER_NOT_CONNECTED
            ),
            _ => false,
        }
    }

    /// Returns the error type for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            PortError::NotConnected => "not_connected",
            PortError::Timeout { .. } => "timeout",
            PortError::NodeUnknown { .. } => "node_unknown",
            PortError::BadStatus { .. } => "bad_status",
            PortError::MethodFailed { .. } => "method_failed",
            PortError::TypeMismatch { .. } => "type_mismatch",
            PortError::InvalidRequest { .. } => "invalid_request",
            PortError::Communication { .. } => "communication",
        }
    }
}

// =============================================================================
// CollisionViolation
// =============================================================================

/// A single sensor whose predicted reading leaves the safety zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionViolation {
    /// The edge the sensor belongs to.
    pub edge: Identity,
    /// Index of the sensor within the edge's readings.
    pub sensor: usize,
    /// Predicted distance from the camera centre, in pixels.
    pub deviation: f64,
    /// The safety radius in force.
    pub limit: f64,
}

impl fmt::Display for CollisionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "edge {} sensor {}: {:.3} > {:.3}",
            self.edge, self.sensor, self.deviation, self.limit
        )
    }
}

fn join_violations(violations: &[CollisionViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// ControllerError
// =============================================================================

/// Errors returned by controller `get_data`/`set_data`/`operate` calls.
#[derive(Debug, Clone, Error)]
pub enum ControllerError {
    /// Offset, argument or requested state outside the supported set.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// The device reported or is in a state that does not allow the request.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message.
        message: String,
    },

    /// The target is read-only.
    #[error("Not writable: {what}")]
    NotWritable {
        /// What was written.
        what: String,
    },

    /// The collision predictor vetoed a motion. Nothing was sent.
    #[error("Motion vetoed by collision prediction ({})", join_violations(.violations))]
    CollisionPredicted {
        /// Every sensor predicted to leave its safety zone.
        violations: Vec<CollisionViolation>,
    },

    /// The collision check could not be evaluated. Nothing was sent.
    #[error("Collision check unavailable: {message}")]
    CollisionCheckUnavailable {
        /// Error message.
        message: String,
    },

    /// Remote data port failure, propagated unchanged.
    #[error(transparent)]
    Port(#[from] PortError),
}

impl ControllerError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a not writable error.
    pub fn not_writable(what: impl Into<String>) -> Self {
        Self::NotWritable { what: what.into() }
    }

    /// Creates a collision-check-unavailable error.
    pub fn collision_check_unavailable(message: impl Into<String>) -> Self {
        Self::CollisionCheckUnavailable {
            message: message.into(),
        }
    }

    /// Returns the status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ControllerError::InvalidArgument { .. } => StatusCode::BAD_INVALID_ARGUMENT,
            ControllerError::InvalidState { .. } => StatusCode::BAD_INVALID_STATE,
            ControllerError::NotWritable { .. } => StatusCode::BAD_NOT_WRITABLE,
            ControllerError::CollisionPredicted { .. }
            | ControllerError::CollisionCheckUnavailable { .. } => StatusCode::BAD,
            ControllerError::Port(e) => e.status_code(),
        }
    }

    /// Returns `true` if the error was raised locally and nothing reached the device.
    pub fn is_local(&self) -> bool {
        !matches!(self, ControllerError::Port(_))
    }

    /// Returns the error type for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            ControllerError::InvalidArgument { .. } => "invalid_argument",
            ControllerError::InvalidState { .. } => "invalid_state",
            ControllerError::NotWritable { .. } => "not_writable",
            ControllerError::CollisionPredicted { .. } => "collision_predicted",
            ControllerError::CollisionCheckUnavailable { .. } => "collision_check_unavailable",
            ControllerError::Port(e) => e.error_type(),
        }
    }
}

// =============================================================================
// RegistrationError
// =============================================================================

/// Errors raised while linking controllers into a topology.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The parent does not accept children of this type.
    #[error("{parent} '{parent_id}' does not accept {child} children")]
    UnsupportedChildType {
        /// Parent device type.
        parent: DeviceType,
        /// Parent identity.
        parent_id: Identity,
        /// Rejected child type.
        child: DeviceType,
    },

    /// A node index does not refer to a node in the topology.
    #[error("Unknown node index {index}")]
    UnknownNode {
        /// The offending index.
        index: usize,
    },

    /// A device was added twice to the topology under the same identity.
    #[error("Duplicate {device_type} '{identity}'")]
    DuplicateDevice {
        /// Device type.
        device_type: DeviceType,
        /// Duplicated identity.
        identity: Identity,
    },
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ControllerError::invalid_state("x").status_code(),
            StatusCode::BAD_INVALID_STATE
        );
        assert_eq!(
            ControllerError::not_writable("state").status_code(),
            StatusCode::BAD_NOT_WRITABLE
        );
        let veto = ControllerError::CollisionPredicted { violations: vec![] };
        assert_eq!(veto.status_code(), StatusCode::BAD);
        assert!(veto.is_local());
    }

    #[test]
    fn test_port_error_propagates_status() {
        let err: ControllerError =
            PortError::method_failed("ns=2;s=Panel_1", "MoveToLengths", StatusCode::BAD_INVALID_STATE)
                .into();
        assert_eq!(err.status_code(), StatusCode::BAD_INVALID_STATE);
        assert!(!err.is_local());
    }

    #[test]
    fn test_retryable() {
        assert!(PortError::NotConnected.is_retryable());
        assert!(PortError::timeout(Duration::from_secs(1)).is_retryable());
        assert!(!PortError::node_unknown("ns=2;s=X").is_retryable());
    }

    #[test]
    fn test_violation_message() {
        let err = ControllerError::CollisionPredicted {
            violations: vec![CollisionViolation {
                edge: Identity::named("1001+1002"),
                sensor: 1,
                deviation: 12.5,
                limit: 10.0,
            }],
        };
        assert_eq!(
            err.to_string(),
            "Motion vetoed by collision prediction (edge 1001+1002 sensor 1: 12.500 > 10.000)"
        );
    }

    #[test]
    fn test_root_error() {
        let err: PasError = RegistrationError::UnknownNode { index: 3 }.into();
        assert_eq!(err.error_type(), "registration");
        assert_eq!(err.status_code(), StatusCode::BAD_INVALID_ARGUMENT);
    }
}
