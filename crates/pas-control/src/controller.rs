// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The capability contract shared by every device controller.
//!
//! Each device type exposes the same five entry points: `get_state`,
//! `set_state`, `get_data`, `set_data` and `operate`. On the wire these are
//! addressed by a numeric offset whose meaning depends on the device type.
//! Here every device type declares a closed [`DeviceField`] enum and a closed
//! [`DeviceOperation`] enum, and only the raw surface on
//! [`DeviceTree`](crate::tree::DeviceTree) deals in numbers.

use std::fmt;

use async_trait::async_trait;
use nalgebra::Vector6;

use pas_core::error::{ControllerError, ControllerResult};
use pas_core::node::NodeName;
use pas_core::registry::ChildRegistry;
use pas_core::status::StatusCode;
use pas_core::types::{DeviceState, DeviceType, Identity, Value};
use pas_opcua::{CorrelationId, DispatchHandle};

use crate::tree::DeviceTree;

// =============================================================================
// NodeIndex
// =============================================================================

/// Stable index of a controller in the [`DeviceTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

impl NodeIndex {
    /// Returns the raw index.
    #[inline]
    pub fn get(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Registry of child links held by composite controllers.
pub type Children = ChildRegistry<NodeIndex>;

// =============================================================================
// Offsets
// =============================================================================

/// A readable/writable property of a device type.
pub trait DeviceField: Sized + Copy + fmt::Debug + Send + Sync {
    /// Maps a numeric offset to a field.
    fn from_offset(offset: u32) -> ControllerResult<Self>;

    /// Returns the numeric offset of this field.
    fn offset(&self) -> u32;
}

/// A command accepted by `operate` on a device type.
pub trait DeviceOperation: Sized + fmt::Debug + Send + Sync {
    /// Builds an operation from a numeric offset and its arguments.
    fn from_offset(offset: u32, args: &[Value]) -> ControllerResult<Self>;

    /// Returns the name of the operation, which is also the remote method name.
    fn name(&self) -> &'static str;
}

pub(crate) fn unknown_offset(device_type: DeviceType, kind: &str, offset: u32) -> ControllerError {
    ControllerError::invalid_argument(format!("{} has no {} at offset {}", device_type, kind, offset))
}

// =============================================================================
// Argument parsing
// =============================================================================

pub(crate) fn expect_arity(op: &str, args: &[Value], expected: usize) -> ControllerResult<()> {
    if args.len() != expected {
        return Err(ControllerError::invalid_argument(format!(
            "{} takes {} argument(s), got {}",
            op,
            expected,
            args.len()
        )));
    }
    Ok(())
}

pub(crate) fn f64_arg(op: &str, args: &[Value], index: usize) -> ControllerResult<f64> {
    let value = &args[index];
    value.as_f64().ok_or_else(|| {
        ControllerError::invalid_argument(format!(
            "{} argument {} must be numeric, got {}",
            op,
            index,
            value.type_name()
        ))
    })
}

pub(crate) fn i32_arg(op: &str, args: &[Value], index: usize) -> ControllerResult<i32> {
    let value = &args[index];
    value
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| {
            ControllerError::invalid_argument(format!(
                "{} argument {} must be a 32-bit integer, got {}",
                op,
                index,
                value.type_name()
            ))
        })
}

pub(crate) fn vector6_args(op: &str, args: &[Value]) -> ControllerResult<Vector6<f64>> {
    expect_arity(op, args, 6)?;
    let mut out = Vector6::zeros();
    for i in 0..6 {
        out[i] = f64_arg(op, args, i)?;
    }
    Ok(out)
}

pub(crate) fn vector6_values(v: &Vector6<f64>) -> Vec<Value> {
    v.iter().copied().map(Value::Float64).collect()
}

// =============================================================================
// OperateOutcome
// =============================================================================

/// Successful result of an `operate` call.
#[derive(Debug)]
pub enum OperateOutcome {
    /// Nothing to do; the call was a legitimate no-op.
    NoOp,
    /// Finished synchronously with these outputs.
    Done(Vec<Value>),
    /// Dispatched asynchronously; completion arrives on the event channel.
    Dispatched(DispatchHandle),
}

impl OperateOutcome {
    /// Status reported to callers. Every outcome is good.
    pub fn status(&self) -> StatusCode {
        StatusCode::GOOD
    }

    /// Returns `true` if the call did nothing.
    pub fn is_noop(&self) -> bool {
        matches!(self, OperateOutcome::NoOp)
    }

    /// Returns the correlation of an async dispatch.
    pub fn correlation(&self) -> Option<CorrelationId> {
        match self {
            OperateOutcome::Dispatched(handle) => Some(handle.correlation),
            _ => None,
        }
    }

    /// Returns the dispatch handle, if any.
    pub fn into_handle(self) -> Option<DispatchHandle> {
        match self {
            OperateOutcome::Dispatched(handle) => Some(handle),
            _ => None,
        }
    }

    /// Returns the synchronous outputs, if any.
    pub fn outputs(&self) -> Option<&[Value]> {
        match self {
            OperateOutcome::Done(values) => Some(values),
            _ => None,
        }
    }
}

/// Collapses a controller result to the status code seen by remote callers.
pub fn status_of<T>(result: &ControllerResult<T>) -> StatusCode {
    match result {
        Ok(_) => StatusCode::GOOD,
        Err(e) => e.status_code(),
    }
}

// =============================================================================
// PasController
// =============================================================================

/// Uniform surface of every device controller.
///
/// Controllers live in a [`DeviceTree`] and reach their children through it,
/// so every call that may touch a child receives the tree.
#[async_trait]
pub trait PasController: Send + Sync {
    /// Property selector of this device type.
    type Field: DeviceField;
    /// Command set of this device type.
    type Operation: DeviceOperation;

    /// Returns the device type.
    fn device_type(&self) -> DeviceType;

    /// Returns the identity.
    fn identity(&self) -> &Identity;

    /// Returns the device's object node on the server.
    fn node(&self) -> &NodeName;

    /// Returns the child registry, for composite controllers.
    fn children(&self) -> Option<&Children> {
        None
    }

    /// Returns the child registry mutably, for composite controllers.
    fn children_mut(&mut self) -> Option<&mut Children> {
        None
    }

    /// Returns the last known state without contacting the device.
    fn state(&self) -> DeviceState;

    /// Refreshes and returns the device state.
    async fn get_state(&self) -> ControllerResult<DeviceState>;

    /// Requests a state transition.
    async fn set_state(&self, state: DeviceState) -> ControllerResult<()>;

    /// Reads a property.
    async fn get_data(&self, tree: &DeviceTree, field: Self::Field) -> ControllerResult<Value>;

    /// Writes a property.
    async fn set_data(
        &self,
        tree: &DeviceTree,
        field: Self::Field,
        value: Value,
    ) -> ControllerResult<()>;

    /// Runs a command.
    async fn operate(
        &self,
        tree: &DeviceTree,
        operation: Self::Operation,
    ) -> ControllerResult<OperateOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector6_args() {
        let args: Vec<Value> = (1..=6).map(Value::Int32).collect();
        let v = vector6_args("MoveDeltaLengths", &args).unwrap();
        assert_eq!(v, Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0));
        assert_eq!(vector6_values(&v)[5], Value::Float64(6.0));
    }

    #[test]
    fn test_bad_args_are_invalid_argument() {
        let short = vec![Value::Float64(1.0); 5];
        let err = vector6_args("MoveToLengths", &short).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_INVALID_ARGUMENT);

        let mut typed = vec![Value::Float64(1.0); 6];
        typed[3] = Value::String("x".into());
        assert!(matches!(
            vector6_args("MoveToLengths", &typed),
            Err(ControllerError::InvalidArgument { .. })
        ));

        assert!(i32_arg("FindHome", &[Value::Int64(1 << 40)], 0).is_err());
        assert_eq!(i32_arg("FindHome", &[Value::Int32(-1)], 0).unwrap(), -1);
    }

    #[test]
    fn test_status_of() {
        let ok: ControllerResult<()> = Ok(());
        assert_eq!(status_of(&ok), StatusCode::GOOD);
        let err: ControllerResult<()> = Err(ControllerError::invalid_state("x"));
        assert_eq!(status_of(&err), StatusCode::BAD_INVALID_STATE);
    }
}
