// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Linear actuator controller.
//!
//! An actuator is a leaf of the tree. Its state and every field are read
//! from the device on demand; nothing is cached.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use pas_core::error::{ControllerError, ControllerResult};
use pas_core::node::NodeName;
use pas_core::types::{DeviceState, DeviceType, Identity, Value};
use pas_opcua::DeviceClient;

use super::{read_device_state, read_error_state};
use crate::controller::{
    expect_arity, f64_arg, i32_arg, unknown_offset, DeviceField, DeviceOperation, OperateOutcome,
    PasController,
};
use crate::tree::DeviceTree;

// =============================================================================
// Offsets
// =============================================================================

/// Actuator properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorField {
    /// Current length, mm.
    CurrentLength,
    /// Length change of the last move, mm.
    DeltaLength,
    /// Target length of the last move, mm.
    TargetLength,
    /// Mounting position.
    Position,
    /// Serial number.
    Serial,
    /// Error state code.
    ErrorState,
}

impl ActuatorField {
    fn member(&self) -> &'static str {
        match self {
            ActuatorField::CurrentLength => "CurrentLength",
            ActuatorField::DeltaLength => "DeltaLength",
            ActuatorField::TargetLength => "TargetLength",
            ActuatorField::Position => "Position",
            ActuatorField::Serial => "SerialNumber",
            ActuatorField::ErrorState => "ErrorState",
        }
    }
}

impl DeviceField for ActuatorField {
    fn from_offset(offset: u32) -> ControllerResult<Self> {
        Ok(match offset {
            0 => ActuatorField::CurrentLength,
            1 => ActuatorField::DeltaLength,
            2 => ActuatorField::TargetLength,
            3 => ActuatorField::Position,
            4 => ActuatorField::Serial,
            5 => ActuatorField::ErrorState,
            _ => return Err(unknown_offset(DeviceType::Actuator, "field", offset)),
        })
    }

    fn offset(&self) -> u32 {
        *self as u32
    }
}

/// Actuator commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorOperation {
    /// Move by a length change, mm. Asynchronous.
    MoveDeltaLength(f64),
    /// Move to an absolute length, mm. Asynchronous.
    MoveToLength(f64),
    /// Stop immediately.
    Stop,
    /// Power on.
    TurnOn,
    /// Power off.
    TurnOff,
    /// Clear one error by index.
    ClearError(i32),
    /// Clear every error.
    ClearAllErrors,
    /// Recover from a fatal error by re-homing from the last known good state.
    ForceRecover,
}

impl DeviceOperation for ActuatorOperation {
    fn from_offset(offset: u32, args: &[Value]) -> ControllerResult<Self> {
        let name = match offset {
            0 => "MoveDeltaLength",
            1 => "MoveToLength",
            2 => "Stop",
            3 => "TurnOn",
            4 => "TurnOff",
            5 => "ClearError",
            6 => "ClearAllErrors",
            7 => "ForceRecover",
            _ => return Err(unknown_offset(DeviceType::Actuator, "operation", offset)),
        };
        let arity = match offset {
            0 | 1 | 5 => 1,
            _ => 0,
        };
        expect_arity(name, args, arity)?;

        Ok(match offset {
            0 => ActuatorOperation::MoveDeltaLength(f64_arg(name, args, 0)?),
            1 => ActuatorOperation::MoveToLength(f64_arg(name, args, 0)?),
            2 => ActuatorOperation::Stop,
            3 => ActuatorOperation::TurnOn,
            4 => ActuatorOperation::TurnOff,
            5 => ActuatorOperation::ClearError(i32_arg(name, args, 0)?),
            6 => ActuatorOperation::ClearAllErrors,
            _ => ActuatorOperation::ForceRecover,
        })
    }

    fn name(&self) -> &'static str {
        match self {
            ActuatorOperation::MoveDeltaLength(_) => "MoveDeltaLength",
            ActuatorOperation::MoveToLength(_) => "MoveToLength",
            ActuatorOperation::Stop => "Stop",
            ActuatorOperation::TurnOn => "TurnOn",
            ActuatorOperation::TurnOff => "TurnOff",
            ActuatorOperation::ClearError(_) => "ClearError",
            ActuatorOperation::ClearAllErrors => "ClearAllErrors",
            ActuatorOperation::ForceRecover => "ForceRecover",
        }
    }
}

// =============================================================================
// ActuatorController
// =============================================================================

/// Controller of a single actuator.
pub struct ActuatorController {
    identity: Identity,
    node: NodeName,
    client: Arc<DeviceClient>,
    state: RwLock<DeviceState>,
}

impl ActuatorController {
    /// Creates an actuator controller.
    pub fn new(identity: Identity, node: NodeName, client: Arc<DeviceClient>) -> Self {
        Self {
            identity,
            node,
            client,
            state: RwLock::new(DeviceState::On),
        }
    }

    /// Returns the mounting position, if known.
    pub fn position(&self) -> Option<u32> {
        self.identity.position
    }

    /// Reads the current length, mm.
    pub async fn current_length(&self) -> ControllerResult<f64> {
        let node = self.node.member(ActuatorField::CurrentLength.member());
        Ok(self.client.read_f64(&node).await?)
    }
}

impl std::fmt::Debug for ActuatorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorController")
            .field("identity", &self.identity)
            .field("node", &self.node)
            .field("state", &*self.state.read())
            .finish()
    }
}

#[async_trait]
impl PasController for ActuatorController {
    type Field = ActuatorField;
    type Operation = ActuatorOperation;

    fn device_type(&self) -> DeviceType {
        DeviceType::Actuator
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn node(&self) -> &NodeName {
        &self.node
    }

    fn state(&self) -> DeviceState {
        *self.state.read()
    }

    async fn get_state(&self) -> ControllerResult<DeviceState> {
        let state = read_device_state(&self.client, &self.node).await?;
        *self.state.write() = state;
        Ok(state)
    }

    async fn set_state(&self, _state: DeviceState) -> ControllerResult<()> {
        Err(ControllerError::not_writable(format!(
            "state of actuator {}",
            self.identity
        )))
    }

    async fn get_data(&self, _tree: &DeviceTree, field: ActuatorField) -> ControllerResult<Value> {
        match field {
            ActuatorField::ErrorState => read_error_state(&self.client, &self.node).await,
            other => {
                let node = self.node.member(other.member());
                Ok(self.client.read_one(&node).await?)
            }
        }
    }

    async fn set_data(
        &self,
        _tree: &DeviceTree,
        field: ActuatorField,
        _value: Value,
    ) -> ControllerResult<()> {
        Err(ControllerError::not_writable(format!(
            "{:?} of actuator {}",
            field, self.identity
        )))
    }

    async fn operate(
        &self,
        _tree: &DeviceTree,
        operation: ActuatorOperation,
    ) -> ControllerResult<OperateOutcome> {
        let method = operation.name();
        tracing::debug!(actuator = %self.identity, operation = method, "Actuator operate");

        match operation {
            ActuatorOperation::MoveDeltaLength(length) | ActuatorOperation::MoveToLength(length) => {
                let handle = self
                    .client
                    .call_async(&self.identity, &self.node, method, &[Value::Float64(length)])
                    .await?;
                Ok(OperateOutcome::Dispatched(handle))
            }
            ActuatorOperation::ClearError(index) => {
                let outputs = self
                    .client
                    .call(&self.node, method, &[Value::Int32(index)])
                    .await?;
                Ok(OperateOutcome::Done(outputs))
            }
            ActuatorOperation::Stop
            | ActuatorOperation::TurnOn
            | ActuatorOperation::TurnOff
            | ActuatorOperation::ClearAllErrors
            | ActuatorOperation::ForceRecover => {
                let outputs = self.client.call(&self.node, method, &[]).await?;
                Ok(OperateOutcome::Done(outputs))
            }
        }
    }
}
