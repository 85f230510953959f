// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Device controllers.
//!
//! | Controller | Children | State |
//! |------------|----------|-------|
//! | [`PanelController`] | Actuator, MPES, Edge | read from the device |
//! | [`ActuatorController`] | none | read from the device, not writable |
//! | [`MpesController`] | none | local |
//! | [`EdgeController`] | MPES, Panel | local |

mod actuator;
mod edge;
mod mpes;
mod panel;

pub use actuator::{ActuatorController, ActuatorField, ActuatorOperation};
pub use edge::{EdgeController, EdgeField, EdgeOperation};
pub use mpes::{
    MpesCalibration, MpesController, MpesField, MpesOperation, MpesReading, PanelSide,
    ResponseBlock, NOMINAL_INTENSITY, NOMINAL_SPOT_WIDTH, VISIBILITY_THRESHOLD,
};
pub use panel::{
    MotionPolicy, PanelController, PanelField, PanelOperation, PanelSettings, PanelSnapshot,
    DEFAULT_SAFETY_RADIUS, DEFAULT_UPDATE_INTERVAL,
};

use pas_core::error::{ControllerError, ControllerResult};
use pas_core::node::NodeName;
use pas_core::types::{DeviceState, ErrorState, Value};
use pas_opcua::DeviceClient;

/// Reads and decodes a device's `State` member.
pub(crate) async fn read_device_state(
    client: &DeviceClient,
    node: &NodeName,
) -> ControllerResult<DeviceState> {
    let member = node.member("State");
    let code = client.read_i64(&member).await?;
    DeviceState::from_code(code).ok_or_else(|| {
        ControllerError::invalid_state(format!("{} reported unknown state code {}", member, code))
    })
}

/// Reads a device's `ErrorState` member and returns it as its wire code.
pub(crate) async fn read_error_state(client: &DeviceClient, node: &NodeName) -> ControllerResult<Value> {
    let member = node.member("ErrorState");
    let code = client.read_i64(&member).await?;
    let state = ErrorState::from_code(code).ok_or_else(|| {
        ControllerError::invalid_state(format!(
            "{} reported unknown error state code {}",
            member, code
        ))
    })?;
    Ok(Value::Int32(state.code()))
}

/// Rejects caller-initiated transitions into the error states.
pub(crate) fn check_settable(state: DeviceState) -> ControllerResult<()> {
    if state.is_error() {
        return Err(ControllerError::invalid_argument(format!(
            "state {} can only be reported by the device",
            state
        )));
    }
    Ok(())
}
