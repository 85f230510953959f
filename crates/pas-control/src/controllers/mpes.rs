// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Optical edge sensor (MPES) controller.
//!
//! An MPES is a camera on one panel looking at a laser spot projected from
//! its neighbour. A `Read` asks the device to acquire an image and then
//! pulls the centroid variables, which are cached as an [`MpesReading`].
//!
//! Each sensor straddles two panels. The side map tells which side (`L` or
//! `W`) of the sensor faces a given panel position, and each side has a 2x6
//! response block mapping that panel's actuator deltas to spot motion.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use nalgebra::SMatrix;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use pas_core::error::{ControllerError, ControllerResult, PortError};
use pas_core::node::NodeName;
use pas_core::types::{DeviceState, DeviceType, Identity, Value};
use pas_opcua::client::expect_f64;
use pas_opcua::DeviceClient;

use super::{check_settable, read_error_state};
use crate::controller::{
    expect_arity, unknown_offset, DeviceField, DeviceOperation, OperateOutcome, PasController,
};
use crate::tree::DeviceTree;

/// A spot whose x centroid is below this is considered out of view.
pub const VISIBILITY_THRESHOLD: f64 = 0.1;

/// Expected cleaned spot intensity.
pub const NOMINAL_INTENSITY: f64 = 150_000.0;

/// Expected spot width, px.
pub const NOMINAL_SPOT_WIDTH: f64 = 20.0;

const INTENSITY_TOLERANCE: f64 = 0.2;

/// Response of one sensor to one panel's six actuators.
pub type ResponseBlock = SMatrix<f64, 2, 6>;

// =============================================================================
// PanelSide / MpesCalibration
// =============================================================================

/// Side of a sensor facing a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelSide {
    /// The laser side.
    L,
    /// The webcam side.
    W,
}

impl fmt::Display for PanelSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelSide::L => f.write_str("l"),
            PanelSide::W => f.write_str("w"),
        }
    }
}

/// Static calibration of a sensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MpesCalibration {
    /// Panel position to side.
    pub sides: BTreeMap<u32, PanelSide>,
    /// Response block per side.
    pub response: BTreeMap<PanelSide, ResponseBlock>,
}

impl MpesCalibration {
    /// Adds a panel side mapping.
    pub fn with_side(mut self, panel_position: u32, side: PanelSide) -> Self {
        self.sides.insert(panel_position, side);
        self
    }

    /// Adds a response block.
    pub fn with_response(mut self, side: PanelSide, block: ResponseBlock) -> Self {
        self.response.insert(side, block);
        self
    }
}

// =============================================================================
// MpesReading
// =============================================================================

/// One acquisition of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MpesReading {
    /// Spot x centroid, px.
    pub x_centroid: f64,
    /// Spot y centroid, px.
    pub y_centroid: f64,
    /// Spot width along x, px.
    pub x_spot_width: f64,
    /// Spot width along y, px.
    pub y_spot_width: f64,
    /// Cleaned intensity.
    pub cleaned_intensity: f64,
    /// Aligned x position, px.
    pub x_nominal: f64,
    /// Aligned y position, px.
    pub y_nominal: f64,
}

impl MpesReading {
    /// Returns `true` if the spot is in the field of view.
    pub fn is_visible(&self) -> bool {
        self.x_centroid >= VISIBILITY_THRESHOLD
    }
}

// =============================================================================
// Offsets
// =============================================================================

/// MPES properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MpesField {
    /// Spot x centroid.
    XCentroid,
    /// Spot y centroid.
    YCentroid,
    /// Spot width along x.
    XSpotWidth,
    /// Spot width along y.
    YSpotWidth,
    /// Cleaned intensity.
    CleanedIntensity,
    /// Aligned x position.
    XNominal,
    /// Aligned y position.
    YNominal,
    /// Camera exposure. Writable.
    Exposure,
    /// Mounting position.
    Position,
    /// Serial number.
    Serial,
    /// Error state code.
    ErrorState,
}

impl DeviceField for MpesField {
    fn from_offset(offset: u32) -> ControllerResult<Self> {
        Ok(match offset {
            0 => MpesField::XCentroid,
            1 => MpesField::YCentroid,
            2 => MpesField::XSpotWidth,
            3 => MpesField::YSpotWidth,
            4 => MpesField::CleanedIntensity,
            5 => MpesField::XNominal,
            6 => MpesField::YNominal,
            7 => MpesField::Exposure,
            8 => MpesField::Position,
            9 => MpesField::Serial,
            10 => MpesField::ErrorState,
            _ => return Err(unknown_offset(DeviceType::Mpes, "field", offset)),
        })
    }

    fn offset(&self) -> u32 {
        *self as u32
    }
}

/// MPES commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpesOperation {
    /// Acquire and cache a reading.
    Read,
    /// Let the device pick a new exposure.
    SetExposure,
    /// Power on.
    TurnOn,
    /// Power off.
    TurnOff,
}

impl DeviceOperation for MpesOperation {
    fn from_offset(offset: u32, args: &[Value]) -> ControllerResult<Self> {
        let op = match offset {
            0 => MpesOperation::Read,
            1 => MpesOperation::SetExposure,
            2 => MpesOperation::TurnOn,
            3 => MpesOperation::TurnOff,
            _ => return Err(unknown_offset(DeviceType::Mpes, "operation", offset)),
        };
        expect_arity(op.name(), args, 0)?;
        Ok(op)
    }

    fn name(&self) -> &'static str {
        match self {
            MpesOperation::Read => "Read",
            MpesOperation::SetExposure => "SetExposure",
            MpesOperation::TurnOn => "TurnOn",
            MpesOperation::TurnOff => "TurnOff",
        }
    }
}

const READING_MEMBERS: [&str; 7] = [
    "xCentroidAvg",
    "yCentroidAvg",
    "xCentroidSpotWidth",
    "yCentroidSpotWidth",
    "CleanedIntensity",
    "xCentroidNominal",
    "yCentroidNominal",
];

// =============================================================================
// MpesController
// =============================================================================

/// Controller of one edge sensor.
pub struct MpesController {
    identity: Identity,
    node: NodeName,
    client: Arc<DeviceClient>,
    calibration: MpesCalibration,
    state: RwLock<DeviceState>,
    reading: RwLock<Option<MpesReading>>,
}

impl MpesController {
    /// Creates a sensor controller.
    pub fn new(
        identity: Identity,
        node: NodeName,
        client: Arc<DeviceClient>,
        calibration: MpesCalibration,
    ) -> Self {
        Self {
            identity,
            node,
            client,
            calibration,
            state: RwLock::new(DeviceState::On),
            reading: RwLock::new(None),
        }
    }

    /// Returns the calibration.
    pub fn calibration(&self) -> &MpesCalibration {
        &self.calibration
    }

    /// Returns the side facing a panel position, if the sensor sees that panel.
    pub fn panel_side(&self, panel_position: u32) -> Option<PanelSide> {
        self.calibration.sides.get(&panel_position).copied()
    }

    /// Returns the response block for a panel position.
    ///
    /// A panel the sensor is not attached to does not move the spot, so its
    /// block is zero.
    pub fn response_block(&self, panel_position: u32) -> ResponseBlock {
        self.panel_side(panel_position)
            .and_then(|side| self.calibration.response.get(&side).copied())
            .unwrap_or_else(ResponseBlock::zeros)
    }

    /// Returns the last cached reading.
    pub fn last_reading(&self) -> Option<MpesReading> {
        *self.reading.read()
    }

    /// Returns `true` if the sensor can be read: it is neither off nor in a
    /// fatal error.
    pub fn is_usable(&self) -> bool {
        !matches!(self.state(), DeviceState::Off | DeviceState::FatalError)
    }

    /// Acquires a new reading and caches it.
    pub async fn read(&self) -> ControllerResult<MpesReading> {
        if !self.is_usable() {
            return Err(ControllerError::invalid_state(format!(
                "MPES {} is {}",
                self.identity,
                self.state()
            )));
        }

        if let Err(e) = self.client.call(&self.node, "Read", &[]).await {
            tracing::warn!(mpes = %self.identity, error = %e, "MPES read request failed");
            return Err(e.into());
        }

        let nodes: Vec<NodeName> = READING_MEMBERS
            .iter()
            .map(|member| self.node.member(member))
            .collect();
        let values = self.client.read(&nodes).await?;
        if values.len() != nodes.len() {
            return Err(PortError::communication(format!(
                "MPES {}: expected {} values, got {}",
                self.identity,
                nodes.len(),
                values.len()
            ))
            .into());
        }

        let mut numbers = [0.0; 7];
        for (i, (node, value)) in nodes.iter().zip(&values).enumerate() {
            numbers[i] = expect_f64(node, value)?;
        }
        let reading = MpesReading {
            x_centroid: numbers[0],
            y_centroid: numbers[1],
            x_spot_width: numbers[2],
            y_spot_width: numbers[3],
            cleaned_intensity: numbers[4],
            x_nominal: numbers[5],
            y_nominal: numbers[6],
        };

        if reading.is_visible() {
            self.check_quality(&reading);
        } else {
            tracing::warn!(mpes = %self.identity, "Spot is not in the field of view");
        }

        tracing::debug!(
            mpes = %self.identity,
            x = reading.x_centroid,
            y = reading.y_centroid,
            intensity = reading.cleaned_intensity,
            "MPES reading"
        );
        *self.reading.write() = Some(reading);
        Ok(reading)
    }

    fn check_quality(&self, reading: &MpesReading) {
        if reading.x_spot_width > NOMINAL_SPOT_WIDTH {
            tracing::warn!(
                mpes = %self.identity,
                width = reading.x_spot_width,
                nominal = NOMINAL_SPOT_WIDTH,
                "Spot is wider than nominal along x"
            );
        }
        if reading.y_spot_width > NOMINAL_SPOT_WIDTH {
            tracing::warn!(
                mpes = %self.identity,
                width = reading.y_spot_width,
                nominal = NOMINAL_SPOT_WIDTH,
                "Spot is wider than nominal along y"
            );
        }
        let deviation = (reading.cleaned_intensity - NOMINAL_INTENSITY).abs() / NOMINAL_INTENSITY;
        if deviation > INTENSITY_TOLERANCE {
            tracing::warn!(
                mpes = %self.identity,
                intensity = reading.cleaned_intensity,
                nominal = NOMINAL_INTENSITY,
                "Spot intensity off nominal; consider adjusting exposure"
            );
        }
    }

    async fn reading_or_fetch(&self) -> ControllerResult<MpesReading> {
        match self.last_reading() {
            Some(reading) => Ok(reading),
            None => self.read().await,
        }
    }
}

impl fmt::Debug for MpesController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpesController")
            .field("identity", &self.identity)
            .field("node", &self.node)
            .field("state", &*self.state.read())
            .field("sides", &self.calibration.sides)
            .finish()
    }
}

#[async_trait]
impl PasController for MpesController {
    type Field = MpesField;
    type Operation = MpesOperation;

    fn device_type(&self) -> DeviceType {
        DeviceType::Mpes
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
        Ok(self.state())
    }

    async fn set_state(&self, state: DeviceState) -> ControllerResult<()> {
        check_settable(state)?;
        *self.state.write() = state;
        Ok(())
    }

    async fn get_data(&self, _tree: &DeviceTree, field: MpesField) -> ControllerResult<Value> {
        let value = match field {
            MpesField::XCentroid => self.reading_or_fetch().await?.x_centroid,
            MpesField::YCentroid => self.reading_or_fetch().await?.y_centroid,
            MpesField::XSpotWidth => self.reading_or_fetch().await?.x_spot_width,
            MpesField::YSpotWidth => self.reading_or_fetch().await?.y_spot_width,
            MpesField::CleanedIntensity => self.reading_or_fetch().await?.cleaned_intensity,
            MpesField::XNominal => self.reading_or_fetch().await?.x_nominal,
            MpesField::YNominal => self.reading_or_fetch().await?.y_nominal,
            MpesField::Exposure => {
                return Ok(self.client.read_one(&self.node.member("Exposure")).await?)
            }
            MpesField::Position => {
                return Ok(self.client.read_one(&self.node.member("Position")).await?)
            }
            MpesField::Serial => {
                return Ok(self.client.read_one(&self.node.member("SerialNumber")).await?)
            }
            MpesField::ErrorState => return read_error_state(&self.client, &self.node).await,
        };
        Ok(Value::Float64(value))
    }

    async fn set_data(
        &self,
        _tree: &DeviceTree,
        field: MpesField,
        value: Value,
    ) -> ControllerResult<()> {
        match field {
            MpesField::Exposure => {
                let exposure = value.as_i64().and_then(|v| i32::try_from(v).ok()).ok_or_else(|| {
                    ControllerError::invalid_argument(format!(
                        "exposure must be a 32-bit integer, got {}",
                        value.type_name()
                    ))
                })?;
                self.client
                    .write_one(&self.node.member("Exposure"), Value::Int32(exposure))
                    .await?;
                Ok(())
            }
            other => Err(ControllerError::not_writable(format!(
                "{:?} of MPES {}",
                other, self.identity
            ))),
        }
    }

    async fn operate(
        &self,
        _tree: &DeviceTree,
        operation: MpesOperation,
    ) -> ControllerResult<OperateOutcome> {
        match operation {
            MpesOperation::Read => {
                let r = self.read().await?;
                Ok(OperateOutcome::Done(vec![
                    Value::Float64(r.x_centroid),
                    Value::Float64(r.y_centroid),
                ]))
            }
            MpesOperation::SetExposure => {
                let outputs = self.client.call(&self.node, operation.name(), &[]).await?;
                Ok(OperateOutcome::Done(outputs))
            }
            MpesOperation::TurnOn | MpesOperation::TurnOff => {
                let outputs = self.client.call(&self.node, operation.name(), &[]).await?;
                let state = if operation == MpesOperation::TurnOn {
                    DeviceState::On
                } else {
                    DeviceState::Off
                };
                *self.state.write() = state;
                tracing::info!(mpes = %self.identity, state = %state, "MPES power changed");
                Ok(OperateOutcome::Done(outputs))
            }
        }
    }
}
