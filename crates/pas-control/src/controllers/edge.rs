// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Edge controller.
//!
//! An edge is the boundary between two or three adjacent panels and owns the
//! MPES mounted across it. From a panel's point of view an edge is a source
//! of two things that must line up row for row: the stacked response blocks
//! of its sensors for that panel, and the sensors' current spot positions.

use async_trait::async_trait;
use nalgebra::{DMatrix, DVector};
use parking_lot::RwLock;

use pas_core::error::{ControllerError, ControllerResult};
use pas_core::node::NodeName;
use pas_core::types::{DeviceState, DeviceType, Identity, Value};

use super::mpes::{MpesController, MpesReading, ResponseBlock};
use super::panel::PanelOperation;
use super::check_settable;
use crate::collision::EdgeResponse;
use crate::controller::{
    expect_arity, unknown_offset, Children, DeviceField, DeviceOperation, OperateOutcome,
    PasController,
};
use crate::tree::DeviceTree;

// =============================================================================
// Offsets
// =============================================================================

/// Edge properties. An edge exposes none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeField {}

impl DeviceField for EdgeField {
    fn from_offset(offset: u32) -> ControllerResult<Self> {
        Err(unknown_offset(DeviceType::Edge, "field", offset))
    }

    fn offset(&self) -> u32 {
        match *self {}
    }
}

/// Edge commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOperation {
    /// Refresh every sensor reading.
    Read,
    /// Stop every panel on the edge.
    Stop,
}

impl DeviceOperation for EdgeOperation {
    fn from_offset(offset: u32, args: &[Value]) -> ControllerResult<Self> {
        let op = match offset {
            0 => EdgeOperation::Read,
            1 => EdgeOperation::Stop,
            _ => return Err(unknown_offset(DeviceType::Edge, "operation", offset)),
        };
        expect_arity(op.name(), args, 0)?;
        Ok(op)
    }

    fn name(&self) -> &'static str {
        match self {
            EdgeOperation::Read => "Read",
            EdgeOperation::Stop => "Stop",
        }
    }
}

// =============================================================================
// EdgeController
// =============================================================================

/// Controller of one panel edge.
pub struct EdgeController {
    identity: Identity,
    node: NodeName,
    children: Children,
    state: RwLock<DeviceState>,
}

impl EdgeController {
    /// Child types an edge accepts.
    pub const CHILD_TYPES: [DeviceType; 2] = [DeviceType::Mpes, DeviceType::Panel];

    /// Creates an edge controller.
    pub fn new(identity: Identity, node: NodeName) -> Self {
        let children = Children::new(DeviceType::Edge, identity.clone(), Self::CHILD_TYPES);
        Self {
            identity,
            node,
            children,
            state: RwLock::new(DeviceState::On),
        }
    }

    fn sensors<'t>(&self, tree: &'t DeviceTree) -> ControllerResult<Vec<&'t MpesController>> {
        self.children
            .handles(DeviceType::Mpes)
            .map(|&index| {
                tree.mpes(index).ok_or_else(|| {
                    ControllerError::invalid_state(format!(
                        "edge {} links {} which is not an MPES",
                        self.identity, index
                    ))
                })
            })
            .collect()
    }

    fn usable_sensors<'t>(&self, tree: &'t DeviceTree) -> ControllerResult<Vec<&'t MpesController>> {
        let mut usable = Vec::new();
        for mpes in self.sensors(tree)? {
            if mpes.is_usable() {
                usable.push(mpes);
            } else {
                tracing::warn!(
                    edge = %self.identity,
                    mpes = %mpes.identity(),
                    state = %mpes.state(),
                    "MPES is off or in fatal error; ignoring it"
                );
            }
        }
        Ok(usable)
    }

    /// Stacks the response blocks of every usable MPES with a visible spot
    /// for the panel at `panel_position`, in MPES registration order.
    ///
    /// Visibility is taken from each sensor's last reading.
    pub fn response_matrix(
        &self,
        tree: &DeviceTree,
        panel_position: u32,
    ) -> ControllerResult<DMatrix<f64>> {
        let blocks: Vec<ResponseBlock> = self
            .usable_sensors(tree)?
            .into_iter()
            .filter(|mpes| mpes.last_reading().is_some_and(|r| r.is_visible()))
            .map(|mpes| mpes.response_block(panel_position))
            .collect();
        Ok(stack_blocks(&blocks))
    }

    /// Reads every usable MPES and returns the visible spots as
    /// `(x0, y0, x1, y1, ...)`, in MPES registration order.
    pub async fn current_readings(&self, tree: &DeviceTree) -> ControllerResult<DVector<f64>> {
        let readings: Vec<MpesReading> = self
            .read_visible(tree)
            .await?
            .into_iter()
            .map(|(_, reading)| reading)
            .collect();
        Ok(stack_readings(&readings))
    }

    /// Reads every usable MPES once and returns readings and response rows
    /// for `panel_position` built from the same set of sensors.
    pub async fn snapshot(
        &self,
        tree: &DeviceTree,
        panel_position: u32,
    ) -> ControllerResult<EdgeResponse> {
        let visible = self.read_visible(tree).await?;
        let blocks: Vec<ResponseBlock> = visible
            .iter()
            .map(|(mpes, _)| mpes.response_block(panel_position))
            .collect();
        let readings: Vec<MpesReading> = visible.iter().map(|(_, r)| *r).collect();

        Ok(EdgeResponse {
            edge: self.identity.clone(),
            response: stack_blocks(&blocks),
            readings: stack_readings(&readings),
        })
    }

    async fn read_visible<'t>(
        &self,
        tree: &'t DeviceTree,
    ) -> ControllerResult<Vec<(&'t MpesController, MpesReading)>> {
        let mut visible = Vec::new();
        for mpes in self.usable_sensors(tree)? {
            let reading = mpes.read().await?;
            if reading.is_visible() {
                visible.push((mpes, reading));
            } else {
                tracing::warn!(
                    edge = %self.identity,
                    mpes = %mpes.identity(),
                    "MPES spot not visible; ignoring it"
                );
            }
        }
        Ok(visible)
    }
}

fn stack_blocks(blocks: &[ResponseBlock]) -> DMatrix<f64> {
    DMatrix::from_fn(blocks.len() * 2, 6, |r, c| blocks[r / 2][(r % 2, c)])
}

fn stack_readings(readings: &[MpesReading]) -> DVector<f64> {
    DVector::from_iterator(
        readings.len() * 2,
        readings.iter().flat_map(|r| [r.x_centroid, r.y_centroid]),
    )
}

impl std::fmt::Debug for EdgeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeController")
            .field("identity", &self.identity)
            .field("state", &*self.state.read())
            .field("mpes", &self.children.child_count(DeviceType::Mpes))
            .field("panels", &self.children.child_count(DeviceType::Panel))
            .finish()
    }
}

#[async_trait]
impl PasController for EdgeController {
    type Field = EdgeField;
    type Operation = EdgeOperation;

    fn device_type(&self) -> DeviceType {
        DeviceType::Edge
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn node(&self) -> &NodeName {
        &self.node
    }

    fn children(&self) -> Option<&Children> {
        Some(&self.children)
    }

    fn children_mut(&mut self) -> Option<&mut Children> {
        Some(&mut self.children)
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

    async fn get_data(&self, _tree: &DeviceTree, field: EdgeField) -> ControllerResult<Value> {
        match field {}
    }

    async fn set_data(
        &self,
        _tree: &DeviceTree,
        field: EdgeField,
        _value: Value,
    ) -> ControllerResult<()> {
        match field {}
    }

    async fn operate(
        &self,
        tree: &DeviceTree,
        operation: EdgeOperation,
    ) -> ControllerResult<OperateOutcome> {
        match operation {
            EdgeOperation::Read => {
                let readings = self.current_readings(tree).await?;
                Ok(OperateOutcome::Done(
                    readings.iter().copied().map(Value::Float64).collect(),
                ))
            }
            EdgeOperation::Stop => {
                *self.state.write() = DeviceState::Off;
                tracing::info!(edge = %self.identity, "Stopping every panel on edge");

                let mut first_error = None;
                for &index in self.children.handles(DeviceType::Panel) {
                    let Some(panel) = tree.panel(index) else {
                        continue;
                    };
                    if let Err(e) = panel.operate(tree, PanelOperation::Stop).await {
                        tracing::error!(
                            edge = %self.identity,
                            panel = %panel.identity(),
                            error = %e,
                            "Failed to stop panel"
                        );
                        first_error.get_or_insert(e);
                    }
                }
                match first_error {
                    Some(e) => Err(e),
                    None => Ok(OperateOutcome::Done(Vec::new())),
                }
            }
        }
    }
}
