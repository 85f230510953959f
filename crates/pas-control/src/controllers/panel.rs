// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Panel controller.
//!
//! A panel is a mirror segment on a six-actuator Stewart platform. The
//! controller keeps a coordinate cache (actuator lengths, pose and pad
//! coordinates) that is refreshed from the actuators, and dispatches motion
//! commands behind the collision gate.
//!
//! # Operate sequence
//!
//! ```text
//! operate(op)
//!   ├─ no actuators and op != Stop ─────────────► NoOp
//!   ├─ lock cache (serializes operate per panel)
//!   ├─ get_state()   Busy/FatalError: warn, or reject under MotionPolicy::Reject
//!   ├─ refresh cache (Move* and ReadAll only, ignores staleness)
//!   ├─ Move*: delta = target - lengths ─► collision gate ─► call_method_async
//!   └─ Stop and maintenance: call_method
//! ```
//!
//! The cache lock is held across the whole sequence, so the lengths the gate
//! checks are the lengths the move is computed from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nalgebra::{Matrix3, Vector6};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use pas_core::error::{ControllerError, ControllerResult};
use pas_core::node::NodeName;
use pas_core::types::{DeviceState, DeviceType, Identity, Value};
use pas_opcua::DeviceClient;

use super::{check_settable, read_device_state, read_error_state};
use crate::collision::{CollisionPredictor, CollisionReport};
use crate::controller::{
    expect_arity, i32_arg, unknown_offset, vector6_args, vector6_values, Children, DeviceField,
    DeviceOperation, OperateOutcome, PasController,
};
use crate::kinematics::{PanelType, StewartPlatform};
use crate::tree::DeviceTree;

/// Default safety radius, px.
pub const DEFAULT_SAFETY_RADIUS: f64 = 40.0;

/// Default coordinate cache lifetime.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(5000);

const ACTUATOR_POSITIONS: [u32; 6] = [1, 2, 3, 4, 5, 6];

// =============================================================================
// Settings
// =============================================================================

/// What to do with a motion command while the panel is Busy or in FatalError.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionPolicy {
    /// Log a warning and dispatch.
    #[default]
    Warn,
    /// Refuse with `BadInvalidState`. Stop is always dispatched.
    Reject,
}

/// Per-panel settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSettings {
    /// Collision safety radius, px.
    pub safety_radius: f64,
    /// Coordinate cache lifetime for pose reads.
    pub update_interval: Duration,
    /// Busy/FatalError policy for motion commands.
    pub motion_policy: MotionPolicy,
    /// Platform geometry.
    pub panel_type: PanelType,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            safety_radius: DEFAULT_SAFETY_RADIUS,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            motion_policy: MotionPolicy::default(),
            panel_type: PanelType::default(),
        }
    }
}

// =============================================================================
// Offsets
// =============================================================================

/// Panel properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelField {
    /// Pose x, mm.
    X,
    /// Pose y, mm.
    Y,
    /// Pose z, mm.
    Z,
    /// Rotation about x, rad.
    XRot,
    /// Rotation about y, rad.
    YRot,
    /// Rotation about z, rad.
    ZRot,
    /// Temperature inside the panel electronics.
    InternalTemperature,
    /// Ambient temperature.
    ExternalTemperature,
    /// Collision safety radius. The only writable field.
    SafetyRadius,
    /// Mounting position.
    Position,
    /// Serial number.
    Serial,
    /// Error state code.
    ErrorState,
}

impl PanelField {
    /// Returns the pose component index for pose fields.
    pub fn pose_index(&self) -> Option<usize> {
        match self {
            PanelField::X => Some(0),
            PanelField::Y => Some(1),
            PanelField::Z => Some(2),
            PanelField::XRot => Some(3),
            PanelField::YRot => Some(4),
            PanelField::ZRot => Some(5),
            _ => None,
        }
    }
}

impl DeviceField for PanelField {
    fn from_offset(offset: u32) -> ControllerResult<Self> {
        Ok(match offset {
            0 => PanelField::X,
            1 => PanelField::Y,
            2 => PanelField::Z,
            3 => PanelField::XRot,
            4 => PanelField::YRot,
            5 => PanelField::ZRot,
            6 => PanelField::InternalTemperature,
            7 => PanelField::ExternalTemperature,
            8 => PanelField::SafetyRadius,
            9 => PanelField::Position,
            10 => PanelField::Serial,
            11 => PanelField::ErrorState,
            _ => return Err(unknown_offset(DeviceType::Panel, "field", offset)),
        })
    }

    fn offset(&self) -> u32 {
        *self as u32
    }
}

/// Panel commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelOperation {
    /// Move each actuator by a length delta, mm.
    MoveDeltaLengths(Vector6<f64>),
    /// Move each actuator to an absolute length, mm.
    MoveToLengths(Vector6<f64>),
    /// Move to an absolute pose.
    MoveToCoords(Vector6<f64>),
    /// Move by a pose delta from the current pose.
    MoveDeltaCoords(Vector6<f64>),
    /// Refresh and report pose and lengths. No remote command.
    ReadAll,
    /// Stop immediately.
    Stop,
    /// Power on.
    TurnOn,
    /// Power off.
    TurnOff,
    /// Home every actuator in a direction.
    FindHome(i32),
    /// Clear one error by index.
    ClearError(i32),
    /// Clear every error.
    ClearAllErrors,
}

impl PanelOperation {
    /// Returns `true` for commands that move the panel.
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            PanelOperation::MoveDeltaLengths(_)
                | PanelOperation::MoveToLengths(_)
                | PanelOperation::MoveToCoords(_)
                | PanelOperation::MoveDeltaCoords(_)
        )
    }

    /// Returns `true` for commands that refresh the coordinate cache first.
    pub fn refreshes_cache(&self) -> bool {
        self.is_motion() || matches!(self, PanelOperation::ReadAll)
    }
}

impl DeviceOperation for PanelOperation {
    fn from_offset(offset: u32, args: &[Value]) -> ControllerResult<Self> {
        Ok(match offset {
            0 => PanelOperation::MoveDeltaLengths(vector6_args("MoveDeltaLengths", args)?),
            1 => PanelOperation::MoveToLengths(vector6_args("MoveToLengths", args)?),
            2 => PanelOperation::MoveToCoords(vector6_args("MoveToCoords", args)?),
            3 => PanelOperation::MoveDeltaCoords(vector6_args("MoveDeltaCoords", args)?),
            8 => {
                expect_arity("FindHome", args, 1)?;
                PanelOperation::FindHome(i32_arg("FindHome", args, 0)?)
            }
            9 => {
                expect_arity("ClearError", args, 1)?;
                PanelOperation::ClearError(i32_arg("ClearError", args, 0)?)
            }
            4..=7 | 10 => {
                let op = match offset {
                    4 => PanelOperation::ReadAll,
                    5 => PanelOperation::Stop,
                    6 => PanelOperation::TurnOn,
                    7 => PanelOperation::TurnOff,
                    _ => PanelOperation::ClearAllErrors,
                };
                expect_arity(op.name(), args, 0)?;
                op
            }
            _ => return Err(unknown_offset(DeviceType::Panel, "operation", offset)),
        })
    }

    fn name(&self) -> &'static str {
        match self {
            PanelOperation::MoveDeltaLengths(_) => "MoveDeltaLengths",
            PanelOperation::MoveToLengths(_) => "MoveToLengths",
            PanelOperation::MoveToCoords(_) => "MoveToCoords",
            PanelOperation::MoveDeltaCoords(_) => "MoveDeltaCoords",
            PanelOperation::ReadAll => "ReadAll",
            PanelOperation::Stop => "Stop",
            PanelOperation::TurnOn => "TurnOn",
            PanelOperation::TurnOff => "TurnOff",
            PanelOperation::FindHome(_) => "FindHome",
            PanelOperation::ClearError(_) => "ClearError",
            PanelOperation::ClearAllErrors => "ClearAllErrors",
        }
    }
}

// =============================================================================
// Coordinate cache
// =============================================================================

/// Cached geometry of a panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSnapshot {
    /// Actuator lengths by position 1..=6, mm.
    pub lengths: Vector6<f64>,
    /// Pose `(x, y, z, rx, ry, rz)`.
    pub pose: Vector6<f64>,
    /// Pad coordinates, one column per pad.
    pub pads: Matrix3<f64>,
}

#[derive(Debug)]
struct CoordinateCache {
    snapshot: PanelSnapshot,
    updated_at: Option<Instant>,
}

impl CoordinateCache {
    fn new() -> Self {
        Self {
            snapshot: PanelSnapshot {
                lengths: Vector6::zeros(),
                pose: Vector6::zeros(),
                pads: Matrix3::zeros(),
            },
            updated_at: None,
        }
    }

    fn expired(&self, interval: Duration) -> bool {
        match self.updated_at {
            Some(at) => at.elapsed() >= interval,
            None => true,
        }
    }
}

// =============================================================================
// PanelController
// =============================================================================

/// Controller of one mirror panel.
pub struct PanelController {
    identity: Identity,
    node: NodeName,
    client: Arc<DeviceClient>,
    children: Children,
    platform: StewartPlatform,
    settings: RwLock<PanelSettings>,
    state: RwLock<DeviceState>,
    cache: Mutex<CoordinateCache>,
    refreshes: AtomicU64,
}

impl PanelController {
    /// Child types a panel accepts.
    pub const CHILD_TYPES: [DeviceType; 3] =
        [DeviceType::Actuator, DeviceType::Mpes, DeviceType::Edge];

    /// Creates a panel controller. The state starts as `On` and is not
    /// synchronized with the device until the first `get_state`.
    pub fn new(
        identity: Identity,
        node: NodeName,
        client: Arc<DeviceClient>,
        settings: PanelSettings,
    ) -> Self {
        let children = Children::new(DeviceType::Panel, identity.clone(), Self::CHILD_TYPES);
        Self {
            platform: StewartPlatform::new(settings.panel_type),
            identity,
            node,
            client,
            children,
            settings: RwLock::new(settings),
            state: RwLock::new(DeviceState::On),
            cache: Mutex::new(CoordinateCache::new()),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Returns the mounting position, if known.
    pub fn position(&self) -> Option<u32> {
        self.identity.position
    }

    /// Returns a copy of the settings.
    pub fn settings(&self) -> PanelSettings {
        self.settings.read().clone()
    }

    /// Returns the safety radius, px.
    pub fn safety_radius(&self) -> f64 {
        self.settings.read().safety_radius
    }

    /// Sets the safety radius, px.
    pub fn set_safety_radius(&self, radius: f64) -> ControllerResult<()> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ControllerError::invalid_argument(format!(
                "safety radius must be positive, got {}",
                radius
            )));
        }
        self.settings.write().safety_radius = radius;
        tracing::info!(panel = %self.identity, radius, "Safety radius updated");
        Ok(())
    }

    /// Sets the Busy/FatalError policy for motion commands.
    pub fn set_motion_policy(&self, policy: MotionPolicy) {
        self.settings.write().motion_policy = policy;
    }

    /// Returns the platform model.
    pub fn platform(&self) -> &StewartPlatform {
        &self.platform
    }

    /// Returns the number of registered actuators.
    pub fn actuator_count(&self) -> usize {
        self.children.child_count(DeviceType::Actuator)
    }

    /// Returns the number of registered edges.
    pub fn edge_count(&self) -> usize {
        self.children.child_count(DeviceType::Edge)
    }

    /// Returns how many times the coordinate cache has been recomputed.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Returns the cached geometry without refreshing it.
    pub async fn cached(&self) -> PanelSnapshot {
        self.cache.lock().await.snapshot.clone()
    }

    /// Re-reads every actuator and recomputes the pose, regardless of staleness.
    pub async fn update_coords(&self, tree: &DeviceTree) -> ControllerResult<PanelSnapshot> {
        let mut cache = self.cache.lock().await;
        self.refresh(tree, &mut cache).await?;
        Ok(cache.snapshot.clone())
    }

    async fn refresh(&self, tree: &DeviceTree, cache: &mut CoordinateCache) -> ControllerResult<()> {
        let lengths = self.actuator_lengths(tree).await?;
        let solution = self.platform.forward(&lengths);

        cache.snapshot = PanelSnapshot {
            lengths,
            pose: solution.pose,
            pads: solution.pads,
        };
        cache.updated_at = Some(Instant::now());
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            panel = %self.identity,
            x = solution.pose[0],
            y = solution.pose[1],
            z = solution.pose[2],
            iterations = solution.iterations,
            "Panel coordinates updated"
        );
        Ok(())
    }

    async fn actuator_lengths(&self, tree: &DeviceTree) -> ControllerResult<Vector6<f64>> {
        let ordered = self.children.by_position_ordered(DeviceType::Actuator);
        let positions: Vec<u32> = ordered.iter().map(|(position, _)| *position).collect();
        if positions[..] != ACTUATOR_POSITIONS
            || self.actuator_count() != ACTUATOR_POSITIONS.len()
        {
            return Err(ControllerError::invalid_state(format!(
                "panel {} has actuators at positions {:?}, expected 1..=6",
                self.identity, positions
            )));
        }

        let mut lengths = Vector6::zeros();
        for (i, (_, &index)) in ordered.iter().enumerate() {
            let actuator = tree.actuator(index).ok_or_else(|| {
                ControllerError::invalid_state(format!(
                    "panel {} links {} which is not an actuator",
                    self.identity, index
                ))
            })?;
            lengths[i] = actuator.current_length().await?;
        }
        Ok(lengths)
    }

    /// Issues an operation that neither reads nor moves the cached geometry.
    ///
    /// Runs without the cache lock.
    async fn maintain(&self, operation: PanelOperation) -> ControllerResult<OperateOutcome> {
        match operation {
            PanelOperation::FindHome(direction) => {
                let handle = self
                    .client
                    .call_async(
                        &self.identity,
                        &self.node,
                        operation.name(),
                        &[Value::Int32(direction)],
                    )
                    .await?;
                Ok(OperateOutcome::Dispatched(handle))
            }
            PanelOperation::ClearError(index) => {
                self.call(operation.name(), &[Value::Int32(index)]).await
            }
            PanelOperation::Stop
            | PanelOperation::TurnOn
            | PanelOperation::TurnOff
            | PanelOperation::ClearAllErrors => self.call(operation.name(), &[]).await,
            other => Err(ControllerError::invalid_state(format!(
                "{} of panel {} needs fresh coordinates",
                other.name(),
                self.identity
            ))),
        }
    }

    /// Predicts the sensor excursions of a length delta against every edge
    /// of this panel, without dispatching anything.
    pub async fn predict_collision(
        &self,
        tree: &DeviceTree,
        delta: &Vector6<f64>,
    ) -> ControllerResult<CollisionReport> {
        let predictor = CollisionPredictor::new(self.safety_radius());
        if self.edge_count() == 0 {
            return predictor.predict(&[], delta);
        }

        let position = self.position().ok_or_else(|| {
            ControllerError::collision_check_unavailable(format!(
                "panel {} has no position",
                self.identity
            ))
        })?;

        let mut edges = Vec::with_capacity(self.edge_count());
        for &index in self.children.handles(DeviceType::Edge) {
            let edge = tree.edge(index).ok_or_else(|| {
                ControllerError::collision_check_unavailable(format!(
                    "panel {} links {} which is not an edge",
                    self.identity, index
                ))
            })?;
            let snapshot = edge.snapshot(tree, position).await.map_err(|e| {
                ControllerError::collision_check_unavailable(format!(
                    "edge {}: {}",
                    edge.identity(),
                    e
                ))
            })?;
            edges.push(snapshot);
        }

        predictor.predict(&edges, delta)
    }

    async fn gate(&self, tree: &DeviceTree, delta: &Vector6<f64>) -> ControllerResult<()> {
        let report = match self.predict_collision(tree, delta).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(panel = %self.identity, error = %e, "Collision check failed; motion vetoed");
                return Err(e);
            }
        };

        if let Err(e) = report.into_result() {
            tracing::warn!(panel = %self.identity, error = %e, "Motion vetoed");
            return Err(e);
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        method: &str,
        lengths: &Vector6<f64>,
    ) -> ControllerResult<OperateOutcome> {
        let handle = self
            .client
            .call_async(&self.identity, &self.node, method, &vector6_values(lengths))
            .await?;
        tracing::info!(
            panel = %self.identity,
            method,
            correlation = %handle.correlation,
            "Motion dispatched"
        );
        Ok(OperateOutcome::Dispatched(handle))
    }

    async fn move_to_coords(
        &self,
        tree: &DeviceTree,
        current: &PanelSnapshot,
        pose: &Vector6<f64>,
    ) -> ControllerResult<OperateOutcome> {
        let target = self.platform.inverse(pose);
        let delta = target - current.lengths;
        tracing::debug!(panel = %self.identity, ?target, "Target lengths computed");
        self.gate(tree, &delta).await?;
        self.dispatch("MoveToLengths", &target).await
    }

    async fn call(&self, method: &str, args: &[Value]) -> ControllerResult<OperateOutcome> {
        let outputs = self.client.call(&self.node, method, args).await?;
        Ok(OperateOutcome::Done(outputs))
    }

    async fn check_state(&self, operation: &PanelOperation) -> ControllerResult<()> {
        let is_stop = matches!(operation, PanelOperation::Stop);
        match self.get_state().await {
            Ok(state @ (DeviceState::Busy | DeviceState::FatalError)) if !is_stop => {
                let policy = self.settings.read().motion_policy;
                if operation.is_motion() && policy == MotionPolicy::Reject {
                    tracing::warn!(
                        panel = %self.identity,
                        state = %state,
                        operation = operation.name(),
                        "Motion rejected in current state"
                    );
                    return Err(ControllerError::invalid_state(format!(
                        "panel {} is {}",
                        self.identity, state
                    )));
                }
                tracing::warn!(
                    panel = %self.identity,
                    state = %state,
                    operation = operation.name(),
                    "Panel is busy or in fatal error; proceeding"
                );
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) if is_stop => {
                tracing::warn!(panel = %self.identity, error = %e, "State read failed; stopping anyway");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for PanelController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelController")
            .field("identity", &self.identity)
            .field("node", &self.node)
            .field("state", &*self.state.read())
            .field("settings", &*self.settings.read())
            .field("actuators", &self.actuator_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[async_trait]
impl PasController for PanelController {
    type Field = PanelField;
    type Operation = PanelOperation;

    fn device_type(&self) -> DeviceType {
        DeviceType::Panel
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
        let state = read_device_state(&self.client, &self.node).await?;
        *self.state.write() = state;
        Ok(state)
    }

    async fn set_state(&self, state: DeviceState) -> ControllerResult<()> {
        check_settable(state)?;
        *self.state.write() = state;
        Ok(())
    }

    async fn get_data(&self, tree: &DeviceTree, field: PanelField) -> ControllerResult<Value> {
        if let Some(i) = field.pose_index() {
            if self.actuator_count() == 0 {
                tracing::debug!(panel = %self.identity, "Panel has no actuators; no pose");
                return Ok(Value::Null);
            }
            let interval = self.settings.read().update_interval;
            let mut cache = self.cache.lock().await;
            if cache.expired(interval) {
                self.refresh(tree, &mut cache).await?;
            }
            return Ok(Value::Float64(cache.snapshot.pose[i]));
        }

        match field {
            PanelField::SafetyRadius => Ok(Value::Float64(self.safety_radius())),
            PanelField::InternalTemperature => {
                Ok(self.client.read_one(&self.node.member("InternalTemperature")).await?)
            }
            PanelField::ExternalTemperature => {
                Ok(self.client.read_one(&self.node.member("ExternalTemperature")).await?)
            }
            PanelField::Position => Ok(self.client.read_one(&self.node.member("Position")).await?),
            PanelField::Serial => {
                Ok(self.client.read_one(&self.node.member("SerialNumber")).await?)
            }
            PanelField::ErrorState => read_error_state(&self.client, &self.node).await,
            _ => Err(ControllerError::invalid_argument(format!("{:?}", field))),
        }
    }

    async fn set_data(
        &self,
        _tree: &DeviceTree,
        field: PanelField,
        value: Value,
    ) -> ControllerResult<()> {
        match field {
            PanelField::SafetyRadius => {
                let radius = value.as_f64().ok_or_else(|| {
                    ControllerError::invalid_argument(format!(
                        "safety radius must be numeric, got {}",
                        value.type_name()
                    ))
                })?;
                self.set_safety_radius(radius)
            }
            other => Err(ControllerError::invalid_argument(format!(
                "{:?} of panel {} is read-only",
                other, self.identity
            ))),
        }
    }

    async fn operate(
        &self,
        tree: &DeviceTree,
        operation: PanelOperation,
    ) -> ControllerResult<OperateOutcome> {
        if self.actuator_count() == 0 && operation != PanelOperation::Stop {
            tracing::info!(
                panel = %self.identity,
                operation = operation.name(),
                "Panel has no actuators; nothing to do"
            );
            return Ok(OperateOutcome::NoOp);
        }

        if !operation.refreshes_cache() {
            self.check_state(&operation).await?;
            return self.maintain(operation).await;
        }

        let mut cache = self.cache.lock().await;
        self.check_state(&operation).await?;
        self.refresh(tree, &mut cache).await?;
        let current = cache.snapshot.clone();

        match operation {
            PanelOperation::MoveDeltaLengths(delta) => {
                self.gate(tree, &delta).await?;
                self.dispatch("MoveDeltaLengths", &delta).await
            }
            PanelOperation::MoveToLengths(target) => {
                let delta = target - current.lengths;
                self.gate(tree, &delta).await?;
                self.dispatch("MoveToLengths", &target).await
            }
            PanelOperation::MoveToCoords(pose) => self.move_to_coords(tree, &current, &pose).await,
            PanelOperation::MoveDeltaCoords(delta) => {
                let pose = current.pose + delta;
                self.move_to_coords(tree, &current, &pose).await
            }
            PanelOperation::ReadAll => {
                tracing::info!(
                    panel = %self.identity,
                    pose = ?current.pose.as_slice(),
                    lengths = ?current.lengths.as_slice(),
                    "Panel coordinates"
                );
                Ok(OperateOutcome::Done(vec![
                    Value::float_array(current.pose.iter().copied()),
                    Value::float_array(current.lengths.iter().copied()),
                    Value::float_array(current.pads.iter().copied()),
                ]))
            }
            other => self.maintain(other).await,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
