// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The device tree.
//!
//! Controllers live in a single arena owned by [`DeviceTree`]. Parent to
//! child links are [`NodeIndex`] values held in each composite controller's
//! registry, never references, so an edge can list a panel that also lists
//! the edge. The tree is assembled by a [`TopologyBuilder`] and frozen once
//! built; controllers mutate only their own interior state afterwards.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pas_core::Identity;
//! use pas_control::{PanelSettings, TopologyBuilder};
//! use pas_opcua::{DeviceClient, SimulatedPort};
//!
//! # fn demo() -> Result<(), pas_core::RegistrationError> {
//! let client = Arc::new(DeviceClient::new(Arc::new(SimulatedPort::without_completions())));
//! let mut builder = TopologyBuilder::new(client, 2);
//!
//! let panel = builder.add_panel(Identity::new(7, 1001), PanelSettings::default())?;
//! for position in 1..=6 {
//!     let actuator = builder.add_actuator(Identity::new(100 + position, position))?;
//!     builder.link(panel, actuator)?;
//! }
//! let tree = builder.build();
//! assert_eq!(tree.len(), 7);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use pas_core::error::{ControllerError, ControllerResult, RegistrationError};
use pas_core::node::NodeName;
use pas_core::registry::Registered;
use pas_core::types::{DeviceState, DeviceType, Identity, Value};
use pas_opcua::DeviceClient;

use crate::controller::{
    Children, DeviceField, DeviceOperation, NodeIndex, OperateOutcome, PasController,
};
use crate::controllers::{
    ActuatorController, EdgeController, MpesCalibration, MpesController, PanelController,
    PanelSettings,
};

// =============================================================================
// DeviceNode
// =============================================================================

/// A controller in the arena.
#[derive(Debug)]
pub enum DeviceNode {
    /// Mirror panel.
    Panel(PanelController),
    /// Linear actuator.
    Actuator(ActuatorController),
    /// Edge sensor.
    Mpes(MpesController),
    /// Panel edge.
    Edge(EdgeController),
}

macro_rules! dispatch {
    ($node:expr, $c:ident => $body:expr) => {
        match $node {
            DeviceNode::Panel($c) => $body,
            DeviceNode::Actuator($c) => $body,
            DeviceNode::Mpes($c) => $body,
            DeviceNode::Edge($c) => $body,
        }
    };
}

impl DeviceNode {
    /// Returns the device type.
    pub fn device_type(&self) -> DeviceType {
        dispatch!(self, c => c.device_type())
    }

    /// Returns the identity.
    pub fn identity(&self) -> &Identity {
        dispatch!(self, c => c.identity())
    }

    /// Returns the object node.
    pub fn node(&self) -> &NodeName {
        dispatch!(self, c => c.node())
    }

    /// Returns the last known state.
    pub fn state(&self) -> DeviceState {
        dispatch!(self, c => c.state())
    }

    /// Returns the child registry of composite nodes.
    pub fn children(&self) -> Option<&Children> {
        dispatch!(self, c => c.children())
    }

    fn children_mut(&mut self) -> Option<&mut Children> {
        dispatch!(self, c => c.children_mut())
    }

    /// Returns the panel controller, if this is a panel.
    pub fn as_panel(&self) -> Option<&PanelController> {
        match self {
            DeviceNode::Panel(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the actuator controller, if this is an actuator.
    pub fn as_actuator(&self) -> Option<&ActuatorController> {
        match self {
            DeviceNode::Actuator(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the MPES controller, if this is an MPES.
    pub fn as_mpes(&self) -> Option<&MpesController> {
        match self {
            DeviceNode::Mpes(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the edge controller, if this is an edge.
    pub fn as_edge(&self) -> Option<&EdgeController> {
        match self {
            DeviceNode::Edge(c) => Some(c),
            _ => None,
        }
    }
}

// =============================================================================
// DeviceTree
// =============================================================================

/// Arena of every controller in a topology.
#[derive(Debug)]
pub struct DeviceTree {
    nodes: Vec<DeviceNode>,
    lookup: HashMap<(DeviceType, Identity), NodeIndex>,
    client: Arc<DeviceClient>,
}

impl DeviceTree {
    /// Returns the shared device client.
    pub fn client(&self) -> &Arc<DeviceClient> {
        &self.client
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns a node.
    pub fn get(&self, index: NodeIndex) -> Option<&DeviceNode> {
        self.nodes.get(index.0)
    }

    /// Iterates over every node with its index.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &DeviceNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex(i), node))
    }

    /// Finds a node by type and identity.
    pub fn find(&self, device_type: DeviceType, identity: &Identity) -> Option<NodeIndex> {
        self.lookup.get(&(device_type, identity.clone())).copied()
    }

    /// Returns a panel by index.
    pub fn panel(&self, index: NodeIndex) -> Option<&PanelController> {
        self.get(index).and_then(DeviceNode::as_panel)
    }

    /// Returns an actuator by index.
    pub fn actuator(&self, index: NodeIndex) -> Option<&ActuatorController> {
        self.get(index).and_then(DeviceNode::as_actuator)
    }

    /// Returns an MPES by index.
    pub fn mpes(&self, index: NodeIndex) -> Option<&MpesController> {
        self.get(index).and_then(DeviceNode::as_mpes)
    }

    /// Returns an edge by index.
    pub fn edge(&self, index: NodeIndex) -> Option<&EdgeController> {
        self.get(index).and_then(DeviceNode::as_edge)
    }

    /// Iterates over every panel.
    pub fn panels(&self) -> impl Iterator<Item = (NodeIndex, &PanelController)> + '_ {
        self.iter()
            .filter_map(|(i, node)| node.as_panel().map(|panel| (i, panel)))
    }

    /// Finds a panel by mounting position.
    pub fn panel_at(&self, position: u32) -> Option<(NodeIndex, &PanelController)> {
        self.panels()
            .find(|(_, panel)| panel.position() == Some(position))
    }

    /// Returns the indices of every node of a type, in insertion order.
    pub fn indices_of(&self, device_type: DeviceType) -> Vec<NodeIndex> {
        self.iter()
            .filter(|(_, node)| node.device_type() == device_type)
            .map(|(i, _)| i)
            .collect()
    }

    fn require(&self, index: NodeIndex) -> ControllerResult<&DeviceNode> {
        self.get(index).ok_or_else(|| {
            ControllerError::invalid_argument(format!("no device at {}", index))
        })
    }

    // =========================================================================
    // Offset surface
    // =========================================================================

    /// Refreshes and returns a node's state.
    pub async fn get_state(&self, index: NodeIndex) -> ControllerResult<DeviceState> {
        dispatch!(self.require(index)?, c => c.get_state().await)
    }

    /// Requests a state transition on a node.
    pub async fn set_state(&self, index: NodeIndex, state: DeviceState) -> ControllerResult<()> {
        dispatch!(self.require(index)?, c => c.set_state(state).await)
    }

    /// Reads a property of a node by numeric offset.
    pub async fn get_data(&self, index: NodeIndex, offset: u32) -> ControllerResult<Value> {
        dispatch!(self.require(index)?, c => get_data_at(c, self, offset).await)
    }

    /// Writes a property of a node by numeric offset.
    pub async fn set_data(
        &self,
        index: NodeIndex,
        offset: u32,
        value: Value,
    ) -> ControllerResult<()> {
        dispatch!(self.require(index)?, c => set_data_at(c, self, offset, value).await)
    }

    /// Runs a command on a node by numeric offset.
    pub async fn operate(
        &self,
        index: NodeIndex,
        offset: u32,
        args: &[Value],
    ) -> ControllerResult<OperateOutcome> {
        dispatch!(self.require(index)?, c => operate_at(c, self, offset, args).await)
    }
}

async fn get_data_at<C: PasController>(
    controller: &C,
    tree: &DeviceTree,
    offset: u32,
) -> ControllerResult<Value> {
    let field = C::Field::from_offset(offset)?;
    controller.get_data(tree, field).await
}

async fn set_data_at<C: PasController>(
    controller: &C,
    tree: &DeviceTree,
    offset: u32,
    value: Value,
) -> ControllerResult<()> {
    let field = C::Field::from_offset(offset)?;
    controller.set_data(tree, field, value).await
}

async fn operate_at<C: PasController>(
    controller: &C,
    tree: &DeviceTree,
    offset: u32,
    args: &[Value],
) -> ControllerResult<OperateOutcome> {
    let operation = C::Operation::from_offset(offset, args)?;
    tracing::debug!(
        device = %controller.identity(),
        operation = operation.name(),
        "Operate"
    );
    controller.operate(tree, operation).await
}

// =============================================================================
// TopologyBuilder
// =============================================================================

/// Assembles a [`DeviceTree`].
pub struct TopologyBuilder {
    client: Arc<DeviceClient>,
    namespace: u16,
    nodes: Vec<DeviceNode>,
    lookup: HashMap<(DeviceType, Identity), NodeIndex>,
}

impl TopologyBuilder {
    /// Creates an empty builder. Default node names use `namespace`.
    pub fn new(client: Arc<DeviceClient>, namespace: u16) -> Self {
        Self {
            client,
            namespace,
            nodes: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Returns the shared client.
    pub fn client(&self) -> &Arc<DeviceClient> {
        &self.client
    }

    /// Returns the default node name for a device.
    pub fn default_node(&self, device_type: DeviceType, identity: &Identity) -> NodeName {
        NodeName::for_device(self.namespace, device_type, identity)
    }

    /// Adds a prebuilt controller.
    pub fn add(&mut self, node: DeviceNode) -> Result<NodeIndex, RegistrationError> {
        let key = (node.device_type(), node.identity().clone());
        if self.lookup.contains_key(&key) {
            return Err(RegistrationError::DuplicateDevice {
                device_type: key.0,
                identity: key.1,
            });
        }
        let index = NodeIndex(self.nodes.len());
        tracing::debug!(
            device_type = %key.0,
            identity = %key.1,
            node = %node.node(),
            index = index.0,
            "Device added"
        );
        self.lookup.insert(key, index);
        self.nodes.push(node);
        Ok(index)
    }

    /// Adds a panel at its default node.
    pub fn add_panel(
        &mut self,
        identity: Identity,
        settings: PanelSettings,
    ) -> Result<NodeIndex, RegistrationError> {
        let node = self.default_node(DeviceType::Panel, &identity);
        self.add_panel_at(identity, node, settings)
    }

    /// Adds a panel at an explicit node.
    pub fn add_panel_at(
        &mut self,
        identity: Identity,
        node: NodeName,
        settings: PanelSettings,
    ) -> Result<NodeIndex, RegistrationError> {
        let client = Arc::clone(&self.client);
        self.add(DeviceNode::Panel(PanelController::new(
            identity, node, client, settings,
        )))
    }

    /// Adds an actuator at its default node.
    pub fn add_actuator(&mut self, identity: Identity) -> Result<NodeIndex, RegistrationError> {
        let node = self.default_node(DeviceType::Actuator, &identity);
        self.add_actuator_at(identity, node)
    }

    /// Adds an actuator at an explicit node.
    pub fn add_actuator_at(
        &mut self,
        identity: Identity,
        node: NodeName,
    ) -> Result<NodeIndex, RegistrationError> {
        let client = Arc::clone(&self.client);
        self.add(DeviceNode::Actuator(ActuatorController::new(
            identity, node, client,
        )))
    }

    /// Adds an MPES at its default node.
    pub fn add_mpes(
        &mut self,
        identity: Identity,
        calibration: MpesCalibration,
    ) -> Result<NodeIndex, RegistrationError> {
        let node = self.default_node(DeviceType::Mpes, &identity);
        self.add_mpes_at(identity, node, calibration)
    }

    /// Adds an MPES at an explicit node.
    pub fn add_mpes_at(
        &mut self,
        identity: Identity,
        node: NodeName,
        calibration: MpesCalibration,
    ) -> Result<NodeIndex, RegistrationError> {
        let client = Arc::clone(&self.client);
        self.add(DeviceNode::Mpes(MpesController::new(
            identity,
            node,
            client,
            calibration,
        )))
    }

    /// Adds an edge at its default node.
    pub fn add_edge(&mut self, identity: Identity) -> Result<NodeIndex, RegistrationError> {
        let node = self.default_node(DeviceType::Edge, &identity);
        self.add(DeviceNode::Edge(EdgeController::new(identity, node)))
    }

    /// Registers `child` under `parent`.
    pub fn link(
        &mut self,
        parent: NodeIndex,
        child: NodeIndex,
    ) -> Result<Registered, RegistrationError> {
        let (child_type, child_id) = match self.nodes.get(child.0) {
            Some(node) => (node.device_type(), node.identity().clone()),
            None => return Err(RegistrationError::UnknownNode { index: child.0 }),
        };
        let parent_node = self
            .nodes
            .get_mut(parent.0)
            .ok_or(RegistrationError::UnknownNode { index: parent.0 })?;
        let parent_type = parent_node.device_type();
        let parent_id = parent_node.identity().clone();

        match parent_node.children_mut() {
            Some(children) => children.add_child(child_type, child_id, child),
            None => Err(RegistrationError::UnsupportedChildType {
                parent: parent_type,
                parent_id,
                child: child_type,
            }),
        }
    }

    /// Looks up a node added so far.
    pub fn find(&self, device_type: DeviceType, identity: &Identity) -> Option<NodeIndex> {
        self.lookup.get(&(device_type, identity.clone())).copied()
    }

    /// Freezes the topology.
    pub fn build(self) -> Arc<DeviceTree> {
        tracing::info!(nodes = self.nodes.len(), "Device tree built");
        Arc::new(DeviceTree {
            nodes: self.nodes,
            lookup: self.lookup,
            client: self.client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pas_opcua::SimulatedPort;

    fn builder() -> TopologyBuilder {
        let port = SimulatedPort::without_completions();
        TopologyBuilder::new(Arc::new(DeviceClient::new(Arc::new(port))), 2)
    }

    #[test]
    fn test_link_and_lookup() {
        let mut b = builder();
        let panel = b
            .add_panel(Identity::new(7, 1001), PanelSettings::default())
            .unwrap();
        let act = b.add_actuator(Identity::new(101, 1)).unwrap();

        assert_eq!(b.link(panel, act).unwrap(), Registered::Added(0));
        assert_eq!(b.link(panel, act).unwrap(), Registered::AlreadyPresent(0));

        let tree = b.build();
        assert_eq!(tree.panel(panel).unwrap().actuator_count(), 1);
        assert_eq!(tree.find(DeviceType::Actuator, &Identity::new(101, 1)), Some(act));
        assert_eq!(
            tree.get(act).unwrap().node().as_str(),
            "ns=2;s=Actuator_101"
        );
        assert!(tree.panel_at(1001).is_some());
        assert!(tree.panel_at(1002).is_none());
    }

    #[test]
    fn test_leaf_rejects_children() {
        let mut b = builder();
        let a = b.add_actuator(Identity::new(101, 1)).unwrap();
        let c = b.add_actuator(Identity::new(102, 2)).unwrap();
        assert!(matches!(
            b.link(a, c),
            Err(RegistrationError::UnsupportedChildType { .. })
        ));
        assert!(matches!(
            b.link(a, NodeIndex(99)),
            Err(RegistrationError::UnknownNode { index: 99 })
        ));
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let mut b = builder();
        b.add_edge(Identity::named("1001+1002")).unwrap();
        assert!(matches!(
            b.add_edge(Identity::named("1001+1002")),
            Err(RegistrationError::DuplicateDevice { .. })
        ));
    }

    #[test]
    fn test_edge_panel_cycle() {
        let mut b = builder();
        let panel = b
            .add_panel(Identity::new(7, 1001), PanelSettings::default())
            .unwrap();
        let edge = b.add_edge(Identity::named("1001+1002")).unwrap();
        b.link(panel, edge).unwrap();
        b.link(edge, panel).unwrap();

        let tree = b.build();
        assert_eq!(tree.panel(panel).unwrap().edge_count(), 1);
        assert_eq!(
            tree.get(edge)
                .unwrap()
                .children()
                .unwrap()
                .child_count(DeviceType::Panel),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_offset_is_invalid_argument() {
        let mut b = builder();
        let panel = b
            .add_panel(Identity::new(7, 1001), PanelSettings::default())
            .unwrap();
        let tree = b.build();

        let err = tree.get_data(panel, 99).await.unwrap_err();
        assert_eq!(err.status_code(), pas_core::StatusCode::BAD_INVALID_ARGUMENT);
        let err = tree.operate(panel, 99, &[]).await.unwrap_err();
        assert_eq!(err.status_code(), pas_core::StatusCode::BAD_INVALID_ARGUMENT);
        assert!(tree.get_data(NodeIndex(5), 0).await.is_err());
    }
}
