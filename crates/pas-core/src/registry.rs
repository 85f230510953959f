// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-node child registry of the composite controller tree.
//!
//! A [`ChildRegistry`] keeps three consistent views over the children of a
//! single controller node:
//!
//! - `type -> ordered children` (registration order)
//! - `type -> identity -> index`
//! - `type -> position -> index` (only for children with a position)
//!
//! The registry is append-only. Re-registering a known `(type, identity)` pair
//! is a logged no-op, and registering a type outside the node's permitted set
//! is an explicit [`RegistrationError`].
//!
//! # Example
//!
//! ```
//! use pas_core::registry::{ChildRegistry, Registered};
//! use pas_core::types::{DeviceType, Identity};
//!
//! let mut registry: ChildRegistry<usize> =
//!     ChildRegistry::new(DeviceType::Panel, Identity::new(7, 1001), [DeviceType::Actuator]);
//!
//! let id = Identity::new(100, 1);
//! assert_eq!(registry.add_child(DeviceType::Actuator, id.clone(), 42), Ok(Registered::Added(0)));
//! assert_eq!(registry.add_child(DeviceType::Actuator, id, 42), Ok(Registered::AlreadyPresent(0)));
//! assert_eq!(registry.child_count(DeviceType::Actuator), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::RegistrationError;
use crate::types::{DeviceType, Identity};

// =============================================================================
// Registered
// =============================================================================

/// Outcome of a successful [`ChildRegistry::add_child`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    /// The child was appended at this index.
    Added(usize),
    /// The child was already registered at this index; nothing changed.
    AlreadyPresent(usize),
}

impl Registered {
    /// Returns the index of the child within its type's sequence.
    pub fn index(&self) -> usize {
        match self {
            Registered::Added(i) | Registered::AlreadyPresent(i) => *i,
        }
    }

    /// Returns `true` if this call appended the child.
    pub fn is_new(&self) -> bool {
        matches!(self, Registered::Added(_))
    }
}

// =============================================================================
// ChildEntry
// =============================================================================

/// A registered child: its identity and the handle used to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry<H> {
    /// The child's identity.
    pub identity: Identity,
    /// Handle to the child controller.
    pub handle: H,
}

// =============================================================================
// ChildRegistry
// =============================================================================

/// Registry of a controller node's children, indexed three ways.
#[derive(Debug, Clone)]
pub struct ChildRegistry<H> {
    owner: DeviceType,
    owner_id: Identity,
    allowed: BTreeSet<DeviceType>,
    children: HashMap<DeviceType, Vec<ChildEntry<H>>>,
    by_identity: HashMap<DeviceType, HashMap<Identity, usize>>,
    by_position: HashMap<DeviceType, BTreeMap<u32, usize>>,
}

impl<H: Clone> ChildRegistry<H> {
    /// Creates an empty registry for a node that may parent the given types.
    pub fn new(
        owner: DeviceType,
        owner_id: Identity,
        allowed: impl IntoIterator<Item = DeviceType>,
    ) -> Self {
        Self {
            owner,
            owner_id,
            allowed: allowed.into_iter().collect(),
            children: HashMap::new(),
            by_identity: HashMap::new(),
            by_position: HashMap::new(),
        }
    }

    /// Returns `true` if this node may parent children of `device_type`.
    #[inline]
    pub fn accepts(&self, device_type: DeviceType) -> bool {
        self.allowed.contains(&device_type)
    }

    /// Returns the permitted child types.
    pub fn allowed_types(&self) -> impl Iterator<Item = DeviceType> + '_ {
        self.allowed.iter().copied()
    }

    /// Registers a child.
    ///
    /// Returns [`RegistrationError::UnsupportedChildType`] without touching
    /// any map if `device_type` is not permitted. If `(device_type, identity)`
    /// is already registered, nothing changes and the existing index is
    /// returned as [`Registered::AlreadyPresent`].
    pub fn add_child(
        &mut self,
        device_type: DeviceType,
        identity: Identity,
        handle: H,
    ) -> Result<Registered, RegistrationError> {
        if !self.accepts(device_type) {
            return Err(RegistrationError::UnsupportedChildType {
                parent: self.owner,
                parent_id: self.owner_id.clone(),
                child: device_type,
            });
        }

        let identities = self.by_identity.entry(device_type).or_default();
        if let Some(&index) = identities.get(&identity) {
            tracing::info!(
                parent = %self.owner_id,
                child_type = %device_type,
                child = %identity,
                "Child already added"
            );
            return Ok(Registered::AlreadyPresent(index));
        }

        let entries = self.children.entry(device_type).or_default();
        let index = entries.len();
        entries.push(ChildEntry {
            identity: identity.clone(),
            handle,
        });
        identities.insert(identity.clone(), index);

        if device_type.has_position() {
            if let Some(position) = identity.position {
                let positions = self.by_position.entry(device_type).or_default();
                if let Some(&existing) = positions.get(&position) {
                    tracing::warn!(
                        parent = %self.owner_id,
                        child_type = %device_type,
                        position,
                        existing_index = existing,
                        "Position already occupied; keeping the first child"
                    );
                } else {
                    positions.insert(position, index);
                }
            }
        }

        tracing::debug!(
            parent = %self.owner_id,
            child_type = %device_type,
            child = %identity,
            index,
            "Child registered"
        );
        Ok(Registered::Added(index))
    }

    /// Returns the children of a type in registration order.
    ///
    /// A type that was never registered yields an empty slice.
    pub fn children(&self, device_type: DeviceType) -> &[ChildEntry<H>] {
        self.children
            .get(&device_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the handles of a type in registration order.
    pub fn handles(&self, device_type: DeviceType) -> impl Iterator<Item = &H> + '_ {
        self.children(device_type).iter().map(|entry| &entry.handle)
    }

    /// Returns the number of children of a type.
    pub fn child_count(&self, device_type: DeviceType) -> usize {
        self.children(device_type).len()
    }

    /// Returns the total number of children across all types.
    pub fn total_count(&self) -> usize {
        self.children.values().map(Vec::len).sum()
    }

    /// Returns the index of a child by identity.
    pub fn index_of(&self, device_type: DeviceType, identity: &Identity) -> Option<usize> {
        self.by_identity
            .get(&device_type)
            .and_then(|map| map.get(identity))
            .copied()
    }

    /// Returns the handle of a child by identity.
    pub fn by_identity(&self, device_type: DeviceType, identity: &Identity) -> Option<&H> {
        self.index_of(device_type, identity)
            .and_then(|i| self.children(device_type).get(i))
            .map(|entry| &entry.handle)
    }

    /// Returns the index of a child by position.
    pub fn index_at(&self, device_type: DeviceType, position: u32) -> Option<usize> {
        self.by_position
            .get(&device_type)
            .and_then(|map| map.get(&position))
            .copied()
    }

    /// Returns the handle of a child by position.
    pub fn by_position(&self, device_type: DeviceType, position: u32) -> Option<&H> {
        self.index_at(device_type, position)
            .and_then(|i| self.children(device_type).get(i))
            .map(|entry| &entry.handle)
    }

    /// Returns `(position, handle)` pairs of a type in ascending position order.
    pub fn by_position_ordered(&self, device_type: DeviceType) -> Vec<(u32, &H)> {
        let entries = self.children(device_type);
        self.by_position
            .get(&device_type)
            .map(|map| {
                map.iter()
                    .filter_map(|(&pos, &i)| entries.get(i).map(|e| (pos, &e.handle)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// Tests
// =============================================================================
