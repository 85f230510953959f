// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Symbolic node names on the remote device server.
//!
//! Every variable and method object is addressed by a string identifier of
//! the form `ns=<n>;s=<symbolic-path>`, for example `ns=2;s=Panel_0.State`.
//! [`NodeName`] keeps that string opaque: it can be built and extended with
//! member segments but is never parsed back into parts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DeviceType, Identity};

/// Default namespace index for device nodes.
pub const DEFAULT_NAMESPACE: u16 = 2;

/// An opaque node identifier string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeName(String);

impl NodeName {
    /// Wraps an already formatted identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds a string-path identifier in the given namespace.
    ///
    /// ```
    /// use pas_core::node::NodeName;
    ///
    /// let node = NodeName::string(2, "Panel_0");
    /// assert_eq!(node.as_str(), "ns=2;s=Panel_0");
    /// ```
    pub fn string(namespace: u16, path: impl AsRef<str>) -> Self {
        Self(format!("ns={};s={}", namespace, path.as_ref()))
    }

    /// Builds the default node name for a device: `<Type>_<serial or name>`.
    pub fn for_device(namespace: u16, device_type: DeviceType, identity: &Identity) -> Self {
        Self::string(
            namespace,
            format!("{}_{}", device_type.node_prefix(), identity.node_key()),
        )
    }

    /// Returns a child node name by appending `.member`.
    ///
    /// ```
    /// use pas_core::node::NodeName;
    ///
    /// let state = NodeName::string(2, "Panel_0").member("State");
    /// assert_eq!(state.as_str(), "ns=2;s=Panel_0.State");
    /// ```
    pub fn member(&self, member: &str) -> Self {
        Self(format!("{}.{}", self.0, member))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}
