// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA style status codes.
//!
//! Controllers report outcomes in the status-code space used by the device
//! server. The high bits classify a code as good, uncertain or bad.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 32-bit status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// The operation succeeded.
    pub const GOOD: StatusCode = StatusCode(0x0000_0000);
    /// Generic failure.
    pub const BAD: StatusCode = StatusCode(0x8000_0000);
    /// Unexpected internal failure.
    pub const BAD_INTERNAL_ERROR: StatusCode = StatusCode(0x8002_0000);
    /// Communication with the device server failed.
    pub const BAD_COMMUNICATION_ERROR: StatusCode = StatusCode(0x8005_0000);
    /// The operation timed out.
    pub const BAD_TIMEOUT: StatusCode = StatusCode(0x800A_0000);
    /// No session to the device server.
    pub const BAD_SERVER_NOT_CONNECTED: StatusCode = StatusCode(0x800D_0000);
    /// The node does not exist.
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    /// The node is not writable.
    pub const BAD_NOT_WRITABLE: StatusCode = StatusCode(0x803B_0000);
    /// The value is outside the permitted range.
    pub const BAD_OUT_OF_RANGE: StatusCode = StatusCode(0x803C_0000);
    /// The requested functionality is not implemented.
    pub const BAD_NOT_IMPLEMENTED: StatusCode = StatusCode(0x8040_0000);
    /// The method does not exist on the object.
    pub const BAD_METHOD_INVALID: StatusCode = StatusCode(0x8075_0000);
    /// An argument or offset is outside the supported set.
    pub const BAD_INVALID_ARGUMENT: StatusCode = StatusCode(0x80AB_0000);
    /// The device is in a state that does not permit the request.
    pub const BAD_INVALID_STATE: StatusCode = StatusCode(0x80AF_0000);

    /// Returns `true` if the code is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` if the code is uncertain.
    #[inline]
    pub fn is_uncertain(&self) -> bool {
        self.0 & 0x4000_0000 != 0 && self.0 & 0x8000_0000 == 0
    }

    /// Returns `true` if the code is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns the symbolic name of the code.
    pub fn name(&self) -> &'static str {
        match self.0 {
            0x0000_0000 => "Good",
            0x8000_0000 => "Bad",
            0x8002_0000 => "BadInternalError",
            0x8005_0000 => "BadCommunicationError",
            0x800A_0000 => "BadTimeout",
            0x800D_0000 => "BadServerNotConnected",
            0x8034_0000 => "BadNodeIdUnknown",
            0x803B_0000 => "BadNotWritable",
            0x803C_0000 => "BadOutOfRange",
            0x8040_0000 => "BadNotImplemented",
            0x8075_0000 => "BadMethodInvalid",
            0x80AB_0000 => "BadInvalidArgument",
            0x80AF_0000 => "BadInvalidState",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

impl From<u32> for StatusCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}
