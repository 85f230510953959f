// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for the panel alignment system.
//!
//! This module defines the value types shared by every crate in the
//! workspace:
//!
//! - [`DeviceType`]: The kind of device a controller drives
//! - [`Identity`]: The key naming a device within the topology
//! - [`DeviceState`]: Operational state reported by a device
//! - [`ErrorState`]: Error severity reported by a device
//! - [`Value`]: Variant payload exchanged with the remote device server

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// DeviceType
// =============================================================================

/// The kind of device a controller node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// A six-actuator Stewart-platform mirror panel.
    Panel,
    /// A single linear actuator of a panel.
    Actuator,
    /// An optical edge sensor (MPES).
    Mpes,
    /// A boundary between two adjacent panels, instrumented by MPES.
    Edge,
}

impl DeviceType {
    /// All device types, in a stable order.
    pub const ALL: [DeviceType; 4] = [
        DeviceType::Panel,
        DeviceType::Actuator,
        DeviceType::Mpes,
        DeviceType::Edge,
    ];

    /// Returns the prefix used for this type's node names on the device server.
    pub fn node_prefix(&self) -> &'static str {
        match self {
            DeviceType::Panel => "Panel",
            DeviceType::Actuator => "Actuator",
            DeviceType::Mpes => "MPES",
            DeviceType::Edge => "Edge",
        }
    }

    /// Returns `true` if devices of this type occupy a meaningful position.
    ///
    /// Edges sit between panels and have no position of their own.
    #[inline]
    pub fn has_position(&self) -> bool {
        !matches!(self, DeviceType::Edge)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_prefix())
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Identifies a single device in the topology.
///
/// An identity is immutable once assigned. Panels, actuators and sensors are
/// keyed by serial and position; edges carry only a name such as
/// `"1001+1002"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    /// Manufacturer serial number, if the device has one.
    pub serial: Option<u32>,

    /// Mounting position, if the device has one.
    pub position: Option<u32>,

    /// Human-readable name. Empty for devices named by serial.
    #[serde(default)]
    pub name: String,
}

impl Identity {
    /// Creates an identity for a positioned device with a serial number.
    pub fn new(serial: u32, position: u32) -> Self {
        Self {
            serial: Some(serial),
            position: Some(position),
            name: String::new(),
        }
    }

    /// Creates an identity for a device known only by its serial number.
    pub fn from_serial(serial: u32) -> Self {
        Self {
            serial: Some(serial),
            position: None,
            name: String::new(),
        }
    }

    /// Creates an identity for a device known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            serial: None,
            position: None,
            name: name.into(),
        }
    }

    /// Sets the position.
    pub fn with_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the key used to build this device's default node path.
    ///
    /// This is the serial number when present, the name otherwise.
    pub fn node_key(&self) -> String {
        match self.serial {
            Some(serial) => serial.to_string(),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.is_empty() {
            return f.write_str(&self.name);
        }
        match (self.position, self.serial) {
            (Some(pos), Some(sn)) => write!(f, "{}#{}", pos, sn),
            (None, Some(sn)) => write!(f, "#{}", sn),
            (Some(pos), None) => write!(f, "{}", pos),
            (None, None) => f.write_str("<anonymous>"),
        }
    }
}

// =============================================================================
// DeviceState
// =============================================================================

/// Operational state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    /// Powered and idle.
    #[default]
    On,
    /// Powered down.
    Off,
    /// Executing a command.
    Busy,
    /// Reporting a recoverable error.
    OperableError,
    /// Reporting an unrecoverable error.
    FatalError,
}

impl DeviceState {
    /// Maps a wire code to a state. Unknown codes yield `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::On),
            1 => Some(Self::Off),
            2 => Some(Self::Busy),
            3 => Some(Self::OperableError),
            4 => Some(Self::FatalError),
            _ => None,
        }
    }

    /// Returns the wire code for this state.
    pub fn code(&self) -> i32 {
        match self {
            Self::On => 0,
            Self::Off => 1,
            Self::Busy => 2,
            Self::OperableError => 3,
            Self::FatalError => 4,
        }
    }

    /// Returns `true` for the two error states.
    ///
    /// Error states are only ever read back from a device and can never be
    /// set by a caller.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::OperableError | Self::FatalError)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "On"),
            Self::Off => write!(f, "Off"),
            Self::Busy => write!(f, "Busy"),
            Self::OperableError => write!(f, "OperableError"),
            Self::FatalError => write!(f, "FatalError"),
        }
    }
}

// =============================================================================
// ErrorState
// =============================================================================

/// Error severity reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorState {
    /// No error.
    #[default]
    Nominal,
    /// Recoverable error.
    OperableError,
    /// Unrecoverable error.
    FatalError,
}

impl ErrorState {
    /// Maps a wire code to an error state.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Nominal),
            1 => Some(Self::OperableError),
            2 => Some(Self::FatalError),
            _ => None,
        }
    }

    /// Returns the wire code.
    pub fn code(&self) -> i32 {
        match self {
            Self::Nominal => 0,
            Self::OperableError => 1,
            Self::FatalError => 2,
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A variant value exchanged with the remote device server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Boolean value
    Bool(bool),

    /// Signed 32-bit integer
    Int32(i32),

    /// Signed 64-bit integer
    Int64(i64),

    /// Unsigned 32-bit integer
    UInt32(u32),

    /// 32-bit floating point
    Float32(f32),

    /// 64-bit floating point
    Float64(f64),

    /// UTF-8 string
    String(String),

    /// Array of values
    Array(Vec<Value>),

    /// Null/undefined value
    #[default]
    Null,
}

impl Value {
    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::UInt32(_) => "uint32",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Null => "null",
        }
    }

    /// Returns the value as `f64` if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::UInt32(v) => Some(*v as f64),
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::UInt32(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Returns the value as `bool` if it is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string slice if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements if this is an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` if this is `Null`.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Builds an array of `Float64` values.
    pub fn float_array<I: IntoIterator<Item = f64>>(values: I) -> Self {
        Value::Array(values.into_iter().map(Value::Float64).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt32(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

// =============================================================================
// Tests
// =============================================================================
