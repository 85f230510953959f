// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Remote data port abstraction.
//!
//! [`RemoteDataPort`] is the request/response and async-call facade over the
//! device server. Implementations own the session; this layer only names
//! nodes and carries values.
//!
//! Asynchronous method calls return a [`TransactionId`] immediately. The
//! outcome arrives later as a [`CallCompletion`] on the completion channel
//! handed to the port at construction (see [`completion_channel`]).

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use pas_core::error::{PortError, PortResult};
use pas_core::node::NodeName;
use pas_core::status::StatusCode;
use pas_core::types::Value;

// =============================================================================
// TransactionId
// =============================================================================

/// Transaction identifier assigned by the port to an async method call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub u32);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

// =============================================================================
// CallCompletion
// =============================================================================

/// Out-of-band completion of an async method call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallCompletion {
    /// The transaction this completes.
    pub transaction: TransactionId,
    /// Result status of the call.
    pub status: StatusCode,
    /// Output arguments.
    pub outputs: Vec<Value>,
}

impl CallCompletion {
    /// Creates a good completion.
    pub fn good(transaction: TransactionId, outputs: Vec<Value>) -> Self {
        Self {
            transaction,
            status: StatusCode::GOOD,
            outputs,
        }
    }

    /// Creates a failed completion.
    pub fn failed(transaction: TransactionId, status: StatusCode) -> Self {
        Self {
            transaction,
            status,
            outputs: Vec::new(),
        }
    }
}

/// Sending half of the completion channel.
pub type CompletionSender = mpsc::UnboundedSender<CallCompletion>;

/// Receiving half of the completion channel.
pub type CompletionReceiver = mpsc::UnboundedReceiver<CallCompletion>;

/// Creates a completion channel.
pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}

// =============================================================================
// RemoteDataPort
// =============================================================================

/// Request/response facade over the remote device server.
#[async_trait]
pub trait RemoteDataPort: Send + Sync {
    /// Reads the values of the given nodes, in order.
    async fn read(&self, nodes: &[NodeName]) -> PortResult<Vec<Value>>;

    /// Writes values to the given nodes. `nodes` and `values` pair up by index.
    async fn write(&self, nodes: &[NodeName], values: &[Value]) -> PortResult<()>;

    /// Calls a method and waits for its result.
    async fn call_method(
        &self,
        object: &NodeName,
        method: &str,
        args: &[Value],
    ) -> PortResult<Vec<Value>>;

    /// Dispatches a method call and returns as soon as the server accepted it.
    async fn call_method_async(
        &self,
        object: &NodeName,
        method: &str,
        args: &[Value],
    ) -> PortResult<TransactionId>;

    /// Reads a single node.
    async fn read_one(&self, node: &NodeName) -> PortResult<Value> {
        let mut values = self.read(std::slice::from_ref(node)).await?;
        values
            .pop()
            .ok_or_else(|| PortError::bad_status(node, StatusCode::BAD_INTERNAL_ERROR))
    }

    /// Writes a single node.
    async fn write_one(&self, node: &NodeName, value: Value) -> PortResult<()> {
        self.write(std::slice::from_ref(node), std::slice::from_ref(&value))
            .await
    }
}

/// Interprets a read value as a number.
pub fn expect_f64(node: &NodeName, value: &Value) -> PortResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| PortError::type_mismatch(node, "number", value.type_name()))
}

/// Interprets a read value as an integer.
pub fn expect_i64(node: &NodeName, value: &Value) -> PortResult<i64> {
    match value {
        Value::Float32(v) if v.fract() == 0.0 => Ok(*v as i64),
        Value::Float64(v) if v.fract() == 0.0 => Ok(*v as i64),
        other => other
            .as_i64()
            .ok_or_else(|| PortError::type_mismatch(node, "integer", other.type_name())),
    }
}

/// Interprets a read value as a boolean.
pub fn expect_bool(node: &NodeName, value: &Value) -> PortResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| PortError::type_mismatch(node, "bool", value.type_name()))
}
