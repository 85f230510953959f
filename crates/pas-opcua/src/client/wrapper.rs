// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! High-level device client.
//!
//! [`DeviceClient`] wraps a [`RemoteDataPort`] with traffic statistics and
//! the pending-operation table. Every controller talks to the device server
//! through one shared client.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use pas_core::error::{PortError, PortResult};
use pas_core::node::NodeName;
use pas_core::types::{Identity, Value};

use super::pending::{CallEvent, CorrelationId, PendingCall, PendingTable};
use super::port::{
    expect_bool, expect_f64, expect_i64, CallCompletion, CompletionReceiver, RemoteDataPort,
    TransactionId,
};
use super::stats::{PortStats, PortStatsSnapshot};

// =============================================================================
// DispatchHandle
// =============================================================================

/// Handle returned by an async dispatch.
#[derive(Debug)]
pub struct DispatchHandle {
    /// Correlation token of the dispatch.
    pub correlation: CorrelationId,
    /// Transaction assigned by the port.
    pub transaction: TransactionId,
    completion: oneshot::Receiver<CallEvent>,
}

impl DispatchHandle {
    /// Waits for the completion of this dispatch.
    ///
    /// Returns `None` if the client was dropped before the call resolved.
    pub async fn completion(self) -> Option<CallEvent> {
        self.completion.await.ok()
    }
}

// =============================================================================
// DeviceClient
// =============================================================================

/// Shared client used by all controllers.
pub struct DeviceClient {
    port: Arc<dyn RemoteDataPort>,
    pending: PendingTable,
    stats: PortStats,
}

impl DeviceClient {
    /// Creates a client over a port.
    pub fn new(port: Arc<dyn RemoteDataPort>) -> Self {
        Self {
            port,
            pending: PendingTable::default(),
            stats: PortStats::new(),
        }
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// Reads several nodes.
    pub async fn read(&self, nodes: &[NodeName]) -> PortResult<Vec<Value>> {
        let start = Instant::now();
        let result = self.port.read(nodes).await;
        self.stats.record_read(start.elapsed());
        if let Err(e) = &result {
            self.stats.record_error();
            tracing::debug!(error = %e, count = nodes.len(), "Read failed");
        }
        result
    }

    /// Reads a single node.
    pub async fn read_one(&self, node: &NodeName) -> PortResult<Value> {
        let mut values = self.read(std::slice::from_ref(node)).await?;
        values
            .pop()
            .ok_or_else(|| PortError::communication(format!("empty read result for {}", node)))
    }

    /// Reads a numeric node.
    pub async fn read_f64(&self, node: &NodeName) -> PortResult<f64> {
        let value = self.read_one(node).await?;
        expect_f64(node, &value)
    }

    /// Reads an integer node.
    pub async fn read_i64(&self, node: &NodeName) -> PortResult<i64> {
        let value = self.read_one(node).await?;
        expect_i64(node, &value)
    }

    /// Reads a boolean node.
    pub async fn read_bool(&self, node: &NodeName) -> PortResult<bool> {
        let value = self.read_one(node).await?;
        expect_bool(node, &value)
    }

    /// Writes several nodes.
    pub async fn write(&self, nodes: &[NodeName], values: &[Value]) -> PortResult<()> {
        if nodes.len() != values.len() {
            return Err(PortError::invalid_request(format!(
                "{} nodes but {} values",
                nodes.len(),
                values.len()
            )));
        }
        let start = Instant::now();
        let result = self.port.write(nodes, values).await;
        self.stats.record_write(start.elapsed());
        if result.is_err() {
            self.stats.record_error();
        }
        result
    }

    /// Writes a single node.
    pub async fn write_one(&self, node: &NodeName, value: Value) -> PortResult<()> {
        self.write(std::slice::from_ref(node), std::slice::from_ref(&value))
            .await
    }

    // =========================================================================
    // Methods
    // =========================================================================

    /// Calls a method synchronously.
    pub async fn call(
        &self,
        object: &NodeName,
        method: &str,
        args: &[Value],
    ) -> PortResult<Vec<Value>> {
        let start = Instant::now();
        let result = self.port.call_method(object, method, args).await;
        self.stats.record_call(start.elapsed());
        match &result {
            Ok(_) => tracing::debug!(object = %object, method, "Method call succeeded"),
            Err(e) => {
                self.stats.record_error();
                tracing::warn!(object = %object, method, error = %e, "Method call failed");
            }
        }
        result
    }

    /// Dispatches a method call asynchronously on behalf of `origin`.
    ///
    /// The returned handle carries a fresh correlation token; the matching
    /// [`CallEvent`] is published once the port reports completion.
    pub async fn call_async(
        &self,
        origin: &Identity,
        object: &NodeName,
        method: &str,
        args: &[Value],
    ) -> PortResult<DispatchHandle> {
        let correlation = CorrelationId::new();
        let completion = self.pending.wait_for(correlation);

        let transaction = match self.port.call_method_async(object, method, args).await {
            Ok(tx) => tx,
            Err(e) => {
                self.pending.forget(&correlation);
                self.stats.record_error();
                tracing::warn!(object = %object, method, error = %e, "Async dispatch failed");
                return Err(e);
            }
        };
        self.stats.record_async_call();

        tracing::info!(
            origin = %origin,
            object = %object,
            method,
            correlation = %correlation,
            transaction = %transaction,
            "Async call dispatched"
        );

        let resolved = self.pending.register(PendingCall {
            correlation,
            origin: origin.clone(),
            object: object.clone(),
            method: method.to_string(),
            transaction,
            issued_at: Utc::now(),
        });
        if let Some(event) = resolved {
            self.stats.record_completion(event.is_good());
        }

        Ok(DispatchHandle {
            correlation,
            transaction,
            completion,
        })
    }

    // =========================================================================
    // Completions
    // =========================================================================

    /// Feeds a completion from the port into the pending table.
    pub fn complete(&self, completion: CallCompletion) -> Option<CallEvent> {
        let event = self.pending.complete(completion)?;
        self.stats.record_completion(event.is_good());
        Some(event)
    }

    /// Spawns a task draining the port's completion channel into this client.
    pub fn spawn_completion_listener(
        self: &Arc<Self>,
        mut completions: CompletionReceiver,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(completion) = completions.recv().await {
                client.complete(completion);
            }
            tracing::debug!("Completion channel closed");
        })
    }

    /// Subscribes to resolved call events.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.pending.subscribe()
    }

    /// Returns `true` if the correlation has not completed yet.
    pub fn is_pending(&self, correlation: &CorrelationId) -> bool {
        self.pending.is_pending(correlation)
    }

    /// Returns the number of in-flight async calls.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns a copy of the in-flight async calls.
    pub fn pending_calls(&self) -> Vec<PendingCall> {
        self.pending.pending()
    }

    /// Returns a snapshot of the traffic counters.
    pub fn stats(&self) -> PortStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClient")
            .field("pending", &self.pending.len())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
