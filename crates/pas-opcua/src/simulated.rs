// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory device server.
//!
//! [`SimulatedPort`] implements [`RemoteDataPort`] over a table of variables
//! and a set of named method handlers. It records every interaction for
//! verification and supports failure injection, so it backs both the CLI
//! `simulate` command and the test suites.
//!
//! Methods without a registered handler succeed with no outputs. Async calls
//! run their handler on a spawned task (after the configured delay) and
//! deliver the outcome on the completion channel.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use pas_core::error::{PortError, PortResult};
use pas_core::node::NodeName;
use pas_core::status::StatusCode;
use pas_core::types::Value;

use crate::client::{CallCompletion, CompletionSender, RemoteDataPort, TransactionId};

// =============================================================================
// Variables
// =============================================================================

/// View of the simulated variable table handed to method handlers.
#[derive(Clone, Copy)]
pub struct Variables<'a>(&'a DashMap<NodeName, Value>);

impl Variables<'_> {
    /// Returns the value of a node.
    pub fn get(&self, node: &NodeName) -> Option<Value> {
        self.0.get(node).map(|v| v.value().clone())
    }

    /// Returns a numeric node value.
    pub fn get_f64(&self, node: &NodeName) -> Option<f64> {
        self.get(node).and_then(|v| v.as_f64())
    }

    /// Sets the value of a node.
    pub fn set(&self, node: NodeName, value: impl Into<Value>) {
        self.0.insert(node, value.into());
    }
}

/// Handler invoked for a simulated method call.
pub type MethodHandler =
    Arc<dyn Fn(Variables<'_>, &[Value]) -> Result<Vec<Value>, StatusCode> + Send + Sync>;

// =============================================================================
// RecordedCall
// =============================================================================

/// A method call observed by the simulated port.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Target object.
    pub object: NodeName,
    /// Method name.
    pub method: String,
    /// Input arguments.
    pub args: Vec<Value>,
    /// Transaction, for async calls.
    pub transaction: Option<TransactionId>,
}

impl RecordedCall {
    /// Returns `true` if this was an async dispatch.
    pub fn is_async(&self) -> bool {
        self.transaction.is_some()
    }

    /// Returns the arguments as numbers.
    pub fn numeric_args(&self) -> Vec<f64> {
        self.args.iter().filter_map(Value::as_f64).collect()
    }
}

// =============================================================================
// SimulatedPort
// =============================================================================

struct SimInner {
    variables: DashMap<NodeName, Value>,
    methods: DashMap<(NodeName, String), MethodHandler>,
    calls: Mutex<Vec<RecordedCall>>,
    completions: Option<CompletionSender>,
    completion_delay: Mutex<Duration>,
    next_transaction: AtomicU32,

    fail_next_read: AtomicBool,
    fail_all_reads: AtomicBool,
    fail_all_calls: AtomicBool,
    disconnected: AtomicBool,
    stalled_members: Mutex<HashSet<String>>,

    read_count: AtomicU64,
    write_count: AtomicU64,
}

/// An in-memory device server. Clones share state.
#[derive(Clone)]
pub struct SimulatedPort {
    inner: Arc<SimInner>,
}

impl SimulatedPort {
    /// Creates a port that delivers async completions on `completions`.
    pub fn new(completions: CompletionSender) -> Self {
        Self::build(Some(completions))
    }

    /// Creates a port whose async calls are accepted but never complete.
    pub fn without_completions() -> Self {
        Self::build(None)
    }

    fn build(completions: Option<CompletionSender>) -> Self {
        Self {
            inner: Arc::new(SimInner {
                variables: DashMap::new(),
                methods: DashMap::new(),
                calls: Mutex::new(Vec::new()),
                completions,
                completion_delay: Mutex::new(Duration::ZERO),
                next_transaction: AtomicU32::new(1),
                fail_next_read: AtomicBool::new(false),
                fail_all_reads: AtomicBool::new(false),
                fail_all_calls: AtomicBool::new(false),
                disconnected: AtomicBool::new(false),
                stalled_members: Mutex::new(HashSet::new()),
                read_count: AtomicU64::new(0),
                write_count: AtomicU64::new(0),
            }),
        }
    }

    // =========================================================================
    // Address space
    // =========================================================================

    /// Sets a variable.
    pub fn set(&self, node: NodeName, value: impl Into<Value>) {
        self.inner.variables.insert(node, value.into());
    }

    /// Returns a variable.
    pub fn get(&self, node: &NodeName) -> Option<Value> {
        self.inner.variables.get(node).map(|v| v.value().clone())
    }

    /// Removes a variable.
    pub fn remove(&self, node: &NodeName) -> Option<Value> {
        self.inner.variables.remove(node).map(|(_, v)| v)
    }

    /// Registers a method handler on an object.
    pub fn on_method<F>(&self, object: NodeName, method: impl Into<String>, handler: F)
    where
        F: Fn(Variables<'_>, &[Value]) -> Result<Vec<Value>, StatusCode> + Send + Sync + 'static,
    {
        self.inner
            .methods
            .insert((object, method.into()), Arc::new(handler));
    }

    /// Sets the delay before async calls complete.
    pub fn set_completion_delay(&self, delay: Duration) {
        *self.inner.completion_delay.lock() = delay;
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Makes the next read fail with a communication error.
    pub fn fail_next_read(&self) {
        self.inner.fail_next_read.store(true, Ordering::SeqCst);
    }

    /// Makes every read fail until cleared.
    pub fn fail_all_reads(&self, fail: bool) {
        self.inner.fail_all_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every method call fail until cleared.
    pub fn fail_all_calls(&self, fail: bool) {
        self.inner.fail_all_calls.store(fail, Ordering::SeqCst);
    }

    /// Makes reads of any `<device>.<member>` variable hang until cleared.
    ///
    /// A read already hanging stays hung.
    pub fn stall_reads(&self, member: &str, stall: bool) {
        let mut stalled = self.inner.stalled_members.lock();
        if stall {
            stalled.insert(member.to_string());
        } else {
            stalled.remove(member);
        }
    }

    fn is_stalled(&self, nodes: &[NodeName]) -> bool {
        let stalled = self.inner.stalled_members.lock();
        !stalled.is_empty()
            && nodes.iter().any(|node| {
                node.as_str()
                    .rsplit_once('.')
                    .map_or(false, |(_, member)| stalled.contains(member))
            })
    }

    /// Simulates a lost session.
    pub fn set_disconnected(&self, disconnected: bool) {
        self.inner.disconnected.store(disconnected, Ordering::SeqCst);
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Returns every recorded method call, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.calls.lock().clone()
    }

    /// Returns recorded calls of a method.
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Returns the number of async dispatches.
    pub fn async_call_count(&self) -> usize {
        self.inner.calls.lock().iter().filter(|c| c.is_async()).count()
    }

    /// Returns the number of method calls of any kind.
    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().len()
    }

    /// Returns the number of read requests.
    pub fn read_count(&self) -> u64 {
        self.inner.read_count.load(Ordering::SeqCst)
    }

    /// Returns the number of write requests.
    pub fn write_count(&self) -> u64 {
        self.inner.write_count.load(Ordering::SeqCst)
    }

    /// Clears the call log.
    pub fn clear_calls(&self) {
        self.inner.calls.lock().clear();
    }

    fn check_connected(&self) -> PortResult<()> {
        if self.inner.disconnected.load(Ordering::SeqCst) {
            return Err(PortError::NotConnected);
        }
        Ok(())
    }

    fn handler(&self, object: &NodeName, method: &str) -> Option<MethodHandler> {
        self.inner
            .methods
            .get(&(object.clone(), method.to_string()))
            .map(|h| Arc::clone(h.value()))
    }

    fn record(&self, object: &NodeName, method: &str, args: &[Value], tx: Option<TransactionId>) {
        self.inner.calls.lock().push(RecordedCall {
            object: object.clone(),
            method: method.to_string(),
            args: args.to_vec(),
            transaction: tx,
        });
    }
}

impl std::fmt::Debug for SimulatedPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedPort")
            .field("variables", &self.inner.variables.len())
            .field("methods", &self.inner.methods.len())
            .field("calls", &self.inner.calls.lock().len())
            .finish()
    }
}

#[async_trait]
impl RemoteDataPort for SimulatedPort {
    async fn read(&self, nodes: &[NodeName]) -> PortResult<Vec<Value>> {
        self.check_connected()?;
        self.inner.read_count.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_all_reads.load(Ordering::SeqCst)
            || self.inner.fail_next_read.swap(false, Ordering::SeqCst)
        {
            return Err(PortError::communication("simulated read failure"));
        }
        if self.is_stalled(nodes) {
            std::future::pending::<()>().await;
        }

        nodes
            .iter()
            .map(|node| self.get(node).ok_or_else(|| PortError::node_unknown(node)))
            .collect()
    }

    async fn write(&self, nodes: &[NodeName], values: &[Value]) -> PortResult<()> {
        self.check_connected()?;
        self.inner.write_count.fetch_add(1, Ordering::SeqCst);

        for node in nodes {
            if !self.inner.variables.contains_key(node) {
                return Err(PortError::node_unknown(node));
            }
        }
        for (node, value) in nodes.iter().zip(values) {
            self.set(node.clone(), value.clone());
        }
        Ok(())
    }

    async fn call_method(
        &self,
        object: &NodeName,
        method: &str,
        args: &[Value],
    ) -> PortResult<Vec<Value>> {
        self.check_connected()?;
        self.record(object, method, args, None);

        if self.inner.fail_all_calls.load(Ordering::SeqCst) {
            return Err(PortError::method_failed(
                object,
                method,
                StatusCode::BAD_COMMUNICATION_ERROR,
            ));
        }

        match self.handler(object, method) {
            Some(handler) => handler(Variables(&self.inner.variables), args)
                .map_err(|status| PortError::method_failed(object, method, status)),
            None => Ok(Vec::new()),
        }
    }

    async fn call_method_async(
        &self,
        object: &NodeName,
        method: &str,
        args: &[Value],
    ) -> PortResult<TransactionId> {
        self.check_connected()?;
        if self.inner.fail_all_calls.load(Ordering::SeqCst) {
            return Err(PortError::method_failed(
                object,
                method,
                StatusCode::BAD_COMMUNICATION_ERROR,
            ));
        }

        let tx = TransactionId(self.inner.next_transaction.fetch_add(1, Ordering::SeqCst));
        self.record(object, method, args, Some(tx));

        let Some(sender) = self.inner.completions.clone() else {
            return Ok(tx);
        };

        let handler = self.handler(object, method);
        let delay = *self.inner.completion_delay.lock();
        let inner = Arc::clone(&self.inner);
        let args = args.to_vec();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let completion = match handler {
                Some(handler) => match handler(Variables(&inner.variables), &args) {
                    Ok(outputs) => CallCompletion::good(tx, outputs),
                    Err(status) => CallCompletion::failed(tx, status),
                },
                None => CallCompletion::good(tx, Vec::new()),
            };
            if sender.send(completion).is_err() {
                tracing::debug!(transaction = %tx, "Completion receiver dropped");
            }
        });

        Ok(tx)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{completion_channel, DeviceClient};
    use pas_core::types::Identity;

    fn node(path: &str) -> NodeName {
        NodeName::string(2, path)
    }

    #[tokio::test]
    async fn test_read_write() {
        let port = SimulatedPort::without_completions();
        port.set(node("Panel_1.State"), Value::Int32(0));

        let values = port.read(&[node("Panel_1.State")]).await.unwrap();
        assert_eq!(values, vec![Value::Int32(0)]);

        port.write(&[node("Panel_1.State")], &[Value::Int32(2)])
            .await
            .unwrap();
        assert_eq!(port.get(&node("Panel_1.State")), Some(Value::Int32(2)));

        let err = port.read(&[node("Missing")]).await.unwrap_err();
        assert!(matches!(err, PortError::NodeUnknown { .. }));
        assert_eq!(port.read_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let port = SimulatedPort::without_completions();
        port.set(node("A"), Value::Float64(1.0));
        port.fail_next_read();
        assert!(port.read(&[node("A")]).await.is_err());
        assert!(port.read(&[node("A")]).await.is_ok());

        port.set_disconnected(true);
        assert_eq!(
            port.read(&[node("A")]).await.unwrap_err(),
            PortError::NotConnected
        );
    }

    #[tokio::test]
    async fn test_stalled_reads() {
        let port = SimulatedPort::without_completions();
        port.set(node("Actuator_1.CurrentLength"), Value::Float64(1.0));
        port.set(node("Actuator_1.State"), Value::Int32(0));
        port.stall_reads("CurrentLength", true);

        let stalled = tokio::time::timeout(
            Duration::from_millis(50),
            port.read(&[node("Actuator_1.CurrentLength")]),
        )
        .await;
        assert!(stalled.is_err());
        assert!(port.read(&[node("Actuator_1.State")]).await.is_ok());

        port.stall_reads("CurrentLength", false);
        assert!(port.read(&[node("Actuator_1.CurrentLength")]).await.is_ok());
    }

    #[tokio::test]
    async fn test_method_handler() {
        let port = SimulatedPort::without_completions();
        port.set(node("Act_1.CurrentLength"), Value::Float64(400.0));
        port.on_method(node("Act_1"), "MoveDeltaLength", |vars, args| {
            let len = vars.get_f64(&NodeName::string(2, "Act_1.CurrentLength")).unwrap_or(0.0);
            let delta = args.first().and_then(Value::as_f64).ok_or(StatusCode::BAD_INVALID_ARGUMENT)?;
            vars.set(NodeName::string(2, "Act_1.CurrentLength"), len + delta);
            Ok(vec![])
        });

        port.call_method(&node("Act_1"), "MoveDeltaLength", &[Value::Float64(5.0)])
            .await
            .unwrap();
        assert_eq!(port.get(&node("Act_1.CurrentLength")), Some(Value::Float64(405.0)));

        let err = port
            .call_method(&node("Act_1"), "MoveDeltaLength", &[])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_INVALID_ARGUMENT);
        assert_eq!(port.calls_to("MoveDeltaLength").len(), 2);
    }

    #[tokio::test]
    async fn test_async_completion_through_client() {
        let (tx, rx) = completion_channel();
        let port = SimulatedPort::new(tx);
        let client = Arc::new(DeviceClient::new(Arc::new(port.clone())));
        let _listener = client.spawn_completion_listener(rx);
        let mut events = client.subscribe();

        let handle = client
            .call_async(&Identity::new(7, 1001), &node("Panel_7"), "MoveDeltaLengths", &[])
            .await
            .unwrap();
        let correlation = handle.correlation;

        let event = handle.completion().await.unwrap();
        assert_eq!(event.correlation, correlation);
        assert!(event.is_good());
        assert_eq!(events.recv().await.unwrap().correlation, correlation);
        assert_eq!(client.pending_count(), 0);
        assert_eq!(port.async_call_count(), 1);

        let stats = client.stats();
        assert_eq!(stats.async_calls, 1);
        assert_eq!(stats.completions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_completion_stays_pending() {
        let (tx, rx) = completion_channel();
        let port = SimulatedPort::new(tx);
        port.set_completion_delay(Duration::from_secs(2));
        let client = Arc::new(DeviceClient::new(Arc::new(port.clone())));
        let _listener = client.spawn_completion_listener(rx);

        let handle = client
            .call_async(&Identity::new(7, 1001), &node("Panel_7"), "FindHome", &[])
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert!(client.is_pending(&handle.correlation));

        let event = handle.completion().await.unwrap();
        assert!(event.is_good());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_handler_completes_bad() {
        let (tx, rx) = completion_channel();
        let port = SimulatedPort::new(tx);
        port.on_method(node("Panel_7"), "MoveToLengths", |_, _| {
            Err(StatusCode::BAD_INVALID_STATE)
        });
        let client = Arc::new(DeviceClient::new(Arc::new(port)));
        let _listener = client.spawn_completion_listener(rx);

        let handle = client
            .call_async(&Identity::new(7, 1001), &node("Panel_7"), "MoveToLengths", &[])
            .await
            .unwrap();
        let event = handle.completion().await.unwrap();
        assert_eq!(event.status, StatusCode::BAD_INVALID_STATE);
        assert_eq!(client.stats().failed_completions, 1);
    }
}
