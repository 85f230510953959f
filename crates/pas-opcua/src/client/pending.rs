// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Pending-operation table for async method calls.
//!
//! Each async dispatch is tagged with a request-scoped [`CorrelationId`].
//! The table maps the port's [`TransactionId`] back to that correlation when
//! the completion arrives, then publishes a [`CallEvent`] to every
//! subscriber and to the dispatcher's awaiter, if any.
//!
//! A completion can overtake the registration of its own transaction (the
//! port may answer before `call_method_async` returns). Such completions are
//! parked and reconciled when the registration lands. Parked completions
//! expire after [`PARKED_COMPLETION_TTL_SECS`] and at most
//! [`MAX_PARKED_COMPLETIONS`] are kept.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use pas_core::node::NodeName;
use pas_core::status::StatusCode;
use pas_core::types::{Identity, Value};

use super::port::{CallCompletion, TransactionId};

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Seconds a completion for an unknown transaction stays parked.
pub const PARKED_COMPLETION_TTL_SECS: i64 = 60;

/// Upper bound on parked completions.
pub const MAX_PARKED_COMPLETIONS: usize = 1024;

// =============================================================================
// CorrelationId
// =============================================================================

/// Request-scoped token linking a dispatch to its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Creates a fresh random token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// PendingCall / CallEvent
// =============================================================================

/// An async call waiting for its completion.
#[derive(Debug, Clone)]
pub struct PendingCall {
    /// Correlation token.
    pub correlation: CorrelationId,
    /// Identity of the device that issued the call.
    pub origin: Identity,
    /// Target object node.
    pub object: NodeName,
    /// Method name.
    pub method: String,
    /// Port transaction.
    pub transaction: TransactionId,
    /// When the call was dispatched.
    pub issued_at: DateTime<Utc>,
}

/// A resolved async call.
#[derive(Debug, Clone)]
pub struct CallEvent {
    /// Correlation token of the originating dispatch.
    pub correlation: CorrelationId,
    /// Identity of the device that issued the call.
    pub origin: Identity,
    /// Method name.
    pub method: String,
    /// Completion status.
    pub status: StatusCode,
    /// Output arguments.
    pub outputs: Vec<Value>,
    /// When the call was dispatched.
    pub issued_at: DateTime<Utc>,
    /// When the completion was processed.
    pub completed_at: DateTime<Utc>,
}

impl CallEvent {
    /// Returns `true` if the call succeeded.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

// =============================================================================
// PendingTable
// =============================================================================

#[derive(Debug, Default)]
struct TableState {
    calls: HashMap<TransactionId, PendingCall>,
    early: HashMap<TransactionId, (CallCompletion, DateTime<Utc>)>,
}

impl TableState {
    fn prune_early(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.early.len();
        self.early.retain(|_, (_, parked_at)| *parked_at >= cutoff);
        before - self.early.len()
    }

    fn park(&mut self, completion: CallCompletion, now: DateTime<Utc>) {
        self.prune_early(now - chrono::Duration::seconds(PARKED_COMPLETION_TTL_SECS));
        if self.early.len() >= MAX_PARKED_COMPLETIONS {
            let oldest = self
                .early
                .iter()
                .min_by_key(|(_, (_, parked_at))| *parked_at)
                .map(|(tx, _)| *tx);
            if let Some(tx) = oldest {
                tracing::warn!(transaction = %tx, "Parked completion limit reached; dropping oldest");
                self.early.remove(&tx);
            }
        }
        self.early.insert(completion.transaction, (completion, now));
    }
}

/// Table of in-flight async calls keyed by transaction.
#[derive(Debug)]
pub struct PendingTable {
    state: Mutex<TableState>,
    waiters: DashMap<CorrelationId, oneshot::Sender<CallEvent>>,
    events: broadcast::Sender<CallEvent>,
}

impl PendingTable {
    /// Creates an empty table.
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            state: Mutex::new(TableState::default()),
            waiters: DashMap::new(),
            events,
        }
    }

    /// Installs a one-shot awaiter for a correlation.
    ///
    /// Must be called before the call is dispatched so the completion cannot
    /// be missed. Awaiters whose handle was dropped are discarded here.
    pub fn wait_for(&self, correlation: CorrelationId) -> oneshot::Receiver<CallEvent> {
        self.waiters.retain(|_, waiter| !waiter.is_closed());
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(correlation, tx);
        rx
    }

    /// Drops the awaiter of a correlation that was never dispatched.
    pub fn forget(&self, correlation: &CorrelationId) {
        self.waiters.remove(correlation);
    }

    /// Registers a dispatched call.
    ///
    /// Returns the resolved event if its completion had already arrived.
    pub fn register(&self, call: PendingCall) -> Option<CallEvent> {
        let early = {
            let mut state = self.state.lock();
            match state.early.remove(&call.transaction) {
                Some((completion, _)) => Some(completion),
                None => {
                    state.calls.insert(call.transaction, call.clone());
                    None
                }
            }
        };
        early.map(|completion| self.publish(call, completion))
    }

    /// Resolves a completion against the table.
    ///
    /// Returns `None` if the transaction is not (yet) registered; the
    /// completion is then parked until [`register`](Self::register) sees it.
    pub fn complete(&self, completion: CallCompletion) -> Option<CallEvent> {
        let call = {
            let mut state = self.state.lock();
            match state.calls.remove(&completion.transaction) {
                Some(call) => call,
                None => {
                    tracing::debug!(
                        transaction = %completion.transaction,
                        "Completion arrived before registration; parking"
                    );
                    state.park(completion, Utc::now());
                    return None;
                }
            }
        };
        Some(self.publish(call, completion))
    }

    fn publish(&self, call: PendingCall, completion: CallCompletion) -> CallEvent {
        let event = CallEvent {
            correlation: call.correlation,
            origin: call.origin,
            method: call.method,
            status: completion.status,
            outputs: completion.outputs,
            issued_at: call.issued_at,
            completed_at: Utc::now(),
        };

        if event.is_good() {
            tracing::debug!(
                correlation = %event.correlation,
                origin = %event.origin,
                method = %event.method,
                "Async call completed"
            );
        } else {
            tracing::warn!(
                correlation = %event.correlation,
                origin = %event.origin,
                method = %event.method,
                status = %event.status,
                "Async call failed"
            );
        }

        if let Some((_, waiter)) = self.waiters.remove(&event.correlation) {
            let _ = waiter.send(event.clone());
        }
        // No subscribers is not an error.
        let _ = self.events.send(event.clone());
        event
    }

    /// Subscribes to resolved call events.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }

    /// Returns `true` if the correlation is still in flight.
    pub fn is_pending(&self, correlation: &CorrelationId) -> bool {
        self.state
            .lock()
            .calls
            .values()
            .any(|call| &call.correlation == correlation)
    }

    /// Returns the number of in-flight calls.
    pub fn len(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Returns `true` if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of completions waiting for their registration.
    pub fn parked_count(&self) -> usize {
        self.state.lock().early.len()
    }

    /// Drops parked completions that arrived before `cutoff`.
    pub fn prune_parked(&self, cutoff: DateTime<Utc>) -> usize {
        self.state.lock().prune_early(cutoff)
    }

    /// Returns the number of installed awaiters.
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Returns a copy of the in-flight calls.
    pub fn pending(&self) -> Vec<PendingCall> {
        self.state.lock().calls.values().cloned().collect()
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
