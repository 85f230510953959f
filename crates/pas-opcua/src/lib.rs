// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # pas-opcua
//!
//! Remote data port layer for the PAS panel alignment system.
//!
//! The device server is reached through the [`RemoteDataPort`] trait, a thin
//! facade exposing `read`, `write`, `call_method` and `call_method_async`
//! over symbolic `ns=<n>;s=<path>` node names. Controllers never use a port
//! directly; they share a [`DeviceClient`] that adds statistics and links
//! every async completion back to the dispatch that caused it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pas_core::{Identity, NodeName, Value};
//! use pas_opcua::{completion_channel, DeviceClient, SimulatedPort};
//!
//! # async fn demo() -> pas_core::PortResult<()> {
//! let (tx, rx) = completion_channel();
//! let port = SimulatedPort::new(tx);
//! port.set(NodeName::string(2, "Panel_0.State"), Value::Int32(0));
//!
//! let client = Arc::new(DeviceClient::new(Arc::new(port)));
//! client.spawn_completion_listener(rx);
//!
//! let state = client.read_i64(&NodeName::string(2, "Panel_0.State")).await?;
//! let handle = client
//!     .call_async(&Identity::new(0, 1001), &NodeName::string(2, "Panel_0"), "FindHome", &[])
//!     .await?;
//! let event = handle.completion().await;
//! # let _ = (state, event);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod simulated;

pub use client::{
    completion_channel, CallCompletion, CallEvent, CompletionReceiver, CompletionSender,
    CorrelationId, DeviceClient, DispatchHandle, PendingCall, PortStatsSnapshot, RemoteDataPort,
    TransactionId,
};
pub use simulated::{MethodHandler, RecordedCall, SimulatedPort, Variables};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
