// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Device server client.
//!
//! - **Port**: the [`RemoteDataPort`] trait implemented by transports
//! - **Pending**: the pending-operation table correlating async completions
//! - **Stats**: lock-free traffic counters
//! - **Wrapper**: [`DeviceClient`], the shared high-level client
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        Panel / Actuator / Edge / MPES        │
//! │               controllers                    │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │                DeviceClient                  │
//! │     (stats, correlation, pending table)      │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │               RemoteDataPort                 │
//! │  read / write / call_method / call_async     │
//! └──────────────────────┬───────────────────────┘
//!                        │ completions (mpsc)
//!                        ▼
//!              DeviceClient::complete
//! ```

mod pending;
mod port;
mod stats;
mod wrapper;

pub use pending::{CallEvent, CorrelationId, PendingCall, PendingTable, DEFAULT_EVENT_CAPACITY};
pub use port::{
    completion_channel, expect_bool, expect_f64, expect_i64, CallCompletion, CompletionReceiver,
    CompletionSender, RemoteDataPort, TransactionId,
};
pub use stats::{PortStats, PortStatsSnapshot};
pub use wrapper::{DeviceClient, DispatchHandle};
