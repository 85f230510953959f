// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Test Assertions
//!
//! Domain-specific assertion helpers for PAS integration tests.
//!
//! ## Design Principles
//!
//! - Provide clear, informative failure messages
//! - Compare geometry with tolerances, never exact equality

use approx::relative_eq;
use nalgebra::Vector6;

use pas_control::OperateOutcome;
use pas_core::{ControllerResult, StatusCode};
use pas_opcua::{RecordedCall, SimulatedPort};

// =============================================================================
// Status Assertions
// =============================================================================

/// Assertion extensions for controller results.
pub trait StatusAssertions {
    /// Assert that the call succeeded.
    fn assert_good(&self);

    /// Assert that the call failed with a specific status.
    fn assert_status(&self, expected: StatusCode);
}

impl<T: std::fmt::Debug> StatusAssertions for ControllerResult<T> {
    fn assert_good(&self) {
        if let Err(e) = self {
            panic!("Expected Good, but got {} ({})", e.status_code(), e);
        }
    }

    fn assert_status(&self, expected: StatusCode) {
        match self {
            Ok(value) => panic!("Expected {}, but the call succeeded with {:?}", expected, value),
            Err(e) => assert_eq!(
                e.status_code(),
                expected,
                "Expected {}, but got {} ({})",
                expected,
                e.status_code(),
                e
            ),
        }
    }
}

/// Assert that an operation resolved without dispatching anything.
pub fn assert_no_op(outcome: &ControllerResult<OperateOutcome>) {
    match outcome {
        Ok(OperateOutcome::NoOp) => {}
        other => panic!("Expected NoOp, but got {:?}", other),
    }
}

// =============================================================================
// Geometry Assertions
// =============================================================================

/// Assert that two six-vectors agree within `epsilon`, component by component.
pub fn assert_vector_approx(actual: &Vector6<f64>, expected: &Vector6<f64>, epsilon: f64) {
    for i in 0..6 {
        assert!(
            relative_eq!(actual[i], expected[i], epsilon = epsilon),
            "Component {} differs: expected {}, got {} (epsilon {})\n  expected: {:?}\n  actual:   {:?}",
            i,
            expected[i],
            actual[i],
            epsilon,
            expected.as_slice(),
            actual.as_slice()
        );
    }
}

// =============================================================================
// Dispatch Assertions
// =============================================================================

/// Assert that no motion was dispatched.
pub fn assert_no_dispatch(port: &SimulatedPort) {
    let dispatched: Vec<_> = port.calls().into_iter().filter(RecordedCall::is_async).collect();
    assert!(
        dispatched.is_empty(),
        "Expected no async calls, but got {}: {:?}",
        dispatched.len(),
        dispatched
            .iter()
            .map(|c| c.method.as_str())
            .collect::<Vec<_>>()
    );
}

/// Assert that `method` was called exactly once and return that call.
pub fn assert_dispatched_once(port: &SimulatedPort, method: &str) -> RecordedCall {
    let mut calls = port.calls_to(method);
    assert_eq!(
        calls.len(),
        1,
        "Expected exactly one call to {}, but got {}",
        method,
        calls.len()
    );
    calls.remove(0)
}
