// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `simulate` command.

use std::time::Duration;

use tracing::{info, warn};

use crate::cli::{Cli, SimulateArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::{MoveOutcome, PlantRuntime, SimulationReport};
use crate::shutdown::run_until_interrupted;

use super::load;

/// Executes the `simulate` command.
///
/// An interrupt stops every panel before returning.
pub async fn simulate(cli: &Cli, args: SimulateArgs) -> BinResult<()> {
    if !args.delta.is_finite() {
        return Err(BinError::config("--delta must be finite"));
    }

    let config = load(cli)?;
    let runtime = PlantRuntime::start(config, Duration::from_millis(args.motion_ms))?;
    info!(
        panels = runtime.config().panels.len(),
        steps = args.steps,
        delta = args.delta,
        "Starting simulation"
    );

    let run = runtime.simulate(
        args.steps,
        args.delta,
        Duration::from_millis(args.timeout_ms),
    );
    let report = match run_until_interrupted(run).await {
        Some(report) => report?,
        None => {
            warn!("Interrupted; stopping every panel");
            let failures = runtime.stop_all().await;
            return Err(BinError::runtime(format!(
                "simulation interrupted ({} stop failures)",
                failures
            )));
        }
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("Simulation finished:");
    for record in &report.moves {
        let result = match &record.outcome {
            MoveOutcome::Completed => "completed".to_string(),
            MoveOutcome::NoOp => "nothing to move".to_string(),
            MoveOutcome::Vetoed { reason } => format!("vetoed: {}", reason),
            MoveOutcome::Failed { reason } => format!("failed: {}", reason),
        };
        println!(
            "  step {:>3}  panel {:>5}  {:+.3} mm  {}",
            record.step, record.panel, record.delta, result
        );
    }
    println!();
    println!(
        "  {} completed, {} vetoed, {} failed",
        report.completed(),
        report.vetoed(),
        report.failed()
    );
}
