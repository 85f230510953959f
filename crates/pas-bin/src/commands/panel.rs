// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `panel` command.

use std::time::Duration;

use crate::cli::{Cli, OutputFormat, PanelAction, PanelArgs};
use crate::error::BinResult;
use crate::runtime::{PanelReadout, PlantRuntime};

use super::load;

/// Executes the `panel` command.
pub async fn panel(cli: &Cli, args: PanelArgs) -> BinResult<()> {
    let config = load(cli)?;
    let runtime = PlantRuntime::start(config, Duration::ZERO)?;

    match args.action {
        PanelAction::Read => {
            let readout = runtime.read_panel(args.position).await?;
            match args.format {
                OutputFormat::Text => print_readout(&readout),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&readout)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                ),
            }
        }
    }
    Ok(())
}

fn print_readout(readout: &PanelReadout) {
    const AXES: [&str; 6] = ["x", "y", "z", "rx", "ry", "rz"];

    println!("Panel {}", readout.position);
    if let Some(serial) = readout.serial {
        println!("  Serial: {}", serial);
    }
    println!("  State: {}", readout.state);
    println!("  Edges: {}", readout.edges);
    println!();
    println!("Actuator lengths (mm):");
    for (i, length) in readout.lengths.iter().enumerate() {
        println!("  {}: {:.3}", i + 1, length);
    }
    println!();
    println!("Pose:");
    for (axis, value) in AXES.iter().zip(&readout.pose) {
        println!("  {:>2}: {:.6}", axis, value);
    }
    println!();
    println!("Pads:");
    for (i, pad) in readout.pads.iter().enumerate() {
        println!("  {}: ({:.3}, {:.3}, {:.3})", i + 1, pad[0], pad[1], pad[2]);
    }
}
