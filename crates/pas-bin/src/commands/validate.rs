// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use std::collections::HashSet;

use pas_config::{PasConfig, ACTUATORS_PER_PANEL};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::BinResult;

use super::load;

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config = load(cli)?;
    let warnings = collect_warnings(&config);
    let config_path = &cli.config;

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Namespace: {}", config.port.namespace);
            println!("  Panels: {}", config.panels.len());
            println!("  Actuators: {}", config.actuator_count());
            println!("  MPES: {}", config.mpes.len());
            println!("  Edges: {}", config.edges.len());
            println!(
                "  Safety radius: {} px",
                config.panel_defaults.safety_radius
            );
            println!(
                "  Update interval: {} ms",
                config.panel_defaults.update_interval_ms
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "namespace": config.port.namespace,
                    "panel_count": config.panels.len(),
                    "actuator_count": config.actuator_count(),
                    "mpes_count": config.mpes.len(),
                    "edge_count": config.edges.len(),
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output)
                    .unwrap_or_else(|_| "(serialization error)".to_string())
            );
        }
    }

    Ok(())
}

/// Finds setups that are valid but probably not intended.
pub fn collect_warnings(config: &PasConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.panels.is_empty() {
        warnings.push("No panels configured".to_string());
    }

    for panel in &config.panels {
        if panel.actuators.is_empty() {
            warnings.push(format!(
                "Panel {} has no actuators; motion commands are no-ops",
                panel.position
            ));
        }
    }

    let on_edges: HashSet<u32> = config
        .edges
        .iter()
        .flat_map(|e| e.panels.iter().copied())
        .collect();
    for panel in &config.panels {
        if panel.actuators.len() == ACTUATORS_PER_PANEL as usize && !on_edges.contains(&panel.position) {
            warnings.push(format!(
                "Panel {} has no edges; its motions are not collision checked",
                panel.position
            ));
        }
    }

    for edge in &config.edges {
        if edge.mpes.is_empty() {
            warnings.push(format!("Edge {} has no MPES", edge.name));
        }
    }

    let used: HashSet<u32> = config
        .edges
        .iter()
        .flat_map(|e| e.mpes.iter().copied())
        .collect();
    for mpes in &config.mpes {
        if !used.contains(&mpes.serial) {
            warnings.push(format!("MPES {} is not on any edge", mpes.serial));
        }
    }

    warnings
}
