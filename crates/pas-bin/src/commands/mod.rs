// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `validate`: Validate the configuration file
//! - `simulate`: Move every panel against a simulated device server
//! - `panel`: Read one panel's geometry
//! - `version`: Show version information

mod panel;
mod simulate;
mod validate;
mod version;

pub use panel::panel;
pub use simulate::simulate;
pub use validate::{collect_warnings, validate};
pub use version::version;

use pas_config::PasConfig;

use crate::cli::{Cli, Commands};
use crate::error::{BinError, BinResult};

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.command.clone() {
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Simulate(args) => simulate::simulate(&cli, args).await,
        Commands::Panel(args) => panel::panel(&cli, args).await,
        Commands::Version => version::version(&cli),
    }
}

/// Loads the configuration named on the command line.
pub(crate) fn load(cli: &Cli) -> BinResult<PasConfig> {
    if !cli.config.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            cli.config.display()
        )));
    }
    pas_config::load_config(&cli.config)
        .map_err(|e| BinError::from(e).with_context(format!("loading {}", cli.config.display())))
}
