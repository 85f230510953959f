// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("PAS - Panel Alignment System client");
    println!();
    println!("Version Information:");
    println!("  pas-bin:     {}", env!("CARGO_PKG_VERSION"));
    println!("  pas-core:    {}", pas_core::VERSION);
    println!("  pas-opcua:   {}", pas_opcua::VERSION);
    println!("  pas-control: {}", pas_control::VERSION);
    println!("  pas-config:  {}", pas_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
