// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! PAS - panel alignment system client
//!
//! Main binary entry point.

use pas_bin::cli::Cli;
use pas_bin::commands::execute;
use pas_bin::error::report_error_and_exit;
use pas_bin::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    // The logging section of the file only supplies defaults; load errors
    // are reported by the command itself.
    let file_logging = pas_config::load_config(&cli.config)
        .ok()
        .map(|config| config.logging);
    let (level, format) = cli.effective_logging(file_logging.as_ref());

    if let Err(e) = init_logging(&level, format) {
        report_error_and_exit(e);
    }

    if let Err(e) = execute(cli).await {
        report_error_and_exit(e);
    }
}
