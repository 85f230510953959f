// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::LogFormat;
use crate::error::{BinError, BinResult};

/// Crates whose events follow the requested level. Everything else logs at `warn`.
const PAS_TARGETS: [&str; 6] = [
    "pas",
    "pas_bin",
    "pas_core",
    "pas_opcua",
    "pas_control",
    "pas_config",
];

// =============================================================================
// Logging Initialization
// =============================================================================

/// Initializes the logging subsystem.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// ```ignore
/// use pas_bin::cli::LogFormat;
/// use pas_bin::logging::init_logging;
///
/// init_logging("info", LogFormat::Text)?;
/// ```
pub fn init_logging(level: &str, format: LogFormat) -> BinResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));

    let result = match format {
        LogFormat::Text => init_text_logging(filter),
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Compact => init_compact_logging(filter),
    };
    result.map_err(|e| BinError::init(format!("failed to install log subscriber: {}", e)))
}

/// Builds the filter used when `RUST_LOG` is unset.
pub fn default_filter(level: &str) -> EnvFilter {
    let level = parse_level(level).to_string().to_lowercase();
    let directives = PAS_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(format!("warn,{}", directives))
}

type InitResult = Result<(), tracing_subscriber::util::TryInitError>;

fn init_text_logging(filter: EnvFilter) -> InitResult {
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stderr());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(is_terminal),
        )
        .try_init()
}

fn init_json_logging(filter: EnvFilter) -> InitResult {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_current_span(true),
        )
        .try_init()
}

fn init_compact_logging(filter: EnvFilter) -> InitResult {
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stderr());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(is_terminal),
        )
        .try_init()
}

// =============================================================================
// Log Level Parsing
// =============================================================================

/// Parses a log level string into a `Level`. Unknown strings give `INFO`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("loud"), Level::INFO);
    }

    #[test]
    fn test_default_filter() {
        let filter = default_filter("debug").to_string();
        assert!(filter.contains("pas_control=debug"));
        assert!(filter.contains("pas_config=debug"));
    }
}
