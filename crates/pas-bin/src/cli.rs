// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `validate`: Validate the configuration file
//! - `simulate`: Drive every panel of the configured topology against a simulated device server
//! - `panel <position> read`: Print one panel's pose, pads and actuator lengths
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use pas_config::{LogLevel, LoggingConfig};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// PAS - panel alignment system client
///
/// Controls segmented-mirror panels through their actuators and guards every
/// motion with an edge-sensor collision prediction.
#[derive(Parser, Debug)]
#[command(
    name = "pas",
    author = "Sylvex <contact@sylvex.io>",
    version = pas_core::VERSION,
    about = "Panel alignment system client",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "pas.yaml", env = "PAS_CONFIG", global = true)]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to the configuration
    #[arg(short, long, env = "PAS_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format; defaults to the configuration
    #[arg(long, env = "PAS_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the PAS CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Run the configured topology against a simulated device server
    ///
    /// Every panel is moved by a small length change per step. Each move
    /// passes the collision gate and is awaited until the device completes it.
    Simulate(SimulateArgs),

    /// Operate on a single panel of the simulated topology
    Panel(PanelArgs),

    /// Show version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `simulate` command.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of move rounds
    #[arg(short = 'n', long, default_value = "1")]
    pub steps: u32,

    /// Length change applied to every actuator per step, mm
    #[arg(long, default_value = "0.5", allow_hyphen_values = true)]
    pub delta: f64,

    /// Simulated device motion time, ms
    #[arg(long, default_value = "20")]
    pub motion_ms: u64,

    /// Time to wait for a move to complete, ms
    #[arg(long, default_value = "5000")]
    pub timeout_ms: u64,
}

impl Default for SimulateArgs {
    fn default() -> Self {
        Self {
            steps: 1,
            delta: 0.5,
            motion_ms: 20,
            timeout_ms: 5000,
        }
    }
}

/// Arguments for the `panel` command.
#[derive(Args, Debug, Clone)]
pub struct PanelArgs {
    /// Panel position, e.g. 1001
    pub position: u32,

    /// Output format
    #[arg(short, long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Panel action
    #[command(subcommand)]
    pub action: PanelAction,
}

/// Actions of the `panel` command.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    /// Print the pose, pad coordinates and actuator lengths
    Read,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<pas_config::LogFormat> for LogFormat {
    fn from(format: pas_config::LogFormat) -> Self {
        match format {
            pas_config::LogFormat::Text => LogFormat::Text,
            pas_config::LogFormat::Json => LogFormat::Json,
            pas_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolves the log level and format.
    ///
    /// Flags win over the configuration file; `--quiet` and `--verbose` win
    /// over both.
    pub fn effective_logging(&self, config: Option<&LoggingConfig>) -> (String, LogFormat) {
        let level = if self.quiet {
            "warn".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else if let Some(level) = &self.log_level {
            level.clone()
        } else {
            config
                .map(|c| c.level)
                .unwrap_or(LogLevel::Info)
                .as_str()
                .to_string()
        };

        let format = self
            .log_format
            .or_else(|| config.map(|c| c.format.into()))
            .unwrap_or_default();

        (level, format)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["pas", "validate", "--show-config", "-f", "json"]);
        if let Commands::Validate(args) = cli.command {
            assert!(args.show_config);
            assert_eq!(args.format, OutputFormat::Json);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_simulate_command() {
        let cli = Cli::parse_from(["pas", "simulate", "--steps", "3", "--delta", "-0.25"]);
        if let Commands::Simulate(args) = cli.command {
            assert_eq!(args.steps, 3);
            assert_eq!(args.delta, -0.25);
            assert_eq!(args.timeout_ms, 5000);
        } else {
            panic!("Expected Simulate command");
        }
    }

    #[test]
    fn test_panel_command() {
        let cli = Cli::parse_from(["pas", "panel", "1001", "read"]);
        if let Commands::Panel(args) = cli.command {
            assert_eq!(args.position, 1001);
            assert_eq!(args.action, PanelAction::Read);
        } else {
            panic!("Expected Panel command");
        }
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["pas", "-c", "/etc/pas/pas.toml", "version"]);
        assert_eq!(cli.config, PathBuf::from("/etc/pas/pas.toml"));
    }

    #[test]
    fn test_effective_logging() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            format: pas_config::LogFormat::Json,
        };

        let cli = Cli::parse_from(["pas", "version"]);
        let (level, format) = cli.effective_logging(Some(&config));
        assert_eq!(level, "debug");
        assert_eq!(format, LogFormat::Json);

        let cli = Cli::parse_from(["pas", "-l", "error", "--log-format", "compact", "version"]);
        let (level, format) = cli.effective_logging(Some(&config));
        assert_eq!(level, "error");
        assert_eq!(format, LogFormat::Compact);

        let cli = Cli::parse_from(["pas", "-q", "version"]);
        assert_eq!(cli.effective_logging(None).0, "warn");
    }
}
