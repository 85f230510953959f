// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading for PAS.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Substitute `${VAR}` and `${VAR:default}` placeholders
//! 3. Parse into [`PasConfig`]
//! 4. Apply `PAS_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! PAS_NAMESPACE=3
//! PAS_UPDATE_INTERVAL_MS=2000
//! PAS_SAFETY_RADIUS=30
//! PAS_MOTION_POLICY=reject
//! PAS_PANEL_TYPE=p1
//! PAS_LOG_LEVEL=debug
//! PAS_LOG_FORMAT=json
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info, warn};

use pas_control::{MotionPolicy, PanelType};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogFormat, LogLevel, PasConfig};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "PAS";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for PAS.
///
/// # Examples
///
/// ```no_run
/// use pas_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("pas.yaml")?;
/// println!("{} panels", config.panels.len());
/// # Ok::<(), pas_config::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `PAS` prefix and environment handling on.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads and validates a configuration file.
    ///
    /// The format follows the extension: `.yaml`/`.yml`, `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<PasConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let format = ConfigFormat::from_path(path)?;

        let config = self.load_from_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        info!(
            panels = config.panels.len(),
            actuators = config.actuator_count(),
            mpes = config.mpes.len(),
            edges = config.edges.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parses, overrides and validates configuration text.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<PasConfig> {
        let mut config = if self.resolve_env_vars {
            format.parse(&resolve_placeholders(content))?
        } else {
            format.parse(content)?
        };

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<(String, String)> {
        let key = format!("{}_{}", self.env_prefix, name);
        env::var(&key).ok().map(|value| (key, value))
    }

    fn apply_env_overrides(&self, config: &mut PasConfig) -> ConfigResult<()> {
        if let Some((key, value)) = self.var("NAMESPACE") {
            config.port.namespace = parse_env(&key, &value)?;
        }

        let defaults = &mut config.panel_defaults;
        if let Some((key, value)) = self.var("UPDATE_INTERVAL_MS") {
            defaults.update_interval_ms = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = self.var("SAFETY_RADIUS") {
            defaults.safety_radius = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = self.var("MOTION_POLICY") {
            defaults.motion_policy = match value.to_lowercase().as_str() {
                "warn" => MotionPolicy::Warn,
                "reject" => MotionPolicy::Reject,
                _ => return Err(ConfigError::invalid_env_var(key, "expected warn or reject")),
            };
        }
        if let Some((key, value)) = self.var("PANEL_TYPE") {
            defaults.panel_type = match value.to_lowercase().as_str() {
                "opt" => PanelType::Opt,
                "p1" => PanelType::P1,
                "p2" => PanelType::P2,
                "s1" => PanelType::S1,
                "s2" => PanelType::S2,
                _ => {
                    return Err(ConfigError::invalid_env_var(
                        key,
                        "expected one of opt, p1, p2, s1, s2",
                    ))
                }
            };
        }

        if let Some((key, value)) = self.var("LOG_LEVEL") {
            match parse_log_level(&value) {
                Some(level) => config.logging.level = level,
                None => warn!(variable = %key, value = %value, "Ignoring unknown log level"),
            }
        }
        if let Some((key, value)) = self.var("LOG_FORMAT") {
            match parse_log_format(&value) {
                Some(format) => config.logging.format = format,
                None => warn!(variable = %key, value = %value, "Ignoring unknown log format"),
            }
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    fn parse(&self, content: &str) -> ConfigResult<PasConfig> {
        debug!(format = self.extension(), "Parsing configuration");
        match self {
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| ConfigError::serialization(e.to_string())),
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
            }
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::serialization(e.to_string())),
        }
    }

    /// Serializes a configuration in this format.
    pub fn render<T: Serialize>(&self, value: &T) -> ConfigResult<String> {
        match self {
            ConfigFormat::Yaml => {
                serde_yaml::to_string(value).map_err(|e| ConfigError::serialization(e.to_string()))
            }
            ConfigFormat::Toml => toml::to_string_pretty(value)
                .map_err(|e| ConfigError::serialization(e.to_string())),
            ConfigFormat::Json => serde_json::to_string_pretty(value)
                .map_err(|e| ConfigError::serialization(e.to_string())),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Substitutes `${VAR}` and `${VAR:default}` placeholders.
///
/// An unset variable without a default is left in place.
fn resolve_placeholders(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };
        match (env::var(name), default) {
            (Ok(value), _) => out.push_str(&value),
            (Err(_), Some(default)) => out.push_str(default),
            (Err(_), None) => {
                warn!(variable = name, "Environment variable not set");
                out.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_env_var(key, format!("cannot parse '{}'", value)))
}

fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.to_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" => Some(LogLevel::Error),
        _ => None,
    }
}

fn parse_log_format(value: &str) -> Option<LogFormat> {
    match value.to_lowercase().as_str() {
        "text" | "pretty" => Some(LogFormat::Text),
        "compact" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<PasConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<PasConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================
