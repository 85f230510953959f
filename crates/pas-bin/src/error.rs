// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the PAS binary.

use thiserror::Error;

use pas_core::{ControllerError, PasError, PortError, RegistrationError};

/// Result type alias for pas-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the PAS binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Initialization error.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Config loading or validation error.
    #[error("Config error: {0}")]
    Config(#[from] pas_config::ConfigError),

    /// Topology could not be assembled.
    #[error("Topology error: {0}")]
    Registration(#[from] RegistrationError),

    /// A controller rejected or failed an operation.
    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    /// The device server failed.
    #[error("Port error: {0}")]
    Port(#[from] PortError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::Initialization(_) => 2,
            Self::Runtime(_) => 3,
            Self::Io(_) => 4,
            Self::Registration(_) => 5,
            Self::Controller(_) => 6,
            Self::Port(_) => 7,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<PasError> for BinError {
    fn from(err: PasError) -> Self {
        match err {
            PasError::Controller(e) => Self::Controller(e),
            PasError::Port(e) => Self::Port(e),
            PasError::Registration(e) => Self::Registration(e),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================
