// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Runs the CLI runtime from configuration files written to a private
//! temporary directory. The directory is removed when the harness drops.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use pas_bin::{BinResult, PlantRuntime};
use pas_config::{load_config, ConfigResult, PasConfig};

use super::{init_test_logging, temp_test_dir};

/// Default time a harness waits on any single future.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// ConfigHarness
// =============================================================================

/// A temporary directory of configuration files.
pub struct ConfigHarness {
    dir: TempDir,
    timeout: Duration,
}

impl ConfigHarness {
    /// Creates a harness whose directory name starts with `test_name`.
    pub fn new(test_name: &str) -> Self {
        init_test_logging();
        Self {
            dir: temp_test_dir(test_name),
            timeout: DEFAULT_TEST_TIMEOUT,
        }
    }

    /// Sets the timeout applied by [`ConfigHarness::within`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Writes `content` to `name` inside the directory.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to write config file");
        path
    }

    /// Returns a path inside the directory without creating it.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Loads and validates a file written earlier.
    pub fn load(&self, name: &str) -> ConfigResult<PasConfig> {
        load_config(self.path(name))
    }

    /// Loads a file and starts the simulated plant over it.
    pub fn runtime(&self, name: &str, motion_delay: Duration) -> BinResult<PlantRuntime> {
        let config = load_config(self.path(name))?;
        PlantRuntime::start(config, motion_delay)
    }

    /// Awaits `fut`, panicking if it outlives the harness timeout.
    pub async fn within<F: Future>(&self, fut: F) -> F::Output {
        within(self.timeout, fut).await
    }
}

/// Awaits `fut`, panicking after `timeout`.
pub async fn within<F: Future>(timeout: Duration, fut: F) -> F::Output {
    match tokio::time::timeout(timeout, fut).await {
        Ok(output) => output,
        Err(_) => panic!("Test timed out after {:?}", timeout),
    }
}
