//! Runtime settings for the CLI.
//!
//! Settings come from environment variables with sensible defaults, then
//! command-line flags override them.

use crate::cli::Cli;
use std::path::PathBuf;
use std::time::Duration;
use tapvisor_net::{WaitPolicy, DEFAULT_WAIT_ATTEMPTS, DEFAULT_WAIT_INTERVAL};

/// Settings for one CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Hypervisor executable; its file name is the expected process name.
    pub hypervisor: PathBuf,

    /// Bridge utility executable.
    pub ifconfig: PathBuf,

    /// Topology files or directories, in merge order.
    pub config_paths: Vec<PathBuf>,

    /// Probes for a tap device to appear (default: 10).
    pub wait_attempts: u32,

    /// Delay between probes (default: 1s).
    pub wait_interval: Duration,
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("wait attempts must be at least 1")]
    ZeroWaitAttempts,

    #[error("no topology paths configured")]
    NoConfigPaths,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            hypervisor: PathBuf::from("hyperkit"),
            ifconfig: PathBuf::from("ifconfig"),
            config_paths: vec![PathBuf::from("tapvisor.toml"), PathBuf::from("tapvisor.d")],
            wait_attempts: DEFAULT_WAIT_ATTEMPTS,
            wait_interval: DEFAULT_WAIT_INTERVAL,
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `TAPVISOR_HYPERVISOR` | `hyperkit` |
    /// | `TAPVISOR_IFCONFIG` | `ifconfig` |
    /// | `TAPVISOR_CONFIG` | `tapvisor.toml:tapvisor.d` |
    /// | `TAPVISOR_WAIT_ATTEMPTS` | `10` |
    /// | `TAPVISOR_WAIT_INTERVAL_MS` | `1000` |
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            hypervisor: std::env::var("TAPVISOR_HYPERVISOR")
                .map(PathBuf::from)
                .unwrap_or(default.hypervisor),
            ifconfig: std::env::var("TAPVISOR_IFCONFIG")
                .map(PathBuf::from)
                .unwrap_or(default.ifconfig),
            config_paths: std::env::var_os("TAPVISOR_CONFIG")
                .map(|v| std::env::split_paths(&v).collect())
                .unwrap_or(default.config_paths),
            wait_attempts: std::env::var("TAPVISOR_WAIT_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.wait_attempts),
            wait_interval: std::env::var("TAPVISOR_WAIT_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.wait_interval),
        }
    }

    /// Apply command-line flags on top.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(hypervisor) = &cli.hypervisor {
            self.hypervisor = hypervisor.clone();
        }
        if let Some(ifconfig) = &cli.ifconfig {
            self.ifconfig = ifconfig.clone();
        }
        if !cli.config.is_empty() {
            self.config_paths = cli.config.clone();
        }
        self
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            attempts: self.wait_attempts,
            interval: self.wait_interval,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_attempts == 0 {
            return Err(ConfigError::ZeroWaitAttempts);
        }
        if self.config_paths.is_empty() {
            return Err(ConfigError::NoConfigPaths);
        }
        Ok(())
    }
}
