//! Application configuration loaded from environment variables.
//!
//! `AppConfig` is read once at binary start-up. Library code never consults
//! the environment itself: budgets and limits are handed down explicitly as
//! values derived from this struct.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::execution_config::{ConfigError, ExecutionConfig};

/// Which isolation backend the sandbox should use for compile and run stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxBackend {
    /// Every stage runs inside a throwaway `docker run --network=none` container.
    Docker,
    /// Stages run directly on the host. Only for trusted input and tests.
    Local,
}

impl FromStr for SandboxBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(SandboxBackend::Docker),
            "local" | "no-docker" => Ok(SandboxBackend::Local),
            other => Err(format!("Unknown sandbox backend '{}'", other)),
        }
    }
}

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_name: String,
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub log_to_console: bool,
    pub code_manager_host: String,
    pub code_manager_port: u16,
    pub max_concurrent_attempts: usize,
    /// Overrides `budgets.compile_timeout_secs` of the execution config when set.
    pub compile_timeout_secs: Option<u64>,
    /// Overrides `budgets.run_timeout_secs` of the execution config when set.
    pub run_timeout_secs: Option<u64>,
    pub sandbox_backend: SandboxBackend,
    pub execution_config_path: Option<PathBuf>,
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Every variable is optional. Values that fail to parse fall back to their
    /// defaults and a warning is logged.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "passk-harness".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "harness.log".into()),
            log_to_console: env::var("LOG_TO_CONSOLE").unwrap_or_else(|_| "false".into()) == "true",
            code_manager_host: env::var("CODE_MANAGER_HOST")
                .unwrap_or_else(|_| "127.0.0.1".into()),
            code_manager_port: parsed_var("CODE_MANAGER_PORT").unwrap_or(3001),
            max_concurrent_attempts: parsed_var("MAX_CONCURRENT_ATTEMPTS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(4),
            compile_timeout_secs: parsed_var("COMPILE_TIMEOUT_SECS"),
            run_timeout_secs: parsed_var("RUN_TIMEOUT_SECS"),
            sandbox_backend: parsed_var("SANDBOX_BACKEND").unwrap_or(SandboxBackend::Docker),
            execution_config_path: env::var("EXECUTION_CONFIG_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Resolves the effective execution config: the JSON file named by
    /// `EXECUTION_CONFIG_PATH` (or built-in defaults), with the budget
    /// environment overrides layered on top.
    pub fn execution_config(&self) -> Result<ExecutionConfig, ConfigError> {
        let mut config = match &self.execution_config_path {
            Some(path) => ExecutionConfig::from_json_file(path)?,
            None => ExecutionConfig::default_config(),
        };

        if let Some(secs) = self.compile_timeout_secs {
            config.budgets.compile_timeout_secs = secs;
        }
        if let Some(secs) = self.run_timeout_secs {
            config.budgets.run_timeout_secs = secs;
        }

        Ok(config)
    }
}

/// Reads and parses an environment variable, logging and discarding values
/// that do not parse.
pub fn parsed_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable value for {}: {:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "CODE_MANAGER_PORT",
        "MAX_CONCURRENT_ATTEMPTS",
        "COMPILE_TIMEOUT_SECS",
        "RUN_TIMEOUT_SECS",
        "SANDBOX_BACKEND",
        "EXECUTION_CONFIG_PATH",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn defaults_when_unset() {
        clear_env();
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.code_manager_port, 3001);
        assert_eq!(cfg.max_concurrent_attempts, 4);
        assert_eq!(cfg.sandbox_backend, SandboxBackend::Docker);
        assert!(cfg.compile_timeout_secs.is_none());

        let exec = cfg.execution_config().unwrap();
        assert_eq!(exec.budgets.compile_timeout_secs, 30);
        assert_eq!(exec.budgets.run_timeout_secs, 10);
    }

    #[test]
    #[serial]
    fn budget_overrides_are_layered_on_execution_config() {
        clear_env();
        unsafe {
            env::set_var("COMPILE_TIMEOUT_SECS", "45");
            env::set_var("RUN_TIMEOUT_SECS", "3");
            env::set_var("SANDBOX_BACKEND", "local");
        }

        let cfg = AppConfig::from_env();
        let exec = cfg.execution_config().unwrap();
        assert_eq!(exec.budgets.compile_timeout_secs, 45);
        assert_eq!(exec.budgets.run_timeout_secs, 3);
        assert_eq!(cfg.sandbox_backend, SandboxBackend::Local);

        clear_env();
    }

    #[test]
    #[serial]
    fn garbage_values_fall_back_to_defaults() {
        clear_env();
        unsafe {
            env::set_var("MAX_CONCURRENT_ATTEMPTS", "zero");
            env::set_var("RUN_TIMEOUT_SECS", "-4");
            env::set_var("SANDBOX_BACKEND", "vm");
        }

        let cfg = AppConfig::from_env();
        assert_eq!(cfg.max_concurrent_attempts, 4);
        assert!(cfg.run_timeout_secs.is_none());
        assert_eq!(cfg.sandbox_backend, SandboxBackend::Docker);

        clear_env();
    }

    #[test]
    #[serial]
    fn zero_concurrency_is_rejected() {
        clear_env();
        unsafe {
            env::set_var("MAX_CONCURRENT_ATTEMPTS", "0");
        }
        assert_eq!(AppConfig::from_env().max_concurrent_attempts, 4);
        clear_env();
    }
}
