use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use sysinfo::System;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON in {path}: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Wall-clock ceilings for the two stages of an attempt.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StageBudgets {
    #[serde(default = "default_compile_timeout_secs")]
    pub compile_timeout_secs: u64,

    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl Default for StageBudgets {
    fn default() -> Self {
        Self {
            compile_timeout_secs: default_compile_timeout_secs(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionLimits {
    /// Container memory ceiling in bytes (docker backend only).
    #[serde(default = "default_max_memory")]
    pub max_memory: u64,

    #[serde(default = "default_max_cpus")]
    pub max_cpus: u32,

    #[serde(default = "default_max_processes")]
    pub max_processes: u32,

    /// Per-stream cap on captured stdout/stderr.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_memory: default_max_memory(),
            max_cpus: default_max_cpus(),
            max_processes: default_max_processes(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl ExecutionLimits {
    /// Clamps memory and CPU limits to what the host actually has.
    pub fn sanitize(mut self) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let mem_total_bytes = sys.total_memory();
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);

        if mem_total_bytes > 0 && self.max_memory > mem_total_bytes {
            self.max_memory = mem_total_bytes;
        }
        if self.max_cpus > cpu_count.max(1) {
            self.max_cpus = cpu_count.max(1);
        }
        if self.max_processes == 0 {
            self.max_processes = default_max_processes();
        }
        self
    }
}

/// How a candidate source unit is turned into an executable and started.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolchainOptions {
    #[serde(default = "default_compiler")]
    pub compiler: String,

    #[serde(default = "default_compiler_flags")]
    pub flags: Vec<String>,

    #[serde(default = "default_source_file")]
    pub source_file: String,

    #[serde(default = "default_binary")]
    pub binary: String,

    #[serde(default = "default_docker_image")]
    pub docker_image: String,

    /// Local backend only: wrap the run stage in `unshare --net` so the
    /// program starts without any network interface.
    #[serde(default)]
    pub unshare_network: bool,
}

impl Default for ToolchainOptions {
    fn default() -> Self {
        Self {
            compiler: default_compiler(),
            flags: default_compiler_flags(),
            source_file: default_source_file(),
            binary: default_binary(),
            docker_image: default_docker_image(),
            unshare_network: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub budgets: StageBudgets,

    #[serde(default)]
    pub limits: ExecutionLimits,

    #[serde(default)]
    pub toolchain: ToolchainOptions,
}

impl ExecutionConfig {
    pub fn default_config() -> Self {
        ExecutionConfig {
            budgets: StageBudgets::default(),
            limits: ExecutionLimits::default(),
            toolchain: ToolchainOptions::default(),
        }
    }

    /// Loads an `ExecutionConfig` from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        let mut cfg: ExecutionConfig = serde_json::from_str(&content)
            .map_err(|source| ConfigError::InvalidJson {
                path: display,
                source,
            })?;

        cfg.limits = cfg.limits.sanitize();
        Ok(cfg)
    }
}

//Default Functions

fn default_compile_timeout_secs() -> u64 {
    30
}

fn default_run_timeout_secs() -> u64 {
    10
}

fn default_max_memory() -> u64 {
    536_870_912
}

fn default_max_cpus() -> u32 {
    1
}

fn default_max_processes() -> u32 {
    64
}

fn default_max_output_bytes() -> usize {
    64 * 1024
}

fn default_compiler() -> String {
    "g++".to_string()
}

fn default_compiler_flags() -> Vec<String> {
    vec!["-std=c++17".to_string(), "-O0".to_string()]
}

fn default_source_file() -> String {
    "main.cpp".to_string()
}

fn default_binary() -> String {
    "main".to_string()
}

fn default_docker_image() -> String {
    "gcc:13".to_string()
}
