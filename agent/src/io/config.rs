//! Agent configuration stored in a TOML file (default `reflex.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::budget::MAX_RETRIES;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
pub const DEFAULT_MASTER_PROMPT: &str =
    "CPU Spike/Stress tester, short test that only lasts for 5 seconds";

/// Agent configuration (TOML).
///
/// Missing fields default to the values the agent ships with, so an absent
/// file and an empty file behave the same.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the controller, without a trailing path.
    pub server_url: String,

    /// Task description sent with every `/gen` and `/fix` request.
    pub master_prompt: String,

    /// Repairs allowed after the first execution.
    pub max_retries: u32,

    /// Connection-establishment timeout for each HTTP request.
    pub connect_timeout_secs: u64,

    /// Total timeout for each HTTP request.
    pub request_timeout_secs: u64,

    /// Kill the child after this many seconds. Unset blocks until it exits.
    pub execution_timeout_secs: Option<u64>,

    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Interpreter invoked with the program file as its only argument.
    pub interpreter: String,
    /// Directory holding the program and capture files.
    pub workdir: PathBuf,
    pub program_file: String,
    pub stdout_file: String,
    pub stderr_file: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            workdir: PathBuf::from("."),
            program_file: "payload_temp.py".to_string(),
            stdout_file: "stdout.txt".to_string(),
            stderr_file: "stderr.txt".to_string(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            master_prompt: DEFAULT_MASTER_PROMPT.to_string(),
            max_retries: MAX_RETRIES,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            execution_timeout_secs: None,
            executor: ExecutorConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        let url = self.server_url.trim();
        if url.is_empty() {
            return Err(anyhow!("server_url must be non-empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!(
                "server_url must start with http:// or https:// (got {url:?})"
            ));
        }
        if self.master_prompt.trim().is_empty() {
            return Err(anyhow!("master_prompt must be non-empty"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(anyhow!("connect_timeout_secs must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        if self.execution_timeout_secs == Some(0) {
            return Err(anyhow!("execution_timeout_secs must be > 0 when set"));
        }
        self.executor.validate()
    }

    /// Base URL with any trailing `/` removed, ready for endpoint paths.
    pub fn base_url(&self) -> &str {
        self.server_url.trim().trim_end_matches('/')
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_secs.map(Duration::from_secs)
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interpreter.trim().is_empty() {
            return Err(anyhow!("executor.interpreter must be non-empty"));
        }
        let names = [
            ("program_file", &self.program_file),
            ("stdout_file", &self.stdout_file),
            ("stderr_file", &self.stderr_file),
        ];
        for (field, name) in names {
            if name.trim().is_empty() {
                return Err(anyhow!("executor.{field} must be non-empty"));
            }
        }
        if self.program_file == self.stdout_file
            || self.program_file == self.stderr_file
            || self.stdout_file == self.stderr_file
        {
            return Err(anyhow!(
                "executor program_file, stdout_file and stderr_file must be distinct"
            ));
        }
        Ok(())
    }

    pub fn program_path(&self) -> PathBuf {
        self.workdir.join(&self.program_file)
    }

    pub fn stdout_path(&self) -> PathBuf {
        self.workdir.join(&self.stdout_file)
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.workdir.join(&self.stderr_file)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
