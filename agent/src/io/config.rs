//! Agent configuration stored in `toolagent.toml`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::strategy::{InvocationStrategy, default_strategies};
use crate::core::stream::ChunkShapes;
use crate::io::coordinator::Coordinator;
use crate::io::locate::ExecutableLocator;
use crate::io::strategy::ExecSettings;

pub const DEFAULT_CONFIG_PATH: &str = "toolagent.toml";
pub const MODEL_ENV: &str = "OLLAMA_MODEL";
pub const TIMEOUT_ENV: &str = "OLLAMA_TIMEOUT_SECS";

/// Agent configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to values that
/// work with a stock `ollama` install.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    pub model: ModelConfig,
    /// Ordered fallback chain, most capable first.
    pub strategies: Vec<InvocationStrategy>,
    pub stream: ChunkShapes,
    pub diagnostics: DiagnosticsConfig,
    pub agent: LoopConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier passed to every strategy.
    pub name: String,
    /// Program name looked up on `PATH`, or an explicit path.
    pub executable: String,
    /// Install locations checked when `PATH` lookup fails.
    pub candidate_paths: Vec<PathBuf>,
    /// Per-strategy wall-clock budget in seconds.
    pub timeout_secs: u64,
    /// Sleep between stream polls in milliseconds.
    pub poll_interval_ms: u64,
    /// Bytes kept from each child stream.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Characters kept from the failure detail excerpt.
    pub excerpt_chars: usize,
    /// Characters of the original prompt echoed back.
    pub prompt_echo_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Default step budget for one request.
    pub max_steps: u32,
    /// Characters of earlier turns replayed into each prompt.
    pub history_budget_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Hospital package catalogue used by `price_compare`.
    pub hospitals_path: PathBuf,
    /// Locality used when a tool call omits one.
    pub default_city: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "koesn/llama3-8b-instruct".to_string(),
            executable: "ollama".to_string(),
            candidate_paths: vec![
                PathBuf::from("/usr/local/bin/ollama"),
                PathBuf::from("/opt/homebrew/bin/ollama"),
                PathBuf::from("/usr/bin/ollama"),
            ],
            timeout_secs: 60,
            poll_interval_ms: 10,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: 2000,
            prompt_echo_chars: 500,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 6,
            history_budget_chars: 8000,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            hospitals_path: PathBuf::from("data/hospitals.json"),
            default_city: "Bangalore".to_string(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            strategies: default_strategies(),
            stream: ChunkShapes::default(),
            diagnostics: DiagnosticsConfig::default(),
            agent: LoopConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.name.trim().is_empty() {
            return Err(anyhow!("model.name must be non-empty"));
        }
        if self.model.executable.trim().is_empty() {
            return Err(anyhow!("model.executable must be non-empty"));
        }
        if self.model.timeout_secs == 0 {
            return Err(anyhow!("model.timeout_secs must be > 0"));
        }
        if self.model.poll_interval_ms == 0 {
            return Err(anyhow!("model.poll_interval_ms must be > 0"));
        }
        if self.model.output_limit_bytes == 0 {
            return Err(anyhow!("model.output_limit_bytes must be > 0"));
        }
        if self.strategies.is_empty() {
            return Err(anyhow!("strategies must list at least one strategy"));
        }
        for strategy in &self.strategies {
            if strategy.name.trim().is_empty() {
                return Err(anyhow!("strategy names must be non-empty"));
            }
            if strategy.args.is_empty() {
                return Err(anyhow!("strategy '{}' has an empty command template", strategy.name));
            }
        }
        if self.agent.max_steps == 0 {
            return Err(anyhow!("agent.max_steps must be > 0"));
        }
        Ok(())
    }

    /// Apply `OLLAMA_MODEL` / `OLLAMA_TIMEOUT_SECS` on top of file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(model) = env::var(MODEL_ENV)
            && !model.trim().is_empty()
        {
            debug!(model = %model, "model overridden from environment");
            self.model.name = model;
        }
        if let Ok(raw) = env::var(TIMEOUT_ENV) {
            self.model.timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("parse {TIMEOUT_ENV}={raw}"))?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.model.timeout_secs)
    }

    pub fn locator(&self) -> ExecutableLocator {
        ExecutableLocator {
            executable: self.model.executable.clone(),
            candidates: self.model.candidate_paths.clone(),
        }
    }

    pub fn exec_settings(&self) -> ExecSettings {
        ExecSettings {
            poll_interval: Duration::from_millis(self.model.poll_interval_ms),
            output_limit_bytes: self.model.output_limit_bytes,
            shapes: self.stream.clone(),
        }
    }

    pub fn coordinator(&self) -> Coordinator {
        Coordinator::new(self.locator(), self.strategies.clone(), self.exec_settings())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`. Environment
/// overrides are not applied here.
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

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::strategy::{InputEncoding, OutputEncoding};

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("toolagent.toml");
        let cfg = AgentConfig::default();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("toolagent.toml");
        fs::write(
            &path,
            r#"
[model]
name = "llama3"

[[strategies]]
name = "run"
args = ["run", "{model}"]
input = "raw"
output = "blob"
"#,
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.model.name, "llama3");
        assert_eq!(cfg.model.timeout_secs, 60);
        assert_eq!(cfg.strategies.len(), 1);
        assert_eq!(cfg.strategies[0].input, InputEncoding::Raw);
        assert_eq!(cfg.strategies[0].output, OutputEncoding::Blob);
        assert_eq!(cfg.agent.max_steps, 6);
    }

    #[test]
    fn validate_rejects_zero_timeout_and_empty_chain() {
        let mut cfg = AgentConfig::default();
        cfg.model.timeout_secs = 0;
        assert!(cfg.validate().is_err());

        let cfg = AgentConfig {
            strategies: Vec::new(),
            ..AgentConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("at least one strategy"));
    }
}
