//! Server configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use zgate_core::{InterpreterConfig, OrchestratorConfig, ProtocolTimeouts};
use zgate_types::GameTitle;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_saves_dir")]
    pub saves_dir: PathBuf,
    #[serde(default)]
    pub interpreter: InterpreterSection,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
}

/// `[interpreter]`: which binary to launch and where the story files live.
#[derive(Debug, Clone, Deserialize)]
pub struct InterpreterSection {
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_flags")]
    pub flags: Vec<String>,
    #[serde(default = "default_games_root")]
    pub games_root: PathBuf,
    /// Title name to story file, relative to `games_root`.
    #[serde(default)]
    pub data_files: HashMap<String, PathBuf>,
}

/// `[timeouts]`, all in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimeoutsSection {
    #[serde(default = "default_banner_ms")]
    pub banner: u64,
    #[serde(default = "default_filename_prompt_ms")]
    pub filename_prompt: u64,
    #[serde(default = "default_overwrite_question_ms")]
    pub overwrite_question: u64,
    #[serde(default = "default_ready_ms")]
    pub ready: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zgate")
        .join("profiles.db")
}

fn default_saves_dir() -> PathBuf {
    PathBuf::from("/data/saves")
}

fn default_binary() -> PathBuf {
    PathBuf::from("/usr/games/dfrotz")
}

fn default_flags() -> Vec<String> {
    vec!["-mp".to_string()]
}

fn default_games_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_banner_ms() -> u64 {
    30_000
}

fn default_filename_prompt_ms() -> u64 {
    30_000
}

fn default_overwrite_question_ms() -> u64 {
    5_000
}

fn default_ready_ms() -> u64 {
    200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            saves_dir: default_saves_dir(),
            interpreter: InterpreterSection::default(),
            timeouts: TimeoutsSection::default(),
        }
    }
}

impl Default for InterpreterSection {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            flags: default_flags(),
            games_root: default_games_root(),
            data_files: HashMap::new(),
        }
    }
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            banner: default_banner_ms(),
            filename_prompt: default_filename_prompt_ms(),
            overwrite_question: default_overwrite_question_ms(),
            ready: default_ready_ms(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from default location (config/default.toml) or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }

        Ok(Config::default())
    }

    /// Orchestrator settings derived from this config.
    ///
    /// Fails on a data-file override for a title outside the catalogue.
    pub fn orchestrator(&self) -> Result<OrchestratorConfig> {
        let mut data_files = HashMap::new();
        for (name, path) in &self.interpreter.data_files {
            let title: GameTitle = name.parse()?;
            data_files.insert(title, path.clone());
        }

        Ok(OrchestratorConfig {
            interpreter: InterpreterConfig {
                binary: self.interpreter.binary.clone(),
                flags: self.interpreter.flags.clone(),
                games_root: self.interpreter.games_root.clone(),
                data_files,
            },
            saves_dir: self.saves_dir.clone(),
            timeouts: ProtocolTimeouts {
                banner: Duration::from_millis(self.timeouts.banner),
                filename_prompt: Duration::from_millis(self.timeouts.filename_prompt),
                overwrite_question: Duration::from_millis(self.timeouts.overwrite_question),
                ready: Duration::from_millis(self.timeouts.ready),
            },
        })
    }
}
