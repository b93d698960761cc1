use crate::agent::DEFAULT_MAX_ITERATIONS;
use crate::memory::MemoryConfig;
use crate::workflow::WorkflowConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const TROUPE_DIR: &str = ".troupe";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub max_iterations: usize,
    pub stream: StreamConfig,
    pub memory: MemoryConfig,
    #[serde(skip)]
    pub workspace_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            stream: StreamConfig::default(),
            memory: MemoryConfig::default(),
            workspace_dir: get_troupe_dir().join("workspace"),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Invalid config TOML")?;
        config.workspace_dir = get_troupe_dir().join("workspace");
        Ok(config)
    }
}

pub fn get_troupe_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(TROUPE_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_troupe_dir().join("config.toml")
}

pub fn ensure_troupe_dir() -> Result<PathBuf> {
    let troupe_dir = get_troupe_dir();

    if !troupe_dir.exists() {
        std::fs::create_dir_all(&troupe_dir).with_context(|| {
            format!(
                "Failed to create troupe directory at {}",
                troupe_dir.display()
            )
        })?;
    }

    Ok(troupe_dir)
}

pub fn load_config() -> Result<Config> {
    let config_path = get_config_path();

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found. Run 'troupe onboard' to set up your configuration."
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_troupe_dir()?;

    let config_path = get_config_path();
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(&config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}

/// Reads a workflow declaration (agents, kind, routing, error policy) from TOML.
pub fn load_workflow_config(path: impl AsRef<Path>) -> Result<WorkflowConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow from {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse workflow from {}", path.display()))
}
