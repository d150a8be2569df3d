use crate::model::DEFAULT_COMMAND;
use crate::runner::Pacing;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub pacing: Pacing,
    #[serde(default)]
    pub sources: SourceConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GeneralConfig {
    /// Catalog file; defaults to `catalog` in the data directory.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub update_schedule: UpdateSchedule,
    /// Command for indexed files that no source claims.
    #[serde(default = "default_command")]
    pub default_command: String,
}

fn default_command() -> String {
    DEFAULT_COMMAND.to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            update_schedule: UpdateSchedule::default(),
            default_command: default_command(),
        }
    }
}

/// How often `ocha watch` re-indexes.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateSchedule {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "10min")]
    TenMinutes,
    #[serde(rename = "30min")]
    #[default]
    HalfHour,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "daily")]
    Daily,
}

impl UpdateSchedule {
    /// None for a manual schedule.
    pub fn interval(self) -> Option<Duration> {
        let minutes = match self {
            UpdateSchedule::Manual => return None,
            UpdateSchedule::TenMinutes => 10,
            UpdateSchedule::HalfHour => 30,
            UpdateSchedule::Hourly => 60,
            UpdateSchedule::Daily => 24 * 60,
        };
        Some(Duration::from_secs(minutes * 60))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub desktop: bool,
    #[serde(default = "default_true")]
    pub bin: bool,
    #[serde(default = "default_true")]
    pub scripts: bool,
    /// Walked recursively; every regular file becomes an entry.
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    /// Regexes matched against entry paths; matching entries are skipped.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            desktop: true,
            bin: true,
            scripts: true,
            directories: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl Config {
    /// The catalog file, falling back to the per-user data directory.
    pub fn catalog_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.general.catalog_path {
            return Ok(path.clone());
        }
        let dirs = project_dirs().context("no home directory to keep the catalog in")?;
        Ok(dirs.data_dir().join("catalog"))
    }
}

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "ocha", "ocha")
}

pub fn load_config() -> Result<Config> {
    let config_path = match project_dirs() {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => PathBuf::from("config.toml"),
    };
    load_config_from(&config_path)
}

/// Reads `path`; a missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config: Config = toml::from_str(&content).with_context(|| format!("parsing {:?}", path))?;
    Ok(config)
}
