use crate::inventory::MergePolicy;
use crate::readiness::ReadinessSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "CLAB_BRINGUP_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "bringup.yaml";
/// Upper bound for every configured duration
const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config {path} is invalid: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{0}")]
    Value(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BringupConfig {
    pub readiness: ReadinessSettings,
    pub inventory: InventorySettings,
    pub commands: CommandSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    /// How long to wait for containerlab to write the inventory
    #[serde(with = "duration")]
    pub wait: Duration,
    #[serde(with = "duration")]
    pub poll_interval: Duration,
    pub target_group: String,
    pub links_key: String,
}

impl Default for InventorySettings {
    fn default() -> Self {
        let policy = MergePolicy::default();
        Self {
            wait: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            target_group: policy.target_group,
            links_key: policy.links_key,
        }
    }
}

impl InventorySettings {
    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy {
            target_group: self.target_group.clone(),
            links_key: self.links_key.clone(),
        }
    }
}

/// Command templates, split with shell-words then filled per argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    pub deploy: String,   // {topology}
    pub status: String,   // {filter}
    pub trigger: String,  // {inventory} {playbook}
    #[serde(with = "duration")]
    pub status_timeout: Duration,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            deploy: "sudo clab deploy -t {topology}".into(),
            status: "docker ps --filter name={filter} --format '{{.Names}}|{{.Status}}'".into(),
            trigger: "ansible-playbook -i {inventory} {playbook}".into(),
            status_timeout: Duration::from_secs(30),
        }
    }
}

/// Splits `template` like a shell would, then substitutes `{key}` placeholders
pub fn render_command(template: &str, vars: &[(&str, &str)]) -> Result<Vec<String>, ConfigError> {
    let words = shell_words::split(template)
        .map_err(|e| ConfigError::Value(format!("bad command template `{template}`: {e}")))?;
    if words.is_empty() {
        return Err(ConfigError::Value("command template is empty".into()));
    }

    Ok(words
        .into_iter()
        .map(|word| {
            vars.iter().fold(word, |acc, (key, value)| acc.replace(&format!("{{{key}}}"), value))
        })
        .collect())
}

impl BringupConfig {
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: BringupConfig = serde_yaml::from_str(text).map_err(|source| ConfigError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text, path)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.readiness.interval.is_zero() {
            return Err(ConfigError::Value("readiness.interval must be greater than zero".into()));
        }
        if self.inventory.poll_interval.is_zero() {
            return Err(ConfigError::Value("inventory.poll_interval must be greater than zero".into()));
        }
        for (name, value) in [
            ("readiness.max_wait", self.readiness.max_wait),
            ("readiness.interval", self.readiness.interval),
            ("inventory.wait", self.inventory.wait),
            ("inventory.poll_interval", self.inventory.poll_interval),
            ("commands.status_timeout", self.commands.status_timeout),
        ] {
            if value > MAX_DURATION {
                return Err(ConfigError::Value(format!(
                    "{name} must be at most {}, got {}",
                    humantime::format_duration(MAX_DURATION),
                    humantime::format_duration(value)
                )));
            }
        }
        for (name, template) in [
            ("deploy", &self.commands.deploy),
            ("status", &self.commands.status),
            ("trigger", &self.commands.trigger),
        ] {
            render_command(template, &[])
                .map_err(|e| ConfigError::Value(format!("commands.{name}: {e}")))?;
        }
        Ok(())
    }
}

/// Loads `.env` if present, then the YAML config named by `CLAB_BRINGUP_CONFIG`
/// (default `bringup.yaml`). An explicit path wins over both.
pub fn load_config(explicit: Option<&Path>) -> Result<BringupConfig, ConfigError> {
    dotenvy::dotenv().ok();

    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE)),
    };
    BringupConfig::load_from(&path)
}

/// Durations as humantime strings: `"5m"`, `"10s"`, `"1m 30s"`
pub mod duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
