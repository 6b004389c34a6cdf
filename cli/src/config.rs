// Configuration management for the meshsight CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/meshsight/config.json
// - Linux: ~/.config/meshsight/config.json
// - Windows: %APPDATA%\meshsight\config.json

use anyhow::{Context, Result};
use meshsight_core::{Node, PredictorConfig, UpdateRule};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address registered for the local node at bootstrap
    pub local_address: String,

    /// Nodes registered before any trace is replayed
    pub seed_nodes: Vec<SeedNode>,

    /// Write daily-rotated logs here in addition to stderr
    pub log_dir: Option<String>,

    /// Estimator, resolver and solver tuning
    pub predictor: PredictorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedNode {
    pub id: String,
    pub address: String,
}

impl SeedNode {
    pub fn to_node(&self) -> Node {
        Node::new(self.id.clone(), self.address.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_address: "127.0.0.1:0".to_string(),
            seed_nodes: vec![
                // Empty by default - users add their own
            ],
            log_dir: None,
            predictor: PredictorConfig::default(),
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("meshsight");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the default config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from `path`, or create a default one there if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            config
                .predictor
                .validate()
                .context("Config file holds invalid predictor settings")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Add a seed node (replaces one with the same id)
    pub fn add_seed_node(&mut self, id: String, address: String) -> Result<()> {
        if id.is_empty() {
            anyhow::bail!("Seed node id must not be empty");
        }
        self.seed_nodes.retain(|n| n.id != id);
        self.seed_nodes.push(SeedNode { id, address });
        Ok(())
    }

    /// Remove a seed node; returns whether it was present
    pub fn remove_seed_node(&mut self, id: &str) -> bool {
        let before = self.seed_nodes.len();
        self.seed_nodes.retain(|n| n.id != id);
        self.seed_nodes.len() != before
    }

    /// Set a config value
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut predictor = self.predictor.clone();
        match key {
            "local_address" => self.local_address = value.to_string(),
            "log_dir" => {
                self.log_dir = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "resolution_interval" => {
                predictor.resolution_interval = value.parse().context("Invalid number")?;
            }
            "confidence_saturation" => {
                predictor.confidence_saturation = value.parse().context("Invalid number")?;
            }
            "existence_threshold" => {
                predictor.existence_threshold = value.parse().context("Invalid number")?;
            }
            "decisive_confidence" => {
                predictor.decisive_confidence = value.parse().context("Invalid number")?;
            }
            "latency_smoothing" => {
                predictor.latency_smoothing = value.parse().context("Invalid number")?;
            }
            "default_latency_ms" => {
                predictor.default_latency_ms = value.parse().context("Invalid number")?;
            }
            "default_bandwidth" => {
                predictor.default_bandwidth = value.parse().context("Invalid number")?;
            }
            "probability_weight" => {
                predictor.probability_weight = value.parse().context("Invalid number")?;
            }
            "latency_divisor" => {
                predictor.latency_divisor = value.parse().context("Invalid number")?;
            }
            "max_alternatives" => {
                predictor.max_alternatives = value.parse().context("Invalid number")?;
            }
            "require_registered_nodes" => {
                predictor.require_registered_nodes =
                    value.parse().context("Invalid boolean value")?;
            }
            "update_rule" => {
                predictor.update_rule = match value {
                    "running_mass" => UpdateRule::RunningMass,
                    "laplace" => UpdateRule::Laplace,
                    _ => anyhow::bail!("Unknown update rule: {} (running_mass | laplace)", value),
                };
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        predictor.validate()?;
        self.predictor = predictor;
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        let p = &self.predictor;
        let update_rule = match p.update_rule {
            UpdateRule::RunningMass => "running_mass",
            UpdateRule::Laplace => "laplace",
        };
        vec![
            ("local_address".to_string(), self.local_address.clone()),
            (
                "log_dir".to_string(),
                self.log_dir.clone().unwrap_or_else(|| "(stderr only)".to_string()),
            ),
            ("resolution_interval".to_string(), p.resolution_interval.to_string()),
            ("confidence_saturation".to_string(), p.confidence_saturation.to_string()),
            ("existence_threshold".to_string(), p.existence_threshold.to_string()),
            ("decisive_confidence".to_string(), p.decisive_confidence.to_string()),
            ("latency_smoothing".to_string(), p.latency_smoothing.to_string()),
            ("default_latency_ms".to_string(), p.default_latency_ms.to_string()),
            ("default_bandwidth".to_string(), p.default_bandwidth.to_string()),
            ("probability_weight".to_string(), p.probability_weight.to_string()),
            ("latency_divisor".to_string(), p.latency_divisor.to_string()),
            ("update_rule".to_string(), update_rule.to_string()),
            ("max_alternatives".to_string(), p.max_alternatives.to_string()),
            (
                "require_registered_nodes".to_string(),
                p.require_registered_nodes.to_string(),
            ),
            ("seed_nodes".to_string(), self.seed_nodes.len().to_string()),
        ]
    }
}
