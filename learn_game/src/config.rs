use crate::error::ConfigError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const NUM_EPISODES: usize = 200_000_usize;
pub const LEARNING_RATE: f64 = 0.5;
pub const EXPLORATION_RATE: f64 = 0.3;
pub const PROGRESS_INTERVAL: usize = 1_000;

/// Step size and exploration of one learning agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub learning_rate: f64,
    pub exploration_rate: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            learning_rate: LEARNING_RATE,
            exploration_rate: EXPLORATION_RATE,
        }
    }
}

impl AgentConfig {
    /// Same agent, but always greedy. Used for play against a human.
    pub fn greedy(self) -> Self {
        AgentConfig {
            exploration_rate: 0.0,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: usize,
    pub progress_interval: usize,
    /// Seeds both agents' generators; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            episodes: NUM_EPISODES,
            progress_interval: PROGRESS_INTERVAL,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub dir: PathBuf,
    pub export_json: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            dir: PathBuf::from("./policy_archive"),
            export_json: false,
        }
    }
}

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub training: TrainingConfig,
    pub policy: PolicyConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`AppConfig::load`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lr = self.agent.learning_rate;
        if !(lr > 0.0 && lr <= 1.0) {
            return Err(ConfigError::Validation(
                "agent.learning_rate must be in (0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.agent.exploration_rate) {
            return Err(ConfigError::Validation(
                "agent.exploration_rate must be in [0, 1]".into(),
            ));
        }
        if self.training.episodes == 0 {
            return Err(ConfigError::Validation(
                "training.episodes must be > 0".into(),
            ));
        }
        if self.training.progress_interval == 0 {
            return Err(ConfigError::Validation(
                "training.progress_interval must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.agent.learning_rate, 0.5);
        assert_eq!(config.agent.exploration_rate, 0.3);
        assert_eq!(config.training.episodes, 200_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learn.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
[agent]
exploration_rate = 0.1

[training]
episodes = 5000
seed = 7
"#
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.agent.exploration_rate, 0.1);
        assert_eq!(config.agent.learning_rate, LEARNING_RATE);
        assert_eq!(config.training.episodes, 5000);
        assert_eq!(config.training.seed, Some(7));
        assert_eq!(config.policy, PolicyConfig::default());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn out_of_range_rates_are_rejected() {
        let mut config = AppConfig::default();
        config.agent.exploration_rate = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = AppConfig::default();
        config.agent.learning_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.training.progress_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn greedy_drops_exploration_only() {
        let greedy = AgentConfig::default().greedy();
        assert_eq!(greedy.exploration_rate, 0.0);
        assert_eq!(greedy.learning_rate, LEARNING_RATE);
    }
}
