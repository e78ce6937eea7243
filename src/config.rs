//! TOML configuration for the analyzer.
//!
//! Every section has compiled-in defaults, so an empty (or absent) file is a
//! valid configuration. Lookup order: explicit path, `NETDESIGN_CONFIG`,
//! `/etc/netdesign/netdesign.toml`, defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::scoring::ForestParams;

pub const CONFIG_ENV: &str = "NETDESIGN_CONFIG";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/netdesign/netdesign.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AnalyzerConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded analyzer configuration");
        Ok(config)
    }

    /// Resolve the configuration. An explicit path must load; the env var and
    /// system locations fall through to defaults on error.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "NETDESIGN_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Allowed CORS origins; `"*"` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Trained model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/model.json"),
        }
    }
}

/// Offline training job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Synthetic topologies in the corpus.
    pub samples: usize,
    pub dataset_path: PathBuf,
    /// Outlier fraction; controls production sensitivity.
    pub contamination: f64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let forest = ForestParams::default();
        Self {
            samples: 200,
            dataset_path: PathBuf::from("data/training_data.csv"),
            contamination: forest.contamination,
            n_estimators: forest.n_estimators,
            max_samples: forest.max_samples,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
            contamination: self.contamination,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationBackend {
    Synthetic,
    Command,
}

/// Simulation adapter backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub backend: SimulationBackend,
    /// Emulation program for the `command` backend.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    /// Seed for the `synthetic` backend.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            backend: SimulationBackend::Synthetic,
            command: None,
            args: Vec::new(),
            timeout_secs: 30,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
