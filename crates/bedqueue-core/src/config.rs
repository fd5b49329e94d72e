//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! database_path = "/var/lib/bedqueue/queue.db"
//! profile_path = "/home/me/.bedqueue/profile.db"
//! busy_timeout_ms = 5000
//!
//! [onboarding]
//! persistence = "batch"
//!
//! [[onboarding.stages]]
//! name = "Eligibility"
//! fields = ["hospital", "approval_code"]
//!
//! [allocation]
//! require_onboarded = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::allocator::AllocationPolicy;
use crate::onboarding::{FlowError, OnboardingFlow, PersistenceMode, StageDescriptor};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid onboarding flow: {0}")]
    Flow(#[from] FlowError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Record store file
    pub database_path: Option<PathBuf>,
    /// Local profile file holding the client identity
    pub profile_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub onboarding: OnboardingConfig,
    pub allocation: AllocationPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OnboardingConfig {
    pub persistence: PersistenceMode,
    /// Empty means the standard three-stage flow
    pub stages: Vec<StageDescriptor>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            profile_path: None,
            busy_timeout_ms: 5000,
            onboarding: OnboardingConfig::default(),
            allocation: AllocationPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        // Surface a bad stage layout at load time rather than first use
        config.flow()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(?path, "Loaded engine config");
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(?path, "No engine config, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Onboarding flow described by this config.
    pub fn flow(&self) -> Result<OnboardingFlow, FlowError> {
        if self.onboarding.stages.is_empty() {
            return Ok(OnboardingFlow::standard().with_persistence(self.onboarding.persistence));
        }
        OnboardingFlow::new(self.onboarding.stages.clone(), self.onboarding.persistence)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
