/// Session settings, loaded from JSON
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::{BeatSpec, PatternId};
use crate::registry::{DEFAULT_AMP, TR808_VOICES};
use crate::sequencer::playback::{MAX_BPM, MIN_BPM};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "BEATGRID_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub bpm: f32,
    /// Pattern ids to cycle through, one per measure
    pub pattern: Vec<PatternId>,
    pub voices: Vec<String>,
    pub sample_root: PathBuf,
    /// Per-voice sample variant overrides
    pub versions: HashMap<String, usize>,
    pub default_amp: f32,
    /// Beat loaded at start-up
    pub beat: Option<BeatSpec>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bpm: 90.0,
            pattern: vec![PatternId::Index(0)],
            voices: TR808_VOICES.iter().map(|v| v.to_string()).collect(),
            sample_root: PathBuf::from("TR808_Samples"),
            versions: HashMap::new(),
            default_amp: DEFAULT_AMP,
            beat: None,
        }
    }
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: SessionConfig = serde_json::from_str(json)?;
        let bpm = config.bpm.clamp(MIN_BPM, MAX_BPM);
        if bpm != config.bpm {
            log::warn!("Config bpm {} clamped to {}", config.bpm, bpm);
            config.bpm = bpm;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load from `$BEATGRID_CONFIG`, or defaults when it is unset
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.voices.is_empty() {
            return Err(Error::Config("no voices configured".into()));
        }
        if !self.default_amp.is_finite() || self.default_amp < 0.0 {
            return Err(Error::Config(format!(
                "default_amp {} must be a non-negative number",
                self.default_amp
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
