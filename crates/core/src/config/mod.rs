use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

/// Upper bound on retained activity log lines.
pub const MAX_LOG_CAPACITY: usize = 1_000;

/// Top-level configuration structure for a play session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audio: AudioConfig,
    pub log: LogConfig,
}

impl EngineConfig {
    /// Parses a JSON document. Missing sections fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.audio.instances_per_clip == 0 {
            return Err(EngineError::InvalidConfig(
                "audio.instances_per_clip must be at least 1".to_string(),
            ));
        }
        if self.audio.cooldown_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "audio.cooldown_ms must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.audio.volume) {
            return Err(EngineError::InvalidConfig(format!(
                "audio.volume must lie in [0, 1], got {}",
                self.audio.volume
            )));
        }
        if !(1..=MAX_LOG_CAPACITY).contains(&self.log.capacity) {
            return Err(EngineError::InvalidConfig(format!(
                "log.capacity must lie in [1, {MAX_LOG_CAPACITY}], got {}",
                self.log.capacity
            )));
        }
        Ok(())
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Independent playback instances prepared for every clip.
    pub instances_per_clip: usize,
    /// Minimum time between two accepted triggers of the same clip.
    pub cooldown_ms: u64,
    /// Playback volume applied on every start.
    pub volume: f32,
}

impl AudioConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            instances_per_clip: 3,
            cooldown_ms: 1_500,
            volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Number of activity log lines kept, newest first.
    pub capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { capacity: 20 }
    }
}
