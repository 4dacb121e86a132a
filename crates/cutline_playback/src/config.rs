use crate::error::{PlaybackError, Result};
use cutline_core::types::TimeUs;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Ticks are stepped in whole microseconds, so faster rates are refused.
pub const MAX_TICK_HZ: u32 = 1_000_000;

/// Playback clock tuning. Every field has a default, so a partial JSON
/// file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Clock ticks per second.
    pub tick_hz: u32,
    /// Largest renderer/engine divergence tolerated before the engine adopts
    /// the renderer's reported position.
    pub drift_threshold: TimeUs,
    /// How often a renderer adapter polls its player for position.
    pub position_poll_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_hz: 30,
            drift_threshold: TimeUs(100_000),
            position_poll_ms: 250,
        }
    }
}

impl PlaybackConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: PlaybackConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_hz == 0 {
            return Err(PlaybackError::Config("tick_hz must be positive".into()));
        }
        if self.tick_hz > MAX_TICK_HZ {
            return Err(PlaybackError::Config(format!(
                "tick_hz must be at most {}",
                MAX_TICK_HZ
            )));
        }
        if self.drift_threshold < TimeUs::ZERO {
            return Err(PlaybackError::Config(
                "drift_threshold must not be negative".into(),
            ));
        }
        Ok(())
    }

    /// Wall-clock period between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_hz.clamp(1, MAX_TICK_HZ)
    }

    pub fn position_poll_interval(&self) -> Duration {
        Duration::from_millis(self.position_poll_ms)
    }
}
