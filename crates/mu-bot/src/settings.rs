use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use mu_vision::{ActivityThresholds, PartyConfig, WarpConfig};

/// Every numeric tunable of the control loop, persisted as one JSON file.
///
/// Defaults match the live game client; overrides exist for private servers
/// with different pacing, not for ordinary use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Title prefix identifying game-client windows, up to the opening
    /// bracket of the character name.
    pub window_title_prefix: String,
    /// Character level at which a reset becomes available.
    pub reset_level: u32,
    /// Maximum points a single allocation command may carry.
    pub allocation_cap: u64,
    /// Pause between the full-roster passes, in seconds.
    pub cycle_interval_secs: u64,
    /// Title re-poll interval while waiting out solo leveling, in seconds.
    pub solo_poll_secs: u64,
    /// Human idle time required before the bot touches the input devices.
    pub idle_threshold_ms: u64,
    /// Window after the bot's own input during which it keeps acting.
    pub bot_grace_ms: u64,
    /// Gap between consecutive chat commands.
    pub command_delay_ms: u64,
    /// Settle time after /reset before allocation commands follow.
    pub reset_settle_ms: u64,
    /// Wait after solo leveling before the party rejoin starts.
    pub rejoin_delay_ms: u64,
    pub rejoin_attempts: u32,
    /// Settle after toggling hunt mode before re-checking it.
    pub hunt_toggle_delay_ms: u64,
    pub hunt_toggle_attempts: u32,
    /// How long step 5 waits for hunt mode to come back, in seconds.
    pub hunt_wait_secs: u64,
    pub hunt_poll_ms: u64,
    /// Settle after toggling power-saving switch mode.
    pub switch_toggle_delay_ms: u64,
    pub switch_threshold: f64,
    /// Match threshold for the leveling-map name label.
    pub map_threshold: f64,
    /// Match threshold for the quest-completion dialog.
    pub quest_threshold: f64,
    /// Foreground-cursor debug poll interval, in seconds. 0 disables.
    pub debug_cursor_poll_secs: u64,
    pub activity: ActivityThresholds,
    pub warp: WarpConfig,
    pub party: PartyConfig,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            window_title_prefix: "GlobalMuOnline - Powered by IGCN - Name: [".to_string(),
            reset_level: 400,
            allocation_cap: 32_600,
            cycle_interval_secs: 60,
            solo_poll_secs: 3,
            idle_threshold_ms: 30_000,
            bot_grace_ms: 2_500,
            command_delay_ms: 500,
            reset_settle_ms: 2_000,
            rejoin_delay_ms: 2_000,
            rejoin_attempts: 3,
            hunt_toggle_delay_ms: 800,
            hunt_toggle_attempts: 3,
            hunt_wait_secs: 30,
            hunt_poll_ms: 1_000,
            switch_toggle_delay_ms: 900,
            switch_threshold: 0.92,
            map_threshold: 0.8,
            quest_threshold: 0.9,
            debug_cursor_poll_secs: 5,
            activity: ActivityThresholds::default(),
            warp: WarpConfig::default(),
            party: PartyConfig::default(),
        }
    }
}

impl BotSettings {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
