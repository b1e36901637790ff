use std::sync::Arc;

use crate::{BotInputTracker, WindowSystem};

/// Decides whether it is safe to act on the shared input devices.
///
/// The bot yields to the human operator: it acts only once the system-wide
/// human idle time passes a threshold. The bot's own injected input resets
/// the system idle counter too, so input injected within a short grace
/// window also counts as "safe"; otherwise the bot would wait on itself.
pub struct IdleGate {
    system: Arc<dyn WindowSystem>,
    tracker: Arc<BotInputTracker>,
    idle_threshold_ms: u64,
    bot_grace_ms: u64,
}

impl IdleGate {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        tracker: Arc<BotInputTracker>,
        idle_threshold_ms: u64,
        bot_grace_ms: u64,
    ) -> Self {
        Self {
            system,
            tracker,
            idle_threshold_ms,
            bot_grace_ms,
        }
    }

    pub fn idle_threshold_ms(&self) -> u64 {
        self.idle_threshold_ms
    }

    pub fn ready(&self) -> bool {
        self.system.user_idle_millis() >= self.idle_threshold_ms
            || self.tracker.is_recent(self.bot_grace_ms)
    }
}
