use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

fn process_millis() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Records when the bot itself last injected input.
///
/// The idle gate uses this to avoid treating the bot's own keystrokes and
/// clicks as human interference, which would deadlock the run. A value of
/// zero means no input has ever been injected.
#[derive(Debug, Default)]
pub struct BotInputTracker {
    // Stored as process-millis + 1 so zero can mean "never".
    last_input: AtomicU64,
}

impl BotInputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.last_input
            .store(process_millis() + 1, Ordering::Relaxed);
    }

    /// Whether the bot injected input within the last `window_ms`.
    pub fn is_recent(&self, window_ms: u64) -> bool {
        let stamp = self.last_input.load(Ordering::Relaxed);
        if stamp == 0 {
            return false;
        }
        process_millis().saturating_sub(stamp - 1) <= window_ms
    }
}
