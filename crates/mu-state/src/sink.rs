use image::RgbaImage;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, RwLock};

use crate::{CharacterStats, LogEntry, LogLevel};
use mu_data::CharacterConfig;

/// Oldest entries are dropped once the log ring grows past this.
pub const LOG_RING_CAP: usize = 500;

/// Everything the control loop reports outward. Events for one character are
/// applied in the order they were published; no ordering is guaranteed across
/// characters for concurrent readers.
#[derive(Debug, Clone)]
pub enum BotEvent {
    Log(LogEntry),
    Stats {
        name: String,
        stats: CharacterStats,
    },
    WindowStatus {
        name: String,
        has_window: bool,
    },
    ActiveCharacter(Option<String>),
    Screenshot {
        name: String,
        image: Arc<RgbaImage>,
    },
    RunState(bool),
}

/// Cloneable publishing handle for the control loop and detectors.
///
/// Log events are mirrored to `tracing` so the developer-facing log carries
/// the same story as the operator-facing ring.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<BotEvent>,
}

impl EventSink {
    pub fn publish(&self, event: BotEvent) {
        // The consumer outliving the producers is a shutdown ordering detail;
        // a closed channel just means nobody is listening anymore.
        let _ = self.tx.send(event);
    }

    pub fn log(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info => tracing::info!("{}", entry.message),
            LogLevel::Important => tracing::info!("[important] {}", entry.message),
            LogLevel::Attention => tracing::warn!("{}", entry.message),
        }
        self.publish(BotEvent::Log(entry));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogEntry::info(message));
    }

    pub fn important(&self, message: impl Into<String>) {
        self.log(LogEntry::important(message));
    }

    pub fn attention(&self, message: impl Into<String>) {
        self.log(LogEntry::attention(message));
    }

    pub fn stats(&self, name: impl Into<String>, stats: CharacterStats) {
        self.publish(BotEvent::Stats {
            name: name.into(),
            stats,
        });
    }

    pub fn window_status(&self, name: impl Into<String>, has_window: bool) {
        self.publish(BotEvent::WindowStatus {
            name: name.into(),
            has_window,
        });
    }

    pub fn active_character(&self, name: Option<String>) {
        self.publish(BotEvent::ActiveCharacter(name));
    }

    pub fn screenshot(&self, name: impl Into<String>, image: Arc<RgbaImage>) {
        self.publish(BotEvent::Screenshot {
            name: name.into(),
            image,
        });
    }

    pub fn run_state(&self, running: bool) {
        self.publish(BotEvent::RunState(running));
    }
}

/// Shared runtime snapshot consumed by UI/web collaborators.
///
/// The worker publishes `BotEvent`s through an `EventSink`; a consumer thread
/// applies them here in channel order while readers poll concurrently.
pub struct RuntimeState {
    running: AtomicBool,
    active: RwLock<Option<String>>,
    logs: Mutex<VecDeque<LogEntry>>,
    stats: RwLock<HashMap<String, CharacterStats>>,
    window_status: RwLock<HashMap<String, bool>>,
    screenshots: RwLock<HashMap<String, Arc<RgbaImage>>>,
    characters: RwLock<Vec<CharacterConfig>>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            active: RwLock::new(None),
            logs: Mutex::new(VecDeque::with_capacity(LOG_RING_CAP)),
            stats: RwLock::new(HashMap::new()),
            window_status: RwLock::new(HashMap::new()),
            screenshots: RwLock::new(HashMap::new()),
            characters: RwLock::new(Vec::new()),
        }
    }
}

impl RuntimeState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a sink whose events are drained into this state by a dedicated
    /// consumer thread. The thread exits once every sink clone is dropped.
    pub fn attach(self: &Arc<Self>) -> EventSink {
        let (tx, rx) = mpsc::channel();
        let state = Arc::clone(self);
        std::thread::Builder::new()
            .name("state-sink".into())
            .spawn(move || {
                for event in rx {
                    state.apply(event);
                }
            })
            .expect("failed to spawn state-sink thread");
        EventSink { tx }
    }

    pub fn apply(&self, event: BotEvent) {
        match event {
            BotEvent::Log(entry) => self.push_log(entry),
            BotEvent::Stats { name, stats } => {
                self.stats.write().unwrap().insert(name, stats);
            }
            BotEvent::WindowStatus { name, has_window } => {
                self.window_status.write().unwrap().insert(name, has_window);
            }
            BotEvent::ActiveCharacter(name) => {
                *self.active.write().unwrap() = name;
            }
            BotEvent::Screenshot { name, image } => {
                self.screenshots.write().unwrap().insert(name, image);
            }
            BotEvent::RunState(running) => {
                self.running.store(running, Ordering::SeqCst);
            }
        }
    }

    fn push_log(&self, entry: LogEntry) {
        let mut logs = self.logs.lock().unwrap();
        logs.push_back(entry);
        while logs.len() > LOG_RING_CAP {
            logs.pop_front();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn active_character(&self) -> Option<String> {
        self.active.read().unwrap().clone()
    }

    /// Most recent log entries, newest last, capped at `limit`.
    pub fn logs(&self, limit: usize) -> Vec<LogEntry> {
        let logs = self.logs.lock().unwrap();
        let skip = logs.len().saturating_sub(limit);
        logs.iter().skip(skip).cloned().collect()
    }

    pub fn stats(&self) -> HashMap<String, CharacterStats> {
        self.stats.read().unwrap().clone()
    }

    pub fn stats_for(&self, name: &str) -> Option<CharacterStats> {
        self.stats.read().unwrap().get(name).copied()
    }

    pub fn window_status(&self) -> HashMap<String, bool> {
        self.window_status.read().unwrap().clone()
    }

    pub fn screenshot(&self, name: &str) -> Option<Arc<RgbaImage>> {
        self.screenshots.read().unwrap().get(name).cloned()
    }

    pub fn set_characters(&self, characters: Vec<CharacterConfig>) {
        *self.characters.write().unwrap() = characters;
    }

    pub fn characters(&self) -> Vec<CharacterConfig> {
        self.characters.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_ring_drops_oldest_past_cap() {
        let state = RuntimeState::default();
        for i in 0..LOG_RING_CAP + 10 {
            state.apply(BotEvent::Log(LogEntry::info(format!("entry {}", i))));
        }
        let logs = state.logs(LOG_RING_CAP + 10);
        assert_eq!(logs.len(), LOG_RING_CAP);
        assert_eq!(logs[0].message, "entry 10");
        assert_eq!(logs.last().unwrap().message, format!("entry {}", LOG_RING_CAP + 9));
    }

    #[test]
    fn logs_limit_returns_newest() {
        let state = RuntimeState::default();
        for i in 0..20 {
            state.apply(BotEvent::Log(LogEntry::info(format!("{}", i))));
        }
        let logs = state.logs(5);
        assert_eq!(logs.len(), 5);
        assert_eq!(logs[0].message, "15");
    }

    #[test]
    fn attached_sink_applies_in_order() {
        let state = RuntimeState::new();
        let sink = state.attach();
        sink.stats("Hero", CharacterStats { level: 1, master_level: 0, resets: 0 });
        sink.stats("Hero", CharacterStats { level: 2, master_level: 0, resets: 0 });
        sink.run_state(true);
        drop(sink);
        // The consumer thread drains before exiting; give it a moment.
        for _ in 0..50 {
            if state.is_running() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(state.is_running());
        assert_eq!(state.stats_for("Hero").unwrap().level, 2);
    }
}
