use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

use mu_data::CharacterConfig;
use mu_state::{parse_title, CharacterStats, EventSink};
use mu_vision::{
    CurrentMapDetector, HuntModeDetector, MapWarpInteractor, NccMatcher, PartyInteractor,
    QuestDialogCloser, SwitchModeDetector, TemplateMatcher,
};
use mu_window::{BotInputTracker, CancelToken, IdleGate, Key, Modifier, WindowInfo, WindowSystem};

use crate::allocation::plan_reset;
use crate::settings::BotSettings;

/// How often the worker re-checks the idle gate while waiting for the user
/// to step away.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Hotkey the client binds to power-saving switch mode.
const SWITCH_HOTKEY: (Modifier, Key) = (Modifier::Ctrl, Key::Char('f'));

/// Key that toggles in-game auto-combat.
const HUNT_TOGGLE_KEY: Key = Key::Home;

/// Owns the run lifecycle: `start` spawns the worker thread, `stop` cancels
/// it cooperatively and joins. At most one run exists at a time; `start`
/// while running is a no-op.
pub struct BotController {
    system: Arc<dyn WindowSystem>,
    tracker: Arc<BotInputTracker>,
    sink: EventSink,
    settings: BotSettings,
    assets_dir: PathBuf,
    running: Arc<AtomicBool>,
    cancel: Mutex<Option<CancelToken>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BotController {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        tracker: Arc<BotInputTracker>,
        sink: EventSink,
        settings: BotSettings,
        assets_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            system,
            tracker,
            sink,
            settings,
            assets_dir: assets_dir.into(),
            running: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start(&self, characters: Vec<CharacterConfig>) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("Bot is already running");
            return;
        }
        let cancel = CancelToken::new();
        *self.cancel.lock().unwrap() = Some(cancel.clone());

        if self.settings.debug_cursor_poll_secs > 0 {
            spawn_cursor_logger(
                Arc::clone(&self.system),
                cancel.clone(),
                self.settings.debug_cursor_poll_secs,
            );
        }

        let worker = BotWorker::new(
            Arc::clone(&self.system),
            Arc::clone(&self.tracker),
            self.sink.clone(),
            self.settings.clone(),
            &self.assets_dir,
            cancel,
            characters,
        );
        let running = Arc::clone(&self.running);
        let handle = std::thread::Builder::new()
            .name("bot-worker".into())
            .spawn(move || {
                worker.run();
                running.store(false, Ordering::SeqCst);
            })
            .expect("failed to spawn bot-worker thread");
        *self.worker.lock().unwrap() = Some(handle);
    }

    pub fn stop(&self) {
        if let Some(cancel) = self.cancel.lock().unwrap().take() {
            cancel.cancel();
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Foreground-window cursor positions at a slow cadence, for calibrating new
/// click points against a live client. Exits with the run's cancel token.
fn spawn_cursor_logger(system: Arc<dyn WindowSystem>, cancel: CancelToken, poll_secs: u64) {
    std::thread::Builder::new()
        .name("cursor-debug".into())
        .spawn(move || {
            while cancel.sleep(Duration::from_secs(poll_secs)) {
                let Some(window) = system.foreground_window() else {
                    continue;
                };
                let Some((x, y)) = system.cursor_pos() else {
                    continue;
                };
                debug!(
                    "Cursor at ({}, {}); ({}, {}) within '{}'",
                    x,
                    y,
                    x - window.rect.left,
                    y - window.rect.top,
                    window.title
                );
            }
        })
        .expect("failed to spawn cursor-debug thread");
}

/// One run's worth of state: the roster, the detectors, and the cancel
/// token. Lives entirely on the worker thread.
struct BotWorker {
    system: Arc<dyn WindowSystem>,
    sink: EventSink,
    settings: BotSettings,
    cancel: CancelToken,
    characters: Vec<CharacterConfig>,
    gate: IdleGate,
    hunt: HuntModeDetector,
    switch: SwitchModeDetector,
    current_map: CurrentMapDetector,
    warp: MapWarpInteractor,
    party: PartyInteractor,
    quest: QuestDialogCloser,
}

impl BotWorker {
    fn new(
        system: Arc<dyn WindowSystem>,
        tracker: Arc<BotInputTracker>,
        sink: EventSink,
        settings: BotSettings,
        assets_dir: &Path,
        cancel: CancelToken,
        characters: Vec<CharacterConfig>,
    ) -> Self {
        let matcher: Arc<dyn TemplateMatcher> = Arc::new(NccMatcher::new());
        let gate = IdleGate::new(
            Arc::clone(&system),
            tracker,
            settings.idle_threshold_ms,
            settings.bot_grace_ms,
        );
        let hunt = HuntModeDetector::new(
            Arc::clone(&system),
            Arc::clone(&matcher),
            assets_dir,
            settings.activity,
        );
        let switch = SwitchModeDetector::new(
            Arc::clone(&system),
            Arc::clone(&matcher),
            assets_dir,
            settings.switch_threshold,
        );
        let current_map = CurrentMapDetector::new(
            Arc::clone(&system),
            Arc::clone(&matcher),
            assets_dir,
            settings.map_threshold,
        );
        let warp = MapWarpInteractor::new(
            Arc::clone(&system),
            Arc::clone(&matcher),
            assets_dir,
            settings.warp,
        );
        let party = PartyInteractor::new(
            Arc::clone(&system),
            Arc::clone(&matcher),
            assets_dir,
            settings.party,
        );
        let quest = QuestDialogCloser::new(
            Arc::clone(&system),
            Arc::clone(&matcher),
            assets_dir,
            settings.quest_threshold,
        );
        Self {
            system,
            sink,
            settings,
            cancel,
            characters,
            gate,
            hunt,
            switch,
            current_map,
            warp,
            party,
            quest,
        }
    }

    fn run(&self) {
        self.sink.run_state(true);
        self.sink.info("Bot started.");
        while !self.cancel.is_cancelled() {
            self.wait_for_user_idle();
            if self.cancel.is_cancelled() {
                break;
            }
            self.run_cycle();
            if !self
                .cancel
                .sleep(Duration::from_secs(self.settings.cycle_interval_secs))
            {
                break;
            }
        }
        self.sink.info("Bot stopped.");
        self.sink.run_state(false);
    }

    /// Block until the human operator has been idle long enough. Announced
    /// once per wait, not once per poll.
    fn wait_for_user_idle(&self) {
        if self.gate.ready() {
            return;
        }
        self.sink.info("Waiting for the user to go idle.");
        while !self.cancel.is_cancelled() && !self.gate.ready() {
            if !self.cancel.sleep(IDLE_POLL) {
                return;
            }
        }
    }

    fn run_cycle(&self) {
        self.sink.info("Cycle started.");
        let mut reset_done: HashSet<String> = HashSet::new();
        for character in &self.characters {
            if self.cancel.is_cancelled() {
                return;
            }
            self.wait_for_user_idle();
            if self.cancel.is_cancelled() {
                return;
            }
            let prefix = format!("{}{}]", self.settings.window_title_prefix, character.name);
            let windows = self.system.find_windows(&prefix);
            self.sink
                .window_status(&character.name, !windows.is_empty());
            if windows.is_empty() {
                self.sink
                    .attention(format!("No window found for {}.", character.name));
                continue;
            }
            for window in &windows {
                if self.cancel.is_cancelled() {
                    return;
                }
                self.process_window(character, window, &mut reset_done);
            }
        }
    }

    fn process_window(
        &self,
        character: &CharacterConfig,
        window: &WindowInfo,
        reset_done: &mut HashSet<String>,
    ) {
        // Titles mutate as the character levels; re-fetch rather than trust
        // the enumeration-time snapshot.
        let Some(title) = self.system.window_title(window.id) else {
            return;
        };
        let Some((name, stats)) = parse_title(&title) else {
            return;
        };
        if !name.eq_ignore_ascii_case(&character.name) {
            return;
        }
        self.sink.stats(&character.name, stats);

        if stats.level < self.settings.reset_level {
            debug!(
                "{} at level {}, below reset level {}",
                character.name, stats.level, self.settings.reset_level
            );
            self.store_screenshot(character, window);
            return;
        }
        // At most one reset per character per cycle, however many windows
        // carry its name.
        if !reset_done.insert(character.name.clone()) {
            return;
        }

        self.sink.active_character(Some(character.name.clone()));
        let was_power_saving = self.switch.is_active(window);
        if was_power_saving {
            self.toggle_switch_mode(window, false);
        }
        self.handle_reset_flow(character, window, &stats);
        if was_power_saving && !self.cancel.is_cancelled() {
            self.toggle_switch_mode(window, true);
        }
        self.sink.active_character(None);
    }

    fn toggle_switch_mode(&self, window: &WindowInfo, enable: bool) {
        self.system.focus(window);
        self.system.send_hotkey(SWITCH_HOTKEY.0, SWITCH_HOTKEY.1);
        if !self
            .cancel
            .sleep(Duration::from_millis(self.settings.switch_toggle_delay_ms))
        {
            return;
        }
        if self.switch.is_active(window) != enable {
            self.sink.attention(format!(
                "Could not {} power-saving mode.",
                if enable { "enable" } else { "disable" }
            ));
        }
    }

    /// The per-character reset workflow: quest dialog, reset + allocation
    /// commands, solo leveling, party rejoin, hunt-mode wait, screenshot.
    fn handle_reset_flow(
        &self,
        character: &CharacterConfig,
        window: &WindowInfo,
        stats: &CharacterStats,
    ) {
        self.quest.close_if_open(window, &self.sink);

        let plan = match plan_reset(character, stats.resets, self.settings.allocation_cap) {
            Ok(plan) => plan,
            Err(e) => {
                self.sink.attention(format!("{:#}", e));
                return;
            }
        };
        if plan.forfeited > 0 {
            self.sink.attention(format!(
                "{}: {} point(s) beyond the allocation cap forfeited.",
                character.name, plan.forfeited
            ));
        }

        self.system.focus(window);
        self.system.send_chat_command("/reset");
        if !self
            .cancel
            .sleep(Duration::from_millis(self.settings.reset_settle_ms))
        {
            return;
        }
        self.sink.important(format!(
            "{} reset ({} -> {} resets).",
            character.name,
            stats.resets,
            stats.resets + 1
        ));
        for command in &plan.commands {
            if self.cancel.is_cancelled() {
                return;
            }
            self.system.send_chat_command(command);
            if !self
                .cancel
                .sleep(Duration::from_millis(self.settings.command_delay_ms))
            {
                return;
            }
        }

        if character.solo_level > 0 {
            self.solo_level(character, window);
            if self.cancel.is_cancelled() {
                return;
            }
        }

        self.rejoin_party(character, window);
        if self.cancel.is_cancelled() {
            return;
        }

        if self.hunt.wait_for_active(
            window,
            Duration::from_secs(self.settings.hunt_wait_secs),
            Duration::from_millis(self.settings.hunt_poll_ms),
            &self.cancel,
            &self.sink,
        ) {
            self.sink.important(format!(
                "{} returned to hunt mode; reset complete.",
                character.name
            ));
        }

        self.store_screenshot(character, window);
    }

    /// Warp to the away map, make sure auto-combat is on, then wait out the
    /// early levels alone. The level wait is unbounded; only cancellation or
    /// a vanished window ends it early.
    fn solo_level(&self, character: &CharacterConfig, window: &WindowInfo) {
        self.warp
            .warp_to(window, character.warp_map, &self.cancel, &self.sink);
        self.ensure_hunt_mode(window);

        let poll = Duration::from_secs(self.settings.solo_poll_secs);
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let Some(title) = self.system.window_title(window.id) else {
                return;
            };
            if let Some((_, stats)) = parse_title(&title) {
                self.sink.stats(&character.name, stats);
                if stats.level >= character.solo_level {
                    self.sink.info(format!(
                        "{} reached level {}.",
                        character.name, stats.level
                    ));
                    return;
                }
            }
            if !self.cancel.sleep(poll) {
                return;
            }
        }
    }

    fn ensure_hunt_mode(&self, window: &WindowInfo) -> bool {
        for _ in 0..self.settings.hunt_toggle_attempts {
            if self.hunt.is_active(window) {
                return true;
            }
            if self.cancel.is_cancelled() {
                return false;
            }
            self.system.focus(window);
            self.system.send_key(HUNT_TOGGLE_KEY);
            if !self
                .cancel
                .sleep(Duration::from_millis(self.settings.hunt_toggle_delay_ms))
            {
                return false;
            }
        }
        if self.hunt.is_active(window) {
            return true;
        }
        self.sink.attention("Could not enable hunt mode.");
        false
    }

    /// Click party slots until the character is pulled off the away map.
    /// Soft failure: an exhausted rejoin leaves the workflow to continue.
    fn rejoin_party(&self, character: &CharacterConfig, window: &WindowInfo) {
        let delay = Duration::from_millis(self.settings.rejoin_delay_ms);
        if !self.cancel.sleep(delay) {
            return;
        }
        let mut attempted = false;
        for _ in 0..self.settings.rejoin_attempts {
            if self.cancel.is_cancelled() {
                return;
            }
            if !self.current_map.is_on_map(window) {
                // Only announce a departure the rejoin itself caused; a
                // character that never reached the map just skips ahead.
                if attempted {
                    self.sink
                        .important(format!("{} left the leveling map.", character.name));
                } else {
                    debug!("{} not on the leveling map; skipping rejoin", character.name);
                }
                return;
            }
            self.party.rejoin(window, &self.cancel, &self.sink);
            attempted = true;
            if !self.cancel.sleep(delay) {
                return;
            }
        }
        if self.current_map.is_on_map(window) {
            self.sink.attention(format!(
                "{} is still on the leveling map.",
                character.name
            ));
        }
    }

    fn store_screenshot(&self, character: &CharacterConfig, window: &WindowInfo) {
        if !character.active {
            return;
        }
        match self.system.capture_window(window) {
            Ok(frame) => self.sink.screenshot(&character.name, Arc::new(frame)),
            Err(e) => tracing::warn!("Screenshot capture failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mu_data::{Attribute, WarpMap};
    use mu_state::RuntimeState;
    use mu_window::stub::StubWindowSystem;
    use mu_window::WindowRect;

    const TITLE_PREFIX: &str = "GlobalMuOnline - Powered by IGCN - Name: [";

    fn character(name: &str) -> CharacterConfig {
        CharacterConfig {
            name: name.to_string(),
            strength: 1000,
            agility: 1000,
            stamina: 0,
            energy: 0,
            command: 0,
            overflow_attribute: Attribute::Cmd,
            points_per_reset: 2000,
            solo_level: 0,
            warp_map: WarpMap::Elbeland3,
            active: false,
        }
    }

    fn fast_settings() -> BotSettings {
        BotSettings {
            command_delay_ms: 0,
            reset_settle_ms: 0,
            rejoin_delay_ms: 0,
            hunt_toggle_delay_ms: 0,
            hunt_wait_secs: 0,
            hunt_poll_ms: 0,
            switch_toggle_delay_ms: 0,
            debug_cursor_poll_secs: 0,
            ..BotSettings::default()
        }
    }

    fn title(name: &str, level: u32, resets: u32) -> String {
        format!(
            "{}{}] Level: [{}] Master Level: [0] Resets: [{}]",
            TITLE_PREFIX, name, level, resets
        )
    }

    fn worker(
        system: &Arc<StubWindowSystem>,
        tracker: Arc<BotInputTracker>,
        characters: Vec<CharacterConfig>,
        assets: &Path,
    ) -> (BotWorker, Arc<RuntimeState>) {
        let state = RuntimeState::new();
        let worker = BotWorker::new(
            Arc::clone(system) as Arc<dyn WindowSystem>,
            tracker,
            state.attach(),
            fast_settings(),
            assets,
            CancelToken::new(),
            characters,
        );
        (worker, state)
    }

    fn idle_stub() -> (Arc<StubWindowSystem>, Arc<BotInputTracker>) {
        let tracker = Arc::new(BotInputTracker::new());
        let system = Arc::new(StubWindowSystem::new(Arc::clone(&tracker)));
        system.set_idle_millis(60_000);
        (system, tracker)
    }

    #[test]
    fn reset_sends_expected_command_sequence() {
        let (system, tracker) = idle_stub();
        system.add_window(1, title("Hero", 400, 5), WindowRect::default());
        let assets = tempfile::tempdir().unwrap();
        let (worker, _) = worker(&system, tracker, vec![character("Hero")], assets.path());

        worker.run_cycle();

        assert_eq!(
            system.commands(),
            vec!["/reset", "/addstr 1000", "/addagi 1000", "/addcmd 8000"]
        );
    }

    #[test]
    fn one_reset_per_character_per_cycle() {
        let (system, tracker) = idle_stub();
        system.add_window(1, title("Hero", 400, 5), WindowRect::default());
        system.add_window(2, title("Hero", 400, 5), WindowRect::default());
        let assets = tempfile::tempdir().unwrap();
        let (worker, _) = worker(&system, tracker, vec![character("Hero")], assets.path());

        worker.run_cycle();

        let resets = system
            .commands()
            .iter()
            .filter(|c| *c == "/reset")
            .count();
        assert_eq!(resets, 1);
    }

    #[test]
    fn below_reset_level_sends_nothing() {
        let (system, tracker) = idle_stub();
        system.add_window(1, title("Hero", 399, 5), WindowRect::default());
        let assets = tempfile::tempdir().unwrap();
        let (worker, _) = worker(&system, tracker, vec![character("Hero")], assets.path());

        worker.run_cycle();

        assert!(system.commands().is_empty());
    }

    #[test]
    fn invalid_allocation_aborts_before_reset_command() {
        let (system, tracker) = idle_stub();
        // resets = 0 gives zero total points, far below the 2000 allocated.
        system.add_window(1, title("Hero", 400, 0), WindowRect::default());
        let assets = tempfile::tempdir().unwrap();
        let (worker, _) = worker(&system, tracker, vec![character("Hero")], assets.path());

        worker.run_cycle();

        assert!(system.commands().is_empty());
    }

    #[test]
    fn missing_window_publishes_status_and_skips() {
        let (system, tracker) = idle_stub();
        let assets = tempfile::tempdir().unwrap();
        let (worker, state) = worker(&system, tracker, vec![character("Hero")], assets.path());

        worker.run_cycle();
        assert!(system.commands().is_empty());

        // The sink consumer runs on its own thread; poll for the status.
        for _ in 0..50 {
            if state.window_status().get("Hero") == Some(&false) {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("window status for Hero never arrived");
    }

    #[test]
    fn no_departure_log_without_a_rejoin_attempt() {
        let (system, tracker) = idle_stub();
        system.add_window(1, title("Hero", 400, 5), WindowRect::default());
        // Empty assets dir: the map detector degrades to negative, so the
        // character never appears to be on the leveling map and no rejoin
        // slot is ever clicked.
        let assets = tempfile::tempdir().unwrap();
        let (worker, state) = worker(&system, tracker, vec![character("Hero")], assets.path());

        worker.run_cycle();
        worker.sink.info("cycle checked");

        for _ in 0..50 {
            if state.logs(100).iter().any(|e| e.message == "cycle checked") {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let logs = state.logs(100);
        assert!(logs.iter().any(|e| e.message == "cycle checked"));
        assert!(
            !logs
                .iter()
                .any(|e| e.message.contains("left the leveling map")),
            "departure was announced although no rejoin ran"
        );
    }

    #[test]
    fn cancelled_worker_does_nothing() {
        let (system, tracker) = idle_stub();
        system.add_window(1, title("Hero", 400, 5), WindowRect::default());
        let assets = tempfile::tempdir().unwrap();
        let (worker, _) = worker(&system, tracker, vec![character("Hero")], assets.path());
        worker.cancel.cancel();

        worker.run_cycle();

        assert!(system.actions().is_empty());
    }

    #[test]
    fn unparsable_title_is_skipped_silently() {
        let (system, tracker) = idle_stub();
        system.add_window(1, format!("{}Hero] broken title", TITLE_PREFIX), WindowRect::default());
        let assets = tempfile::tempdir().unwrap();
        let (worker, _) = worker(&system, tracker, vec![character("Hero")], assets.path());

        worker.run_cycle();

        assert!(system.commands().is_empty());
    }

    #[test]
    fn controller_start_is_single_run() {
        let (system, tracker) = idle_stub();
        let assets = tempfile::tempdir().unwrap();
        let state = RuntimeState::new();
        let controller = BotController::new(
            Arc::clone(&system) as Arc<dyn WindowSystem>,
            tracker,
            state.attach(),
            fast_settings(),
            assets.path(),
        );
        controller.start(Vec::new());
        assert!(controller.is_running());
        // A second start must not spawn a second worker.
        controller.start(Vec::new());
        controller.stop();
        assert!(!controller.is_running());
    }
}
