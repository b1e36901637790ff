//! Scripted in-memory backend for the window-system port.
//!
//! Used by tests and by `mureset --stub` dry runs: windows, titles, and
//! frames are scripted up front, every injected input is recorded, and the
//! human-idle clock is settable. Titles and frames are queues so a test can
//! script a window that changes over time (each read advances the queue
//! until one value remains).

use anyhow::Result;
use image::RgbaImage;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::{
    BotInputTracker, Key, Modifier, WindowId, WindowInfo, WindowRect, WindowSystem,
};

/// Size of the synthetic frame returned when no frame was scripted.
const DEFAULT_FRAME: (u32, u32) = (800, 600);

/// One recorded input injection.
#[derive(Debug, Clone, PartialEq)]
pub enum StubAction {
    Focus(WindowId),
    Key(Key),
    Hotkey(Modifier, Key),
    Command(String),
    Click(i32, i32),
}

#[derive(Default)]
struct StubInner {
    windows: Vec<(WindowId, WindowRect)>,
    titles: HashMap<WindowId, VecDeque<String>>,
    frames: HashMap<WindowId, VecDeque<RgbaImage>>,
    idle_millis: u64,
    cursor: Option<(i32, i32)>,
    foreground: Option<WindowId>,
    actions: Vec<StubAction>,
}

pub struct StubWindowSystem {
    tracker: Arc<BotInputTracker>,
    inner: Mutex<StubInner>,
}

impl StubWindowSystem {
    pub fn new(tracker: Arc<BotInputTracker>) -> Self {
        Self {
            tracker,
            inner: Mutex::new(StubInner::default()),
        }
    }

    pub fn add_window(&self, id: WindowId, title: impl Into<String>, rect: WindowRect) {
        let mut inner = self.inner.lock().unwrap();
        inner.windows.push((id, rect));
        inner
            .titles
            .entry(id)
            .or_default()
            .push_back(title.into());
    }

    /// Queue a title change; reads advance through queued titles and then
    /// stick on the last one.
    pub fn push_title(&self, id: WindowId, title: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .titles
            .entry(id)
            .or_default()
            .push_back(title.into());
    }

    /// Replace all scripted titles for a window with a single current one.
    pub fn set_title(&self, id: WindowId, title: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        let queue = inner.titles.entry(id).or_default();
        queue.clear();
        queue.push_back(title.into());
    }

    /// Queue a frame; captures advance through queued frames and then stick
    /// on the last one.
    pub fn push_frame(&self, id: WindowId, frame: RgbaImage) {
        self.inner
            .lock()
            .unwrap()
            .frames
            .entry(id)
            .or_default()
            .push_back(frame);
    }

    pub fn set_idle_millis(&self, millis: u64) {
        self.inner.lock().unwrap().idle_millis = millis;
    }

    pub fn set_cursor(&self, pos: Option<(i32, i32)>) {
        self.inner.lock().unwrap().cursor = pos;
    }

    pub fn actions(&self) -> Vec<StubAction> {
        self.inner.lock().unwrap().actions.clone()
    }

    /// Chat commands sent so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                StubAction::Command(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<(i32, i32)> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                StubAction::Click(x, y) => Some((x, y)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_actions(&self) {
        self.inner.lock().unwrap().actions.clear();
    }

    fn record(&self, action: StubAction) {
        self.inner.lock().unwrap().actions.push(action);
        self.tracker.mark();
    }

    fn current_title(inner: &mut StubInner, id: WindowId) -> Option<String> {
        let queue = inner.titles.get_mut(&id)?;
        match queue.len() {
            0 => None,
            1 => queue.front().cloned(),
            _ => queue.pop_front(),
        }
    }
}

impl WindowSystem for StubWindowSystem {
    fn find_windows(&self, title_prefix: &str) -> Vec<WindowInfo> {
        let inner = self.inner.lock().unwrap();
        inner
            .windows
            .iter()
            .filter_map(|(id, rect)| {
                let title = inner.titles.get(id)?.front()?.clone();
                title.starts_with(title_prefix).then(|| WindowInfo {
                    id: *id,
                    title,
                    rect: *rect,
                })
            })
            .collect()
    }

    fn window_title(&self, id: WindowId) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        Self::current_title(&mut inner, id)
    }

    fn foreground_window(&self) -> Option<WindowInfo> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.foreground?;
        let rect = inner
            .windows
            .iter()
            .find(|(wid, _)| *wid == id)
            .map(|(_, r)| *r)?;
        let title = Self::current_title(&mut inner, id)?;
        Some(WindowInfo { id, title, rect })
    }

    fn focus(&self, window: &WindowInfo) {
        self.inner.lock().unwrap().foreground = Some(window.id);
        self.record(StubAction::Focus(window.id));
    }

    fn capture_window(&self, window: &WindowInfo) -> Result<RgbaImage> {
        let mut inner = self.inner.lock().unwrap();
        let frame = match inner.frames.get_mut(&window.id) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(frame.unwrap_or_else(|| RgbaImage::new(DEFAULT_FRAME.0, DEFAULT_FRAME.1)))
    }

    fn capture_client(&self, window: &WindowInfo) -> Result<RgbaImage> {
        // The stub has no window chrome; client area equals the window.
        self.capture_window(window)
    }

    fn client_origin(&self, window: &WindowInfo) -> (i32, i32) {
        (window.rect.left, window.rect.top)
    }

    fn send_key(&self, key: Key) {
        self.record(StubAction::Key(key));
    }

    fn send_hotkey(&self, modifier: Modifier, key: Key) {
        self.record(StubAction::Hotkey(modifier, key));
    }

    fn send_chat_command(&self, command: &str) {
        self.record(StubAction::Command(command.to_string()));
    }

    fn click_at(&self, x: i32, y: i32) {
        self.record(StubAction::Click(x, y));
    }

    fn user_idle_millis(&self) -> u64 {
        self.inner.lock().unwrap().idle_millis
    }

    fn cursor_pos(&self) -> Option<(i32, i32)> {
        self.inner.lock().unwrap().cursor
    }
}
