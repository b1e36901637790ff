mod cancel;
mod idle;
pub mod stub;
mod tracker;

pub use cancel::CancelToken;
pub use idle::IdleGate;
pub use tracker::BotInputTracker;

use anyhow::Result;
use image::RgbaImage;

/// Native window identifier (HWND on Windows, CGWindowID on macOS).
pub type WindowId = u64;

/// Screen rectangle of a window, in device pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WindowRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// Snapshot of a native window. Titles and rectangles mutate externally, so
/// callers re-fetch these per poll rather than caching across cycles.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub id: WindowId,
    pub title: String,
    pub rect: WindowRect,
}

/// Keys the bot injects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Ctrl,
}

/// Port over the native windowing system: enumeration, capture, and input
/// injection. Platform backends live outside this crate; the bot core only
/// ever talks to this trait.
///
/// Implementations must call [`BotInputTracker::mark`] on every injected
/// input so the idle gate can tell the bot's own activity apart from the
/// human operator's.
pub trait WindowSystem: Send + Sync {
    /// All top-level windows whose title starts with `title_prefix`.
    fn find_windows(&self, title_prefix: &str) -> Vec<WindowInfo>;

    /// Current title of a window, or `None` if it no longer exists.
    fn window_title(&self, id: WindowId) -> Option<String>;

    fn foreground_window(&self) -> Option<WindowInfo>;

    /// Bring the window to the foreground and park the cursor over it.
    fn focus(&self, window: &WindowInfo);

    /// Capture the full window rectangle.
    fn capture_window(&self, window: &WindowInfo) -> Result<RgbaImage>;

    /// Capture only the client area (window minus borders and title bar).
    fn capture_client(&self, window: &WindowInfo) -> Result<RgbaImage>;

    /// Screen coordinates of the client area's top-left corner.
    fn client_origin(&self, window: &WindowInfo) -> (i32, i32);

    fn send_key(&self, key: Key);

    fn send_hotkey(&self, modifier: Modifier, key: Key);

    /// Type a chat command: Enter to open chat, the text, Enter to submit.
    fn send_chat_command(&self, command: &str);

    /// Left-click at an absolute screen coordinate.
    fn click_at(&self, x: i32, y: i32);

    /// Milliseconds since the last human input anywhere on the system.
    fn user_idle_millis(&self) -> u64;

    fn cursor_pos(&self) -> Option<(i32, i32)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_geometry() {
        let rect = WindowRect {
            left: 100,
            top: 50,
            right: 500,
            bottom: 350,
        };
        assert_eq!(rect.width(), 400);
        assert_eq!(rect.height(), 300);
        assert_eq!(rect.center(), (300, 200));
        assert!(rect.contains(100, 50));
        assert!(rect.contains(500, 350));
        assert!(!rect.contains(501, 200));
    }
}
