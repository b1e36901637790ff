use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use mu_state::EventSink;
use mu_window::{WindowInfo, WindowSystem};

use crate::matcher::TemplateMatcher;
use crate::template::{load_template, match_best_scale, SCALE_LADDER};

const QUEST_TEMPLATE: &str = "quest_dialog_template.png";

/// Position of the close button inside the matched dialog, as ratios of the
/// matched size.
const CLOSE_OFFSET: (f64, f64) = (0.94, 0.5);

/// Closes the quest-completion dialog that pops over the screen after a
/// level-up, which would otherwise swallow the reset chat commands.
pub struct QuestDialogCloser {
    system: Arc<dyn WindowSystem>,
    matcher: Arc<dyn TemplateMatcher>,
    template: Option<RgbaImage>,
    threshold: f64,
}

impl QuestDialogCloser {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        matcher: Arc<dyn TemplateMatcher>,
        assets_dir: &Path,
        threshold: f64,
    ) -> Self {
        Self {
            system,
            matcher,
            template: load_template(assets_dir, QUEST_TEMPLATE),
            threshold,
        }
    }

    /// Close the dialog if it is open. True when a close click was issued.
    pub fn close_if_open(&self, window: &WindowInfo, sink: &EventSink) -> bool {
        let Some(template) = &self.template else {
            return false;
        };
        let frame = match self.system.capture_window(window) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Quest-dialog capture failed: {}", e);
                return false;
            }
        };
        let Some(m) = match_best_scale(self.matcher.as_ref(), &frame, template, &SCALE_LADDER)
        else {
            return false;
        };
        if m.score < self.threshold {
            debug!("Quest dialog score {:.3}, not open", m.score);
            return false;
        }
        let w = (template.width() as f64 * m.scale) as u32;
        let h = (template.height() as f64 * m.scale) as u32;
        let x = window.rect.left + m.x as i32 + (w as f64 * CLOSE_OFFSET.0) as i32;
        let y = window.rect.top + m.y as i32 + (h as f64 * CLOSE_OFFSET.1) as i32;
        self.system.click_at(x, y);
        sink.info("Closed quest dialog.");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::NccMatcher;
    use mu_state::RuntimeState;
    use mu_window::stub::StubWindowSystem;
    use mu_window::{BotInputTracker, WindowRect};

    fn dialog() -> RgbaImage {
        RgbaImage::from_fn(18, 12, |x, y| {
            let v = (x.wrapping_mul(23).wrapping_add(y.wrapping_mul(41)) % 227) as u8;
            image::Rgba([v, v / 2, 255 - v, 255])
        })
    }

    #[test]
    fn clicks_close_button_of_open_dialog() {
        let assets = tempfile::tempdir().unwrap();
        dialog().save(assets.path().join(QUEST_TEMPLATE)).unwrap();

        let system = Arc::new(StubWindowSystem::new(Arc::new(BotInputTracker::new())));
        let rect = WindowRect {
            left: 50,
            top: 30,
            right: 210,
            bottom: 150,
        };
        system.add_window(1, "mu", rect);
        let mut frame = RgbaImage::from_pixel(160, 120, image::Rgba([3, 3, 3, 255]));
        image::imageops::overlay(&mut frame, &dialog(), 40, 60);
        system.push_frame(1, frame);

        let closer = QuestDialogCloser::new(
            Arc::clone(&system) as Arc<dyn WindowSystem>,
            Arc::new(NccMatcher::new()),
            assets.path(),
            0.9,
        );
        let window = system.find_windows("mu").remove(0);
        let sink = RuntimeState::new().attach();

        assert!(closer.close_if_open(&window, &sink));
        // Close button sits at 94%/50% of the 18x12 dialog matched at (40, 60).
        assert_eq!(system.clicks(), vec![(50 + 40 + 16, 30 + 60 + 6)]);
    }

    #[test]
    fn stricter_threshold_rejects_the_same_match() {
        let assets = tempfile::tempdir().unwrap();
        dialog().save(assets.path().join(QUEST_TEMPLATE)).unwrap();

        let system = Arc::new(StubWindowSystem::new(Arc::new(BotInputTracker::new())));
        system.add_window(1, "mu", WindowRect::default());
        let mut frame = RgbaImage::from_pixel(160, 120, image::Rgba([3, 3, 3, 255]));
        image::imageops::overlay(&mut frame, &dialog(), 40, 60);
        system.push_frame(1, frame);

        // An unreachable threshold must turn the same frame into a no-op.
        let closer = QuestDialogCloser::new(
            Arc::clone(&system) as Arc<dyn WindowSystem>,
            Arc::new(NccMatcher::new()),
            assets.path(),
            1.5,
        );
        let window = system.find_windows("mu").remove(0);
        let sink = RuntimeState::new().attach();

        assert!(!closer.close_if_open(&window, &sink));
        assert!(system.clicks().is_empty());
    }

    #[test]
    fn no_dialog_means_no_click() {
        let assets = tempfile::tempdir().unwrap();
        dialog().save(assets.path().join(QUEST_TEMPLATE)).unwrap();

        let system = Arc::new(StubWindowSystem::new(Arc::new(BotInputTracker::new())));
        system.add_window(1, "mu", WindowRect::default());
        // Default blank frame: nothing matches.
        let closer = QuestDialogCloser::new(
            Arc::clone(&system) as Arc<dyn WindowSystem>,
            Arc::new(NccMatcher::new()),
            assets.path(),
            0.9,
        );
        let window = system.find_windows("mu").remove(0);
        let sink = RuntimeState::new().attach();

        assert!(!closer.close_if_open(&window, &sink));
        assert!(system.clicks().is_empty());
    }

    #[test]
    fn missing_template_is_silent_noop() {
        let assets = tempfile::tempdir().unwrap();
        let system = Arc::new(StubWindowSystem::new(Arc::new(BotInputTracker::new())));
        system.add_window(1, "mu", WindowRect::default());
        let closer = QuestDialogCloser::new(
            Arc::clone(&system) as Arc<dyn WindowSystem>,
            Arc::new(NccMatcher::new()),
            assets.path(),
            0.9,
        );
        let window = system.find_windows("mu").remove(0);
        let sink = RuntimeState::new().attach();
        assert!(!closer.close_if_open(&window, &sink));
        assert!(system.actions().is_empty());
    }
}
