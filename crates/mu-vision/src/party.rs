use image::RgbaImage;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use mu_state::EventSink;
use mu_window::{CancelToken, WindowInfo, WindowSystem};

use crate::matcher::TemplateMatcher;
use crate::roi::Roi;
use crate::template::load_template;

/// Window-relative coordinates of the five party-member rows in the party
/// panel. Clicking a row sends that member a party request.
const PARTY_SLOT_POINTS: [(i32, i32); 5] = [
    (957, 158),
    (957, 218),
    (957, 278),
    (957, 338),
    (957, 398),
];

/// Center region where the party-request confirmation dialog appears.
const CONFIRM_ROI: Roi = Roi::new(0.35, 0.45, 0.30, 0.20);

/// Position of the OK button inside the matched dialog, as ratios of the
/// template's size.
const CONFIRM_CLICK_OFFSET: (f64, f64) = (0.36, 0.73);

const CONFIRM_TEMPLATE: &str = "ok_dialog_template.png";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PartyConfig {
    pub confirm_threshold: f64,
    pub max_attempts: u32,
    pub focus_settle_ms: u64,
    pub click_settle_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            confirm_threshold: 0.6,
            max_attempts: 3,
            focus_settle_ms: 300,
            click_settle_ms: 450,
            retry_delay_ms: 300,
        }
    }
}

/// Rejoins the character to its party by clicking party-panel rows until the
/// confirmation dialog appears and accepting it.
///
/// Which row belongs to the party leader varies between sessions, so rows are
/// tried in random order, never repeating one within a single rejoin.
pub struct PartyInteractor {
    system: Arc<dyn WindowSystem>,
    matcher: Arc<dyn TemplateMatcher>,
    confirm: Option<RgbaImage>,
    config: PartyConfig,
}

impl PartyInteractor {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        matcher: Arc<dyn TemplateMatcher>,
        assets_dir: &Path,
        config: PartyConfig,
    ) -> Self {
        Self {
            system,
            matcher,
            confirm: load_template(assets_dir, CONFIRM_TEMPLATE),
            config,
        }
    }

    /// True once a party request was confirmed.
    pub fn rejoin(&self, window: &WindowInfo, cancel: &CancelToken, sink: &EventSink) -> bool {
        let mut slots: Vec<(i32, i32)> = PARTY_SLOT_POINTS.to_vec();
        slots.shuffle(&mut rand::thread_rng());
        let attempts = (self.config.max_attempts as usize).min(slots.len());

        for (i, (sx, sy)) in slots.into_iter().take(attempts).enumerate() {
            if cancel.is_cancelled() {
                return false;
            }
            self.system.focus(window);
            if !cancel.sleep(Duration::from_millis(self.config.focus_settle_ms)) {
                return false;
            }
            self.system
                .click_at(window.rect.left + sx, window.rect.top + sy);
            if !cancel.sleep(Duration::from_millis(self.config.click_settle_ms)) {
                return false;
            }

            if self.accept_confirmation(window) {
                sink.info("Party request confirmed.");
                cancel.sleep(Duration::from_millis(self.config.click_settle_ms));
                return true;
            }

            debug!("Party slot ({}, {}) gave no dialog", sx, sy);
            if i + 1 < attempts
                && !cancel.sleep(Duration::from_millis(self.config.retry_delay_ms))
            {
                return false;
            }
        }
        sink.attention("Could not rejoin the party.");
        false
    }

    /// Look for the confirmation dialog and click its OK button.
    fn accept_confirmation(&self, window: &WindowInfo) -> bool {
        let Some(confirm) = &self.confirm else {
            return false;
        };
        let frame = match self.system.capture_window(window) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Party-dialog capture failed: {}", e);
                return false;
            }
        };
        let roi = CONFIRM_ROI.resolve(frame.width(), frame.height());
        let crop = crate::roi::crop_rect(&frame, &roi);
        let Some(m) = self.matcher.find_best(&crop, confirm) else {
            return false;
        };
        if m.score < self.config.confirm_threshold {
            return false;
        }
        let ok_x = (confirm.width() as f64 * CONFIRM_CLICK_OFFSET.0) as u32;
        let ok_y = (confirm.height() as f64 * CONFIRM_CLICK_OFFSET.1) as u32;
        self.system.click_at(
            window.rect.left + (roi.x + m.x + ok_x) as i32,
            window.rect.top + (roi.y + m.y + ok_y) as i32,
        );
        true
    }
}
