use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use mu_data::{AnchorSide, WarpMap};
use mu_state::EventSink;
use mu_window::{CancelToken, Key, WindowInfo, WindowSystem};

use crate::matcher::TemplateMatcher;
use crate::roi::{crop_rect, PixelRect, Roi};
use crate::template::{load_template, match_best_scale, ScaledMatch, SCALE_LADDER};

/// Key that toggles the in-game menu containing the warp list.
const MENU_KEY: Key = Key::Char('m');

/// Portion of the client area covered by the open warp list.
const LIST_ROI: Roi = Roi::new(0.02, 0.12, 0.50, 0.60);

/// Vertical padding between adjacent warp-list rows.
const ROW_GAP_PX: u32 = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WarpConfig {
    pub target_threshold: f64,
    /// Relaxed threshold for the neighbouring-entry anchor match.
    pub anchor_threshold: f64,
    pub max_attempts: u32,
    pub menu_settle_ms: u64,
    pub warp_wait_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            target_threshold: 0.92,
            anchor_threshold: 0.90,
            max_attempts: 3,
            menu_settle_ms: 500,
            warp_wait_ms: 5000,
            retry_delay_ms: 400,
        }
    }
}

/// Opens the warp menu, locates a destination row in the warp list, and
/// clicks it.
///
/// Adjacent rows differ only by a single digit, so a direct match is
/// cross-checked against the neighbouring entry: when the anchor is found,
/// the target is re-matched inside a narrow band on the expected side of it
/// and that refined hit wins over the whole-list one.
pub struct MapWarpInteractor {
    system: Arc<dyn WindowSystem>,
    matcher: Arc<dyn TemplateMatcher>,
    templates: HashMap<WarpMap, RgbaImage>,
    config: WarpConfig,
}

impl MapWarpInteractor {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        matcher: Arc<dyn TemplateMatcher>,
        assets_dir: &Path,
        config: WarpConfig,
    ) -> Self {
        let mut templates = HashMap::new();
        for map in WarpMap::ALL {
            if let Some(img) = load_template(assets_dir, map.template_file()) {
                templates.insert(map, img);
            }
        }
        Self {
            system,
            matcher,
            templates,
            config,
        }
    }

    /// Warp the focused character to `map`. Returns true once the warp click
    /// was issued and the travel wait has elapsed.
    pub fn warp_to(
        &self,
        window: &WindowInfo,
        map: WarpMap,
        cancel: &CancelToken,
        sink: &EventSink,
    ) -> bool {
        if !self.templates.contains_key(&map) {
            sink.attention(format!("No warp template for {}; skipping warp.", map.label()));
            return false;
        }
        for attempt in 1..=self.config.max_attempts {
            if cancel.is_cancelled() {
                return false;
            }
            self.system.focus(window);
            self.system.send_key(MENU_KEY);
            if !cancel.sleep(Duration::from_millis(self.config.menu_settle_ms)) {
                return false;
            }

            let frame = match self.system.capture_client(window) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Warp-list capture failed: {}", e);
                    continue;
                }
            };
            let list = LIST_ROI.resolve(frame.width(), frame.height());
            let crop = crop_rect(&frame, &list);

            if let Some((cx, cy)) = self.find_warp_click(&crop, map) {
                let (ox, oy) = self.system.client_origin(window);
                self.system
                    .click_at(ox + (list.x + cx) as i32, oy + (list.y + cy) as i32);
                sink.info(format!("Warping to {}.", map.label()));
                cancel.sleep(Duration::from_millis(self.config.warp_wait_ms));
                return true;
            }

            debug!(
                "Warp entry {} not found (attempt {}/{})",
                map.label(),
                attempt,
                self.config.max_attempts
            );
            if attempt < self.config.max_attempts
                && !cancel.sleep(Duration::from_millis(self.config.retry_delay_ms))
            {
                return false;
            }
        }
        sink.attention(format!(
            "Could not locate {} in the warp list.",
            map.label()
        ));
        false
    }

    /// Click point for `map` within the warp-list crop, or `None` when no
    /// match clears the threshold.
    fn find_warp_click(&self, crop: &RgbaImage, map: WarpMap) -> Option<(u32, u32)> {
        let target = self.templates.get(&map)?;
        let base = match_best_scale(self.matcher.as_ref(), crop, target, &SCALE_LADDER)
            .filter(|m| m.score >= self.config.target_threshold);

        let refined = self
            .templates
            .get(&map.anchor())
            .and_then(|anchor| {
                match_best_scale(self.matcher.as_ref(), crop, anchor, &SCALE_LADDER)
                    .filter(|m| m.score >= self.config.anchor_threshold)
                    .map(|m| (m, scaled_dims(anchor, &m)))
            })
            .and_then(|(anchor_match, (aw, ah))| {
                let anchor_rect = PixelRect {
                    x: anchor_match.x,
                    y: anchor_match.y,
                    w: aw,
                    h: ah,
                };
                let band = refined_band(
                    crop.width(),
                    crop.height(),
                    &anchor_rect,
                    target.height(),
                    map.anchor_side(),
                    ROW_GAP_PX,
                )?;
                let sub = crop_rect(crop, &band);
                let m = match_best_scale(self.matcher.as_ref(), &sub, target, &SCALE_LADDER)
                    .filter(|m| m.score >= self.config.target_threshold)?;
                let (tw, th) = scaled_dims(target, &m);
                Some((band.x + m.x + tw / 2, band.y + m.y + th / 2))
            });
        if refined.is_some() {
            return refined;
        }

        base.map(|m| {
            let (tw, th) = scaled_dims(target, &m);
            (m.x + tw / 2, m.y + th / 2)
        })
    }
}

fn scaled_dims(template: &RgbaImage, m: &ScaledMatch) -> (u32, u32) {
    (
        (template.width() as f64 * m.scale) as u32,
        (template.height() as f64 * m.scale) as u32,
    )
}

/// Band of the warp list where the target row must sit, given where its
/// anchor row matched. Two target heights tall, clamped to the list, `None`
/// when the anchor leaves no room on the expected side.
fn refined_band(
    crop_w: u32,
    crop_h: u32,
    anchor: &PixelRect,
    target_h: u32,
    side: AnchorSide,
    gap: u32,
) -> Option<PixelRect> {
    match side {
        // Target renders below its anchor.
        AnchorSide::BelowAnchor => {
            let top = anchor.y + anchor.h + gap;
            if top >= crop_h {
                return None;
            }
            let h = (2 * target_h).min(crop_h - top);
            (h > 0).then_some(PixelRect {
                x: 0,
                y: top,
                w: crop_w,
                h,
            })
        }
        // Target renders above its anchor.
        AnchorSide::AboveAnchor => {
            let bottom = anchor.y.saturating_sub(gap);
            let h = (2 * target_h).min(bottom);
            (h > 0).then_some(PixelRect {
                x: 0,
                y: bottom - h,
                w: crop_w,
                h,
            })
        }
    }
}
