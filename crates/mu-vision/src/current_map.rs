use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use mu_window::{WindowInfo, WindowSystem};

use crate::matcher::TemplateMatcher;
use crate::roi::Roi;
use crate::template::{load_template, match_score};

/// Corner of the frame where the client renders the current map name.
const MAP_ROI: Roi = Roi::new(0.0, 0.0, 0.35, 0.12);

const MAP_TEMPLATE: &str = "current_map_elbeland.png";

/// Checks whether the character currently stands in the leveling map, from
/// the map-name label in the top-left corner of the frame.
pub struct CurrentMapDetector {
    system: Arc<dyn WindowSystem>,
    matcher: Arc<dyn TemplateMatcher>,
    template: Option<RgbaImage>,
    threshold: f64,
}

impl CurrentMapDetector {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        matcher: Arc<dyn TemplateMatcher>,
        assets_dir: &Path,
        threshold: f64,
    ) -> Self {
        Self {
            system,
            matcher,
            template: load_template(assets_dir, MAP_TEMPLATE),
            threshold,
        }
    }

    /// True when the map label matches. Capture failures and a missing
    /// template both degrade to false.
    pub fn is_on_map(&self, window: &WindowInfo) -> bool {
        let Some(template) = &self.template else {
            return false;
        };
        let frame = match self.system.capture_client(window) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Map-label capture failed: {}", e);
                return false;
            }
        };
        let crop = MAP_ROI.crop(&frame);
        let score = match_score(self.matcher.as_ref(), &crop, template);
        debug!("Map label score {:.3}", score);
        score >= self.threshold
    }
}
