use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use mu_state::EventSink;
use mu_window::{CancelToken, WindowInfo, WindowSystem};

use crate::matcher::TemplateMatcher;
use crate::roi::Roi;
use crate::template::{edge_map, load_template, match_best_scale, SCALE_LADDER};

/// UI strip containing the hunt-mode play/pause control.
const HUNT_ROI: Roi = Roi::new(0.15, 0.0, 0.25, 0.12);

const HUNT_ACTIVE_TEMPLATE: &str = "pause_button_template.png";
const HUNT_INACTIVE_TEMPLATE: &str = "play_button_template.png";
const SWITCH_TEMPLATE: &str = "switch_mode_template.png";

/// Thresholds for the dual-evidence activity decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActivityThresholds {
    pub color_active_min: f64,
    pub color_active_gap: f64,
    pub edge_active_min: f64,
    pub edge_active_gap: f64,
}

impl Default for ActivityThresholds {
    fn default() -> Self {
        Self {
            color_active_min: 0.70,
            color_active_gap: 0.02,
            edge_active_min: 0.30,
            edge_active_gap: 0.03,
        }
    }
}

/// Best multi-scale scores of the "active" and "inactive" templates on the
/// color crop and its edge map.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityScores {
    pub color_active: f64,
    pub color_inactive: f64,
    pub edge_active: f64,
    pub edge_inactive: f64,
}

/// Dual-evidence decision: color evidence first, edges only as fallback.
///
/// Within each channel the signed gap between the two template scores must
/// clear a margin before the control is called active. Ambiguous evidence
/// never flips to active, and edges never override usable color evidence.
pub fn decide_active(scores: &ActivityScores, thresholds: &ActivityThresholds) -> bool {
    let color_max = scores.color_active.max(scores.color_inactive);
    if color_max >= thresholds.color_active_min {
        let gap = scores.color_active - scores.color_inactive;
        return gap >= thresholds.color_active_gap;
    }
    let edge_max = scores.edge_active.max(scores.edge_inactive);
    if edge_max >= thresholds.edge_active_min {
        let gap = scores.edge_active - scores.edge_inactive;
        return gap >= thresholds.edge_active_gap;
    }
    false
}

/// Detects whether the in-game auto-combat ("hunt mode") toggle is active,
/// from the appearance of its play/pause control.
pub struct HuntModeDetector {
    system: Arc<dyn WindowSystem>,
    matcher: Arc<dyn TemplateMatcher>,
    active_color: Option<RgbaImage>,
    inactive_color: Option<RgbaImage>,
    active_edges: Option<RgbaImage>,
    inactive_edges: Option<RgbaImage>,
    thresholds: ActivityThresholds,
}

impl HuntModeDetector {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        matcher: Arc<dyn TemplateMatcher>,
        assets_dir: &Path,
        thresholds: ActivityThresholds,
    ) -> Self {
        let active_color = load_template(assets_dir, HUNT_ACTIVE_TEMPLATE);
        let inactive_color = load_template(assets_dir, HUNT_INACTIVE_TEMPLATE);
        let active_edges = active_color.as_ref().map(edge_map);
        let inactive_edges = inactive_color.as_ref().map(edge_map);
        Self {
            system,
            matcher,
            active_color,
            inactive_color,
            active_edges,
            inactive_edges,
            thresholds,
        }
    }

    pub fn is_active(&self, window: &WindowInfo) -> bool {
        let (Some(active_color), Some(inactive_color)) =
            (&self.active_color, &self.inactive_color)
        else {
            return false;
        };
        let frame = match self.system.capture_client(window) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Hunt-mode capture failed: {}", e);
                return false;
            }
        };
        let crop = HUNT_ROI.crop(&frame);
        let edges = edge_map(&crop);

        let mut scores = ActivityScores {
            color_active: self.best_score(&crop, active_color),
            color_inactive: self.best_score(&crop, inactive_color),
            ..Default::default()
        };
        if let (Some(active_e), Some(inactive_e)) = (&self.active_edges, &self.inactive_edges) {
            scores.edge_active = self.best_score(&edges, active_e);
            scores.edge_inactive = self.best_score(&edges, inactive_e);
        } else {
            scores.edge_active = -1.0;
            scores.edge_inactive = -1.0;
        }

        let decision = decide_active(&scores, &self.thresholds);
        debug!(
            "Hunt mode: color {:.3}/{:.3} edges {:.3}/{:.3} -> {}",
            scores.color_active,
            scores.color_inactive,
            scores.edge_active,
            scores.edge_inactive,
            decision
        );
        decision
    }

    /// Poll [`is_active`](Self::is_active) until it reports true, the
    /// timeout elapses, or the run is cancelled. Logs Attention on timeout.
    pub fn wait_for_active(
        &self,
        window: &WindowInfo,
        timeout: Duration,
        poll: Duration,
        cancel: &CancelToken,
        sink: &EventSink,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                return false;
            }
            if self.is_active(window) {
                return true;
            }
            if !cancel.sleep(poll) {
                return false;
            }
        }
        sink.attention("Timeout waiting for hunt mode.");
        false
    }

    fn best_score(&self, region: &RgbaImage, template: &RgbaImage) -> f64 {
        match_best_scale(self.matcher.as_ref(), region, template, &SCALE_LADDER)
            .map(|m| m.score)
            .unwrap_or(-1.0)
    }
}

/// Detects whether the client's power-saving ("switch mode") overlay is
/// active anywhere on the frame.
pub struct SwitchModeDetector {
    system: Arc<dyn WindowSystem>,
    matcher: Arc<dyn TemplateMatcher>,
    template: Option<RgbaImage>,
    threshold: f64,
}

impl SwitchModeDetector {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        matcher: Arc<dyn TemplateMatcher>,
        assets_dir: &Path,
        threshold: f64,
    ) -> Self {
        Self {
            system,
            matcher,
            template: load_template(assets_dir, SWITCH_TEMPLATE),
            threshold,
        }
    }

    pub fn is_active(&self, window: &WindowInfo) -> bool {
        let Some(template) = &self.template else {
            return false;
        };
        let frame = match self.system.capture_client(window) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Switch-mode capture failed: {}", e);
                return false;
            }
        };
        match_best_scale(self.matcher.as_ref(), &frame, template, &SCALE_LADDER)
            .map(|m| m.score >= self.threshold)
            .unwrap_or(false)
    }
}
