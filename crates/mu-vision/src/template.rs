use image::RgbaImage;
use std::path::Path;
use tracing::{debug, warn};

use crate::matcher::TemplateMatcher;

/// Resize factors tried for every template, tolerating minor rendering-scale
/// differences between the reference screenshots and the live client.
pub const SCALE_LADDER: [f64; 5] = [0.90, 0.95, 1.00, 1.05, 1.10];

/// Scales that would shrink a template below this dimension are skipped;
/// such slivers match everything.
pub const MIN_SCALED_DIM: u32 = 6;

/// Gradient magnitude above which a pixel counts as an edge.
const EDGE_THRESHOLD: i32 = 60;

/// A multi-scale match: location within the searched region, the scale the
/// template was resized to, and the correlation score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledMatch {
    pub x: u32,
    pub y: u32,
    pub scale: f64,
    pub score: f64,
}

/// Load a reference template from the assets directory.
///
/// A missing or unreadable file degrades the owning detector to
/// always-negative instead of failing the process, so this logs and returns
/// `None` rather than erroring.
pub fn load_template(assets_dir: &Path, file: &str) -> Option<RgbaImage> {
    let path = assets_dir.join(file);
    match image::open(&path) {
        Ok(img) => {
            let img = img.to_rgba8();
            debug!(
                "Loaded template {} ({}x{})",
                path.display(),
                img.width(),
                img.height()
            );
            Some(img)
        }
        Err(e) => {
            warn!(
                "Failed to load template {}: {}. Detector degraded to negative.",
                path.display(),
                e
            );
            None
        }
    }
}

/// Match `template` against `region` across a scale ladder and return the
/// strongest result. Ties go to the earliest scale in the ladder. `None`
/// when every scale was skipped or the region is smaller than the template
/// at every attempted scale.
pub fn match_best_scale(
    matcher: &dyn TemplateMatcher,
    region: &RgbaImage,
    template: &RgbaImage,
    scales: &[f64],
) -> Option<ScaledMatch> {
    let mut best: Option<ScaledMatch> = None;
    for &scale in scales {
        let w = (template.width() as f64 * scale) as u32;
        let h = (template.height() as f64 * scale) as u32;
        if w < MIN_SCALED_DIM || h < MIN_SCALED_DIM {
            continue;
        }
        let scaled = if (w, h) == template.dimensions() {
            template.clone()
        } else {
            image::imageops::resize(template, w, h, image::imageops::FilterType::Triangle)
        };
        let Some(m) = matcher.find_best(region, &scaled) else {
            continue;
        };
        if best.map_or(true, |b| m.score > b.score) {
            best = Some(ScaledMatch {
                x: m.x,
                y: m.y,
                scale,
                score: m.score,
            });
        }
    }
    best
}

/// Single-scale match score, `-1.0` when no alignment is possible.
pub fn match_score(matcher: &dyn TemplateMatcher, region: &RgbaImage, template: &RgbaImage) -> f64 {
    matcher
        .find_best(region, template)
        .map(|m| m.score)
        .unwrap_or(-1.0)
}

/// Illumination-invariant evidence channel: grayscale the image and keep
/// only strong gradients as white-on-black edges.
pub fn edge_map(image: &RgbaImage) -> RgbaImage {
    let gray = image::imageops::grayscale(image);
    let (w, h) = gray.dimensions();
    RgbaImage::from_fn(w, h, |x, y| {
        let center = gray.get_pixel(x, y)[0] as i32;
        let right = if x + 1 < w {
            gray.get_pixel(x + 1, y)[0] as i32
        } else {
            center
        };
        let below = if y + 1 < h {
            gray.get_pixel(x, y + 1)[0] as i32
        } else {
            center
        };
        let magnitude = (center - right).abs() + (center - below).abs();
        let v = if magnitude >= EDGE_THRESHOLD { 255 } else { 0 };
        image::Rgba([v, v, v, 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{NccMatcher, RawMatch};

    fn textured(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            let v = (x.wrapping_mul(17).wrapping_add(y.wrapping_mul(43)) % 241) as u8;
            image::Rgba([v, 255 - v, v / 2, 255])
        })
    }

    #[test]
    fn tiny_template_skips_every_scale() {
        // 5px template: even the 1.10 scale stays below the 6px floor.
        let matcher = NccMatcher::new();
        let region = textured(50, 50);
        let template = textured(5, 5);
        assert!(match_best_scale(&matcher, &region, &template, &SCALE_LADDER).is_none());
    }

    #[test]
    fn empty_ladder_is_none() {
        let matcher = NccMatcher::new();
        let region = textured(50, 50);
        let template = textured(20, 20);
        assert!(match_best_scale(&matcher, &region, &template, &[]).is_none());
    }

    #[test]
    fn region_smaller_than_all_scales_is_none() {
        let matcher = NccMatcher::new();
        let region = textured(10, 10);
        let template = textured(20, 20);
        assert!(match_best_scale(&matcher, &region, &template, &SCALE_LADDER).is_none());
    }

    #[test]
    fn exact_embedding_prefers_unit_scale() {
        let matcher = NccMatcher::new();
        let template = textured(16, 12);
        let mut region = RgbaImage::from_pixel(60, 40, image::Rgba([0, 0, 0, 255]));
        image::imageops::overlay(&mut region, &template, 20, 10);
        let m = match_best_scale(&matcher, &region, &template, &SCALE_LADDER).unwrap();
        assert_eq!(m.scale, 1.0);
        assert_eq!((m.x, m.y), (20, 10));
        assert!(m.score > 0.99);
    }

    #[test]
    fn ties_go_to_earliest_scale() {
        // A matcher that reports the same score for every scale.
        struct Constant;
        impl TemplateMatcher for Constant {
            fn find_best(&self, _: &RgbaImage, _: &RgbaImage) -> Option<RawMatch> {
                Some(RawMatch {
                    x: 0,
                    y: 0,
                    score: 0.5,
                })
            }
        }
        let region = textured(50, 50);
        let template = textured(20, 20);
        let m = match_best_scale(&Constant, &region, &template, &SCALE_LADDER).unwrap();
        assert_eq!(m.scale, SCALE_LADDER[0]);
    }

    #[test]
    fn edge_map_marks_sharp_boundary() {
        // Left half dark, right half bright: a vertical edge at the seam.
        let image = RgbaImage::from_fn(20, 10, |x, _| {
            if x < 10 {
                image::Rgba([10, 10, 10, 255])
            } else {
                image::Rgba([240, 240, 240, 255])
            }
        });
        let edges = edge_map(&image);
        assert_eq!(edges.get_pixel(9, 5)[0], 255);
        assert_eq!(edges.get_pixel(3, 5)[0], 0);
        assert_eq!(edges.get_pixel(15, 5)[0], 0);
    }

    #[test]
    fn missing_template_file_is_none() {
        assert!(load_template(Path::new("/nonexistent"), "nope.png").is_none());
    }
}
