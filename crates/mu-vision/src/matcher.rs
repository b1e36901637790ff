use image::RgbaImage;

/// Best-aligned position of a template inside a region, with a normalized
/// correlation score in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMatch {
    pub x: u32,
    pub y: u32,
    pub score: f64,
}

/// Port over the raw template-matching primitive.
///
/// `find_best` slides `template` across `region` and returns the location of
/// the strongest alignment. Returns `None` when the region is smaller than
/// the template in either dimension.
pub trait TemplateMatcher: Send + Sync {
    fn find_best(&self, region: &RgbaImage, template: &RgbaImage) -> Option<RawMatch>;
}

/// Default matcher: zero-mean normalized cross-correlation over the RGB
/// channels, evaluated at every alignment offset.
#[derive(Debug, Default)]
pub struct NccMatcher;

impl NccMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateMatcher for NccMatcher {
    fn find_best(&self, region: &RgbaImage, template: &RgbaImage) -> Option<RawMatch> {
        let (rw, rh) = region.dimensions();
        let (tw, th) = template.dimensions();
        if tw == 0 || th == 0 || rw < tw || rh < th {
            return None;
        }

        let tmpl = rgb_samples(template, 0, 0, tw, th);
        let (t_mean, t_std) = stats(&tmpl);

        let mut best: Option<RawMatch> = None;
        for y in 0..=(rh - th) {
            for x in 0..=(rw - tw) {
                let window = rgb_samples(region, x, y, tw, th);
                let (w_mean, w_std) = stats(&window);
                let score = ncc(&window, w_mean, w_std, &tmpl, t_mean, t_std);
                if best.map_or(true, |b| score > b.score) {
                    best = Some(RawMatch { x, y, score });
                }
            }
        }
        best
    }
}

/// Flatten an RGB window into f64 samples (alpha ignored).
fn rgb_samples(image: &RgbaImage, x0: u32, y0: u32, w: u32, h: u32) -> Vec<f64> {
    let mut samples = Vec::with_capacity((w * h * 3) as usize);
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            let px = image.get_pixel(x, y);
            samples.push(px[0] as f64);
            samples.push(px[1] as f64);
            samples.push(px[2] as f64);
        }
    }
    samples
}

fn stats(samples: &[f64]) -> (f64, f64) {
    let n = samples.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Zero-mean NCC between two equal-length sample windows.
fn ncc(a: &[f64], a_mean: f64, a_std: f64, b: &[f64], b_mean: f64, b_std: f64) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let denom = a_std * b_std;
    if denom < 1e-10 {
        // Flat window or flat template carries no correlation signal.
        return 0.0;
    }
    let n = a.len() as f64;
    let cross: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(av, bv)| (av - a_mean) * (bv - b_mean))
        .sum();
    cross / (n * denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            let v = (x.wrapping_mul(31).wrapping_add(y.wrapping_mul(57)) % 251) as u8;
            image::Rgba([v, v.wrapping_add(40), v.wrapping_mul(3), 255])
        })
    }

    #[test]
    fn finds_exact_embedding() {
        let template = textured(12, 8);
        let mut region = RgbaImage::from_pixel(60, 40, image::Rgba([10, 10, 10, 255]));
        image::imageops::overlay(&mut region, &template, 23, 17);

        let m = NccMatcher::new().find_best(&region, &template).unwrap();
        assert_eq!((m.x, m.y), (23, 17));
        assert!(m.score > 0.99, "score {}", m.score);
    }

    #[test]
    fn region_smaller_than_template_is_none() {
        let template = textured(20, 20);
        let region = textured(10, 10);
        assert!(NccMatcher::new().find_best(&region, &template).is_none());
    }

    #[test]
    fn flat_region_scores_zero() {
        let template = textured(8, 8);
        let region = RgbaImage::from_pixel(30, 30, image::Rgba([128, 128, 128, 255]));
        let m = NccMatcher::new().find_best(&region, &template).unwrap();
        assert_eq!(m.score, 0.0);
    }

    #[test]
    fn unrelated_content_scores_low() {
        let template = textured(10, 10);
        let region = RgbaImage::from_fn(40, 40, |x, y| {
            image::Rgba([(y % 256) as u8, (x % 256) as u8, 200, 255])
        });
        let m = NccMatcher::new().find_best(&region, &template).unwrap();
        assert!(m.score < 0.9, "score {}", m.score);
    }
}
