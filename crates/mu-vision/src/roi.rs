use image::RgbaImage;

/// Pixel-space rectangle produced by resolving a [`Roi`] against a concrete
/// image. Always non-empty and fully inside the image it was resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Region of interest expressed as ratios of the source image's dimensions.
///
/// Resolution clamps rather than errors: whatever the ratios, the resulting
/// rectangle has at least one pixel and never extends outside the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Roi {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn resolve(&self, width: u32, height: u32) -> PixelRect {
        let width = width.max(1);
        let height = height.max(1);
        let x = ((width as f64 * self.x) as i64).clamp(0, width as i64 - 1) as u32;
        let y = ((height as f64 * self.y) as i64).clamp(0, height as i64 - 1) as u32;
        let w = ((width as f64 * self.w) as i64).clamp(1, (width - x) as i64) as u32;
        let h = ((height as f64 * self.h) as i64).clamp(1, (height - y) as i64) as u32;
        PixelRect { x, y, w, h }
    }

    pub fn crop(&self, image: &RgbaImage) -> RgbaImage {
        let rect = self.resolve(image.width(), image.height());
        crop_rect(image, &rect)
    }
}

/// Crop an already-resolved rectangle out of an image. Bounds are re-clamped
/// so a rect resolved against a different-sized frame cannot read out of
/// range.
pub fn crop_rect(image: &RgbaImage, rect: &PixelRect) -> RgbaImage {
    let (w, h) = (image.width().max(1), image.height().max(1));
    let x = rect.x.min(w - 1);
    let y = rect.y.min(h - 1);
    let rw = rect.w.clamp(1, w - x);
    let rh = rect.h.clamp(1, h - y);
    if image.width() == 0 || image.height() == 0 {
        return RgbaImage::new(1, 1);
    }
    image::imageops::crop_imm(image, x, y, rw, rh).to_image()
}
