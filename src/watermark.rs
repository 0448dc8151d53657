use crate::{
    error::{CardError, CardResult},
    resource::decode_image,
    surface::{Rgba8, Surface, encode_jpeg},
};

/// Fixed parameters of the tiled warning overlay.
///
/// A single centered watermark is trivially croppable; the full-surface
/// rotated tiling stays legible at any viewport and survives simple cropping.
#[derive(Clone, Debug)]
pub struct WatermarkSpec {
    pub text: &'static str,
    pub angle_rad: f64,
    pub stroke_alpha: f64,
    pub fill_alpha: f64,
    pub jpeg_quality: u8,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: "DO NOT USE",
            angle_rad: -std::f64::consts::FRAC_PI_6,
            stroke_alpha: 0.35,
            fill_alpha: 0.08,
            jpeg_quality: 92,
        }
    }
}

impl WatermarkSpec {
    /// Tile font size scales with the image width, floored at 24px.
    pub fn font_size(&self, image_width: u32) -> f64 {
        (0.08 * f64::from(image_width)).floor().max(24.0)
    }

    /// Horizontal distance between tile centers.
    pub fn step_x(&self, font_size: f64) -> f64 {
        font_size * 7.0
    }

    /// Vertical distance between tile centers.
    pub fn step_y(&self, font_size: f64) -> f64 {
        font_size * 4.5
    }

    /// Outline width for the dashed stroke pass.
    pub fn line_width(&self, font_size: f64) -> f64 {
        (0.06 * font_size).floor().max(2.0)
    }

    fn alpha8(fraction: f64) -> u8 {
        (fraction.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

/// Overlay the tiled warning text on an encoded image and re-encode as JPEG.
///
/// The output has exactly the source's pixel dimensions; the source bytes are
/// never mutated. Fails with a decode error for non-raster input and an
/// encode error when the composited surface cannot be serialized. No partial
/// output is returned on failure.
#[tracing::instrument(skip_all, fields(len = bytes.len()))]
pub fn apply_watermark(bytes: &[u8]) -> CardResult<Vec<u8>> {
    apply_watermark_with(&WatermarkSpec::default(), bytes)
}

pub fn apply_watermark_with(spec: &WatermarkSpec, bytes: &[u8]) -> CardResult<Vec<u8>> {
    let source = decode_image(bytes)?;
    if source.width == 0 || source.height == 0 {
        return Err(CardError::encode("cannot watermark a zero-dimension image"));
    }

    let width = f64::from(source.width);
    let height = f64::from(source.height);

    let mut surface = Surface::new(source.width, source.height)?;
    surface.draw_image(&source, kurbo::Rect::new(0.0, 0.0, width, height))?;

    let font_size = spec.font_size(source.width);
    let step_x = spec.step_x(font_size);
    let step_y = spec.step_y(font_size);
    let line_width = spec.line_width(font_size);

    let shaped = surface.shape_text(spec.text, font_size as f32, 800.0)?;
    let text_w = shaped.width();
    let text_h = shaped.height();
    tracing::debug!(font_size, step_x, step_y, "tiling watermark");

    // Local frame centered on the image midpoint, rotated once; every tile is
    // placed in this frame.
    surface.set_transform(
        kurbo::Affine::translate((width / 2.0, height / 2.0))
            * kurbo::Affine::rotate(spec.angle_rad),
    );

    let stroke = Rgba8::opaque(255, 255, 255).with_alpha(WatermarkSpec::alpha8(spec.stroke_alpha));
    let fill = Rgba8::opaque(255, 255, 255).with_alpha(WatermarkSpec::alpha8(spec.fill_alpha));
    let dashes = [line_width * 1.2, line_width * 1.8];

    // Rotation exposes corners beyond the axis-aligned bounds, so the loops
    // overscan to double the naive range. Shrinking this breaks coverage.
    for_each_tile(width, height, step_x, step_y, |x, y| {
        let origin = kurbo::Point::new(x - text_w / 2.0, y - text_h / 2.0);
        surface.stroke_text(&shaped, origin, stroke, line_width, &dashes);
    });
    // Faint inner fill keeps the text readable over dark content where the
    // outline alone would vanish.
    for_each_tile(width, height, step_x, step_y, |x, y| {
        let origin = kurbo::Point::new(x - text_w / 2.0, y - text_h / 2.0);
        surface.fill_text(&shaped, origin, fill);
    });

    let (rgba, w, h) = surface.into_rgba8();
    encode_jpeg(&rgba, w, h, spec.jpeg_quality)
}

fn for_each_tile(
    width: f64,
    height: f64,
    step_x: f64,
    step_y: f64,
    mut draw: impl FnMut(f64, f64),
) {
    let mut y = -height;
    while y <= height {
        let mut x = -width;
        while x <= width {
            draw(x, y);
            x += step_x;
        }
        y += step_y;
    }
}

/// Tile centers in source-image coordinates, after the rotation is applied.
///
/// Exposed for coverage verification: every point of the unrotated
/// `[0,w] x [0,h]` rectangle must lie near some returned center.
pub fn tile_centers(spec: &WatermarkSpec, width: u32, height: u32) -> Vec<(f64, f64)> {
    let w = f64::from(width);
    let h = f64::from(height);
    let font_size = spec.font_size(width);
    let rotation =
        kurbo::Affine::translate((w / 2.0, h / 2.0)) * kurbo::Affine::rotate(spec.angle_rad);

    let mut centers = Vec::new();
    for_each_tile(w, h, spec.step_x(font_size), spec.step_y(font_size), |x, y| {
        let p = rotation * kurbo::Point::new(x, y);
        centers.push((p.x, p.y));
    });
    centers
}
