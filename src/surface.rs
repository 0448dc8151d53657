use std::collections::HashMap;

use vello_cpu::kurbo::Shape as _;

use crate::{
    error::{CardError, CardResult},
    resource::PreparedImage,
};

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

/// Shaped text ready for repeated drawing.
pub struct ShapedText {
    layout: parley::Layout<Rgba8>,
}

impl ShapedText {
    pub fn width(&self) -> f64 {
        f64::from(self.layout.full_width())
    }

    pub fn height(&self) -> f64 {
        f64::from(self.layout.height())
    }
}

struct TextShaper {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<Rgba8>,
}

impl TextShaper {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape a single-style run against the system `sans-serif` stack.
    fn shape(&mut self, text: &str, size_px: f32, weight: f32) -> CardResult<ShapedText> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(CardError::validation("text size_px must be finite and > 0"));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Borrowed("sans-serif")),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::new(weight),
        ));

        let mut layout: parley::Layout<Rgba8> = builder.build(text);
        layout.break_all_lines(None);

        Ok(ShapedText { layout })
    }
}

/// Addressable 2D pixel buffer with draw/fill/stroke/text operations and
/// byte-stream export.
///
/// Thin stateful wrapper over a `vello_cpu` render context: callers set a
/// transform, issue draw calls in local coordinates, and read the surface back
/// as straight-alpha RGBA8 once at the end.
pub struct Surface {
    width: u32,
    height: u32,
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
    transform: vello_cpu::kurbo::Affine,
    shaper: TextShaper,
    font_cache: HashMap<u64, vello_cpu::peniko::FontData>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> CardResult<Self> {
        if width == 0 || height == 0 {
            return Err(CardError::validation("surface dimensions must be > 0"));
        }
        let w: u16 = width
            .try_into()
            .map_err(|_| CardError::validation("surface width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| CardError::validation("surface height exceeds u16"))?;

        Ok(Self {
            width,
            height,
            ctx: vello_cpu::RenderContext::new(w, h),
            pixmap: vello_cpu::Pixmap::new(w, h),
            transform: vello_cpu::kurbo::Affine::IDENTITY,
            shaper: TextShaper::new(),
            font_cache: HashMap::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Set the transform applied to all subsequent draw calls.
    pub fn set_transform(&mut self, transform: kurbo::Affine) {
        self.transform = to_cpu_affine(transform);
    }

    pub fn reset_transform(&mut self) {
        self.transform = vello_cpu::kurbo::Affine::IDENTITY;
    }

    pub fn fill_rect(&mut self, rect: kurbo::Rect, color: Rgba8) {
        self.ctx.set_transform(self.transform);
        self.ctx.set_paint(to_cpu_color(color));
        self.ctx.fill_rect(&to_cpu_rect(rect));
    }

    pub fn fill_rounded_rect(&mut self, rect: kurbo::Rect, radius: f64, color: Rgba8) {
        self.ctx.set_transform(self.transform);
        self.ctx.set_paint(to_cpu_color(color));
        let rounded =
            vello_cpu::kurbo::RoundedRect::from_rect(to_cpu_rect(rect), radius).to_path(0.1);
        self.ctx.fill_path(&rounded);
    }

    pub fn stroke_rounded_rect(
        &mut self,
        rect: kurbo::Rect,
        radius: f64,
        line_width: f64,
        color: Rgba8,
    ) {
        self.ctx.set_transform(self.transform);
        self.ctx.set_paint(to_cpu_color(color));
        self.ctx
            .set_stroke(vello_cpu::kurbo::Stroke::new(line_width));
        let rounded =
            vello_cpu::kurbo::RoundedRect::from_rect(to_cpu_rect(rect), radius).to_path(0.1);
        self.ctx.stroke_path(&rounded);
    }

    /// Draw a prepared image scaled to fill `dest` exactly.
    pub fn draw_image(&mut self, image: &PreparedImage, dest: kurbo::Rect) -> CardResult<()> {
        let paint = image_paint(image)?;
        let sx = dest.width() / f64::from(image.width);
        let sy = dest.height() / f64::from(image.height);
        let local = vello_cpu::kurbo::Affine::translate((dest.x0, dest.y0))
            * vello_cpu::kurbo::Affine::scale_non_uniform(sx, sy);

        self.ctx.set_transform(self.transform * local);
        self.ctx.set_paint(paint);
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(image.width),
            f64::from(image.height),
        ));
        Ok(())
    }

    pub fn shape_text(&mut self, text: &str, size_px: f32, weight: f32) -> CardResult<ShapedText> {
        self.shaper.shape(text, size_px, weight)
    }

    /// Fill shaped text with its layout origin (top-left) at `origin`.
    pub fn fill_text(&mut self, text: &ShapedText, origin: kurbo::Point, color: Rgba8) {
        self.draw_text(text, origin, color, None);
    }

    /// Stroke shaped text outlines with an optional dash pattern.
    pub fn stroke_text(
        &mut self,
        text: &ShapedText,
        origin: kurbo::Point,
        color: Rgba8,
        line_width: f64,
        dashes: &[f64],
    ) {
        let mut stroke = vello_cpu::kurbo::Stroke::new(line_width);
        if !dashes.is_empty() {
            stroke = stroke.with_dashes(0.0, dashes.iter().copied());
        }
        self.draw_text(text, origin, color, Some(stroke));
    }

    fn draw_text(
        &mut self,
        text: &ShapedText,
        origin: kurbo::Point,
        color: Rgba8,
        stroke: Option<vello_cpu::kurbo::Stroke>,
    ) {
        self.ctx.set_transform(
            self.transform * vello_cpu::kurbo::Affine::translate((origin.x, origin.y)),
        );
        self.ctx.set_paint(to_cpu_color(color));
        let stroked = stroke.is_some();
        if let Some(stroke) = stroke {
            self.ctx.set_stroke(stroke);
        }

        for line in text.layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let font = font_data_for(&mut self.font_cache, run.run().font());
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                let builder = self.ctx.glyph_run(&font).font_size(run.run().font_size());
                if stroked {
                    builder.stroke_glyphs(glyphs);
                } else {
                    builder.fill_glyphs(glyphs);
                }
            }
        }
    }

    /// Flush all pending draws and read the surface back as straight-alpha
    /// RGBA8 bytes.
    pub fn into_rgba8(mut self) -> (Vec<u8>, u32, u32) {
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.pixmap);
        let mut data = self.pixmap.data_as_u8_slice().to_vec();
        unpremultiply_rgba8_in_place(&mut data);
        (data, self.width, self.height)
    }
}

fn to_cpu_affine(a: kurbo::Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn to_cpu_rect(r: kurbo::Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn to_cpu_color(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn font_data_for(
    cache: &mut HashMap<u64, vello_cpu::peniko::FontData>,
    font: &parley::Font,
) -> vello_cpu::peniko::FontData {
    cache
        .entry(font.data.id())
        .or_insert_with(|| {
            vello_cpu::peniko::FontData::new(
                vello_cpu::peniko::Blob::from(font.data.as_ref().to_vec()),
                font.index,
            )
        })
        .clone()
}

/// Build a pixmap-backed image paint from premultiplied RGBA8 bytes.
fn image_paint(image: &PreparedImage) -> CardResult<vello_cpu::Image> {
    let w: u16 = image
        .width
        .try_into()
        .map_err(|_| CardError::validation("image width exceeds u16"))?;
    let h: u16 = image
        .height
        .try_into()
        .map_err(|_| CardError::validation("image height exceeds u16"))?;
    let bytes = image.rgba8_premul.as_slice();
    if bytes.len() != image.width as usize * image.height as usize * 4 {
        return Err(CardError::validation("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(image.width as usize * image.height as usize);
    for px in bytes.chunks_exact(4) {
        may_have_opacities |= px[3] != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a: px[3],
        });
    }

    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(
            vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities),
        )),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Encode straight-alpha RGBA8 bytes as PNG.
pub fn encode_png(rgba: &[u8], width: u32, height: u32) -> CardResult<Vec<u8>> {
    let img = image::RgbaImage::from_raw(width, height, rgba.to_vec())
        .ok_or_else(|| CardError::encode("rgba byte length does not match dimensions"))?;
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| CardError::encode(format!("encode png: {e}")))?;
    Ok(buf)
}

/// Encode straight-alpha RGBA8 bytes as JPEG, dropping alpha.
pub fn encode_jpeg(rgba: &[u8], width: u32, height: u32, quality: u8) -> CardResult<Vec<u8>> {
    let img = image::RgbaImage::from_raw(width, height, rgba.to_vec())
        .ok_or_else(|| CardError::encode("rgba byte length does not match dimensions"))?;
    let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();

    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| CardError::encode(format!("encode jpeg: {e}")))?;
    Ok(buf)
}
