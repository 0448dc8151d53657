use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Context as _;

use crate::{
    error::{CardError, CardResult},
    model::{CARD_HEIGHT, CARD_WIDTH},
    resource::{LoadState, PreparedImage, await_all_settled},
    scene::{CARD_BACKGROUND, Node},
    surface::{Rgba8, Surface, encode_png},
};

/// File name prefix of downloaded card images.
pub const EXPORT_FILE_PREFIX: &str = "anoma-card";

/// One export invocation over a composition tree.
///
/// Ephemeral: build one per request. The output always has exactly
/// `width x height` pixels against an opaque background, independent of any
/// display-only scaling of the tree.
#[derive(Clone, Debug)]
pub struct ExportJob {
    pub tree: Node,
    pub width: u32,
    pub height: u32,
    pub background: Rgba8,
    pub pixel_ratio: f64,
}

impl ExportJob {
    /// The canonical card export: 1140x1230 over the opaque card background.
    pub fn card(tree: Node) -> Self {
        Self {
            tree,
            width: CARD_WIDTH,
            height: CARD_HEIGHT,
            background: CARD_BACKGROUND,
            pixel_ratio: 1.0,
        }
    }
}

/// Finished export: encoded PNG plus the timestamped download file name.
#[derive(Clone, Debug)]
pub struct ExportedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub file_name: String,
}

impl ExportedImage {
    /// Write the PNG under its generated file name and return the full path.
    pub fn write_to_dir(&self, dir: &Path) -> CardResult<PathBuf> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.png)
            .with_context(|| format!("write exported card to {}", path.display()))?;
        Ok(path)
    }
}

/// Rasterizes composition trees to exact-pixel-dimension images.
///
/// At most one export may be in flight per exporter at any time; a second
/// request issued while one is pending is rejected, never interleaved.
/// Clones share the same in-flight guard.
#[derive(Clone, Debug, Default)]
pub struct Exporter {
    in_flight: Arc<AtomicBool>,
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an export over this exporter's tree is currently pending.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run an export job: wait for every embedded resource to settle, then
    /// rasterize at exactly the job's target dimensions.
    ///
    /// On any failure no file name is produced and the in-flight guard is
    /// released, leaving prior state unchanged.
    #[tracing::instrument(skip_all, fields(width = job.width, height = job.height))]
    pub async fn export(&self, job: &ExportJob) -> CardResult<ExportedImage> {
        let _guard = InFlightGuard::acquire(&self.in_flight)
            .ok_or_else(|| CardError::export("an export is already in flight for this tree"))?;

        let resources = job.tree.collect_resources();
        await_all_settled(&resources).await;

        // Display scaling never reaches this path: rasterization always runs
        // in the canonical coordinate space at pixel ratio 1.
        if job.pixel_ratio != 1.0 {
            tracing::debug!(pixel_ratio = job.pixel_ratio, "ignoring non-unit pixel ratio");
        }

        let (rgba, width, height) =
            rasterize_scene(&job.tree, job.width, job.height, job.background)?;
        let png = encode_png(&rgba, width, height)?;
        let file_name = format!("{EXPORT_FILE_PREFIX}-{}.png", epoch_millis());

        Ok(ExportedImage {
            png,
            width,
            height,
            file_name,
        })
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub(crate) fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Rasterize a composition tree against an opaque background.
///
/// Resources that settled as failed (or are unexpectedly still pending)
/// render as placeholders; rasterization itself only fails when the surface
/// cannot be built or read back.
pub fn rasterize_scene(
    tree: &Node,
    width: u32,
    height: u32,
    background: Rgba8,
) -> CardResult<(Vec<u8>, u32, u32)> {
    let mut surface = Surface::new(width, height)?;
    surface.fill_rect(
        kurbo::Rect::new(0.0, 0.0, f64::from(width), f64::from(height)),
        background.with_alpha(255),
    );

    draw_node(&mut surface, tree, kurbo::Affine::IDENTITY)?;
    Ok(surface.into_rgba8())
}

fn draw_node(surface: &mut Surface, node: &Node, transform: kurbo::Affine) -> CardResult<()> {
    surface.set_transform(transform);
    match node {
        Node::Group {
            transform: local,
            children,
        } => {
            for child in children {
                draw_node(surface, child, transform * *local)?;
            }
        }
        Node::Fill {
            rect,
            radius,
            color,
        } => {
            if *radius > 0.0 {
                surface.fill_rounded_rect(*rect, *radius, *color);
            } else {
                surface.fill_rect(*rect, *color);
            }
        }
        Node::Border {
            rect,
            radius,
            line_width,
            color,
        } => {
            surface.stroke_rounded_rect(*rect, *radius, *line_width, *color);
        }
        Node::Image { resource, dest } => match resource.state() {
            LoadState::Loaded(img) => {
                let fitted = img.cover_crop(dest.width() as u32, dest.height() as u32);
                surface.draw_image(&fitted, *dest)?;
            }
            LoadState::Failed | LoadState::Pending => {
                draw_image_placeholder(surface, *dest)?;
            }
        },
        Node::Text {
            content,
            size,
            weight,
            color,
            origin,
            centered,
        } => {
            let shaped = surface.shape_text(content, *size, *weight)?;
            let origin = if *centered {
                kurbo::Point::new(
                    origin.x - shaped.width() / 2.0,
                    origin.y - shaped.height() / 2.0,
                )
            } else {
                *origin
            };
            surface.set_transform(transform);
            surface.fill_text(&shaped, origin, *color);
        }
        Node::Svg { tree, dest } => {
            let raster = rasterize_svg(tree, dest.width(), dest.height())?;
            surface.draw_image(&raster, *dest)?;
        }
    }
    Ok(())
}

fn draw_image_placeholder(surface: &mut Surface, dest: kurbo::Rect) -> CardResult<()> {
    surface.fill_rounded_rect(dest, 12.0, Rgba8::opaque(20, 20, 20));
    let shaped = surface.shape_text("PFP", 48.0, 500.0)?;
    let center = dest.center();
    surface.fill_text(
        &shaped,
        kurbo::Point::new(
            center.x - shaped.width() / 2.0,
            center.y - shaped.height() / 2.0,
        ),
        Rgba8::opaque(255, 255, 255).with_alpha(128),
    );
    Ok(())
}

fn rasterize_svg(tree: &usvg::Tree, width: f64, height: f64) -> CardResult<PreparedImage> {
    let w = width.ceil().max(1.0) as u32;
    let h = height.ceil().max(1.0) as u32;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(w, h)
        .ok_or_else(|| CardError::encode("failed to allocate svg pixmap"))?;
    let sx = (w as f32) / tree.size().width();
    let sy = (h as f32) / tree.size().height();
    resvg::render(
        tree,
        resvg::tiny_skia::Transform::from_scale(sx, sy),
        &mut pixmap.as_mut(),
    );

    Ok(PreparedImage {
        width: w,
        height: h,
        rgba8_premul: Arc::new(pixmap.data().to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::card_scene;

    #[test]
    fn file_name_carries_prefix_and_extension() {
        let name = format!("{EXPORT_FILE_PREFIX}-{}.png", epoch_millis());
        assert!(name.starts_with("anoma-card-"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn guard_is_exclusive_and_releases_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = InFlightGuard::acquire(&flag).unwrap();
        assert!(InFlightGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(InFlightGuard::acquire(&flag).is_some());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn second_export_is_rejected_while_pending() {
        let exporter = Exporter::new();
        let job = ExportJob::card(card_scene(&crate::model::CardConfig::new()));

        let _guard = InFlightGuard::acquire(&exporter.in_flight).unwrap();
        let err = exporter.export(&job).await.unwrap_err();
        assert!(matches!(err, CardError::Export(_)));
        assert!(exporter.is_in_flight());
    }

    #[test]
    fn rasterize_failed_resource_uses_placeholder() {
        let failed = crate::resource::ImageResource::pending();
        failed.fail();
        let tree = Node::group(vec![Node::Image {
            resource: failed,
            dest: kurbo::Rect::new(0.0, 0.0, 32.0, 32.0),
        }]);
        let (rgba, w, h) = rasterize_scene(&tree, 32, 32, CARD_BACKGROUND).unwrap();
        assert_eq!((w, h), (32, 32));
        assert_eq!(rgba.len(), 32 * 32 * 4);
    }
}
