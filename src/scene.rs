use std::sync::{Arc, OnceLock};

use crate::{
    model::{CARD_HEIGHT, CARD_WIDTH, CardConfig},
    resource::ImageResource,
    surface::Rgba8,
};

/// Brand accent red.
pub const BRAND_RED: Rgba8 = Rgba8::opaque(229, 9, 20);
/// Opaque card background.
pub const CARD_BACKGROUND: Rgba8 = Rgba8::opaque(11, 11, 11);

const ARTWORK_BACKGROUND: Rgba8 = Rgba8::opaque(5, 5, 5);
const WHITE: Rgba8 = Rgba8::opaque(255, 255, 255);

/// One node of a composition tree.
///
/// The tree is a pure description: nothing is rasterized until an export job
/// walks it, so the same tree backs both the scaled preview and the
/// full-resolution export.
#[derive(Clone, Debug)]
pub enum Node {
    Group {
        transform: kurbo::Affine,
        children: Vec<Node>,
    },
    Fill {
        rect: kurbo::Rect,
        radius: f64,
        color: Rgba8,
    },
    Border {
        rect: kurbo::Rect,
        radius: f64,
        line_width: f64,
        color: Rgba8,
    },
    Image {
        resource: ImageResource,
        dest: kurbo::Rect,
    },
    Text {
        content: String,
        size: f32,
        weight: f32,
        color: Rgba8,
        /// Top-left of the text block, or its center when `centered`.
        origin: kurbo::Point,
        centered: bool,
    },
    Svg {
        tree: Arc<usvg::Tree>,
        dest: kurbo::Rect,
    },
}

impl Node {
    pub fn group(children: Vec<Node>) -> Node {
        Node::Group {
            transform: kurbo::Affine::IDENTITY,
            children,
        }
    }

    /// Every raster resource embedded anywhere in this tree.
    pub fn collect_resources(&self) -> Vec<ImageResource> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<ImageResource>) {
        match self {
            Node::Group { children, .. } => {
                for child in children {
                    child.collect_into(out);
                }
            }
            Node::Image { resource, .. } => out.push(resource.clone()),
            _ => {}
        }
    }
}

const BRAND_MARK_SVG: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64" viewBox="0 0 64 64"><circle cx="32" cy="32" r="30" fill="#E50914"/><path d="M20 45 L32 17 L44 45 Z" fill="#0B0B0B"/><circle cx="32" cy="38" r="4" fill="#E50914"/></svg>"##;

static BRAND_MARK: OnceLock<Option<Arc<usvg::Tree>>> = OnceLock::new();

/// Parsed brand-mark SVG. The markup is a compile-time constant, so a parse
/// failure degrades to a plain colored square instead of erroring the scene.
fn brand_mark() -> Option<Arc<usvg::Tree>> {
    BRAND_MARK
        .get_or_init(|| {
            usvg::Tree::from_data(BRAND_MARK_SVG, &usvg::Options::default())
                .ok()
                .map(Arc::new)
        })
        .clone()
}

fn brand_mark_node(dest: kurbo::Rect) -> Node {
    match brand_mark() {
        Some(tree) => Node::Svg { tree, dest },
        None => Node::Fill {
            rect: dest,
            radius: 6.0,
            color: BRAND_RED,
        },
    }
}

// Template geometry, all in the canonical 1140x1230 space.
const INSET: f64 = 4.0;
const PAD_X: f64 = 28.0;
const ACCENT_Y: f64 = 24.0;
const ACCENT_H: f64 = 3.0;
const HEADER_CENTER_Y: f64 = 72.0;
const ARTWORK_TOP: f64 = 122.0;
const ARTWORK_SIZE: f64 = 840.0;
const INFO_TOP: f64 = ARTWORK_TOP + ARTWORK_SIZE + 18.0;
const INFO_WIDTH: f64 = 798.0; // 70% of the card width
const INFO_BASE_H: f64 = 96.0;
const HANDLE_ROW_H: f64 = 52.0;
// The footer clears the info block even when both handle rows are present.
const INFO_MAX_H: f64 = INFO_BASE_H + 2.0 * HANDLE_ROW_H;
const FOOTER_BASELINE: f64 = INFO_TOP + INFO_MAX_H + 14.0;

/// Build the fixed card template for a config.
///
/// Pure projection: the config is read, never mutated, and the produced tree
/// is independent of any preview scaling.
pub fn card_scene(config: &CardConfig) -> Node {
    let layout = config.layout();
    let w = f64::from(CARD_WIDTH);
    let h = f64::from(CARD_HEIGHT);

    let mut children = vec![
        // Outer frame and inner card.
        Node::Fill {
            rect: kurbo::Rect::new(0.0, 0.0, w, h),
            radius: 28.0,
            color: Rgba8::opaque(24, 24, 24),
        },
        Node::Fill {
            rect: kurbo::Rect::new(INSET, INSET, w - INSET, h - INSET),
            radius: 24.0,
            color: CARD_BACKGROUND,
        },
        Node::Border {
            rect: kurbo::Rect::new(INSET, INSET, w - INSET, h - INSET),
            radius: 24.0,
            line_width: 1.0,
            color: WHITE.with_alpha(26),
        },
        // Top red accent.
        Node::Fill {
            rect: kurbo::Rect::new(PAD_X, ACCENT_Y, w - PAD_X, ACCENT_Y + ACCENT_H),
            radius: ACCENT_H / 2.0,
            color: BRAND_RED,
        },
        // Header: brand mark + word mark on the left.
        brand_mark_node(kurbo::Rect::new(
            PAD_X,
            HEADER_CENTER_Y - 18.0,
            PAD_X + 36.0,
            HEADER_CENTER_Y + 18.0,
        )),
        Node::Text {
            content: "anoma".to_string(),
            size: 30.0,
            weight: 600.0,
            color: WHITE,
            origin: kurbo::Point::new(PAD_X + 52.0, HEADER_CENTER_Y - 18.0),
            centered: false,
        },
    ];

    // Badge pill on the right.
    let pill_w = 40.0 + layout.badge_label.chars().count() as f64 * 14.0;
    let pill = kurbo::Rect::new(
        w - PAD_X - pill_w,
        HEADER_CENTER_Y - 22.0,
        w - PAD_X,
        HEADER_CENTER_Y + 22.0,
    );
    children.push(Node::Fill {
        rect: pill,
        radius: 22.0,
        color: BRAND_RED.with_alpha(36),
    });
    children.push(Node::Border {
        rect: pill,
        radius: 22.0,
        line_width: 1.0,
        color: BRAND_RED.with_alpha(71),
    });
    children.push(Node::Fill {
        rect: kurbo::Rect::new(
            pill.x0 + 14.0,
            HEADER_CENTER_Y - 4.0,
            pill.x0 + 22.0,
            HEADER_CENTER_Y + 4.0,
        ),
        radius: 4.0,
        color: BRAND_RED,
    });
    children.push(Node::Text {
        content: layout.badge_label.clone(),
        size: 24.0,
        weight: 500.0,
        color: WHITE,
        origin: kurbo::Point::new(pill.x0 + 28.0 + (pill_w - 42.0) / 2.0, HEADER_CENTER_Y),
        centered: true,
    });

    // Artwork square with red border glow.
    let art_x = (w - ARTWORK_SIZE) / 2.0;
    let art = kurbo::Rect::new(
        art_x,
        ARTWORK_TOP,
        art_x + ARTWORK_SIZE,
        ARTWORK_TOP + ARTWORK_SIZE,
    );
    children.push(Node::Fill {
        rect: art,
        radius: 12.0,
        color: ARTWORK_BACKGROUND,
    });
    children.push(Node::Border {
        rect: art,
        radius: 12.0,
        line_width: 2.0,
        color: BRAND_RED.with_alpha(82),
    });
    match config.profile() {
        Some(resource) => children.push(Node::Image {
            resource: resource.clone(),
            dest: art.inset(-2.0),
        }),
        None => children.push(Node::Text {
            content: "PFP".to_string(),
            size: 48.0,
            weight: 500.0,
            color: WHITE.with_alpha(128),
            origin: kurbo::Point::new(art.center().x, art.center().y),
            centered: true,
        }),
    }

    // Info block: community title plus the filled-in handle rows.
    let info_x = (w - INFO_WIDTH) / 2.0;
    let handle_count = [layout.twitter.as_ref(), layout.discord.as_ref()]
        .iter()
        .flatten()
        .count() as f64;
    let info_h = INFO_BASE_H + handle_count * HANDLE_ROW_H;
    let info = kurbo::Rect::new(info_x, INFO_TOP, info_x + INFO_WIDTH, INFO_TOP + info_h);
    children.push(Node::Fill {
        rect: info,
        radius: 16.0,
        color: WHITE.with_alpha(13),
    });
    children.push(Node::Border {
        rect: info,
        radius: 16.0,
        line_width: 1.0,
        color: WHITE.with_alpha(26),
    });
    children.push(brand_mark_node(kurbo::Rect::new(
        info.x0 + 20.0,
        info.y0 + 20.0,
        info.x0 + 68.0,
        info.y0 + 68.0,
    )));
    children.push(Node::Text {
        content: "Anoma Community".to_string(),
        size: 24.0,
        weight: 600.0,
        color: WHITE,
        origin: kurbo::Point::new(info.x0 + 84.0, info.y0 + 18.0),
        centered: false,
    });
    children.push(Node::Text {
        content: "Card generated from your MG pfp.".to_string(),
        size: 18.0,
        weight: 400.0,
        color: WHITE.with_alpha(153),
        origin: kurbo::Point::new(info.x0 + 84.0, info.y0 + 46.0),
        centered: false,
    });

    let mut row_y = info.y0 + 88.0;
    for handle in [layout.twitter.as_ref(), layout.discord.as_ref()]
        .into_iter()
        .flatten()
    {
        children.push(Node::Fill {
            rect: kurbo::Rect::new(info.x0 + 20.0, row_y, info.x0 + 64.0, row_y + 44.0),
            radius: 22.0,
            color: BRAND_RED.with_alpha(38),
        });
        children.push(Node::Text {
            content: handle.clone(),
            size: 24.0,
            weight: 600.0,
            color: WHITE,
            origin: kurbo::Point::new(info.x0 + 80.0, row_y + 8.0),
            centered: false,
        });
        row_y += HANDLE_ROW_H;
    }

    // Footer micro brand.
    children.push(Node::Text {
        content: "crafted for Anoma".to_string(),
        size: 18.0,
        weight: 400.0,
        color: WHITE.with_alpha(128),
        origin: kurbo::Point::new(PAD_X, FOOTER_BASELINE),
        centered: false,
    });
    children.push(Node::Text {
        content: "MG community card".to_string(),
        size: 18.0,
        weight: 400.0,
        color: WHITE.with_alpha(128),
        origin: kurbo::Point::new(w - PAD_X - 180.0, FOOTER_BASELINE),
        centered: false,
    });

    Node::group(children)
}
