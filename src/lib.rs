//! Client-side card composition and export pipeline.
//!
//! Builds the Anoma community card as a composition tree, rasterizes it to
//! exact-dimension PNG bytes, applies the tiled protective watermark to
//! uploads, and runs the community-wall publishing flow.

#![forbid(unsafe_code)]

pub mod community;
pub mod error;
pub mod export;
pub mod handle;
pub mod model;
pub mod resource;
pub mod scene;
pub mod surface;
pub mod watermark;

pub use community::{
    CommunityRecord, CommunityStore, LISTING_PAGE_SIZE, MemoryStore, generate_object_key,
    upload_to_wall, validate_upload, viewer_proxy_url,
};
pub use error::{CardError, CardResult};
pub use export::{EXPORT_FILE_PREFIX, ExportJob, ExportedImage, Exporter, rasterize_scene};
pub use handle::normalize_handle;
pub use model::{
    CARD_HEIGHT, CARD_WIDTH, CardConfig, CardLayout, DEFAULT_BADGE, PREVIEW_SCALE,
    preview_viewport,
};
pub use resource::{ImageResource, LoadState, PreparedImage, await_all_settled, decode_image};
pub use scene::{BRAND_RED, CARD_BACKGROUND, Node, card_scene};
pub use surface::{Rgba8, Surface};
pub use watermark::{WatermarkSpec, apply_watermark, apply_watermark_with};
