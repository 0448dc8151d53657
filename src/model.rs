use crate::{handle::normalize_handle, resource::ImageResource};

/// Canonical card width in pixels, shared by preview and export.
pub const CARD_WIDTH: u32 = 1140;
/// Canonical card height in pixels, shared by preview and export.
pub const CARD_HEIGHT: u32 = 1230;

/// Display-only scale factor of the live preview. Never feeds layout math.
pub const PREVIEW_SCALE: f64 = 0.6;

/// Badge label used when the user leaves the badge field blank.
pub const DEFAULT_BADGE: &str = "Seeker";

/// User-editable state behind the card generator.
///
/// Handles are normalized on write; the layout projection performs no further
/// transformation. The profile image is owned exclusively by the config and is
/// dropped when superseded by a new selection.
#[derive(Clone, Debug, Default)]
pub struct CardConfig {
    profile: Option<ImageResource>,
    twitter: String,
    discord: String,
    badge: String,
}

impl CardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_profile(&mut self, resource: ImageResource) {
        self.profile = Some(resource);
    }

    pub fn clear_profile(&mut self) {
        self.profile = None;
    }

    pub fn set_twitter(&mut self, raw: &str) {
        self.twitter = normalize_handle(raw);
    }

    pub fn set_discord(&mut self, raw: &str) {
        self.discord = normalize_handle(raw);
    }

    pub fn set_badge(&mut self, raw: &str) {
        self.badge = raw.to_string();
    }

    pub fn profile(&self) -> Option<&ImageResource> {
        self.profile.as_ref()
    }

    pub fn twitter(&self) -> &str {
        &self.twitter
    }

    pub fn discord(&self) -> &str {
        &self.discord
    }

    /// Project the config onto template slots.
    pub fn layout(&self) -> CardLayout {
        let badge = self.badge.trim();
        CardLayout {
            badge_label: if badge.is_empty() {
                DEFAULT_BADGE.to_string()
            } else {
                badge.to_string()
            },
            twitter: (!self.twitter.is_empty()).then(|| self.twitter.clone()),
            discord: (!self.discord.is_empty()).then(|| self.discord.clone()),
            has_profile: self.profile.is_some(),
        }
    }

    /// A card is exportable once a profile image is set and at least one
    /// handle is filled in.
    pub fn ready(&self) -> bool {
        self.profile.is_some() && (!self.twitter.is_empty() || !self.discord.is_empty())
    }
}

/// Slot values of the fixed card template. Pure projection of [`CardConfig`];
/// preview and export both consume it, which is what guarantees visual parity.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CardLayout {
    pub badge_label: String,
    pub twitter: Option<String>,
    pub discord: Option<String>,
    pub has_profile: bool,
}

/// On-screen size of the scaled preview viewport.
///
/// The preview is a read-only scaled view: layout math always runs in the
/// canonical `CARD_WIDTH x CARD_HEIGHT` space and only the final visual
/// transform differs.
pub fn preview_viewport() -> (u32, u32) {
    let w = (f64::from(CARD_WIDTH) * PREVIEW_SCALE).round() as u32;
    let h = (f64::from(CARD_HEIGHT) * PREVIEW_SCALE).round() as u32;
    (w, h)
}
