use std::collections::HashMap;

use rand::Rng as _;

use crate::{
    error::{CardError, CardResult},
    export::epoch_millis,
    watermark::apply_watermark,
};

/// Maximum number of listing records read back for the wall.
pub const LISTING_PAGE_SIZE: usize = 60;

const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const ALLOWED_MIME_TYPES: [&str; 2] = ["image/png", "image/jpeg"];
const OBJECT_KEY_SUFFIX_LEN: usize = 11;

/// Check an upload against the file-type allow-list.
///
/// Runs before any network call or pipeline work; a rejected file aborts the
/// whole action.
pub fn validate_upload(file_name: &str, mime: &str) -> CardResult<()> {
    let ext = file_extension(file_name).ok_or_else(|| {
        CardError::validation("file has no extension; only PNG, JPG, JPEG are allowed")
    })?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CardError::validation(format!(
            "extension '.{ext}' is not allowed; only PNG, JPG, JPEG are allowed"
        )));
    }
    if !ALLOWED_MIME_TYPES.contains(&mime) {
        return Err(CardError::validation(format!(
            "mime type '{mime}' is not allowed; only PNG, JPG, JPEG are allowed"
        )));
    }
    Ok(())
}

fn file_extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Generate a fresh object key: `{epoch-millis}-{base36-suffix}.{ext}`.
///
/// Keys are never reused and stored objects are never overwritten; a missing
/// extension falls back to `jpg` since uploads are re-encoded as JPEG anyway.
pub fn generate_object_key(file_name: &str) -> String {
    let ext = file_extension(file_name).unwrap_or_else(|| "jpg".to_string());
    format!("{}-{}.{ext}", epoch_millis(), base36_suffix(OBJECT_KEY_SUFFIX_LEN))
}

fn base36_suffix(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Listing record written on a successful community upload.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommunityRecord {
    pub username: String,
    pub image_path: String,
    pub created_at: u64,
}

impl CommunityRecord {
    /// A blank username defaults to `anon`.
    pub fn new(username: &str, image_path: &str) -> Self {
        let username = username.trim();
        Self {
            username: if username.is_empty() {
                "anon".to_string()
            } else {
                username.to_string()
            },
            image_path: image_path.to_string(),
            created_at: epoch_millis() as u64,
        }
    }
}

/// Remote object storage plus the listing store, as one external collaborator
/// seam. The core only ever talks to this trait; wiring it to a real backend
/// is out of scope.
pub trait CommunityStore {
    /// Store object bytes under a fresh key. Must refuse to overwrite.
    fn put_object(&mut self, key: &str, bytes: Vec<u8>) -> CardResult<()>;

    /// Append a listing record.
    fn insert_record(&mut self, record: CommunityRecord) -> CardResult<()>;

    /// Most recent records first, capped at `limit`.
    fn recent(&self, limit: usize) -> CardResult<Vec<CommunityRecord>>;
}

/// In-memory store used by tests and local development.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: HashMap<String, Vec<u8>>,
    records: Vec<CommunityRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, key: &str) -> Option<&[u8]> {
        self.objects.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CommunityStore for MemoryStore {
    fn put_object(&mut self, key: &str, bytes: Vec<u8>) -> CardResult<()> {
        if self.objects.contains_key(key) {
            return Err(CardError::remote_write(format!(
                "object key '{key}' already exists"
            )));
        }
        self.objects.insert(key.to_string(), bytes);
        Ok(())
    }

    fn insert_record(&mut self, record: CommunityRecord) -> CardResult<()> {
        self.records.push(record);
        Ok(())
    }

    fn recent(&self, limit: usize) -> CardResult<Vec<CommunityRecord>> {
        // Insertion order doubles as recency; same-millisecond uploads keep
        // their relative order.
        Ok(self.records.iter().rev().take(limit).cloned().collect())
    }
}

/// Build a reference to the external viewing proxy for a stored object.
///
/// The object key is URL-escaped; overlay intensities are optional and
/// clamped to `[0, 1]`.
pub fn viewer_proxy_url(
    base: &str,
    object_key: &str,
    fill: Option<f64>,
    stroke: Option<f64>,
) -> String {
    let mut url = format!("{base}?path={}", urlencoding::encode(object_key));
    if let Some(fill) = fill {
        url.push_str(&format!("&fill={}", fill.clamp(0.0, 1.0)));
    }
    if let Some(stroke) = stroke {
        url.push_str(&format!("&stroke={}", stroke.clamp(0.0, 1.0)));
    }
    url
}

/// Full community-upload pipeline: validate, watermark, store, list.
///
/// Any failure leaves the store as it was before the failing step; in
/// particular a rejected file never reaches the watermarking pipeline and a
/// failed object write never produces a listing record.
#[tracing::instrument(skip(store, bytes))]
pub fn upload_to_wall(
    store: &mut dyn CommunityStore,
    file_name: &str,
    mime: &str,
    bytes: &[u8],
    username: &str,
) -> CardResult<CommunityRecord> {
    validate_upload(file_name, mime)?;
    let watermarked = apply_watermark(bytes)?;

    let key = generate_object_key(file_name);
    store.put_object(&key, watermarked)?;

    let record = CommunityRecord::new(username, &key);
    store.insert_record(record.clone())?;
    tracing::debug!(key = %key, "community upload stored");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_allow_list() {
        validate_upload("a.png", "image/png").unwrap();
        validate_upload("b.JPG", "image/jpeg").unwrap();
        validate_upload("c.jpeg", "image/jpeg").unwrap();
    }

    #[test]
    fn validate_rejects_bad_extension_and_mime() {
        assert!(matches!(
            validate_upload("a.webp", "image/webp"),
            Err(CardError::Validation(_))
        ));
        assert!(matches!(
            validate_upload("a.png", "image/webp"),
            Err(CardError::Validation(_))
        ));
        assert!(matches!(
            validate_upload("noext", "image/png"),
            Err(CardError::Validation(_))
        ));
    }

    #[test]
    fn object_key_shape() {
        let key = generate_object_key("photo.PNG");
        let (stem, ext) = key.rsplit_once('.').unwrap();
        assert_eq!(ext, "png");
        let (millis, suffix) = stem.split_once('-').unwrap();
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(suffix.len(), OBJECT_KEY_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn object_keys_do_not_repeat() {
        let a = generate_object_key("x.jpg");
        let b = generate_object_key("x.jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn blank_username_defaults_to_anon() {
        assert_eq!(CommunityRecord::new("", "k").username, "anon");
        assert_eq!(CommunityRecord::new("  ", "k").username, "anon");
        assert_eq!(CommunityRecord::new("@emir", "k").username, "@emir");
    }

    #[test]
    fn record_serde_roundtrip() {
        let record = CommunityRecord::new("@emir", "123-abc.jpg");
        let json = serde_json::to_string(&record).unwrap();
        let back: CommunityRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn memory_store_refuses_overwrite() {
        let mut store = MemoryStore::new();
        store.put_object("k", vec![1]).unwrap();
        assert!(matches!(
            store.put_object("k", vec![2]),
            Err(CardError::RemoteWrite(_))
        ));
        assert_eq!(store.object("k"), Some(&[1u8][..]));
    }

    #[test]
    fn recent_is_newest_first_and_capped() {
        let mut store = MemoryStore::new();
        for i in 0..70 {
            store
                .insert_record(CommunityRecord {
                    username: format!("u{i}"),
                    image_path: format!("k{i}"),
                    created_at: i,
                })
                .unwrap();
        }
        let page = store.recent(LISTING_PAGE_SIZE).unwrap();
        assert_eq!(page.len(), LISTING_PAGE_SIZE);
        assert_eq!(page[0].image_path, "k69");
        assert_eq!(page.last().unwrap().image_path, "k10");
    }

    #[test]
    fn proxy_url_escapes_key_and_clamps_params() {
        let url = viewer_proxy_url("/api/wm", "17 00-a b.jpg", Some(0.28), Some(1.7));
        assert_eq!(url, "/api/wm?path=17%2000-a%20b.jpg&fill=0.28&stroke=1");
    }

    #[test]
    fn proxy_url_without_params() {
        let url = viewer_proxy_url("/api/wm", "k.jpg", None, None);
        assert_eq!(url, "/api/wm?path=k.jpg");
    }

    #[test]
    fn upload_rejects_before_pipeline() {
        let mut store = MemoryStore::new();
        let err = upload_to_wall(&mut store, "a.gif", "image/gif", b"xx", "").unwrap_err();
        assert!(matches!(err, CardError::Validation(_)));
        assert!(store.is_empty());
    }
}
