use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{CardError, CardResult};

/// Decoded raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Center-crop to the aspect ratio of `dst_w x dst_h` (object-cover):
    /// the result can be scaled to the destination without distortion.
    pub fn cover_crop(&self, dst_w: u32, dst_h: u32) -> PreparedImage {
        if self.width == 0 || self.height == 0 || dst_w == 0 || dst_h == 0 {
            return self.clone();
        }

        let src_aspect = f64::from(self.width) / f64::from(self.height);
        let dst_aspect = f64::from(dst_w) / f64::from(dst_h);

        let (crop_w, crop_h) = if src_aspect > dst_aspect {
            (
                ((f64::from(self.height) * dst_aspect).round() as u32).clamp(1, self.width),
                self.height,
            )
        } else {
            (
                self.width,
                ((f64::from(self.width) / dst_aspect).round() as u32).clamp(1, self.height),
            )
        };

        if crop_w == self.width && crop_h == self.height {
            return self.clone();
        }

        let x0 = (self.width - crop_w) / 2;
        let y0 = (self.height - crop_h) / 2;
        let src_stride = self.width as usize * 4;
        let row_bytes = crop_w as usize * 4;

        let mut out = Vec::with_capacity(row_bytes * crop_h as usize);
        for row in y0..y0 + crop_h {
            let start = row as usize * src_stride + x0 as usize * 4;
            out.extend_from_slice(&self.rgba8_premul[start..start + row_bytes]);
        }

        PreparedImage {
            width: crop_w,
            height: crop_h,
            rgba8_premul: Arc::new(out),
        }
    }
}

/// Decode arbitrary encoded image bytes into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> CardResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| CardError::decode(format!("decode image from memory: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}

/// Lifecycle of one asynchronous image load.
///
/// A resource settles at most once: either `Loaded` with decoded pixels or
/// `Failed`. A failed load is a permanently failed placeholder for downstream
/// rendering, never an error that aborts a barrier.
#[derive(Clone, Debug, Default)]
pub enum LoadState {
    #[default]
    Pending,
    Loaded(PreparedImage),
    Failed,
}

impl LoadState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, LoadState::Pending)
    }

    pub fn prepared(&self) -> Option<&PreparedImage> {
        match self {
            LoadState::Loaded(img) => Some(img),
            _ => None,
        }
    }
}

/// Cheap-clone handle on one raster resource and its load state.
///
/// Clones observe the same underlying state; the terminal state is written at
/// most once regardless of how many handles exist.
#[derive(Clone, Debug)]
pub struct ImageResource {
    tx: Arc<watch::Sender<LoadState>>,
}

impl ImageResource {
    /// A resource whose load has not started or finished yet. Settle it with
    /// [`ImageResource::resolve`] or [`ImageResource::fail`].
    pub fn pending() -> Self {
        let (tx, _rx) = watch::channel(LoadState::Pending);
        Self { tx: Arc::new(tx) }
    }

    /// Decode synchronously and return an already-loaded resource.
    pub fn decode_now(bytes: &[u8]) -> CardResult<Self> {
        Ok(Self::from_prepared(decode_image(bytes)?))
    }

    pub fn from_prepared(image: PreparedImage) -> Self {
        let (tx, _rx) = watch::channel(LoadState::Loaded(image));
        Self { tx: Arc::new(tx) }
    }

    /// Start an independent decode task and return the pending handle.
    ///
    /// The task settles the resource exactly once; a decode failure becomes
    /// the `Failed` terminal state and is not propagated further.
    pub fn spawn_load(bytes: Vec<u8>) -> Self {
        let resource = Self::pending();
        let handle = resource.clone();
        tokio::spawn(async move {
            match decode_image(&bytes) {
                Ok(img) => {
                    handle.resolve(img);
                }
                Err(err) => {
                    tracing::debug!(error = %err, "image load failed; settling as Failed");
                    handle.fail();
                }
            }
        });
        resource
    }

    /// Settle the resource as loaded. Returns false if it was already settled.
    pub fn resolve(&self, image: PreparedImage) -> bool {
        self.settle(LoadState::Loaded(image))
    }

    /// Settle the resource as failed. Returns false if it was already settled.
    pub fn fail(&self) -> bool {
        self.settle(LoadState::Failed)
    }

    fn settle(&self, terminal: LoadState) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_settled() {
                return false;
            }
            *state = terminal;
            true
        })
    }

    pub fn state(&self) -> LoadState {
        self.tx.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_settled()
    }

    /// Wait until this resource reaches a terminal state. Never fails;
    /// a failed load counts as settled.
    pub async fn await_settled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives inside `self`, so wait_for cannot observe a closed
        // channel while we are borrowing it.
        let _ = rx.wait_for(LoadState::is_settled).await;
    }
}

/// Readiness barrier: resolve once every resource has settled.
///
/// Successes and failures both count as settled; an empty set resolves
/// immediately. This is a join over N independent loads with no ordering
/// guarantee among them.
pub async fn await_all_settled(resources: &[ImageResource]) {
    futures::future::join_all(resources.iter().map(ImageResource::await_settled)).await;
}
