//! Single-flight texture cache.
//!
//! Every path maps to a shared cell that is either filled with the decoded
//! texture or being filled by exactly one decode. Requesters for a path whose
//! decode is running wait on that decode instead of starting another one.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbaImage;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, instrument};

use crate::config::LoaderOptions;
use crate::error::Error;
use crate::processing::decode::{decode_rgba8_apply_exif, resample_square};

/// A decoded, square-resampled photo.
pub struct PhotoTexture {
    pub path: PathBuf,
    pub name: String,
    pub image: RgbaImage,
}

impl fmt::Debug for PhotoTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoTexture")
            .field("path", &self.path)
            .field("dimensions", &self.image.dimensions())
            .finish()
    }
}

impl PhotoTexture {
    pub fn new(path: PathBuf, image: RgbaImage) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name, image }
    }
}

type Slot = Arc<OnceCell<Arc<PhotoTexture>>>;

struct Inner {
    slots: Mutex<HashMap<PathBuf, Slot>>,
    permits: Semaphore,
    square_size: u32,
    decodes: AtomicUsize,
}

#[derive(Clone)]
pub struct TextureCache {
    inner: Arc<Inner>,
}

impl TextureCache {
    pub fn new(opts: &LoaderOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                permits: Semaphore::new(opts.max_concurrent_loads.max(1)),
                square_size: opts.square_image_size,
                decodes: AtomicUsize::new(0),
            }),
        }
    }

    /// Return the cached texture for `path`, decoding it first if needed.
    ///
    /// At most `max_concurrent_loads` decodes run at once; further decodes
    /// queue for a permit in arrival order. A failed decode leaves the slot
    /// empty so a later call retries.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn get_or_load(&self, path: &Path) -> Result<Arc<PhotoTexture>, Error> {
        let slot = self.slot(path);
        let texture = slot
            .get_or_try_init(|| async {
                let _permit = self
                    .inner
                    .permits
                    .acquire()
                    .await
                    .map_err(|err| Error::Io(io::Error::other(err)))?;
                self.inner.decodes.fetch_add(1, Ordering::Relaxed);
                let owned = path.to_path_buf();
                let size = self.inner.square_size;
                let texture = tokio::task::spawn_blocking(move || load_texture(owned, size))
                    .await
                    .map_err(|err| Error::Io(io::Error::other(err)))??;
                debug!("decoded texture");
                Ok::<_, Error>(Arc::new(texture))
            })
            .await?;
        Ok(Arc::clone(texture))
    }

    /// Cached texture for `path`, if its decode already finished.
    pub fn get(&self, path: &Path) -> Option<Arc<PhotoTexture>> {
        let slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(path).and_then(|slot| slot.get().cloned())
    }

    /// Drop the cached texture for `path`. Photos already holding it keep their handle.
    pub fn evict(&self, path: &Path) -> bool {
        let mut slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(path).is_some()
    }

    /// Number of decodes started since the cache was created.
    pub fn decode_count(&self) -> usize {
        self.inner.decodes.load(Ordering::Relaxed)
    }

    fn slot(&self, path: &Path) -> Slot {
        let mut slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(path.to_path_buf()).or_default())
    }
}

fn load_texture(path: PathBuf, size: u32) -> Result<PhotoTexture, Error> {
    let decoded = decode_rgba8_apply_exif(&path)?;
    let square = resample_square(&path, &decoded, size)?;
    Ok(PhotoTexture::new(path, square))
}
