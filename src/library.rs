//! Photo discovery and the refilling queue photos are drawn from.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Error;

/// Lowercase extensions, without the dot, the library picks up.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tga"];

/// Return `true` if `path` has a supported image extension (any case).
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
}

/// List the supported images directly inside `folder`, sorted by path.
///
/// A missing folder is created and yields an empty list.
///
/// # Errors
/// Returns [`Error::AssetNotFound`] if the folder is missing and cannot be created.
pub fn discover(folder: &Path) -> Result<Vec<PathBuf>, Error> {
    if !folder.is_dir() {
        warn!(folder = %folder.display(), "photo folder missing; creating it");
        fs::create_dir_all(folder).map_err(|err| {
            warn!(folder = %folder.display(), error = %err, "could not create photo folder");
            Error::AssetNotFound(folder.to_path_buf())
        })?;
        return Ok(Vec::new());
    }

    let mut out: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| is_supported_image(p))
        .collect();
    out.sort();
    info!(folder = %folder.display(), count = out.len(), "discovered photos");
    Ok(out)
}

/// Endless supply of photo paths.
///
/// Every known photo is handed out once per round; a new round starts
/// (reshuffled when shuffling is on) when the current one runs dry.
#[derive(Debug)]
pub struct PhotoQueue {
    photos: Vec<PathBuf>,
    round: VecDeque<PathBuf>,
    shuffle: bool,
    rng: StdRng,
}

impl PhotoQueue {
    pub fn new(photos: Vec<PathBuf>, shuffle: bool, rng: StdRng) -> Self {
        let mut queue = Self {
            photos,
            round: VecDeque::new(),
            shuffle,
            rng,
        };
        queue.refill();
        queue
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn photos(&self) -> &[PathBuf] {
        &self.photos
    }

    pub fn next_photo(&mut self) -> Option<PathBuf> {
        if self.round.is_empty() {
            self.refill();
        }
        self.round.pop_front()
    }

    /// Add a newly discovered photo; it joins the current round at the back.
    pub fn add(&mut self, path: PathBuf) {
        if self.photos.contains(&path) {
            return;
        }
        self.round.push_back(path.clone());
        self.photos.push(path);
    }

    /// Forget a photo that failed to decode or was deleted.
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.photos.len();
        self.photos.retain(|p| p != path);
        self.round.retain(|p| p != path);
        let removed = self.photos.len() != before;
        if removed {
            debug!(path = %path.display(), remaining = self.photos.len(), "removed photo from queue");
        }
        removed
    }

    fn refill(&mut self) {
        let mut next = self.photos.clone();
        if self.shuffle {
            next.shuffle(&mut self.rng);
        }
        self.round = next.into();
    }
}
