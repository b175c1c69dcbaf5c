use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::PhotoTexture;

#[derive(Debug)]
pub enum InventoryEvent {
    PhotoAdded(PathBuf),
    PhotoRemoved(PathBuf),
    /// Every photo found by the startup scan has been reported.
    ScanComplete,
}

#[derive(Debug)]
pub struct LoadPhoto(pub PathBuf);

#[derive(Debug)]
pub struct PhotoLoaded(pub Arc<PhotoTexture>);

#[derive(Debug)]
pub struct InvalidPhoto(pub PathBuf);
