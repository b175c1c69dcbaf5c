use crate::events::InventoryEvent;
use crate::library::{discover, is_supported_image};
use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use rand::seq::SliceRandom;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Scan the photo folder once, then forward changes to its top level.
///
/// Photos are never deleted here; a file that fails to decode is only
/// dropped from the controller's inventory.
#[instrument(skip(to_driver, cancel), fields(root = %root.display()))]
pub async fn run(
    root: PathBuf,
    to_driver: Sender<InventoryEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    // 1) Startup scan (top level only) -> shuffle, emit
    let mut initial = discover(&root)
        .with_context(|| format!("scanning photo folder {}", root.display()))?;
    initial.shuffle(&mut rand::rng());
    for path in &initial {
        debug!(action = "startup_add", path = %path.display());
        let _ = to_driver.send(InventoryEvent::PhotoAdded(path.clone())).await;
    }
    let _ = to_driver.send(InventoryEvent::ScanComplete).await;
    info!(discovered = initial.len(), "startup scan complete (shuffled)");

    // 2) Bridge notify callback -> async channel
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;
    watcher.watch(&root, RecursiveMode::NonRecursive)?;
    match root.canonicalize() {
        Ok(abs) => info!(watching = %abs.display(), "notify watcher initialized"),
        Err(_) => info!(watching = %root.display(), "notify watcher initialized"),
    }

    // 3) Event loop
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting files task");
                break;
            }

            Some(res) = watch_rx.recv() => match res {
                Ok(event) => {
                    debug!(kind = ?event.kind, paths = ?event.paths, "notify event");
                    for inv in classify(event) {
                        let _ = to_driver.send(inv).await;
                    }
                }
                Err(err) => error!("watch error: {err}"),
            }
        }
    }
    Ok(())
}

/// Translate a notify event into inventory changes.
///
/// The watch is non-recursive, so every reported path sits at the top level.
fn classify(event: Event) -> Vec<InventoryEvent> {
    let photos = event
        .paths
        .into_iter()
        .filter(|p| is_supported_image(p) && !p.is_dir());
    match event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => {
            photos.map(InventoryEvent::PhotoAdded).collect()
        }
        EventKind::Remove(RemoveKind::File | RemoveKind::Any) => {
            photos.map(InventoryEvent::PhotoRemoved).collect()
        }
        // macOS often reports moves as Name(Any). Decide per-path by existence.
        EventKind::Modify(ModifyKind::Name(_)) => photos
            .map(|p| {
                if p.exists() {
                    InventoryEvent::PhotoAdded(p)
                } else {
                    InventoryEvent::PhotoRemoved(p)
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    #[test]
    fn ignores_unsupported_files() {
        let root = Path::new("/photos");
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(root.join("a.JPG"))
            .add_path(root.join("clip.mov"))
            .add_path(root.join("notes.txt"));
        let got = classify(event);
        assert_eq!(got.len(), 1);
        assert!(matches!(&got[0], InventoryEvent::PhotoAdded(p) if p == &root.join("a.JPG")));
    }

    #[test]
    fn renames_are_classified_by_existence() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("here.png");
        std::fs::write(&present, b"x").unwrap();
        let gone = dir.path().join("gone.png");
        let event = Event::new(EventKind::Modify(ModifyKind::Name(
            notify::event::RenameMode::Any,
        )))
        .add_path(present.clone())
        .add_path(gone.clone());
        let got = classify(event);
        assert!(matches!(&got[0], InventoryEvent::PhotoAdded(p) if p == &present));
        assert!(matches!(&got[1], InventoryEvent::PhotoRemoved(p) if p == &gone));
    }
}
