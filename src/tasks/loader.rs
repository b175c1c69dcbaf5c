use crate::cache::TextureCache;
use crate::events::{InvalidPhoto, LoadPhoto, PhotoLoaded};
use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Resolve load requests through the shared texture cache.
///
/// - Accepts requests only while fewer than `max_in_flight` are running.
/// - A path already in flight is not requested twice.
/// - Decoded textures go out as `PhotoLoaded`; failures as `InvalidPhoto`.
#[instrument(skip_all, fields(max_in_flight = max_in_flight))]
pub async fn run(
    cache: TextureCache,
    mut load_rx: Receiver<LoadPhoto>,
    loaded_tx: Sender<PhotoLoaded>,
    invalid_tx: Sender<InvalidPhoto>,
    cancel: CancellationToken,
    max_in_flight: usize,
) -> Result<()> {
    let max_in_flight = max_in_flight.max(1);
    let mut in_flight: HashSet<PathBuf> = HashSet::new();
    let mut tasks = JoinSet::new();

    loop {
        select! {
            _ = cancel.cancelled() => break,

            // Accept new load requests while under limit
            Some(LoadPhoto(path)) = load_rx.recv(), if in_flight.len() < max_in_flight => {
                if in_flight.insert(path.clone()) {
                    let cache = cache.clone();
                    tasks.spawn(async move {
                        let res = cache.get_or_load(&path).await;
                        (path, res)
                    });
                } else {
                    debug!(path = %path.display(), "already loading");
                }
            }

            // Handle completed loads as they finish
            Some(join_res) = tasks.join_next() => {
                let Ok((path, res)) = join_res else {
                    warn!("load task panicked or was cancelled");
                    continue;
                };
                in_flight.remove(&path);
                match res {
                    Ok(texture) => {
                        debug!(path = %path.display(), "loaded");
                        let _ = loaded_tx.send(PhotoLoaded(texture)).await;
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "invalid photo");
                        let _ = invalid_tx.send(InvalidPhoto(path)).await;
                    }
                }
            }

            else => break,
        }
    }
    Ok(())
}
