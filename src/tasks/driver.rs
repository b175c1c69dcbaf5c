use crate::cache::TextureCache;
use crate::events::{InvalidPhoto, InventoryEvent, LoadPhoto, PhotoLoaded};
use crate::mosaic::actions::Action;
use crate::mosaic::system::{Frame, PhotoSystem};
use anyhow::Result;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Channels the driver reads from and writes to.
pub struct DriverChannels {
    pub control_rx: Receiver<Action>,
    pub inventory_rx: Receiver<InventoryEvent>,
    pub loaded_rx: Receiver<PhotoLoaded>,
    pub invalid_rx: Receiver<InvalidPhoto>,
    pub load_tx: Sender<LoadPhoto>,
    pub frames: watch::Sender<Frame>,
}

/// Own the controller and advance it at a fixed rate.
///
/// Load requests are handed to the loader without blocking; whatever does
/// not fit in its queue waits in a local backlog for the next turn.
/// Control input is held until the startup scan has been delivered, and
/// cached textures are dropped whenever their file is added, removed or
/// fails to decode.
#[instrument(skip_all, fields(tick_ms = tick.as_millis() as u64))]
pub async fn run(
    mut system: PhotoSystem,
    mut ch: DriverChannels,
    cache: TextureCache,
    tick: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();
    let mut backlog: VecDeque<PathBuf> = VecDeque::new();
    let mut scanned = false;
    let mut inventory_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting driver task");
                break;
            }

            now = ticker.tick() => {
                let dt = now.saturating_duration_since(last);
                last = now;
                system.tick(dt.as_secs_f32());
                ch.frames.send_replace(system.frame());
            }

            Some(action) = ch.control_rx.recv(), if scanned => {
                // rejections are logged and shown by the controller
                let _ = system.handle(action);
                ch.frames.send_replace(system.frame());
            }

            event = ch.inventory_rx.recv(), if inventory_open => match event {
                Some(event) => {
                    match &event {
                        InventoryEvent::PhotoAdded(path) | InventoryEvent::PhotoRemoved(path) => {
                            if cache.evict(path) {
                                debug!(path = %path.display(), "dropped cached texture");
                            }
                        }
                        InventoryEvent::ScanComplete => scanned = true,
                    }
                    system.inventory(event);
                }
                None => {
                    inventory_open = false;
                    if !scanned {
                        warn!("inventory closed before the startup scan finished");
                        scanned = true;
                    }
                }
            },

            Some(PhotoLoaded(texture)) = ch.loaded_rx.recv() => system.photo_loaded(texture),

            Some(InvalidPhoto(path)) = ch.invalid_rx.recv() => {
                cache.evict(&path);
                system.photo_failed(&path);
            }
        }

        backlog.extend(system.take_load_requests());
        flush_requests(&mut backlog, &ch.load_tx);
    }
    Ok(())
}

fn flush_requests(backlog: &mut VecDeque<PathBuf>, load_tx: &Sender<LoadPhoto>) {
    while let Some(path) = backlog.pop_front() {
        match load_tx.try_send(LoadPhoto(path)) {
            Ok(()) => {}
            Err(TrySendError::Full(LoadPhoto(path))) => {
                backlog.push_front(path);
                debug!(waiting = backlog.len(), "loader queue full");
                break;
            }
            Err(TrySendError::Closed(_)) => {
                warn!(dropped = backlog.len() + 1, "loader gone; dropping load requests");
                backlog.clear();
                break;
            }
        }
    }
}
