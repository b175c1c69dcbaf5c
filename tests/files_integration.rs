use photo_mosaic::events::InventoryEvent;
use photo_mosaic::tasks::files;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn startup_scan_emits_top_level_photos_only() {
    let tmp = tempdir().unwrap();
    let lib = tmp.path().join("lib");
    fs::create_dir_all(lib.join("nested")).unwrap();

    // Create files before the task starts (startup scan)
    fs::write(lib.join("a.jpg"), b"x").unwrap();
    fs::write(lib.join("b.PNG"), b"x").unwrap();
    fs::write(lib.join("nested").join("c.jpeg"), b"x").unwrap();
    fs::write(lib.join("d.txt"), b"x").unwrap();

    let (inv_tx, mut inv_rx) = mpsc::channel::<InventoryEvent>(16);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(files::run(lib.clone(), inv_tx, cancel.clone()));

    let mut added: Vec<PathBuf> = Vec::new();
    while added.len() < 2 {
        let ev = tokio::time::timeout(Duration::from_secs(5), inv_rx.recv())
            .await
            .expect("timeout waiting for inventory event")
            .expect("files task closed its channel");
        match ev {
            InventoryEvent::PhotoAdded(p) => added.push(p),
            other => panic!("unexpected event before the scan finished: {other:?}"),
        }
    }
    added.sort();
    assert_eq!(added, vec![lib.join("a.jpg"), lib.join("b.PNG")]);

    // the scan closes with a marker once every photo is reported
    let done = tokio::time::timeout(Duration::from_secs(5), inv_rx.recv())
        .await
        .expect("timeout waiting for scan marker");
    assert!(matches!(done, Some(InventoryEvent::ScanComplete)), "got {done:?}");

    // nothing else arrives from the startup scan
    let extra = tokio::time::timeout(Duration::from_millis(200), inv_rx.recv()).await;
    assert!(extra.is_err(), "unexpected event: {extra:?}");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_folder_still_reports_scan_complete() {
    let tmp = tempdir().unwrap();
    let lib = tmp.path().join("empty");
    fs::create_dir_all(&lib).unwrap();

    let (inv_tx, mut inv_rx) = mpsc::channel::<InventoryEvent>(16);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(files::run(lib, inv_tx, cancel.clone()));

    let first = tokio::time::timeout(Duration::from_secs(5), inv_rx.recv())
        .await
        .expect("timeout waiting for scan marker");
    assert!(matches!(first, Some(InventoryEvent::ScanComplete)), "got {first:?}");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_folder_is_created() {
    let tmp = tempdir().unwrap();
    let lib = tmp.path().join("Photos");
    assert!(!lib.exists());

    let (inv_tx, _inv_rx) = mpsc::channel::<InventoryEvent>(16);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(files::run(lib.clone(), inv_tx, cancel.clone()));

    // the scan runs before the watcher; wait for it
    for _ in 0..50 {
        if lib.is_dir() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(lib.is_dir());

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_photo_is_reported() {
    let tmp = tempdir().unwrap();
    let lib = tmp.path().join("lib");
    fs::create_dir_all(&lib).unwrap();

    let (inv_tx, mut inv_rx) = mpsc::channel::<InventoryEvent>(16);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(files::run(lib.clone(), inv_tx, cancel.clone()));

    // give the watcher time to register
    tokio::time::sleep(Duration::from_millis(300)).await;
    let fresh = lib.join("fresh.jpg");
    fs::write(&fresh, b"x").unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut seen = false;
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(500), inv_rx.recv()).await {
            Ok(Some(InventoryEvent::PhotoAdded(p))) if p.file_name() == fresh.file_name() => {
                seen = true;
                break;
            }
            Ok(Some(_)) | Err(_) => continue,
            Ok(None) => break,
        }
    }
    assert!(seen, "no PhotoAdded for {}", fresh.display());

    cancel.cancel();
    handle.await.unwrap().unwrap();
}
