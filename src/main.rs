//! Binary entrypoint for the photo mosaic installation.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use photo_mosaic::cache::TextureCache;
use photo_mosaic::config::{Configuration, SamplingMode};
use photo_mosaic::error::Error;
use photo_mosaic::events::{InvalidPhoto, InventoryEvent, LoadPhoto, PhotoLoaded};
use photo_mosaic::mosaic::actions::Action;
use photo_mosaic::mosaic::system::PhotoSystem;
use photo_mosaic::processing::continuous::ContinuousSampler;
use photo_mosaic::processing::formation::Formation;
use photo_mosaic::processing::grid::GridSampler;
use photo_mosaic::settings::InstallationSettings;
use photo_mosaic::tasks;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_SETTINGS_FILE: &str = "mosaic-config.json";

#[derive(Debug, Parser)]
#[command(
    name = "photo-mosaic",
    version,
    about = "Assemble a logo out of photos"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Installation settings JSON (overrides settings-path in the config)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Deterministic RNG seed for shuffles and motion
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Print the sampled logo as JSON and exit
    #[arg(long)]
    dump_grid: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("photo_mosaic={level}").parse()?)
        .add_directive("notify=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?
        .validated()
        .context("validating configuration")?;

    let settings_path = cli
        .settings
        .clone()
        .or_else(|| cfg.settings_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = InstallationSettings::load_or_create(&settings_path, &cfg)
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;
    cfg.apply_settings(&settings);

    let logo = cfg
        .logo_path
        .clone()
        .ok_or_else(|| Error::ConfigurationMissing("logo-path".into()))?;

    if cli.dump_grid {
        let json = match cfg.sampler.mode {
            SamplingMode::Grid => serde_json::to_string_pretty(
                &GridSampler::from(&cfg.sampler).sample_file(&logo)?,
            )?,
            SamplingMode::Continuous => serde_json::to_string_pretty(
                &ContinuousSampler::from(&cfg.sampler).sample_file(&logo)?,
            )?,
        };
        println!("{json}");
        return Ok(());
    }

    let formation = sample_logo(&cfg, &logo)
        .with_context(|| format!("sampling logo {}", logo.display()))?;
    info!(
        targets = formation.len(),
        cell_size = formation.cell_size,
        mode = ?cfg.sampler.mode,
        "logo sampled"
    );

    let seed = cli.seed.or(cfg.startup_shuffle_seed);
    let system = PhotoSystem::new(cfg.clone(), formation, seed);
    let cache = TextureCache::new(&cfg.loader);

    // Channels (small/bounded)
    let (inv_tx, inv_rx) = mpsc::channel::<InventoryEvent>(128); // Files -> Driver
    let (load_tx, load_rx) = mpsc::channel::<LoadPhoto>(16); // Driver -> Loader
    let (loaded_tx, loaded_rx) = mpsc::channel::<PhotoLoaded>(16); // Loader -> Driver
    let (invalid_tx, invalid_rx) = mpsc::channel::<InvalidPhoto>(16); // Loader -> Driver
    let (control_tx, control_rx) = mpsc::channel::<Action>(16); // Stdin -> Driver
    let (frames_tx, mut frames_rx) = watch::channel(system.frame());

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    // PhotoFiles
    tasks.spawn({
        let root = cfg.photo_library_path.clone();
        let cancel = cancel.clone();
        async move {
            tasks::files::run(root, inv_tx, cancel)
                .await
                .context("files task failed")
        }
    });

    // PhotoLoader
    tasks.spawn({
        let cancel = cancel.clone();
        let cache = cache.clone();
        let max_in_flight = cfg.loader.max_concurrent_loads;
        async move {
            tasks::loader::run(cache, load_rx, loaded_tx, invalid_tx, cancel, max_in_flight)
                .await
                .context("loader task failed")
        }
    });

    // Driver
    tasks.spawn({
        let cancel = cancel.clone();
        let tick = cfg.tick_interval();
        let channels = tasks::driver::DriverChannels {
            control_rx,
            inventory_rx: inv_rx,
            loaded_rx,
            invalid_rx,
            load_tx,
            frames: frames_tx,
        };
        async move {
            tasks::driver::run(system, channels, cache, tick, cancel)
                .await
                .context("driver task failed")
        }
    });

    // Control input
    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            tasks::control::run(BufReader::new(tokio::io::stdin()), control_tx, cancel)
                .await
                .context("control task failed")
        }
    });

    // Frame observer: log state changes and status messages
    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            let mut last = {
                let frame = frames_rx.borrow();
                (frame.state, frame.status.clone())
            };
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = frames_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let frame = frames_rx.borrow_and_update();
                        let current = (frame.state, frame.status.clone());
                        if current != last {
                            info!(
                                state = ?frame.state,
                                photos = frame.photos.len(),
                                status = frame.status.as_deref().unwrap_or(""),
                                "installation"
                            );
                            last = current;
                        }
                    }
                }
            }
            anyhow::Ok(())
        }
    });

    // Drain JoinSet (wait for tasks to complete)
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("task error: {e:?}");
                cancel.cancel();
            }
            Err(e) => {
                tracing::error!("join error: {e}");
                cancel.cancel();
            }
        }
    }

    Ok(())
}

fn sample_logo(cfg: &Configuration, logo: &std::path::Path) -> Result<Formation> {
    let formation = match cfg.sampler.mode {
        SamplingMode::Grid => GridSampler::from(&cfg.sampler).sample_file(logo)?.formation()?,
        SamplingMode::Continuous => ContinuousSampler::from(&cfg.sampler).sample_file(logo)?,
    };
    Ok(formation)
}
