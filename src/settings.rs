//! Installation settings: the small JSON document operators edit on site.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::Configuration;
use crate::error::Error;

const INSTRUCTIONS: &str =
    "Edit this file to change settings. Restart the application after making changes.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallationSettings {
    pub photo_folder_path: PathBuf,
    pub enable_sequencer: bool,
    /// Seconds the sequenced scatter floats before settling.
    #[serde(rename = "sequencer3DEffectDuration")]
    pub sequencer_3d_effect_duration: f32,
    pub instructions: String,
}

impl Default for InstallationSettings {
    fn default() -> Self {
        Self {
            photo_folder_path: PathBuf::from("Photos"),
            enable_sequencer: true,
            sequencer_3d_effect_duration: 10.0,
            instructions: INSTRUCTIONS.to_owned(),
        }
    }
}

impl InstallationSettings {
    /// Settings mirroring the values already in `cfg`.
    pub fn from_configuration(cfg: &Configuration) -> Self {
        Self {
            photo_folder_path: cfg.photo_library_path.clone(),
            enable_sequencer: cfg.sequencer.enabled,
            sequencer_3d_effect_duration: cfg.sequencer.effect_3d_duration.as_secs_f32(),
            instructions: INSTRUCTIONS.to_owned(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Load the settings at `path`, writing defaults taken from `cfg` when the
    /// file does not exist yet.
    ///
    /// A file that is not valid JSON is reported and left untouched; the
    /// defaults are used for this run.
    pub fn load_or_create(path: &Path, cfg: &Configuration) -> Result<Self, Error> {
        if !path.exists() {
            let settings = Self::from_configuration(cfg);
            match settings.save(path) {
                Ok(()) => info!(path = %path.display(), "wrote default installation settings"),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "could not write installation settings")
                }
            }
            return Ok(settings);
        }
        match Self::load(path) {
            Ok(settings) => {
                info!(
                    path = %path.display(),
                    photos = %settings.photo_folder_path.display(),
                    sequencer = settings.enable_sequencer,
                    "loaded installation settings"
                );
                Ok(settings)
            }
            Err(Error::Settings(err)) => {
                error!(path = %path.display(), error = %err, "malformed installation settings; using defaults");
                Ok(Self::from_configuration(cfg))
            }
            Err(err) => Err(err),
        }
    }
}
