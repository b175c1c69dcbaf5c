use std::path::PathBuf;

use thiserror::Error;

use crate::mosaic::actions::Action;
use crate::mosaic::sequencer::Key;

/// Library error type for mosaic operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A reference the operation depends on was never configured.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(String),

    /// A source image or the photo folder does not exist and could not be provided.
    #[error("asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    /// A single image failed to decode.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A decoded image could not be resampled to the texture size.
    #[error("failed to resample {}: {reason}", path.display())]
    Resample { path: PathBuf, reason: String },

    /// The sequencer expected a different key.
    #[error("wrong key '{got}', expected '{expected}'")]
    InvalidSequenceInput { expected: Key, got: Key },

    /// The effect started by the previous key is still running.
    #[error("effect still running; '{expected}' is accepted once it completes")]
    SequenceBusy { expected: Key },

    /// The action cannot run in the current state.
    #[error("{action} unavailable: {reason}")]
    ActionUnavailable { action: Action, reason: &'static str },

    /// Sampling or discovery produced nothing usable.
    #[error("{0} produced no usable entries")]
    EmptyResultSet(&'static str),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    /// JSON installation settings error.
    #[error(transparent)]
    Settings(#[from] serde_json::Error),
}
