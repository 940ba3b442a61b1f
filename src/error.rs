//! Top-level error type for the player.

use crate::assets::AssetError;
use crate::audio::{AudioPlayerError, PcmError};
use crate::config::ConfigError;
use crate::export::ExportError;
use crate::playback::SessionError;
use crate::render::RenderError;
use crate::sync::{SyncError, TrackFileError};

/// Any failure that stops the player
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Track file error: {0}")]
    TrackFile(#[from] TrackFileError),
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("Tune error: {0}")]
    Pcm(#[from] PcmError),
    #[error("Audio error: {0}")]
    Audio(#[from] AudioPlayerError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
    #[error("Window error: {0}")]
    Window(String),
}
