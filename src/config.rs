//! Player configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Every field has a default, so an empty file is a valid config
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub bpm: f64,
    pub rows_per_beat: u32,
    /// Rows added to the playhead while editing, so the row shown in the
    /// editor is the one being heard
    pub live_lookahead_rows: f64,

    pub demo_aspect: f32,
    /// Physical aspect of the display; `None` uses the window's pixel aspect
    pub monitor_aspect: Option<f32>,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub vsync: bool,

    pub data_dir: PathBuf,
    /// Relative to `data_dir`
    pub tracks_file: PathBuf,
    /// Raw interleaved little-endian f32 samples, relative to `data_dir`
    pub tune_file: PathBuf,
    pub tune_sample_rate: u32,
    pub tune_channels: u16,

    /// Sprites per particle flush
    pub particle_capacity: usize,
    pub cloud_particles: usize,
    /// Colour-map files relative to `data_dir`; `None` enumerates
    /// `color_maps/0000.png` onward
    pub color_maps: Option<Vec<String>>,

    pub live: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bpm: 175.0,
            rows_per_beat: 8,
            live_lookahead_rows: 0.005,
            demo_aspect: 16.0 / 9.0,
            monitor_aspect: None,
            width: 1280,
            height: 720,
            fullscreen: false,
            vsync: true,
            data_dir: PathBuf::from("data"),
            tracks_file: PathBuf::from("sync.json"),
            tune_file: PathBuf::from("tune.pcm"),
            tune_sample_rate: 44_100,
            tune_channels: 2,
            particle_capacity: 1024,
            cloud_particles: 30_000,
            color_maps: None,
            live: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.bpm > 0.0) {
            return Err(ConfigError::Invalid(format!("bpm must be positive, got {}", self.bpm)));
        }
        if self.rows_per_beat == 0 {
            return Err(ConfigError::Invalid("rows_per_beat must be at least 1".into()));
        }
        if !(self.demo_aspect > 0.0) || self.monitor_aspect.is_some_and(|a| !(a > 0.0)) {
            return Err(ConfigError::Invalid("aspect ratios must be positive".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.particle_capacity == 0 {
            return Err(ConfigError::Invalid("particle_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn tracks_path(&self) -> PathBuf {
        self.data_dir.join(&self.tracks_file)
    }

    pub fn tune_path(&self) -> PathBuf {
        self.data_dir.join(&self.tune_file)
    }
}
