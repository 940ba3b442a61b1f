//! vlee: a synchronised real-time demo player.
//!
//! Track values keyed to musical rows drive a fixed chain of render passes.
//! The audio transport is the master clock; an optional editor link edits
//! tracks and moves the playhead while the demo runs.

pub mod assets;
pub mod audio;
pub mod camera;
pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod particles;
pub mod playback;
pub mod render;
pub mod sync;

pub use config::Config;
pub use error::PlayerError;
