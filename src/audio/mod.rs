pub mod buffer;
pub mod player;

pub use buffer::{Pcm, PcmError};
pub use player::{AudioPlayerError, CpalTransport};
