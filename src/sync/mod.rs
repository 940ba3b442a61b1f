//! Track data: keyframed curves, the evaluator that owns them, the standalone
//! track file and the live-editing link.

pub mod link;
pub mod source;
pub mod timeline;
pub mod track;
pub mod tracks;

pub use link::{channel_link, ChannelLink, EditorCommand, EditorEndpoint, EditorLink, Standalone};
pub use source::{load_tracks, TrackFile, TrackFileError};
pub use timeline::{SyncError, TimelineEvaluator, TrackEdit, TrackHandle};
pub use track::{Interpolation, Keyframe, Track, TrackError};
pub use tracks::{DemoTracks, FrameValues, TRACK_NAMES};
