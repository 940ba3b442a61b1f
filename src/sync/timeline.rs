//! Named track registry evaluated once per frame.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::sync::track::{Keyframe, Track, TrackError};

/// Error type for track lookups and edits
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Unknown track: {0}")]
    UnknownTrack(String),
    #[error("Track error: {0}")]
    Track(#[from] TrackError),
}

/// Stable handle to a registered track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle(usize);

/// An edit supplied by the live-editing collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackEdit {
    SetKey { track: String, key: Keyframe },
    DeleteKey { track: String, row: i32 },
}

/// Mapping from track name to track.
///
/// The renderer only ever reads through `evaluate`; edits arrive from the
/// editor link between frames, so a frame always sees a consistent snapshot.
#[derive(Debug, Clone, Default)]
pub struct TimelineEvaluator {
    tracks: Vec<Track>,
    index: HashMap<String, TrackHandle>,
}

impl TimelineEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a track, replacing the keys of an existing track with the same name.
    /// Handles stay valid across replacement.
    pub fn insert(&mut self, track: Track) -> TrackHandle {
        if let Some(&handle) = self.index.get(&track.name) {
            self.tracks[handle.0] = track;
            return handle;
        }
        let handle = TrackHandle(self.tracks.len());
        self.index.insert(track.name.clone(), handle);
        self.tracks.push(track);
        handle
    }

    /// Look up a track by name
    pub fn get_track(&self, name: &str) -> Result<TrackHandle, SyncError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SyncError::UnknownTrack(name.to_string()))
    }

    /// Evaluate a track at a fractional row
    #[inline]
    pub fn evaluate(&self, handle: TrackHandle, row: f64) -> f32 {
        self.tracks[handle.0].evaluate(row)
    }

    pub fn track(&self, handle: TrackHandle) -> &Track {
        &self.tracks[handle.0]
    }

    /// Apply a live edit. Edits to names never seen before register a new track.
    pub fn apply(&mut self, edit: &TrackEdit) {
        match edit {
            TrackEdit::SetKey { track, key } => {
                let handle = self.ensure(track);
                self.tracks[handle.0].set_key(*key);
            }
            TrackEdit::DeleteKey { track, row } => {
                if let Ok(handle) = self.get_track(track) {
                    self.tracks[handle.0].remove_key(*row);
                }
            }
        }
    }

    fn ensure(&mut self, name: &str) -> TrackHandle {
        match self.get_track(name) {
            Ok(handle) => handle,
            Err(_) => self.insert(Track::new(name)),
        }
    }

    /// Number of registered tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Registered track names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|t| t.name.as_str())
    }
}
