//! Standalone track data loaded from a JSON document.
//!
//! ```json
//! { "tracks": { "cam.dist": [ { "row": 0, "value": 10.0, "interp": "smooth" } ] } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::sync::timeline::TimelineEvaluator;
use crate::sync::track::{Keyframe, Track, TrackError};

/// Error type for track file loading
#[derive(Debug, thiserror::Error)]
pub enum TrackFileError {
    #[error("Failed to read track file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed track file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid track: {0}")]
    Track(#[from] TrackError),
}

/// On-disk representation of every track
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackFile {
    pub tracks: BTreeMap<String, Vec<Keyframe>>,
}

impl TrackFile {
    /// Parse a track document
    pub fn parse(json: &str) -> Result<Self, TrackFileError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the evaluator, validating key order per track
    pub fn into_timeline(self) -> Result<TimelineEvaluator, TrackFileError> {
        let mut timeline = TimelineEvaluator::new();
        for (name, keys) in self.tracks {
            timeline.insert(Track::from_keys(name, keys)?);
        }
        Ok(timeline)
    }
}

/// Load a track file from disk into an evaluator
pub fn load_tracks(path: &Path) -> Result<TimelineEvaluator, TrackFileError> {
    let json = std::fs::read_to_string(path).map_err(|source| TrackFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let timeline = TrackFile::parse(&json)?.into_timeline()?;
    tracing::info!(tracks = timeline.len(), path = %path.display(), "loaded track data");
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::track::Interpolation;

    const DOC: &str = r#"{
        "tracks": {
            "part": [ { "row": 0, "value": 0, "interp": "step" }, { "row": 64, "value": 1, "interp": "step" } ],
            "cam.dist": [ { "row": 0, "value": 10.0 }, { "row": 10, "value": 20.0, "interp": "smooth" } ],
            "cm.fade": []
        }
    }"#;

    #[test]
    fn test_parse() {
        let file = TrackFile::parse(DOC).unwrap();
        assert_eq!(file.tracks.len(), 3);
        // Interpolation defaults to linear
        assert_eq!(file.tracks["cam.dist"][0].interp, Interpolation::Linear);
        assert_eq!(file.tracks["part"][1].interp, Interpolation::Step);
    }

    #[test]
    fn test_into_timeline() {
        let timeline = TrackFile::parse(DOC).unwrap().into_timeline().unwrap();
        let part = timeline.get_track("part").unwrap();
        let dist = timeline.get_track("cam.dist").unwrap();
        let fade = timeline.get_track("cm.fade").unwrap();
        assert_eq!(timeline.evaluate(part, 63.9), 0.0);
        assert_eq!(timeline.evaluate(part, 64.0), 1.0);
        assert_eq!(timeline.evaluate(dist, 5.0), 15.0);
        assert_eq!(timeline.evaluate(fade, 5.0), 0.0);
    }

    #[test]
    fn test_duplicate_rows_fail() {
        let doc = r#"{ "tracks": { "x": [ { "row": 1, "value": 0 }, { "row": 1, "value": 2 } ] } }"#;
        let result = TrackFile::parse(doc).unwrap().into_timeline();
        assert!(matches!(result, Err(TrackFileError::Track(_))));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(TrackFile::parse("{ not json"), Err(TrackFileError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_tracks(Path::new("definitely/not/here.json"));
        assert!(matches!(result, Err(TrackFileError::Io { .. })));
    }
}
