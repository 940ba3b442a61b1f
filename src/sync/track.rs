//! Keyframed animation tracks.
//!
//! Keyframes are stored sorted by row with unique rows, so evaluation is a
//! binary search for the bracketing pair followed by one interpolation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error type for track operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    /// Two keyframes share a row
    DuplicateKey { track: String, row: i32 },
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::DuplicateKey { track, row } => {
                write!(f, "Track '{}' has more than one key at row {}", track, row)
            }
        }
    }
}

impl std::error::Error for TrackError {}

/// How a segment moves from its start key to the next key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Hold the start value until the next key
    Step,
    #[default]
    Linear,
    /// Smoothstep ease, zero slope at both ends
    Smooth,
}

impl Interpolation {
    /// Shape a segment fraction in `[0, 1]`
    #[inline]
    pub fn shape(self, t: f64) -> f64 {
        match self {
            Interpolation::Step => 0.0,
            Interpolation::Linear => t,
            Interpolation::Smooth => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// A single sample point on a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub row: i32,
    pub value: f32,
    #[serde(default)]
    pub interp: Interpolation,
}

impl Keyframe {
    pub fn new(row: i32, value: f32, interp: Interpolation) -> Self {
        Self { row, value, interp }
    }
}

/// A named value curve over rows.
///
/// Evaluation clamps outside the keyed range and is exact at every key.
/// An empty track evaluates to 0.0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    pub name: String,
    keys: Vec<Keyframe>, // Sorted by row, unique rows
}

impl Track {
    /// Create an empty track
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
        }
    }

    /// Create a track from keys in any order.
    ///
    /// Returns `Err(TrackError::DuplicateKey)` if two keys share a row.
    pub fn from_keys(name: impl Into<String>, mut keys: Vec<Keyframe>) -> Result<Self, TrackError> {
        let name = name.into();
        keys.sort_by_key(|k| k.row);
        if let Some(pair) = keys.windows(2).find(|w| w[0].row == w[1].row) {
            return Err(TrackError::DuplicateKey {
                track: name,
                row: pair[0].row,
            });
        }
        Ok(Self { name, keys })
    }

    /// Insert a key, replacing any key already at the same row
    pub fn set_key(&mut self, key: Keyframe) {
        match self.keys.binary_search_by_key(&key.row, |k| k.row) {
            Ok(idx) => self.keys[idx] = key,
            Err(idx) => self.keys.insert(idx, key),
        }
    }

    /// Remove the key at a row
    pub fn remove_key(&mut self, row: i32) -> Option<Keyframe> {
        self.keys
            .binary_search_by_key(&row, |k| k.row)
            .ok()
            .map(|idx| self.keys.remove(idx))
    }

    /// Keys in row order
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Evaluate the curve at a fractional row
    pub fn evaluate(&self, row: f64) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if row <= first.row as f64 {
            return first.value;
        }
        if row >= last.row as f64 {
            return last.value;
        }

        // Number of keys at or before `row`; both neighbours exist after the clamps above
        let idx = self.keys.partition_point(|k| k.row as f64 <= row);
        let k0 = &self.keys[idx - 1];
        let k1 = &self.keys[idx];

        let span = (k1.row - k0.row) as f64;
        let t = k0.interp.shape((row - k0.row as f64) / span);
        (k0.value as f64 + (k1.value as f64 - k0.value as f64) * t) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ramp(interp: Interpolation) -> Track {
        Track::from_keys(
            "ramp",
            vec![Keyframe::new(0, 0.0, interp), Keyframe::new(10, 1.0, interp)],
        )
        .unwrap()
    }

    #[test_case(5.0, 0.5 ; "midpoint")]
    #[test_case(-3.0, 0.0 ; "clamped before first key")]
    #[test_case(20.0, 1.0 ; "clamped after last key")]
    #[test_case(2.5, 0.25 ; "quarter")]
    fn test_linear(row: f64, expected: f32) {
        assert!((ramp(Interpolation::Linear).evaluate(row) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_step_holds_start_value() {
        let track = ramp(Interpolation::Step);
        assert_eq!(track.evaluate(0.0), 0.0);
        assert_eq!(track.evaluate(9.99), 0.0);
        assert_eq!(track.evaluate(10.0), 1.0);
    }

    #[test]
    fn test_smooth_is_symmetric_and_eased() {
        let track = ramp(Interpolation::Smooth);
        assert!((track.evaluate(5.0) - 0.5).abs() < 1e-6);
        // Eased start lags linear, eased end leads it
        assert!(track.evaluate(1.0) < 0.1);
        assert!(track.evaluate(9.0) > 0.9);
    }

    #[test]
    fn test_exact_at_every_key() {
        for interp in [Interpolation::Step, Interpolation::Linear, Interpolation::Smooth] {
            let track = Track::from_keys(
                "keys",
                vec![
                    Keyframe::new(0, 3.0, interp),
                    Keyframe::new(4, -1.0, Interpolation::Step),
                    Keyframe::new(9, 7.5, interp),
                    Keyframe::new(12, 2.0, interp),
                ],
            )
            .unwrap();
            for key in track.keys() {
                assert_eq!(track.evaluate(key.row as f64), key.value, "{:?} at {}", interp, key.row);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let track = ramp(Interpolation::Smooth);
        let a = track.evaluate(3.3);
        let b = track.evaluate(3.3);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(Track::new("empty").evaluate(5.0), 0.0);

        let single = Track::from_keys("single", vec![Keyframe::new(3, 2.0, Interpolation::Linear)]).unwrap();
        assert_eq!(single.evaluate(-10.0), 2.0);
        assert_eq!(single.evaluate(100.0), 2.0);
    }

    #[test]
    fn test_duplicate_rows_rejected() {
        let result = Track::from_keys(
            "dup",
            vec![Keyframe::new(2, 0.0, Interpolation::Linear), Keyframe::new(2, 1.0, Interpolation::Linear)],
        );
        assert!(matches!(result, Err(TrackError::DuplicateKey { row: 2, .. })));
    }

    #[test]
    fn test_sorted_order() {
        let track = Track::from_keys(
            "unsorted",
            vec![
                Keyframe::new(20, 2.0, Interpolation::Linear),
                Keyframe::new(0, 0.0, Interpolation::Linear),
                Keyframe::new(10, 1.0, Interpolation::Linear),
            ],
        )
        .unwrap();
        let rows: Vec<i32> = track.keys().iter().map(|k| k.row).collect();
        assert_eq!(rows, vec![0, 10, 20]);
        assert!((track.evaluate(15.0) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_set_and_remove_key() {
        let mut track = ramp(Interpolation::Linear);
        track.set_key(Keyframe::new(5, 4.0, Interpolation::Step));
        assert_eq!(track.keys().len(), 3);
        assert_eq!(track.evaluate(7.0), 4.0);

        // Replacing keeps a single key per row
        track.set_key(Keyframe::new(5, 2.0, Interpolation::Step));
        assert_eq!(track.keys().len(), 3);
        assert_eq!(track.evaluate(5.0), 2.0);

        assert!(track.remove_key(5).is_some());
        assert!(track.remove_key(5).is_none());
        assert!((track.evaluate(5.0) - 0.5).abs() < 1e-6);
    }
}
