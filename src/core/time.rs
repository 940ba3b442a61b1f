//! Row arithmetic for tempo-synchronised playback.
//! The audio transport reports seconds; everything downstream works in rows.

/// Fractional timeline position
pub type Row = f64;

/// Time constants for conversions
pub mod constants {
    pub const SECONDS_PER_MINUTE: f64 = 60.0;
    /// Rows per phase unit used by shake, pulse and light animation
    pub const ROWS_PER_BEAT_PHASE: f64 = 4.0;
}

/// Rows per second for a tempo and row resolution
#[inline]
pub fn row_rate(bpm: f64, rows_per_beat: u32) -> f64 {
    (bpm / constants::SECONDS_PER_MINUTE) * rows_per_beat as f64
}

/// Convert audio seconds to a row
#[inline]
pub fn seconds_to_row(seconds: f64, row_rate: f64) -> Row {
    seconds * row_rate
}

/// Convert a row back to audio seconds
#[inline]
pub fn row_to_seconds(row: Row, row_rate: f64) -> f64 {
    row / row_rate
}

/// Beat phase for a row
#[inline]
pub fn beat(row: Row) -> f64 {
    row / constants::ROWS_PER_BEAT_PHASE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_rate() {
        assert_eq!(row_rate(120.0, 8), 16.0);
        assert_eq!(row_rate(60.0, 4), 4.0);
    }

    #[test]
    fn test_seconds_to_row() {
        let rate = row_rate(120.0, 8);
        assert_eq!(seconds_to_row(1.0, rate), 16.0);
        assert_eq!(seconds_to_row(0.0, rate), 0.0);
    }

    #[test]
    fn test_row_roundtrip() {
        let rate = row_rate(175.0, 8);
        let seconds = 12.345;
        let back = row_to_seconds(seconds_to_row(seconds, rate), rate);
        assert!((back - seconds).abs() < 1e-9);
    }

    #[test]
    fn test_beat() {
        assert_eq!(beat(0.0), 0.0);
        assert_eq!(beat(16.0), 4.0);
    }
}
