//! Audio-driven frame clock.
//! The audio transport is the master clock; rows are derived from it on
//! every read and never stored.

use crate::core::time::{self, Row};
use crate::playback::transport::{AudioClock, TransportControl};

/// Error type for clock reads
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    #[error("Audio transport has not been started")]
    NotStarted,
}

/// Transport request originating from the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Pause,
    Play,
    Seek(i32),
}

/// Converts audio playback position into timeline rows
pub struct FrameClock<A> {
    audio: A,
    row_rate: f64,
    /// Rows added to every read to compensate transport latency
    lookahead: Row,
}

impl<A: AudioClock> FrameClock<A> {
    /// Create a clock for a tempo and row resolution
    pub fn new(audio: A, bpm: f64, rows_per_beat: u32) -> Self {
        Self {
            audio,
            row_rate: time::row_rate(bpm, rows_per_beat),
            lookahead: 0.0,
        }
    }

    /// Bias every read by a fixed number of rows
    pub fn with_lookahead(mut self, rows: Row) -> Self {
        self.lookahead = rows;
        self
    }

    /// Current fractional row
    pub fn current_row(&self) -> Result<Row, ClockError> {
        if !self.audio.is_started() {
            return Err(ClockError::NotStarted);
        }
        Ok(time::seconds_to_row(self.audio.position_seconds(), self.row_rate) + self.lookahead)
    }

    /// Forward a transport request to the audio backend
    pub fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Pause => self.audio.set_paused(true),
            TransportEvent::Play => self.audio.set_paused(false),
            TransportEvent::Seek(row) => {
                self.audio.seek_seconds(time::row_to_seconds(row as f64, self.row_rate));
            }
        }
    }

    pub fn row_rate(&self) -> f64 {
        self.row_rate
    }

    pub fn is_finished(&self) -> bool {
        self.audio.is_finished()
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }
}

impl<A: AudioClock> TransportControl for FrameClock<A> {
    fn set_paused(&mut self, paused: bool) {
        self.on_transport_event(if paused { TransportEvent::Pause } else { TransportEvent::Play });
    }

    fn set_position(&mut self, row: i32) {
        self.on_transport_event(TransportEvent::Seek(row));
    }

    fn is_playing(&self) -> bool {
        self.audio.is_playing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::transport::OfflineClock;

    const LOOKAHEAD: f64 = 0.005;

    fn started(seconds: f64) -> OfflineClock {
        let mut audio = OfflineClock::new(None);
        audio.start();
        audio.seek_seconds(seconds);
        audio
    }

    #[test]
    fn test_not_started() {
        let clock = FrameClock::new(OfflineClock::new(None), 120.0, 8);
        assert_eq!(clock.current_row(), Err(ClockError::NotStarted));
    }

    #[test]
    fn test_standalone_row() {
        let clock = FrameClock::new(started(1.0), 120.0, 8);
        assert_eq!(clock.row_rate(), 16.0);
        assert_eq!(clock.current_row(), Ok(16.0));
    }

    #[test]
    fn test_live_row_has_lookahead() {
        let clock = FrameClock::new(started(1.0), 120.0, 8).with_lookahead(LOOKAHEAD);
        assert_eq!(clock.current_row(), Ok(16.0 + LOOKAHEAD));
    }

    #[test]
    fn test_seek_converts_rows_to_seconds() {
        let mut clock = FrameClock::new(started(0.0), 120.0, 8);
        clock.on_transport_event(TransportEvent::Seek(32));
        assert_eq!(clock.audio().position_seconds(), 2.0);
        assert_eq!(clock.current_row(), Ok(32.0));
    }

    #[test]
    fn test_pause_and_play() {
        let mut clock = FrameClock::new(started(0.0), 120.0, 8);
        clock.set_paused(true);
        assert!(!clock.is_playing());
        clock.audio_mut().advance(1.0);
        assert_eq!(clock.current_row(), Ok(0.0));

        clock.set_paused(false);
        assert!(clock.is_playing());
        clock.audio_mut().advance(0.5);
        assert_eq!(clock.current_row(), Ok(8.0));
    }

    #[test]
    fn test_rows_non_decreasing_without_seek() {
        let mut clock = FrameClock::new(started(0.0), 175.0, 8);
        let mut last = clock.current_row().unwrap();
        for _ in 0..100 {
            clock.audio_mut().advance(1.0 / 60.0);
            let row = clock.current_row().unwrap();
            assert!(row >= last);
            last = row;
        }
    }
}
