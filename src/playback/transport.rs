//! Transport abstractions between the frame loop and the audio backend.

/// Row-based transport control offered to the editing collaborator
pub trait TransportControl {
    fn set_paused(&mut self, paused: bool);
    /// Reposition playback to an integer row
    fn set_position(&mut self, row: i32);
    fn is_playing(&self) -> bool;
}

/// The audio backend as seen by the frame clock. Time is in seconds.
pub trait AudioClock {
    /// Whether playback has been started; positions are meaningless before
    fn is_started(&self) -> bool;
    fn position_seconds(&self) -> f64;
    fn seek_seconds(&mut self, seconds: f64);
    fn set_paused(&mut self, paused: bool);
    fn is_playing(&self) -> bool;
    /// Whether the tune has played to its end
    fn is_finished(&self) -> bool;
}

/// Software clock with no audio output.
///
/// Used for deterministic frame dumps and tests: the caller sets the
/// position explicitly instead of a sound card advancing it.
#[derive(Debug, Clone, Default)]
pub struct OfflineClock {
    position: f64,
    duration: Option<f64>,
    started: bool,
    paused: bool,
}

impl OfflineClock {
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    /// Place the clock at a frame of a fixed-rate sequence
    pub fn set_frame(&mut self, frame: u64, fps: f64) {
        self.position = frame as f64 / fps;
    }

    /// Advance by `seconds` unless paused
    pub fn advance(&mut self, seconds: f64) {
        if self.started && !self.paused {
            self.position += seconds;
        }
    }
}

impl AudioClock for OfflineClock {
    fn is_started(&self) -> bool {
        self.started
    }

    fn position_seconds(&self) -> f64 {
        self.position
    }

    fn seek_seconds(&mut self, seconds: f64) {
        self.position = seconds.max(0.0);
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn is_playing(&self) -> bool {
        self.started && !self.paused && !self.is_finished()
    }

    fn is_finished(&self) -> bool {
        self.duration.is_some_and(|d| self.position >= d)
    }
}
