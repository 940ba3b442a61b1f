//! cpal tune playback.
//! The output stream is the master clock: the callback advances the play
//! cursor and the frame loop reads it back.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::buffer::Pcm;
use crate::playback::transport::AudioClock;

/// Error type for audio playback
#[derive(Debug)]
pub enum AudioPlayerError {
    DefaultConfig(cpal::DefaultStreamConfigError),
    BuildStream(cpal::BuildStreamError),
    PlayStream(cpal::PlayStreamError),
    PauseStream(cpal::PauseStreamError),
    NoDevice,
}

impl std::fmt::Display for AudioPlayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioPlayerError::DefaultConfig(e) => write!(f, "cpal default config error: {}", e),
            AudioPlayerError::BuildStream(e) => write!(f, "cpal build stream error: {}", e),
            AudioPlayerError::PlayStream(e) => write!(f, "cpal play stream error: {}", e),
            AudioPlayerError::PauseStream(e) => write!(f, "cpal pause stream error: {}", e),
            AudioPlayerError::NoDevice => write!(f, "No audio device available"),
        }
    }
}

impl std::error::Error for AudioPlayerError {}

impl From<cpal::DefaultStreamConfigError> for AudioPlayerError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioPlayerError::DefaultConfig(err)
    }
}

impl From<cpal::BuildStreamError> for AudioPlayerError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioPlayerError::BuildStream(err)
    }
}

impl From<cpal::PlayStreamError> for AudioPlayerError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioPlayerError::PlayStream(err)
    }
}

impl From<cpal::PauseStreamError> for AudioPlayerError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AudioPlayerError::PauseStream(err)
    }
}

/// State shared between the transport and the audio callback
#[derive(Debug, Default)]
struct Cursor {
    /// Source frame position as f64 bits
    frame: AtomicU64,
    paused: AtomicBool,
}

impl Cursor {
    fn load(&self) -> f64 {
        f64::from_bits(self.frame.load(Ordering::Acquire))
    }

    fn store(&self, frame: f64) {
        self.frame.store(frame.to_bits(), Ordering::Release);
    }
}

/// Fill an interleaved output buffer from the tune, advancing the cursor.
/// `step` is source frames per output frame.
fn render_block(pcm: &Pcm, cursor: &Cursor, step: f64, out_channels: usize, data: &mut [f32]) {
    if cursor.paused.load(Ordering::Acquire) {
        data.fill(0.0);
        return;
    }
    let start = cursor.frame.load(Ordering::Acquire);
    let mut position = f64::from_bits(start);
    for frame in data.chunks_mut(out_channels) {
        let src = position as usize;
        for (ch, sample) in frame.iter_mut().enumerate() {
            *sample = pcm.sample(src, ch);
        }
        position += step;
    }
    // A seek may have landed during the block; keep the newer position.
    let _ = cursor.frame.compare_exchange(
        start,
        position.min(pcm.frames() as f64).to_bits(),
        Ordering::AcqRel,
        Ordering::Acquire,
    );
}

/// Audio transport playing one tune through the default output device
pub struct CpalTransport {
    device: Device,
    stream_config: StreamConfig,
    pcm: Pcm,
    cursor: Arc<Cursor>,
    stream: Option<cpal::Stream>,
}

impl CpalTransport {
    /// Open the default output device
    pub fn new(pcm: Pcm) -> Result<Self, AudioPlayerError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioPlayerError::NoDevice)?;
        let stream_config = StreamConfig::from(device.default_output_config()?);
        tracing::info!(
            device = %device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate = stream_config.sample_rate.0,
            channels = stream_config.channels,
            "Opened audio output"
        );

        Ok(Self {
            device,
            stream_config,
            pcm,
            cursor: Arc::new(Cursor::default()),
            stream: None,
        })
    }

    /// Start playback from the current cursor
    pub fn play(&mut self) -> Result<(), AudioPlayerError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let pcm = self.pcm.clone();
        let cursor = Arc::clone(&self.cursor);
        let channels = self.stream_config.channels as usize;
        let step = pcm.sample_rate as f64 / self.stream_config.sample_rate.0 as f64;

        let stream = self.device.build_output_stream(
            &self.stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                render_block(&pcm, &cursor, step, channels, data);
            },
            |err| tracing::error!("Audio stream error: {}", err),
            None,
        )?;
        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Stop and release the output stream
    pub fn stop(&mut self) {
        self.stream = None;
    }
}

impl AudioClock for CpalTransport {
    fn is_started(&self) -> bool {
        self.stream.is_some()
    }

    fn position_seconds(&self) -> f64 {
        self.cursor.load() / self.pcm.sample_rate as f64
    }

    fn seek_seconds(&mut self, seconds: f64) {
        let frame = (seconds.max(0.0) * self.pcm.sample_rate as f64).min(self.pcm.frames() as f64);
        self.cursor.store(frame);
    }

    fn set_paused(&mut self, paused: bool) {
        self.cursor.paused.store(paused, Ordering::Release);
    }

    fn is_playing(&self) -> bool {
        self.is_started() && !self.cursor.paused.load(Ordering::Acquire) && !self.is_finished()
    }

    fn is_finished(&self) -> bool {
        self.cursor.load() >= self.pcm.frames() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tune() -> Pcm {
        Pcm::from_samples(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8], 4, 2).unwrap()
    }

    #[test]
    fn test_render_block_advances_cursor() {
        let pcm = tune();
        let cursor = Cursor::default();
        let mut out = [0.0f32; 4];
        render_block(&pcm, &cursor, 1.0, 2, &mut out);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(cursor.load(), 2.0);
    }

    #[test]
    fn test_render_block_paused_is_silent() {
        let pcm = tune();
        let cursor = Cursor::default();
        cursor.paused.store(true, Ordering::Release);
        let mut out = [1.0f32; 4];
        render_block(&pcm, &cursor, 1.0, 2, &mut out);
        assert_eq!(out, [0.0; 4]);
        assert_eq!(cursor.load(), 0.0);
    }

    #[test]
    fn test_render_block_stops_at_end() {
        let pcm = tune();
        let cursor = Cursor::default();
        cursor.store(3.0);
        let mut out = [1.0f32; 6];
        render_block(&pcm, &cursor, 1.0, 2, &mut out);
        assert_eq!(out, [0.7, 0.8, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(cursor.load(), 4.0);
    }

    #[test]
    fn test_render_block_steps_source_and_fills_from_first_channel() {
        let pcm = tune();
        let cursor = Cursor::default();
        let mut out = [0.0f32; 2];
        // half-rate output: two source frames per output frame
        render_block(&pcm, &cursor, 2.0, 1, &mut out);
        assert_eq!(out, [0.1, 0.5]);
        assert_eq!(cursor.load(), 4.0);
    }
}
