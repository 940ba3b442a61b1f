//! PCM tune storage.
//! Samples are interleaved f32 (L, R, L, R, ...).

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Error type for loading tunes
#[derive(Debug)]
pub enum PcmError {
    Io { path: PathBuf, source: std::io::Error },
    /// Byte length is not a whole number of frames
    Truncated { path: PathBuf, len: usize },
    InvalidFormat(String),
}

impl std::fmt::Display for PcmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PcmError::Io { path, source } => write!(f, "Cannot read tune {}: {}", path.display(), source),
            PcmError::Truncated { path, len } => {
                write!(f, "Tune {} has {} bytes, not a whole number of frames", path.display(), len)
            }
            PcmError::InvalidFormat(msg) => write!(f, "Invalid tune format: {}", msg),
        }
    }
}

impl std::error::Error for PcmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PcmError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Decoded tune, shared with the audio callback
#[derive(Debug, Clone)]
pub struct Pcm {
    samples: Arc<[f32]>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Pcm {
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, PcmError> {
        if sample_rate == 0 || channels == 0 {
            return Err(PcmError::InvalidFormat(format!(
                "{} Hz, {} channels",
                sample_rate, channels
            )));
        }
        if samples.len() % channels as usize != 0 {
            return Err(PcmError::InvalidFormat(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            samples: samples.into(),
            sample_rate,
            channels,
        })
    }

    /// Load headerless little-endian f32 samples
    pub fn load_raw_f32(path: &Path, sample_rate: u32, channels: u16) -> Result<Self, PcmError> {
        let bytes = std::fs::read(path).map_err(|source| PcmError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let frame_bytes = 4 * channels.max(1) as usize;
        if bytes.len() % frame_bytes != 0 {
            return Err(PcmError::Truncated {
                path: path.to_path_buf(),
                len: bytes.len(),
            });
        }
        let samples = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Self::from_samples(samples, sample_rate, channels)
    }

    /// Number of sample frames (per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Sample at a frame; channels beyond the source repeat the last one
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channel = channel.min(self.channels as usize - 1);
        self.samples
            .get(frame * self.channels as usize + channel)
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_and_duration() {
        let pcm = Pcm::from_samples(vec![0.0; 88200], 44100, 2).unwrap();
        assert_eq!(pcm.frames(), 44100);
        assert_eq!(pcm.duration_seconds(), 1.0);
    }

    #[test]
    fn test_mono_upmix_and_out_of_range() {
        let pcm = Pcm::from_samples(vec![0.25, 0.5], 8000, 1).unwrap();
        assert_eq!(pcm.sample(1, 0), 0.5);
        assert_eq!(pcm.sample(1, 1), 0.5);
        assert_eq!(pcm.sample(2, 0), 0.0);
    }

    #[test]
    fn test_rejects_partial_frame() {
        assert!(Pcm::from_samples(vec![0.0; 3], 44100, 2).is_err());
        assert!(Pcm::from_samples(vec![], 0, 2).is_err());
    }

    #[test]
    fn test_load_raw_f32() {
        let dir = std::env::temp_dir().join(format!("vlee-pcm-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tune.pcm");
        let bytes: Vec<u8> = [1.0f32, -1.0, 0.5, 0.25]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        std::fs::write(&path, &bytes).unwrap();

        let pcm = Pcm::load_raw_f32(&path, 48000, 2).unwrap();
        assert_eq!(pcm.frames(), 2);
        assert_eq!(pcm.sample(1, 1), 0.25);

        std::fs::write(&path, &bytes[..6]).unwrap();
        assert!(matches!(
            Pcm::load_raw_f32(&path, 48000, 2),
            Err(PcmError::Truncated { len: 6, .. })
        ));
        std::fs::remove_dir_all(&dir).ok();
    }
}
