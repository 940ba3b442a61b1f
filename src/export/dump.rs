//! Deterministic frame dump.
//!
//! Frames are stepped at a fixed rate on an [`OfflineClock`] instead of
//! following the sound card, rendered offscreen and written as numbered PNG
//! files.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::playback::{FrameOutcome, OfflineClock, Session, SessionError};
use crate::render::{GpuBackend, RenderError, WgpuBackend};
use crate::sync::link::EditorLink;

/// Error type for frame dumps
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Readback error: {0}")]
    Readback(#[from] RenderError),
    #[error("Failed to create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Dump settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DumpSettings {
    pub fps: f64,
    /// Stop after this many frames even if the demo continues
    pub max_frames: Option<u64>,
}

impl Default for DumpSettings {
    fn default() -> Self {
        Self {
            fps: 60.0,
            max_frames: None,
        }
    }
}

/// Backends whose last presented frame can be copied back
pub trait FrameReadback {
    fn read_frame(&self) -> Result<RgbaImage, RenderError>;
}

impl FrameReadback for WgpuBackend {
    fn read_frame(&self) -> Result<RgbaImage, RenderError> {
        WgpuBackend::read_frame(self)
    }
}

pub fn frame_file_name(index: u64) -> String {
    format!("frame{:04}.png", index)
}

/// Render frames at `settings.fps` into `dir` until the demo ends or the
/// frame limit is reached. Returns the number of frames written.
pub fn dump_frames<L, B>(
    session: &mut Session<OfflineClock, L, B>,
    dir: &Path,
    settings: &DumpSettings,
) -> Result<u64, ExportError>
where
    L: EditorLink,
    B: GpuBackend + FrameReadback + 'static,
{
    std::fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    session.clock_mut().audio_mut().start();

    let mut index = 0;
    while settings.max_frames.map_or(true, |max| index < max) {
        session.clock_mut().audio_mut().set_frame(index, settings.fps);
        let FrameOutcome::Rendered { row, .. } = session.frame()? else {
            break;
        };

        let path = dir.join(frame_file_name(index));
        let image = session.renderer().backend().read_frame()?;
        image
            .save(&path)
            .map_err(|source| ExportError::Write { path, source })?;
        tracing::debug!(index, row, "frame written");
        index += 1;
    }

    tracing::info!(frames = index, dir = %dir.display(), "dump finished");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraRig, Projection};
    use crate::playback::FrameClock;
    use crate::render::letterbox::Viewport;
    use crate::render::renderer::tests::renderer;
    use crate::render::testing::RecordingBackend;
    use crate::sync::link::Standalone;
    use crate::sync::tracks::tests::constant_timeline;
    use crate::sync::{Interpolation, Keyframe, Track};

    impl FrameReadback for RecordingBackend {
        fn read_frame(&self) -> Result<RgbaImage, RenderError> {
            Ok(RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255])))
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vlee-dump-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn session(part_end_row: Option<i32>) -> Session<OfflineClock, Standalone, RecordingBackend> {
        let mut timeline = constant_timeline(&[]);
        if let Some(row) = part_end_row {
            let keys = vec![
                Keyframe::new(0, 0.0, Interpolation::Step),
                Keyframe::new(row, -1.0, Interpolation::Step),
            ];
            timeline.insert(Track::from_keys("part", keys).unwrap());
        }
        let clock = FrameClock::new(OfflineClock::new(None), 120.0, 8);
        let rig = CameraRig::new(Projection::new(16.0 / 9.0));
        Session::new(clock, Standalone, timeline, rig, renderer(Viewport::full(64, 36), 0)).unwrap()
    }

    #[test]
    fn test_file_names() {
        assert_eq!(frame_file_name(7), "frame0007.png");
        assert_eq!(frame_file_name(12345), "frame12345.png");
    }

    #[test]
    fn test_dump_respects_frame_limit() {
        let dir = temp_dir("limit");
        let settings = DumpSettings { fps: 30.0, max_frames: Some(3) };
        let written = dump_frames(&mut session(None), &dir, &settings).unwrap();
        assert_eq!(written, 3);
        assert!(dir.join("frame0002.png").is_file());
        assert!(!dir.join("frame0003.png").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dump_stops_at_end_of_demo() {
        let dir = temp_dir("end");
        // 16 rows per second at 120 bpm: row 16 is reached at frame 4 at 4 fps
        let settings = DumpSettings { fps: 4.0, max_frames: Some(100) };
        let written = dump_frames(&mut session(Some(16)), &dir, &settings).unwrap();
        assert_eq!(written, 4);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
