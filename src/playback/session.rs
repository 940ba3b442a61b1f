//! The per-session frame loop.
//!
//! One call to [`Session::frame`] evaluates one row and renders one frame.
//! The session owns everything the loop touches; nothing is global.

use crate::camera::CameraRig;
use crate::core::Row;
use crate::playback::clock::{ClockError, FrameClock};
use crate::playback::transport::AudioClock;
use crate::render::{FrameContext, GpuBackend, RenderError, Renderer};
use crate::sync::link::EditorLink;
use crate::sync::timeline::{SyncError, TimelineEvaluator};
use crate::sync::tracks::DemoTracks;

/// Error type for a frame iteration
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Rendered { row: Row, part: i32 },
    /// The termination flag is set; nothing was drawn
    Finished,
}

/// Clock, tracks, editor link and renderer for one playback session
pub struct Session<A, L, B: GpuBackend + 'static> {
    clock: FrameClock<A>,
    link: L,
    timeline: TimelineEvaluator,
    tracks: DemoTracks,
    rig: CameraRig,
    renderer: Renderer<B>,
    frames: u64,
    terminated: bool,
}

impl<A: AudioClock, L: EditorLink, B: GpuBackend + 'static> Session<A, L, B> {
    /// Resolve every demo track up front; a missing one fails here
    pub fn new(
        clock: FrameClock<A>,
        link: L,
        timeline: TimelineEvaluator,
        rig: CameraRig,
        renderer: Renderer<B>,
    ) -> Result<Self, SyncError> {
        let tracks = DemoTracks::resolve(&timeline)?;
        tracing::info!(
            tracks = timeline.len(),
            live = link.is_live(),
            viewport = ?renderer.plan().viewport(),
            "session ready"
        );
        Ok(Self {
            clock,
            link,
            timeline,
            tracks,
            rig,
            renderer,
            frames: 0,
            terminated: false,
        })
    }

    /// Request the loop to stop at the next iteration
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn clock(&self) -> &FrameClock<A> {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut FrameClock<A> {
        &mut self.clock
    }

    pub fn renderer(&self) -> &Renderer<B> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<B> {
        &mut self.renderer
    }

    /// Run one iteration: poll the editor, sample the tracks at the current
    /// row and render. Errors are fatal for the session.
    pub fn frame(&mut self) -> Result<FrameOutcome, SessionError> {
        if self.terminated {
            return Ok(FrameOutcome::Finished);
        }

        let row = self.clock.current_row()?;
        self.link
            .poll(row.floor() as i32, &mut self.clock, &mut self.timeline);
        // The editor may have seeked
        let row = self.clock.current_row()?;

        let values = self.tracks.sample(&self.timeline, row);
        if !self.link.is_live() && (values.part < 0 || self.clock.is_finished()) {
            tracing::info!(row, part = values.part, frames = self.frames, "end of demo");
            self.terminated = true;
            return Ok(FrameOutcome::Finished);
        }

        let frame = FrameContext::new(self.frames, values, &self.rig, self.renderer.plan().viewport());
        tracing::trace!(row, part = values.part, scene = ?frame.scene, "frame");
        self.renderer.render_frame(&frame)?;
        self.frames += 1;

        Ok(FrameOutcome::Rendered {
            row,
            part: values.part,
        })
    }
}
