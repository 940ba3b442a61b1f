//! Render pass capability and the ordered pass list.

use std::collections::HashSet;

use crate::render::backend::{GpuBackend, RenderError};
use crate::render::frame::FrameContext;
use crate::render::surfaces::SurfaceId;

/// Execution state shared by every pass of one frame
pub struct PassContext<'a, B: ?Sized> {
    pub backend: &'a mut B,
    pub frame: &'a FrameContext,
    written: &'a mut HashSet<SurfaceId>,
}

impl<'a, B: ?Sized> PassContext<'a, B> {
    pub fn new(backend: &'a mut B, frame: &'a FrameContext, written: &'a mut HashSet<SurfaceId>) -> Self {
        Self {
            backend,
            frame,
            written,
        }
    }

    pub fn has_written(&self, surface: SurfaceId) -> bool {
        self.written.contains(&surface)
    }
}

/// One stage of the frame.
///
/// `configure` pulls this frame's parameters out of the context;
/// `reads`/`writes` describe the configured pass.
pub trait RenderPass<B: GpuBackend + ?Sized> {
    fn name(&self) -> &'static str;

    fn enabled(&self, _frame: &FrameContext) -> bool {
        true
    }

    fn configure(&mut self, frame: &FrameContext) -> Result<(), RenderError>;

    fn reads(&self) -> Vec<SurfaceId>;

    fn writes(&self) -> Vec<SurfaceId>;

    fn execute(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError>;
}

/// Passes run in insertion order
pub struct PassList<B: GpuBackend + ?Sized> {
    passes: Vec<Box<dyn RenderPass<B>>>,
}

impl<B: GpuBackend + ?Sized> Default for PassList<B> {
    fn default() -> Self {
        Self { passes: Vec::new() }
    }
}

impl<B: GpuBackend + ?Sized> PassList<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pass: impl RenderPass<B> + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Names of the passes that would run for a frame
    pub fn active(&self, frame: &FrameContext) -> Vec<&'static str> {
        self.passes
            .iter()
            .filter(|p| p.enabled(frame))
            .map(|p| p.name())
            .collect()
    }

    /// Configure, check and execute every enabled pass. A pass reading a
    /// surface no earlier pass wrote this frame is an error.
    pub fn run(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError> {
        for pass in &mut self.passes {
            if !pass.enabled(ctx.frame) {
                continue;
            }
            pass.configure(ctx.frame)?;
            if let Some(&surface) = pass.reads().iter().find(|s| !ctx.written.contains(*s)) {
                return Err(RenderError::ReadBeforeWrite {
                    pass: pass.name(),
                    surface,
                });
            }
            tracing::debug!(pass = pass.name(), "execute");
            pass.execute(ctx)?;
            ctx.written.extend(pass.writes());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraRig, Projection};
    use crate::render::letterbox::Viewport;
    use crate::render::testing::RecordingBackend;
    use crate::sync::tracks::FrameValues;

    struct Touch {
        name: &'static str,
        reads: Vec<SurfaceId>,
        writes: Vec<SurfaceId>,
        configured: bool,
    }

    impl RenderPass<RecordingBackend> for Touch {
        fn name(&self) -> &'static str {
            self.name
        }

        fn enabled(&self, frame: &FrameContext) -> bool {
            self.name != "skipped" || frame.values.part == 1
        }

        fn configure(&mut self, _frame: &FrameContext) -> Result<(), RenderError> {
            self.configured = true;
            Ok(())
        }

        fn reads(&self) -> Vec<SurfaceId> {
            self.reads.clone()
        }

        fn writes(&self) -> Vec<SurfaceId> {
            self.writes.clone()
        }

        fn execute(&mut self, _ctx: &mut PassContext<'_, RecordingBackend>) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn touch(name: &'static str, reads: &[SurfaceId], writes: &[SurfaceId]) -> Touch {
        Touch {
            name,
            reads: reads.to_vec(),
            writes: writes.to_vec(),
            configured: false,
        }
    }

    fn frame(part: i32) -> FrameContext {
        let values = FrameValues { part, ..FrameValues::default() };
        FrameContext::new(0, values, &CameraRig::new(Projection::new(1.0)), Viewport::full(8, 8))
    }

    fn run(list: &mut PassList<RecordingBackend>, part: i32) -> Result<HashSet<SurfaceId>, RenderError> {
        let mut backend = RecordingBackend::new(4);
        let mut written = HashSet::new();
        let f = frame(part);
        let mut ctx = PassContext::new(&mut backend, &f, &mut written);
        list.run(&mut ctx)?;
        Ok(written)
    }

    #[test]
    fn test_ordered_reads_pass() {
        let mut list = PassList::new();
        list.push(touch("a", &[], &[SurfaceId::Color]));
        list.push(touch("b", &[SurfaceId::Color], &[SurfaceId::Antialiased]));
        let written = run(&mut list, 0).unwrap();
        assert!(written.contains(&SurfaceId::Antialiased));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_read_before_write_fails() {
        let mut list = PassList::new();
        list.push(touch("b", &[SurfaceId::Color], &[SurfaceId::Antialiased]));
        list.push(touch("a", &[], &[SurfaceId::Color]));
        assert!(matches!(
            run(&mut list, 0),
            Err(RenderError::ReadBeforeWrite { pass: "b", surface: SurfaceId::Color })
        ));
    }

    #[test]
    fn test_disabled_pass_writes_nothing() {
        let mut list = PassList::new();
        list.push(touch("skipped", &[], &[SurfaceId::Dof]));
        list.push(touch("reader", &[SurfaceId::Dof], &[]));
        assert!(run(&mut list, 0).is_err());
        assert!(run(&mut list, 1).is_ok());
        assert_eq!(list.active(&frame(0)), vec!["reader"]);
    }
}
