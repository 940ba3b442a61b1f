//! Public rendering interface: one call per frame drives the scene and the
//! post chain against a backend.

use std::collections::HashSet;

use crate::particles::ParticleCloud;
use crate::render::backend::{GpuBackend, RenderError};
use crate::render::frame::FrameContext;
use crate::render::letterbox::Viewport;
use crate::render::pass::PassContext;
use crate::render::post::{PostProcessChain, PostResources};
use crate::render::scene::{SceneCompositor, SceneResources};
use crate::render::surfaces::SurfacePlan;

/// Owns the backend and the fixed pass pipeline for a session
pub struct Renderer<B: GpuBackend + 'static> {
    backend: B,
    plan: SurfacePlan,
    scene: SceneCompositor<B>,
    post: PostProcessChain<B>,
    /// Kept to rebuild the passes when the surfaces are reallocated
    scene_resources: SceneResources,
    post_resources: PostResources,
    cloud: ParticleCloud,
    sprite_capacity: usize,
}

impl<B: GpuBackend + 'static> Renderer<B> {
    /// `backend` must already hold the surfaces of `plan` and the uploaded
    /// resources.
    pub fn new(
        backend: B,
        plan: SurfacePlan,
        scene: SceneResources,
        post: PostResources,
        cloud: ParticleCloud,
        sprite_capacity: usize,
    ) -> Result<Self, RenderError> {
        let sprite_capacity = sprite_capacity.min(backend.sprite_capacity()).max(1);
        Ok(Self {
            scene: SceneCompositor::new(&plan, scene, cloud.clone(), sprite_capacity),
            post: PostProcessChain::new(&plan, post.clone())?,
            backend,
            plan,
            scene_resources: scene,
            post_resources: post,
            cloud,
            sprite_capacity,
        })
    }

    /// Reallocate every render surface for a new letterboxed viewport and
    /// rebuild the passes sized from them. Returns `false` when the viewport
    /// is unchanged and nothing was done.
    pub fn resize(&mut self, viewport: Viewport) -> Result<bool, RenderError> {
        if viewport == self.plan.viewport() {
            return Ok(false);
        }
        let plan = SurfacePlan::new(viewport);
        self.backend.create_surfaces(&plan)?;
        self.post = PostProcessChain::new(&plan, self.post_resources.clone())?;
        self.scene = SceneCompositor::new(&plan, self.scene_resources, self.cloud.clone(), self.sprite_capacity);
        self.plan = plan;
        tracing::info!(?viewport, "render surfaces resized");
        Ok(true)
    }

    pub fn plan(&self) -> &SurfacePlan {
        &self.plan
    }

    /// Names of the passes a frame would run, in order
    pub fn active_passes(&self, frame: &FrameContext) -> Vec<&'static str> {
        let mut names = self.scene.active(frame);
        names.extend(self.post.active(frame));
        names
    }

    /// Render and present one frame. Any failure aborts the frame.
    pub fn render_frame(&mut self, frame: &FrameContext) -> Result<(), RenderError> {
        self.backend.begin_frame()?;
        let mut written = HashSet::new();
        let mut ctx = PassContext::new(&mut self.backend, frame, &mut written);
        self.scene.render(&mut ctx)?;
        self.post.render(&mut ctx)?;
        self.backend.present()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
