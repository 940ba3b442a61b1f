//! The GPU seam.
//!
//! Passes talk to the device only through [`GpuBackend`]. The wgpu
//! implementation lives in `gpu.rs`; tests use a recording mock.

use crate::particles::Particle;
use crate::render::effect::{EffectId, EffectParams};
use crate::render::letterbox::Viewport;
use crate::render::mesh::{MeshData, MeshHandle};
use crate::render::surfaces::{SurfaceId, SurfacePlan, Target};
use crate::render::texture::{TextureData, TextureHandle};

/// Error type for rendering operations
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("No compatible GPU adapter found")]
    NoAdapter,
    #[error("wgpu error: {0}")]
    Wgpu(String),
    #[error("Surface error: {0}")]
    Surface(String),
    #[error("Effect {effect} is missing parameter {name}")]
    MissingParameter { effect: &'static str, name: &'static str },
    #[error("Effect {effect} parameter {name} has the wrong type")]
    ParameterType { effect: &'static str, name: &'static str },
    #[error("Effect {effect} has no texture named {name}")]
    UnknownTexture { effect: &'static str, name: &'static str },
    #[error("Effect {effect} has no pass {pass}")]
    UnknownPass { effect: &'static str, pass: usize },
    #[error("Surface {0:?} was not allocated")]
    UnknownSurface(SurfaceId),
    #[error("Pass {pass} reads {surface:?} before anything wrote it this frame")]
    ReadBeforeWrite { pass: &'static str, surface: SurfaceId },
    #[error("{count} sprites exceed the stream capacity of {capacity}")]
    SpriteOverflow { count: usize, capacity: usize },
    #[error("Invalid resource: {0}")]
    InvalidResource(String),
    #[error("No frame in progress")]
    NoFrame,
    #[error("Readback failed: {0}")]
    Readback(String),
}

/// Texture bound to an effect slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRef {
    /// Every mip level of a render surface
    Surface(SurfaceId),
    /// One mip level of a render surface
    SurfaceMip(SurfaceId, u32),
    Asset(TextureHandle),
}

impl TextureRef {
    pub fn surface(&self) -> Option<SurfaceId> {
        match *self {
            TextureRef::Surface(id) | TextureRef::SurfaceMip(id, _) => Some(id),
            TextureRef::Asset(_) => None,
        }
    }
}

/// What to rasterize
#[derive(Debug, Clone, Copy)]
pub enum Geometry<'a> {
    Fullscreen,
    Mesh(MeshHandle),
    Sprites(&'a [Particle]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthMode {
    #[default]
    Disabled,
    TestWrite,
    /// Depth test without writing
    TestOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// Source is premultiplied: `src + dst * (1 - src.a)`
    Premultiplied,
}

/// One draw with one effect pass
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub effect: EffectId,
    pub pass: usize,
    pub params: &'a EffectParams,
    pub textures: &'a [(&'static str, TextureRef)],
    pub targets: &'a [Target],
    pub depth: DepthMode,
    pub blend: BlendMode,
    pub geometry: Geometry<'a>,
    /// Sub-rectangle of the targets; the whole target when unset
    pub viewport: Option<Viewport>,
}

/// Device operations the render passes need
pub trait GpuBackend {
    /// Allocate the fixed surface set. Called once.
    fn create_surfaces(&mut self, plan: &SurfacePlan) -> Result<(), RenderError>;

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, RenderError>;

    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureHandle, RenderError>;

    /// Maximum sprites per draw
    fn sprite_capacity(&self) -> usize;

    fn begin_frame(&mut self) -> Result<(), RenderError>;

    /// Clear colour targets and, when given, the depth buffer
    fn clear(&mut self, targets: &[Target], color: [f32; 4], depth: Option<f32>) -> Result<(), RenderError>;

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), RenderError>;

    /// Linear-filtered copy of mip `level` into `level + 1`
    fn downsample(&mut self, surface: SurfaceId, level: u32) -> Result<(), RenderError>;

    /// Submit the frame and show it
    fn present(&mut self) -> Result<(), RenderError>;
}
