pub mod backend;
pub mod bloom;
pub mod effect;
pub mod frame;
pub mod gpu;
pub mod letterbox;
pub mod mesh;
pub mod pass;
pub mod post;
pub mod renderer;
pub mod scene;
pub mod shader;
pub mod surfaces;
pub mod texture;

#[cfg(test)]
pub mod testing;

pub use backend::{GpuBackend, RenderError};
pub use frame::FrameContext;
pub use gpu::WgpuBackend;
pub use letterbox::{letterbox, Viewport};
pub use post::PostResources;
pub use renderer::Renderer;
pub use scene::{SceneResources, SceneVariant};
pub use surfaces::SurfacePlan;
