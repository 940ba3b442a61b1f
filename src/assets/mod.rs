//! Asset collaborators: where meshes and textures come from, and how they
//! reach the GPU.

pub mod demo;
pub mod lut;
pub mod source;

pub use demo::DemoAssets;
pub use lut::{load_color_maps, strip_to_volume, LUT_SIZE};
pub use source::{AssetError, AssetSource, FsAssets};
