//! Asset collaborator interface and the filesystem implementation.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::render::effect::TextureKind;
use crate::render::mesh::MeshData;
use crate::render::texture::TextureData;
use crate::render::RenderError;

/// Error type for asset loading
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to decode image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Failed to parse mesh {}: {source}", .path.display())]
    MeshFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid mesh {name}: {reason}")]
    InvalidMesh { name: String, reason: String },
    #[error("Missing asset: {0}")]
    Missing(String),
    #[error("Colour map {name} is {width}x{height}, expected {expected_width}x{expected_height}")]
    ColorMapSize {
        name: String,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("Invalid texture {name}: {reason}")]
    InvalidTexture { name: String, reason: String },
    #[error("No colour maps found")]
    NoColorMaps,
    #[error("No overlay images found in {0}")]
    NoOverlays(String),
    #[error("Upload failed: {0}")]
    Upload(#[from] RenderError),
}

/// Supplies decoded assets by logical name
pub trait AssetSource {
    /// Decoded RGBA image, or `None` when nothing exists under `name`
    fn load_image(&self, name: &str) -> Result<Option<RgbaImage>, AssetError>;

    fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError>;
}

/// Assets read from a data directory
#[derive(Debug, Clone)]
pub struct FsAssets {
    root: PathBuf,
}

impl FsAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for FsAssets {
    fn load_image(&self, name: &str) -> Result<Option<RgbaImage>, AssetError> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        let img = image::open(&path).map_err(|source| AssetError::Image { path, source })?;
        Ok(Some(img.to_rgba8()))
    }

    fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError> {
        let path = self.root.join(name);
        let json = std::fs::read_to_string(&path).map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })?;
        let mesh: MeshData =
            serde_json::from_str(&json).map_err(|source| AssetError::MeshFormat { path, source })?;
        mesh.validate().map_err(|reason| AssetError::InvalidMesh {
            name: name.to_string(),
            reason,
        })?;
        Ok(mesh)
    }
}

/// Load an image that must exist
pub fn require_image<S: AssetSource + ?Sized>(source: &S, name: &str) -> Result<RgbaImage, AssetError> {
    source
        .load_image(name)?
        .ok_or_else(|| AssetError::Missing(name.to_string()))
}

pub fn texture_2d<S: AssetSource + ?Sized>(source: &S, name: &str) -> Result<TextureData, AssetError> {
    let img = require_image(source, name)?;
    let (width, height) = img.dimensions();
    Ok(TextureData::new_2d(width, height, img.into_raw()))
}

/// Face file names of a cube map directory, in upload order
pub const CUBE_FACES: [&str; 6] = ["px.png", "nx.png", "py.png", "ny.png", "pz.png", "nz.png"];

/// Cube map from six square face images under `dir`
pub fn cube_texture<S: AssetSource + ?Sized>(source: &S, dir: &str) -> Result<TextureData, AssetError> {
    let mut size = None;
    let mut rgba = Vec::new();
    for face in CUBE_FACES {
        let name = format!("{}/{}", dir, face);
        let img = require_image(source, &name)?;
        let (w, h) = img.dimensions();
        if w != h || size.is_some_and(|s| s != w) {
            return Err(AssetError::InvalidTexture {
                name,
                reason: format!("face is {}x{}, faces must be equal squares", w, h),
            });
        }
        size = Some(w);
        rgba.extend_from_slice(img.as_raw());
    }
    let size = size.unwrap_or(0);
    Ok(TextureData {
        kind: TextureKind::Cube,
        width: size,
        height: size,
        layers: 6,
        rgba,
    })
}

/// Volume texture from a strip of square slices laid side by side
pub fn volume_texture<S: AssetSource + ?Sized>(source: &S, name: &str) -> Result<TextureData, AssetError> {
    let img = require_image(source, name)?;
    let (w, h) = img.dimensions();
    if h == 0 || w % h != 0 {
        return Err(AssetError::InvalidTexture {
            name: name.to_string(),
            reason: format!("{}x{} is not a row of square slices", w, h),
        });
    }
    let depth = w / h;
    let mut rgba = Vec::with_capacity(img.as_raw().len());
    for slice in 0..depth {
        for y in 0..h {
            for x in 0..h {
                rgba.extend_from_slice(&img.get_pixel(slice * h + x, y).0);
            }
        }
    }
    Ok(TextureData {
        kind: TextureKind::D3,
        width: h,
        height: h,
        layers: depth,
        rgba,
    })
}

/// Every image `dir/0000.png`, `dir/0001.png`, ... up to the first gap
pub fn numbered_images<S: AssetSource + ?Sized>(source: &S, dir: &str) -> Result<Vec<(String, RgbaImage)>, AssetError> {
    let mut images = Vec::new();
    loop {
        let name = format!("{}/{:04}.png", dir, images.len());
        match source.load_image(&name)? {
            Some(img) => images.push((name, img)),
            None => break,
        }
    }
    Ok(images)
}
