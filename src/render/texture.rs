//! CPU-side texture data handed to the backend for upload.

use crate::render::effect::TextureKind;

/// Handle of an uploaded texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) usize);

/// RGBA8 texels of a 2D, cube or volume texture. Depth textures are
/// render surfaces only and cannot be uploaded.
///
/// Cube faces are stored one after another in +X, -X, +Y, -Y, +Z, -Z order;
/// volume slices are stored front to back.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    /// Cube faces (6), volume depth, or 1
    pub layers: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn new_2d(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            kind: TextureKind::D2,
            width,
            height,
            layers: 1,
            rgba,
        }
    }

    /// Single-texel texture, used where a binding has nothing to show
    pub fn solid(kind: TextureKind, rgba: [u8; 4]) -> Self {
        let layers = match kind {
            TextureKind::Cube => 6,
            _ => 1,
        };
        Self {
            kind,
            width: 1,
            height: 1,
            layers,
            rgba: rgba.repeat(layers as usize),
        }
    }

    /// Bytes the texel data must have
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layers as usize * 4
    }

    pub fn is_valid(&self) -> bool {
        let layers_ok = match self.kind {
            TextureKind::D2 => self.layers == 1,
            TextureKind::Cube => self.layers == 6 && self.width == self.height,
            TextureKind::D3 => self.layers >= 1,
            TextureKind::Depth => false,
        };
        layers_ok && self.width > 0 && self.height > 0 && self.rgba.len() == self.expected_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_textures_are_valid() {
        for kind in [TextureKind::D2, TextureKind::Cube, TextureKind::D3] {
            let tex = TextureData::solid(kind, [1, 2, 3, 4]);
            assert!(tex.is_valid(), "{:?}", kind);
        }
        assert_eq!(TextureData::solid(TextureKind::Cube, [0; 4]).rgba.len(), 24);
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(!TextureData::new_2d(2, 2, vec![0; 15]).is_valid());
        let mut cube = TextureData::solid(TextureKind::Cube, [0; 4]);
        cube.layers = 5;
        assert!(!cube.is_valid());
    }
}
