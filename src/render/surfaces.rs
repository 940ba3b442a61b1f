//! The fixed render surface set.
//!
//! Surfaces are named by [`SurfaceId`] rather than referenced directly, so
//! passes can declare what they read and write and the pass list can check
//! ordering. Every surface is sized to the letterboxed viewport once at
//! startup and never reallocated.

use crate::render::letterbox::Viewport;

/// Maximum mip levels in the bloom pyramid
pub const BLOOM_MIP_LEVELS: u32 = 8;

/// Registry index of a render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceId {
    /// Scene colour (HDR)
    Color,
    /// Linear view depth written next to colour
    LinearDepth,
    DepthStencil,
    /// Depth-of-field result, also the sprite target after DOF
    Dof,
    DofTemp1,
    DofTemp2,
    Antialiased,
    /// Bright pass and bloom pyramid
    BloomA,
    /// Blur scratch for each pyramid level
    BloomB,
    /// Window or offscreen presentation surface
    Present,
}

impl SurfaceId {
    /// Every surface allocated by the pipeline (the presentation surface is
    /// owned by the backend)
    pub const OFFSCREEN: [SurfaceId; 9] = [
        SurfaceId::Color,
        SurfaceId::LinearDepth,
        SurfaceId::DepthStencil,
        SurfaceId::Dof,
        SurfaceId::DofTemp1,
        SurfaceId::DofTemp2,
        SurfaceId::Antialiased,
        SurfaceId::BloomA,
        SurfaceId::BloomB,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SurfaceId::Color => "color",
            SurfaceId::LinearDepth => "linear depth",
            SurfaceId::DepthStencil => "depth stencil",
            SurfaceId::Dof => "dof",
            SurfaceId::DofTemp1 => "dof temp1",
            SurfaceId::DofTemp2 => "dof temp2",
            SurfaceId::Antialiased => "antialiased",
            SurfaceId::BloomA => "bloom a",
            SurfaceId::BloomB => "bloom b",
            SurfaceId::Present => "present",
        }
    }
}

/// Pixel format of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceFormat {
    /// Half-float RGBA
    Hdr,
    /// Single float channel
    Depth,
    DepthStencil,
    /// Whatever the presentation surface uses
    Present,
}

/// Allocation parameters of one surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDesc {
    pub id: SurfaceId,
    pub format: SurfaceFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

impl SurfaceDesc {
    /// Dimensions of a mip level
    pub fn mip_size(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }
}

/// A render target: one mip level of one surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub surface: SurfaceId,
    pub mip: u32,
}

impl From<SurfaceId> for Target {
    fn from(surface: SurfaceId) -> Self {
        Target { surface, mip: 0 }
    }
}

impl Target {
    pub fn mip(surface: SurfaceId, mip: u32) -> Self {
        Target { surface, mip }
    }
}

/// Number of mip levels for a full chain, capped at [`BLOOM_MIP_LEVELS`]
pub fn full_mip_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    (32 - largest.leading_zeros()).min(BLOOM_MIP_LEVELS)
}

/// Allocation plan for the fixed surface set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfacePlan {
    viewport: Viewport,
    surfaces: Vec<SurfaceDesc>,
}

impl SurfacePlan {
    pub fn new(viewport: Viewport) -> Self {
        let (w, h) = (viewport.width.max(1), viewport.height.max(1));
        let surfaces = SurfaceId::OFFSCREEN
            .iter()
            .map(|&id| {
                let (format, mip_levels) = match id {
                    SurfaceId::LinearDepth => (SurfaceFormat::Depth, 1),
                    SurfaceId::DepthStencil => (SurfaceFormat::DepthStencil, 1),
                    SurfaceId::BloomA | SurfaceId::BloomB => (SurfaceFormat::Hdr, full_mip_count(w, h)),
                    _ => (SurfaceFormat::Hdr, 1),
                };
                SurfaceDesc {
                    id,
                    format,
                    width: w,
                    height: h,
                    mip_levels,
                }
            })
            .collect();
        Self { viewport, surfaces }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn surfaces(&self) -> &[SurfaceDesc] {
        &self.surfaces
    }

    pub fn get(&self, id: SurfaceId) -> Option<&SurfaceDesc> {
        self.surfaces.iter().find(|s| s.id == id)
    }

    /// Bloom iterations the pyramid can hold
    pub fn bloom_levels(&self) -> u32 {
        self.get(SurfaceId::BloomA)
            .map_or(0, |s| s.mip_levels.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_sized_to_viewport() {
        let plan = SurfacePlan::new(Viewport { x: 0, y: 60, width: 1280, height: 600 });
        assert_eq!(plan.surfaces().len(), SurfaceId::OFFSCREEN.len());
        for s in plan.surfaces() {
            assert_eq!((s.width, s.height), (1280, 600));
        }
        assert_eq!(plan.get(SurfaceId::LinearDepth).unwrap().format, SurfaceFormat::Depth);
        assert_eq!(plan.get(SurfaceId::BloomB).unwrap().mip_levels, BLOOM_MIP_LEVELS);
        assert_eq!(plan.bloom_levels(), 7);
        assert!(plan.get(SurfaceId::Present).is_none());
    }

    #[test]
    fn test_small_viewport_caps_pyramid() {
        let plan = SurfacePlan::new(Viewport::full(20, 10));
        // 20 -> 10 -> 5 -> 2 -> 1
        assert_eq!(plan.get(SurfaceId::BloomA).unwrap().mip_levels, 5);
        assert_eq!(plan.bloom_levels(), 4);
    }

    #[test]
    fn test_mip_size() {
        let plan = SurfacePlan::new(Viewport::full(1920, 1080));
        let bloom = plan.get(SurfaceId::BloomA).unwrap();
        assert_eq!(bloom.mip_size(0), (1920, 1080));
        assert_eq!(bloom.mip_size(3), (240, 135));
        assert_eq!(bloom.mip_size(20), (1, 1));
    }
}
