//! Post-processing: anti-aliasing with bright pass, the bloom pyramid and
//! the final grade written into the letterbox.

use glam::Vec3;

use crate::core::not_rand;
use crate::render::backend::{
    BlendMode, DepthMode, DrawCall, Geometry, GpuBackend, RenderError, TextureRef,
};
use crate::render::bloom::{gauss_kernel, pack_kernel, Axis, BLOOM_LEVELS, BLOOM_STD_DEV};
use crate::render::effect::{EffectId, EffectParams, Param};
use crate::render::frame::FrameContext;
use crate::render::pass::{PassContext, PassList, RenderPass};
use crate::render::surfaces::{SurfaceId, SurfacePlan, Target};
use crate::render::texture::TextureHandle;

/// Texels covered by one tile of the grain texture
const NOISE_TILE: f32 = 256.0;

/// Textures used by the final composite
#[derive(Debug, Clone)]
pub struct PostResources {
    pub noise: TextureHandle,
    pub spectrum: TextureHandle,
    /// Looping overlay images
    pub overlays: Vec<TextureHandle>,
    /// Volume colour lookup tables
    pub color_maps: Vec<TextureHandle>,
}

/// Grade values derived from the tracks for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeValues {
    pub flash: f32,
    pub fade: f32,
    pub noise_offset: Vec3,
    pub dist_amt: f32,
    pub dist_freq: f32,
    pub dist_time: f32,
    pub overlay: usize,
    pub overlay_alpha: f32,
    pub map1: usize,
    pub map2: usize,
    pub map_lerp: f32,
}

impl CompositeValues {
    pub fn new(frame: &FrameContext, overlays: usize, color_maps: usize) -> Self {
        let grade = &frame.values.grade;
        let dist = &frame.values.distortion;
        let beat = frame.beat;

        let pulse = grade.pulse_amount;
        let pulse_wave = (beat * grade.pulse_speed as f64 * std::f64::consts::PI).cos() as f32;
        let fade = (grade.fade - pulse + pulse_wave * pulse).max(0.0);

        let flash = if grade.flash < 0.0 {
            frame.random
        } else {
            grade.flash.powf(2.0)
        };

        let seed = (beat * 100.0) as i32;
        let wrap = |index: i32, count: usize| index.rem_euclid(count.max(1) as i32) as usize;

        Self {
            flash,
            fade: fade.powf(2.2),
            noise_offset: Vec3::new(not_rand(seed), not_rand(seed.wrapping_add(1)), 0.0),
            dist_amt: dist.amount / 100.0,
            dist_freq: dist.frequency * 2.0 * std::f32::consts::PI,
            dist_time: (beat * 4.0) as f32 + dist.offset,
            overlay: wrap(grade.overlay, overlays),
            overlay_alpha: grade.overlay_alpha,
            map1: wrap(grade.map1, color_maps),
            map2: wrap(grade.map2, color_maps),
            map_lerp: grade.map_lerp,
        }
    }
}

/// FXAA into the anti-aliased target plus bright-pass into the bloom base
struct AntialiasPass {
    params: EffectParams,
    source: SurfaceId,
}

impl<B: GpuBackend + ?Sized> RenderPass<B> for AntialiasPass {
    fn name(&self) -> &'static str {
        "antialias"
    }

    fn configure(&mut self, frame: &FrameContext) -> Result<(), RenderError> {
        self.source = frame.scene.output();
        self.params.set_float("bloom_cutoff", frame.values.bloom.cutoff);
        Ok(())
    }

    fn reads(&self) -> Vec<SurfaceId> {
        vec![self.source]
    }

    fn writes(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Antialiased, SurfaceId::BloomA]
    }

    fn execute(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError> {
        ctx.backend.draw(&DrawCall {
            effect: EffectId::Antialias,
            pass: 0,
            params: &self.params,
            textures: &[("color_tex", TextureRef::Surface(self.source))],
            targets: &[Target::from(SurfaceId::Antialiased), Target::from(SurfaceId::BloomA)],
            depth: DepthMode::Disabled,
            blend: BlendMode::Opaque,
            geometry: Geometry::Fullscreen,
            viewport: None,
        })
    }
}

/// Down-sample then blur each pyramid level, horizontally then vertically
struct BloomPass {
    /// Blur parameters per level: (horizontal, vertical)
    levels: Vec<(EffectParams, EffectParams)>,
}

impl BloomPass {
    /// The standard deviation is fixed, so each level's kernel only depends
    /// on its mip size and is packed once per surface plan.
    fn new(plan: &SurfacePlan) -> Self {
        let kernel = gauss_kernel(BLOOM_STD_DEV);
        let levels = plan.bloom_levels().min(BLOOM_LEVELS);
        let base = plan.get(SurfaceId::BloomA).copied();
        let levels = (0..levels)
            .filter_map(|level| {
                let (w, h) = base?.mip_size(level);
                let blur = |axis| {
                    let mut params = EffectParams::new(EffectId::Blur);
                    params.set("gauss", Param::Vec4Array(pack_kernel(&kernel, axis, w, h).to_vec()));
                    params
                };
                Some((blur(Axis::Horizontal), blur(Axis::Vertical)))
            })
            .collect();
        Self { levels }
    }

    fn blur<B: GpuBackend + ?Sized>(
        backend: &mut B,
        params: &EffectParams,
        from: SurfaceId,
        to: SurfaceId,
        level: u32,
    ) -> Result<(), RenderError> {
        backend.draw(&DrawCall {
            effect: EffectId::Blur,
            pass: 0,
            params,
            textures: &[("blur_tex", TextureRef::SurfaceMip(from, level))],
            targets: &[Target::mip(to, level)],
            depth: DepthMode::Disabled,
            blend: BlendMode::Opaque,
            geometry: Geometry::Fullscreen,
            viewport: None,
        })
    }
}

impl<B: GpuBackend + ?Sized> RenderPass<B> for BloomPass {
    fn name(&self) -> &'static str {
        "bloom"
    }

    fn configure(&mut self, _frame: &FrameContext) -> Result<(), RenderError> {
        Ok(())
    }

    fn reads(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::BloomA]
    }

    fn writes(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::BloomA, SurfaceId::BloomB]
    }

    fn execute(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError> {
        for (level, (horizontal, vertical)) in self.levels.iter().enumerate() {
            let level = level as u32;
            ctx.backend.downsample(SurfaceId::BloomA, level)?;
            Self::blur(ctx.backend, horizontal, SurfaceId::BloomA, SurfaceId::BloomB, level)?;
            Self::blur(ctx.backend, vertical, SurfaceId::BloomB, SurfaceId::BloomA, level)?;
        }
        Ok(())
    }
}

/// Grade, bloom mix, distortion, overlay and colour lookup, presented into
/// the letterbox with black bars around it
struct CompositePass {
    params: EffectParams,
    resources: PostResources,
    textures: [(&'static str, TextureRef); 7],
}

impl CompositePass {
    fn new(plan: &SurfacePlan, resources: PostResources) -> Result<Self, RenderError> {
        let first = |list: &[TextureHandle], what: &str| {
            list.first()
                .copied()
                .ok_or_else(|| RenderError::InvalidResource(format!("no {}", what)))
        };
        let overlay = first(&resources.overlays, "overlays")?;
        let map = first(&resources.color_maps, "color maps")?;

        let vp = plan.viewport();
        let (w, h) = (vp.width as f32, vp.height as f32);
        let bloom_levels = plan.get(SurfaceId::BloomA).map_or(1, |s| s.mip_levels);
        let mut params = EffectParams::new(EffectId::Composite);
        params
            .set_vec3("viewport", Vec3::new(w, h, 0.0))
            .set_vec3("nscale", Vec3::new(w / NOISE_TILE, h / NOISE_TILE, 0.0))
            .set("bloom_levels", Param::Int(bloom_levels as i32));

        let textures = [
            ("color_tex", TextureRef::Surface(SurfaceId::Antialiased)),
            ("bloom_tex", TextureRef::Surface(SurfaceId::BloomA)),
            ("noise_tex", TextureRef::Asset(resources.noise)),
            ("spectrum_tex", TextureRef::Asset(resources.spectrum)),
            ("overlay_tex", TextureRef::Asset(overlay)),
            ("color_map1_tex", TextureRef::Asset(map)),
            ("color_map2_tex", TextureRef::Asset(map)),
        ];
        Ok(Self {
            params,
            resources,
            textures,
        })
    }
}

impl<B: GpuBackend + ?Sized> RenderPass<B> for CompositePass {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn configure(&mut self, frame: &FrameContext) -> Result<(), RenderError> {
        let r = &self.resources;
        let v = CompositeValues::new(frame, r.overlays.len(), r.color_maps.len());
        let bloom = &frame.values.bloom;
        self.params
            .set_vec3("noffs", v.noise_offset)
            .set_float("flash", v.flash)
            .set_float("fade", v.fade)
            .set_float("dist_amt", v.dist_amt)
            .set_float("dist_freq", v.dist_freq)
            .set_float("dist_time", v.dist_time)
            .set_float("overlay_alpha", v.overlay_alpha)
            .set_float("bloom_amt", bloom.amount)
            .set_float("bloom_shape", bloom.shape)
            .set_float("color_map_lerp", v.map_lerp);

        self.textures[4].1 = TextureRef::Asset(r.overlays[v.overlay]);
        self.textures[5].1 = TextureRef::Asset(r.color_maps[v.map1]);
        self.textures[6].1 = TextureRef::Asset(r.color_maps[v.map2]);
        Ok(())
    }

    fn reads(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Antialiased, SurfaceId::BloomA]
    }

    fn writes(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Present]
    }

    fn execute(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError> {
        let present = [Target::from(SurfaceId::Present)];
        ctx.backend.clear(&present, [0.0, 0.0, 0.0, 1.0], None)?;
        ctx.backend.draw(&DrawCall {
            effect: EffectId::Composite,
            pass: 0,
            params: &self.params,
            textures: &self.textures,
            targets: &present,
            depth: DepthMode::Disabled,
            blend: BlendMode::Opaque,
            geometry: Geometry::Fullscreen,
            viewport: Some(ctx.frame.viewport),
        })
    }
}

/// Anti-aliasing, bloom and final composite
pub struct PostProcessChain<B: GpuBackend + ?Sized> {
    passes: PassList<B>,
}

impl<B: GpuBackend + ?Sized + 'static> PostProcessChain<B> {
    /// Fails when there is no overlay or no colour map to select from
    pub fn new(plan: &SurfacePlan, resources: PostResources) -> Result<Self, RenderError> {
        let vp = plan.viewport();
        let mut antialias = EffectParams::new(EffectId::Antialias);
        antialias.set_vec3(
            "viewport_inv",
            Vec3::new(1.0 / vp.width.max(1) as f32, 1.0 / vp.height.max(1) as f32, 0.0),
        );

        let mut passes = PassList::new();
        passes.push(AntialiasPass {
            params: antialias,
            source: SurfaceId::Color,
        });
        passes.push(BloomPass::new(plan));
        passes.push(CompositePass::new(plan, resources)?);
        Ok(Self { passes })
    }

    pub fn active(&self, frame: &FrameContext) -> Vec<&'static str> {
        self.passes.active(frame)
    }

    pub fn render(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError> {
        self.passes.run(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraRig, Projection};
    use crate::render::letterbox::Viewport;
    use crate::sync::tracks::FrameValues;

    fn frame(values: FrameValues) -> FrameContext {
        FrameContext::new(3, values, &CameraRig::new(Projection::new(1.0)), Viewport::full(64, 36))
    }

    #[test]
    fn test_fade_pulse_and_gamma() {
        let mut values = FrameValues::default();
        values.grade.fade = 0.5;
        let v = CompositeValues::new(&frame(values), 1, 1);
        assert!((v.fade - 0.5f32.powf(2.2)).abs() < 1e-6);

        // at beat 0 the pulse wave is at its peak and cancels out
        values.grade.pulse_amount = 0.3;
        values.grade.pulse_speed = 1.0;
        let v = CompositeValues::new(&frame(values), 1, 1);
        assert!((v.fade - 0.5f32.powf(2.2)).abs() < 1e-6);

        // one beat later it is at its trough
        values.row = 4.0;
        let v = CompositeValues::new(&frame(values), 1, 1);
        assert!(v.fade.abs() < 1e-6);
    }

    #[test]
    fn test_flash() {
        let mut values = FrameValues::default();
        values.grade.flash = 0.5;
        assert_eq!(CompositeValues::new(&frame(values), 1, 1).flash, 0.25);

        values.grade.flash = -1.0;
        let f = frame(values);
        assert_eq!(CompositeValues::new(&f, 1, 1).flash, f.random);
    }

    #[test]
    fn test_distortion() {
        let mut values = FrameValues::default();
        values.row = 8.0;
        values.distortion.amount = 50.0;
        values.distortion.frequency = 1.0;
        values.distortion.offset = 0.5;
        let v = CompositeValues::new(&frame(values), 1, 1);
        assert_eq!(v.dist_amt, 0.5);
        assert!((v.dist_freq - 2.0 * std::f32::consts::PI).abs() < 1e-6);
        assert_eq!(v.dist_time, 8.5);
    }

    #[test]
    fn test_indices_wrap() {
        let mut values = FrameValues::default();
        values.grade.overlay = 7;
        values.grade.map1 = -1;
        values.grade.map2 = 4;
        let v = CompositeValues::new(&frame(values), 3, 4);
        assert_eq!(v.overlay, 1);
        assert_eq!(v.map1, 3);
        assert_eq!(v.map2, 0);
    }

    #[test]
    fn test_noise_offset_follows_beat() {
        let mut values = FrameValues::default();
        values.row = 2.0;
        let v = CompositeValues::new(&frame(values), 1, 1);
        assert_eq!(v.noise_offset.x, not_rand(50));
        assert_eq!(v.noise_offset.y, not_rand(51));
    }
}
