//! Scene composition: geometry, particles and depth of field.
//!
//! The `part` track picks one [`SceneVariant`] per frame. The variant
//! decides which passes run; the passes themselves always run in the same
//! order.

use glam::{Mat4, Vec3};

use crate::particles::{Particle, ParticleCloud, ParticleSink, ParticleStreamBuffer};
use crate::render::backend::{
    BlendMode, DepthMode, DrawCall, Geometry, GpuBackend, RenderError, TextureRef,
};
use crate::render::effect::{EffectId, EffectParams, Param};
use crate::render::frame::FrameContext;
use crate::render::mesh::MeshHandle;
use crate::render::pass::{PassContext, PassList, RenderPass};
use crate::render::surfaces::{SurfaceId, SurfacePlan, Target};
use crate::render::texture::TextureHandle;

/// Sprites orbiting the tunnel light
pub const LIGHT_SPRITES: usize = 50;

/// Radius of the light's orbit around the tunnel axis
const LIGHT_ORBIT: f32 = 70.0;

/// Background of the particle cloud scene (0x7F7F7F)
const CLOUD_BACKGROUND: [f32; 4] = [127.0 / 255.0, 127.0 / 255.0, 127.0 / 255.0, 1.0];

/// Scene content selected by the `part` track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneVariant {
    /// Environment-mapped bust
    Bust,
    /// Noise tunnel with an orbiting light
    Tunnel,
    /// Chrome logo
    Chrome,
    /// Alpha-blended particle cloud
    Cloud,
    /// Nothing but the background
    Empty,
}

impl SceneVariant {
    pub fn from_part(part: i32) -> Self {
        match part {
            0 => SceneVariant::Bust,
            1 => SceneVariant::Tunnel,
            3 => SceneVariant::Chrome,
            4 => SceneVariant::Cloud,
            _ => SceneVariant::Empty,
        }
    }

    pub fn depth_of_field(self) -> bool {
        matches!(self, SceneVariant::Bust | SceneVariant::Tunnel | SceneVariant::Chrome)
    }

    pub fn background(self) -> [f32; 4] {
        match self {
            SceneVariant::Cloud => CLOUD_BACKGROUND,
            _ => [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn light_sprites(self) -> bool {
        self == SceneVariant::Tunnel
    }

    /// Surface the post chain starts from
    pub fn output(self) -> SurfaceId {
        if self.depth_of_field() {
            SurfaceId::Dof
        } else {
            SurfaceId::Color
        }
    }
}

/// Light position driven by the beat
pub fn light_position(beat: f64) -> Vec3 {
    let a = beat * 0.1;
    Vec3::new(a.sin() as f32, a.cos() as f32, 0.0) * LIGHT_ORBIT
}

/// The sprites drawn around the light
pub fn light_sprites(beat: f64) -> impl Iterator<Item = Particle> {
    let center = light_position(beat);
    (0..LIGHT_SPRITES).map(move |i| {
        let f = i as f64;
        let dir = Vec3::new(
            (f * 32.0 + beat * 0.32).sin() as f32,
            (f * 45.0 + beat * 0.1).cos() as f32,
            (f * 23.0 - beat * 0.23).cos() as f32,
        )
        .normalize_or_zero();
        Particle::new(center + dir * i as f32 * 0.1, 20.0 / (3.0 + i as f32))
    })
}

/// GPU resources the scene draws with
#[derive(Debug, Clone, Copy)]
pub struct SceneResources {
    pub bust: MeshHandle,
    pub chrome: MeshHandle,
    pub tunnel: MeshHandle,
    /// Reflection cube map for the bust and the chrome logo
    pub environment: TextureHandle,
    pub volume_noise: TextureHandle,
    pub cloud_sprite: TextureHandle,
    pub light_sprite: TextureHandle,
}

const SCENE_TARGETS: [Target; 2] = [
    Target { surface: SurfaceId::Color, mip: 0 },
    Target { surface: SurfaceId::LinearDepth, mip: 0 },
];

struct ClearPass {
    color: [f32; 4],
}

impl<B: GpuBackend + ?Sized> RenderPass<B> for ClearPass {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn configure(&mut self, frame: &FrameContext) -> Result<(), RenderError> {
        self.color = frame.scene.background();
        Ok(())
    }

    fn reads(&self) -> Vec<SurfaceId> {
        Vec::new()
    }

    fn writes(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Color, SurfaceId::LinearDepth, SurfaceId::DepthStencil]
    }

    fn execute(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError> {
        ctx.backend.clear(&SCENE_TARGETS, self.color, Some(1.0))
    }
}

/// The opaque mesh of the bust, tunnel or chrome scene
struct MeshPass {
    resources: SceneResources,
    current: Option<(EffectId, MeshHandle, &'static str, TextureHandle)>,
    params: Option<EffectParams>,
}

impl<B: GpuBackend + ?Sized> RenderPass<B> for MeshPass {
    fn name(&self) -> &'static str {
        "mesh"
    }

    fn enabled(&self, frame: &FrameContext) -> bool {
        matches!(frame.scene, SceneVariant::Bust | SceneVariant::Tunnel | SceneVariant::Chrome)
    }

    fn configure(&mut self, frame: &FrameContext) -> Result<(), RenderError> {
        let r = &self.resources;
        let current = match frame.scene {
            SceneVariant::Bust => (EffectId::Bust, r.bust, "env_tex", r.environment),
            SceneVariant::Chrome => (EffectId::Chrome, r.chrome, "env_tex", r.environment),
            SceneVariant::Tunnel => (EffectId::Tunnel, r.tunnel, "volume_noise_tex", r.volume_noise),
            _ => {
                self.current = None;
                return Ok(());
            }
        };

        let mut params = EffectParams::new(current.0);
        params.set_matrices(Mat4::IDENTITY, frame.camera.view, frame.camera.projection);
        if current.0 == EffectId::Tunnel {
            params
                .set_float("time", (frame.beat * 0.1) as f32)
                .set_vec3("light_position", light_position(frame.beat));
        }
        self.current = Some(current);
        self.params = Some(params);
        Ok(())
    }

    fn reads(&self) -> Vec<SurfaceId> {
        Vec::new()
    }

    fn writes(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Color, SurfaceId::LinearDepth, SurfaceId::DepthStencil]
    }

    fn execute(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError> {
        let (Some((effect, mesh, slot, texture)), Some(params)) = (self.current, &self.params) else {
            return Ok(());
        };
        ctx.backend.draw(&DrawCall {
            effect,
            pass: 0,
            params,
            textures: &[(slot, TextureRef::Asset(texture))],
            targets: &SCENE_TARGETS,
            depth: DepthMode::TestWrite,
            blend: BlendMode::Opaque,
            geometry: Geometry::Mesh(mesh),
            viewport: None,
        })
    }
}

/// Issues one sprite draw per flushed batch
struct SpriteSink<'a, 'b, B: ?Sized> {
    backend: &'a mut B,
    params: &'b EffectParams,
    textures: &'b [(&'static str, TextureRef)],
    targets: &'b [Target],
    blend: BlendMode,
}

impl<B: GpuBackend + ?Sized> ParticleSink for SpriteSink<'_, '_, B> {
    type Error = RenderError;

    fn draw_batch(&mut self, batch: &[Particle]) -> Result<(), RenderError> {
        self.backend.draw(&DrawCall {
            effect: self.params.effect(),
            pass: 0,
            params: self.params,
            textures: self.textures,
            targets: self.targets,
            depth: DepthMode::TestOnly,
            blend: self.blend,
            geometry: Geometry::Sprites(batch),
            viewport: None,
        })
    }
}

fn sprite_params(effect: EffectId, frame: &FrameContext, alpha: f32) -> EffectParams {
    let mut params = EffectParams::new(effect);
    params
        .set_matrices(Mat4::IDENTITY, frame.camera.view, frame.camera.projection)
        .set_vec3("up", frame.camera.basis.up)
        .set_vec3("left", frame.camera.basis.left)
        .set("alpha", Param::Float(alpha));
    params
}

/// Back-to-front particle cloud, blended over the scene
struct CloudPass {
    cloud: ParticleCloud,
    stream: ParticleStreamBuffer,
    sprite: TextureHandle,
    params: Option<EffectParams>,
}

impl<B: GpuBackend + ?Sized> RenderPass<B> for CloudPass {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn enabled(&self, frame: &FrameContext) -> bool {
        frame.scene == SceneVariant::Cloud
    }

    fn configure(&mut self, frame: &FrameContext) -> Result<(), RenderError> {
        self.cloud.sort(frame.camera.basis.forward);
        self.params = Some(sprite_params(EffectId::Cloud, frame, 1.0));
        Ok(())
    }

    fn reads(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Color, SurfaceId::DepthStencil]
    }

    fn writes(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Color, SurfaceId::LinearDepth]
    }

    fn execute(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError> {
        let Some(params) = &self.params else {
            return Ok(());
        };
        let mut sink = SpriteSink {
            backend: &mut *ctx.backend,
            params,
            textures: &[("tex", TextureRef::Asset(self.sprite))],
            targets: &SCENE_TARGETS,
            blend: BlendMode::Premultiplied,
        };
        let emitted = self
            .stream
            .stream_all(self.cloud.particles().iter().copied(), &mut sink)?;
        tracing::trace!(emitted, "cloud streamed");
        Ok(())
    }
}

/// Three-step depth of field: circle of confusion, two-target blur, combine
struct DofPass {
    params: EffectParams,
}

impl DofPass {
    fn new(plan: &SurfacePlan) -> Self {
        let vp = plan.viewport();
        let mut params = EffectParams::new(EffectId::Dof);
        params.set_vec3("viewport", Vec3::new(vp.width as f32, vp.height as f32, 0.0));
        Self { params }
    }
}

impl<B: GpuBackend + ?Sized> RenderPass<B> for DofPass {
    fn name(&self) -> &'static str {
        "dof"
    }

    fn enabled(&self, frame: &FrameContext) -> bool {
        frame.scene.depth_of_field()
    }

    fn configure(&mut self, frame: &FrameContext) -> Result<(), RenderError> {
        let dof = &frame.values.dof;
        self.params
            .set_float("focal_distance", dof.focal_distance)
            .set_float("focal_length", dof.focal_length)
            .set_float("f_stop", dof.f_stop);
        Ok(())
    }

    fn reads(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Color, SurfaceId::LinearDepth]
    }

    fn writes(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Dof, SurfaceId::DofTemp1, SurfaceId::DofTemp2]
    }

    fn execute(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError> {
        let steps: [(&[(&'static str, TextureRef)], &[Target]); 3] = [
            (
                &[
                    ("color_tex", TextureRef::Surface(SurfaceId::Color)),
                    ("depth_tex", TextureRef::Surface(SurfaceId::LinearDepth)),
                ],
                &[Target { surface: SurfaceId::Dof, mip: 0 }],
            ),
            (
                &[("premult_tex", TextureRef::Surface(SurfaceId::Dof))],
                &[
                    Target { surface: SurfaceId::DofTemp1, mip: 0 },
                    Target { surface: SurfaceId::DofTemp2, mip: 0 },
                ],
            ),
            (
                &[
                    ("temp1_tex", TextureRef::Surface(SurfaceId::DofTemp1)),
                    ("temp2_tex", TextureRef::Surface(SurfaceId::DofTemp2)),
                ],
                &[Target { surface: SurfaceId::Dof, mip: 0 }],
            ),
        ];

        for (pass, (textures, targets)) in steps.into_iter().enumerate() {
            ctx.backend.draw(&DrawCall {
                effect: EffectId::Dof,
                pass,
                params: &self.params,
                textures,
                targets,
                depth: DepthMode::Disabled,
                blend: BlendMode::Opaque,
                geometry: Geometry::Fullscreen,
                viewport: None,
            })?;
        }
        Ok(())
    }
}

/// Glow sprites around the tunnel light, added on top of the focused image
struct LightSpritePass {
    stream: ParticleStreamBuffer,
    sprite: TextureHandle,
    params: Option<EffectParams>,
    beat: f64,
}

impl<B: GpuBackend + ?Sized> RenderPass<B> for LightSpritePass {
    fn name(&self) -> &'static str {
        "light sprites"
    }

    fn enabled(&self, frame: &FrameContext) -> bool {
        frame.scene.light_sprites()
    }

    fn configure(&mut self, frame: &FrameContext) -> Result<(), RenderError> {
        self.beat = frame.beat;
        self.params = Some(sprite_params(EffectId::Light, frame, 0.5));
        Ok(())
    }

    fn reads(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Dof, SurfaceId::DepthStencil]
    }

    fn writes(&self) -> Vec<SurfaceId> {
        vec![SurfaceId::Dof]
    }

    fn execute(&mut self, ctx: &mut PassContext<'_, B>) -> Result<(), RenderError> {
        let Some(params) = &self.params else {
            return Ok(());
        };
        let mut sink = SpriteSink {
            backend: &mut *ctx.backend,
            params,
            textures: &[("tex", TextureRef::Asset(self.sprite))],
            targets: &[Target { surface: SurfaceId::Dof, mip: 0 }],
            // Same blend state as the cloud; the light shader writes zero
            // alpha, so the glow adds onto the focused image
            blend: BlendMode::Premultiplied,
        };
        self.stream.stream_all(light_sprites(self.beat), &mut sink)?;
        Ok(())
    }
}

/// Geometry, particle and depth-of-field passes for one frame
pub struct SceneCompositor<B: GpuBackend + ?Sized> {
    passes: PassList<B>,
}

impl<B: GpuBackend + ?Sized + 'static> SceneCompositor<B> {
    /// `cloud` is drawn in the particle scene; `capacity` bounds each
    /// sprite flush.
    pub fn new(plan: &SurfacePlan, resources: SceneResources, cloud: ParticleCloud, capacity: usize) -> Self {
        let mut passes = PassList::new();
        passes.push(ClearPass { color: [0.0; 4] });
        passes.push(MeshPass {
            resources,
            current: None,
            params: None,
        });
        passes.push(CloudPass {
            cloud,
            stream: ParticleStreamBuffer::new(capacity),
            sprite: resources.cloud_sprite,
            params: None,
        });
        passes.push(DofPass::new(plan));
        passes.push(LightSpritePass {
            stream: ParticleStreamBuffer::new(capacity),
            sprite: resources.light_sprite,
            params: None,
            beat: 0.0,
        });
        Self { passes }
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
    use test_case::test_case;

    #[test_case(0, SceneVariant::Bust, true)]
    #[test_case(1, SceneVariant::Tunnel, true)]
    #[test_case(2, SceneVariant::Empty, false)]
    #[test_case(3, SceneVariant::Chrome, true)]
    #[test_case(4, SceneVariant::Cloud, false)]
    #[test_case(-1, SceneVariant::Empty, false)]
    fn test_part_selects_scene(part: i32, scene: SceneVariant, dof: bool) {
        let variant = SceneVariant::from_part(part);
        assert_eq!(variant, scene);
        assert_eq!(variant.depth_of_field(), dof);
        assert_eq!(variant.output(), if dof { SurfaceId::Dof } else { SurfaceId::Color });
    }

    #[test]
    fn test_cloud_background_is_grey() {
        assert_eq!(SceneVariant::Cloud.background()[0], 127.0 / 255.0);
        assert_eq!(SceneVariant::Bust.background(), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_light_orbit() {
        assert!((light_position(0.0) - Vec3::new(0.0, 70.0, 0.0)).length() < 1e-4);
        let p = light_position(13.7);
        assert!((p.length() - LIGHT_ORBIT).abs() < 1e-3);
        assert_eq!(p.z, 0.0);
    }

    #[test]
    fn test_light_sprites() {
        let sprites: Vec<Particle> = light_sprites(8.0).collect();
        assert_eq!(sprites.len(), LIGHT_SPRITES);
        assert_eq!(sprites[0].position, light_position(8.0).to_array());
        assert_eq!(sprites[0].size, 20.0 / 3.0);
        let center = light_position(8.0);
        for (i, s) in sprites.iter().enumerate() {
            let d = (Vec3::from(s.position) - center).length();
            assert!(d <= i as f32 * 0.1 + 1e-4);
        }
    }
}
