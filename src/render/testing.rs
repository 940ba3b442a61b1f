//! Recording backend for exercising passes without a GPU.

use crate::render::backend::{
    BlendMode, DepthMode, DrawCall, Geometry, GpuBackend, RenderError, TextureRef,
};
use crate::render::effect::{EffectId, GeometryKind};
use crate::render::letterbox::Viewport;
use crate::render::mesh::{MeshData, MeshHandle};
use crate::render::surfaces::{SurfaceId, SurfacePlan, Target};
use crate::render::texture::{TextureData, TextureHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BeginFrame,
    Clear {
        targets: Vec<Target>,
        color: [f32; 4],
        depth: Option<f32>,
    },
    Draw {
        effect: EffectId,
        pass: usize,
        targets: Vec<Target>,
        textures: Vec<(&'static str, TextureRef)>,
        sprites: usize,
        depth: DepthMode,
        blend: BlendMode,
        viewport: Option<Viewport>,
    },
    Downsample {
        surface: SurfaceId,
        level: u32,
    },
    Present,
}

/// Backend that checks each call against the effect descriptors and
/// records it
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    pub plan: Option<SurfacePlan>,
    pub capacity: usize,
    meshes: usize,
    textures: usize,
    in_frame: bool,
}

impl RecordingBackend {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    fn check_target(&self, target: &Target) -> Result<(), RenderError> {
        if target.surface == SurfaceId::Present {
            return Ok(());
        }
        let desc = self
            .plan
            .as_ref()
            .and_then(|p| p.get(target.surface))
            .ok_or(RenderError::UnknownSurface(target.surface))?;
        if target.mip >= desc.mip_levels {
            return Err(RenderError::InvalidResource(format!(
                "{} has no mip {}",
                target.surface.label(),
                target.mip
            )));
        }
        Ok(())
    }

    /// Draws recorded since the last frame began
    pub fn draws(&self) -> impl Iterator<Item = &Call> {
        self.calls.iter().filter(|c| matches!(c, Call::Draw { .. }))
    }

    pub fn draws_of(&self, effect: EffectId) -> Vec<&Call> {
        self.draws()
            .filter(|c| matches!(c, Call::Draw { effect: e, .. } if *e == effect))
            .collect()
    }

    /// Effects in draw order, consecutive repeats collapsed
    pub fn effect_sequence(&self) -> Vec<EffectId> {
        let mut seq: Vec<EffectId> = Vec::new();
        for call in self.draws() {
            if let Call::Draw { effect, .. } = call {
                if seq.last() != Some(effect) {
                    seq.push(*effect);
                }
            }
        }
        seq
    }
}

impl GpuBackend for RecordingBackend {
    fn create_surfaces(&mut self, plan: &SurfacePlan) -> Result<(), RenderError> {
        self.plan = Some(plan.clone());
        Ok(())
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, RenderError> {
        mesh.validate().map_err(RenderError::InvalidResource)?;
        self.meshes += 1;
        Ok(MeshHandle(self.meshes - 1))
    }

    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureHandle, RenderError> {
        if !texture.is_valid() {
            return Err(RenderError::InvalidResource("bad texture".into()));
        }
        self.textures += 1;
        Ok(TextureHandle(self.textures - 1))
    }

    fn sprite_capacity(&self) -> usize {
        self.capacity
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.in_frame = true;
        self.calls.clear();
        self.calls.push(Call::BeginFrame);
        Ok(())
    }

    fn clear(&mut self, targets: &[Target], color: [f32; 4], depth: Option<f32>) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoFrame);
        }
        for t in targets {
            self.check_target(t)?;
        }
        self.calls.push(Call::Clear {
            targets: targets.to_vec(),
            color,
            depth,
        });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoFrame);
        }
        let desc = call.effect.desc();
        assert_eq!(call.params.effect(), call.effect, "parameters belong to another effect");
        call.params.pack()?;
        let pass = desc.passes.get(call.pass).ok_or(RenderError::UnknownPass {
            effect: desc.label,
            pass: call.pass,
        })?;
        assert_eq!(pass.targets, call.targets.len(), "{} pass {} target count", desc.label, call.pass);
        for t in call.targets {
            self.check_target(t)?;
        }
        for (name, texture) in call.textures {
            if desc.texture_binding(name).is_none() {
                return Err(RenderError::UnknownTexture {
                    effect: desc.label,
                    name,
                });
            }
            if let Some(surface) = texture.surface() {
                assert!(
                    call.targets.iter().all(|t| t.surface != surface || matches!(texture, TextureRef::SurfaceMip(_, m) if *m != t.mip)),
                    "{} samples {:?} while rendering to it",
                    desc.label,
                    surface
                );
            }
        }
        let sprites = match (call.geometry, desc.geometry) {
            (Geometry::Sprites(batch), GeometryKind::Sprite) => {
                if batch.len() > self.capacity {
                    return Err(RenderError::SpriteOverflow {
                        count: batch.len(),
                        capacity: self.capacity,
                    });
                }
                batch.len()
            }
            (Geometry::Mesh(MeshHandle(m)), GeometryKind::Mesh) => {
                assert!(m < self.meshes, "unknown mesh");
                0
            }
            (Geometry::Fullscreen, GeometryKind::Fullscreen) => 0,
            (geometry, kind) => panic!("{:?} drawn with {:?} effect", geometry, kind),
        };
        self.calls.push(Call::Draw {
            effect: call.effect,
            pass: call.pass,
            targets: call.targets.to_vec(),
            textures: call.textures.to_vec(),
            sprites,
            depth: call.depth,
            blend: call.blend,
            viewport: call.viewport,
        });
        Ok(())
    }

    fn downsample(&mut self, surface: SurfaceId, level: u32) -> Result<(), RenderError> {
        self.check_target(&Target::mip(surface, level + 1))?;
        self.calls.push(Call::Downsample { surface, level });
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoFrame);
        }
        self.in_frame = false;
        self.calls.push(Call::Present);
        Ok(())
    }
}
