//! Effect descriptors and the parameter model.
//!
//! An effect is a WGSL program plus the named parameters and textures it
//! consumes. Parameters are packed into one uniform block in declaration
//! order; each scalar or vector takes a 16-byte slot and a matrix takes
//! four. Textures bind at 3.. in declaration order after the uniform block
//! (0), a clamping sampler (1) and a repeating sampler (2).

use std::collections::HashMap;

use glam::{Mat4, Vec3, Vec4};

use crate::render::backend::RenderError;
use crate::render::shader;

/// Every effect the demo draws with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectId {
    Bust,
    Chrome,
    Tunnel,
    Cloud,
    Light,
    Dof,
    Antialias,
    Blur,
    Composite,
}

/// Vertex input an effect expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Mesh,
    Sprite,
    /// One oversized triangle generated from the vertex index
    Fullscreen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Float,
    Int,
    Vec3,
    Vec4,
    Mat4,
    Vec4Array(usize),
}

impl ParamKind {
    /// Uniform slots of 16 bytes
    pub fn slots(self) -> usize {
        match self {
            ParamKind::Mat4 => 4,
            ParamKind::Vec4Array(n) => n,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
    D3,
    /// Single float channel, read with `textureLoad`
    Depth,
}

/// Entry points and output count of one program pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramPass {
    pub vertex: &'static str,
    pub fragment: &'static str,
    pub targets: usize,
}

/// Static description of an effect
#[derive(Debug, Clone, Copy)]
pub struct EffectDesc {
    pub id: EffectId,
    pub label: &'static str,
    pub source: &'static str,
    pub geometry: GeometryKind,
    pub passes: &'static [ProgramPass],
    pub params: &'static [(&'static str, ParamKind)],
    pub textures: &'static [(&'static str, TextureKind)],
}

impl EffectDesc {
    pub fn uniform_slots(&self) -> usize {
        self.params.iter().map(|(_, kind)| kind.slots()).sum()
    }

    /// Binding slot of a texture parameter
    pub fn texture_binding(&self, name: &str) -> Option<u32> {
        self.textures
            .iter()
            .position(|(n, _)| *n == name)
            .map(|i| i as u32 + 3)
    }
}

const SINGLE: &[ProgramPass] = &[ProgramPass {
    vertex: "vs_main",
    fragment: "fs_main",
    targets: 1,
}];

const SCENE: &[ProgramPass] = &[ProgramPass {
    vertex: "vs_main",
    fragment: "fs_main",
    targets: 2,
}];

const MATRICES: [(&str, ParamKind); 3] = [
    ("world", ParamKind::Mat4),
    ("view", ParamKind::Mat4),
    ("proj", ParamKind::Mat4),
];

const SPRITE_PARAMS: &[(&str, ParamKind)] = &[
    MATRICES[0],
    MATRICES[1],
    MATRICES[2],
    ("up", ParamKind::Vec3),
    ("left", ParamKind::Vec3),
    ("alpha", ParamKind::Float),
];

const BUST: EffectDesc = EffectDesc {
    id: EffectId::Bust,
    label: "bust",
    source: shader::BUST,
    geometry: GeometryKind::Mesh,
    passes: SCENE,
    params: &MATRICES,
    textures: &[("env_tex", TextureKind::Cube)],
};

const CHROME: EffectDesc = EffectDesc {
    id: EffectId::Chrome,
    label: "chrome",
    source: shader::CHROME,
    ..BUST
};

const TUNNEL: EffectDesc = EffectDesc {
    id: EffectId::Tunnel,
    label: "tunnel",
    source: shader::TUNNEL,
    geometry: GeometryKind::Mesh,
    passes: SCENE,
    params: &[
        MATRICES[0],
        MATRICES[1],
        MATRICES[2],
        ("time", ParamKind::Float),
        ("light_position", ParamKind::Vec3),
    ],
    textures: &[("volume_noise_tex", TextureKind::D3)],
};

const CLOUD: EffectDesc = EffectDesc {
    id: EffectId::Cloud,
    label: "cloud",
    source: shader::CLOUD,
    geometry: GeometryKind::Sprite,
    passes: SCENE,
    params: SPRITE_PARAMS,
    textures: &[("tex", TextureKind::D2)],
};

const LIGHT: EffectDesc = EffectDesc {
    id: EffectId::Light,
    label: "light",
    source: shader::LIGHT,
    passes: SINGLE,
    ..CLOUD
};

const DOF: EffectDesc = EffectDesc {
    id: EffectId::Dof,
    label: "dof",
    source: shader::DOF,
    geometry: GeometryKind::Fullscreen,
    passes: &[
        ProgramPass { vertex: "vs_main", fragment: "fs_coc", targets: 1 },
        ProgramPass { vertex: "vs_main", fragment: "fs_blur", targets: 2 },
        ProgramPass { vertex: "vs_main", fragment: "fs_combine", targets: 1 },
    ],
    params: &[
        ("viewport", ParamKind::Vec3),
        ("focal_distance", ParamKind::Float),
        ("focal_length", ParamKind::Float),
        ("f_stop", ParamKind::Float),
    ],
    textures: &[
        ("color_tex", TextureKind::D2),
        ("depth_tex", TextureKind::Depth),
        ("premult_tex", TextureKind::D2),
        ("temp1_tex", TextureKind::D2),
        ("temp2_tex", TextureKind::D2),
    ],
};

const ANTIALIAS: EffectDesc = EffectDesc {
    id: EffectId::Antialias,
    label: "antialias",
    source: shader::ANTIALIAS,
    geometry: GeometryKind::Fullscreen,
    passes: &[ProgramPass { vertex: "vs_main", fragment: "fs_main", targets: 2 }],
    params: &[("viewport_inv", ParamKind::Vec3), ("bloom_cutoff", ParamKind::Float)],
    textures: &[("color_tex", TextureKind::D2)],
};

const BLUR: EffectDesc = EffectDesc {
    id: EffectId::Blur,
    label: "blur",
    source: shader::BLUR,
    geometry: GeometryKind::Fullscreen,
    passes: SINGLE,
    params: &[("gauss", ParamKind::Vec4Array(crate::render::bloom::KERNEL_TAPS))],
    textures: &[("blur_tex", TextureKind::D2)],
};

const COMPOSITE: EffectDesc = EffectDesc {
    id: EffectId::Composite,
    label: "composite",
    source: shader::COMPOSITE,
    geometry: GeometryKind::Fullscreen,
    passes: SINGLE,
    params: &[
        ("viewport", ParamKind::Vec3),
        ("nscale", ParamKind::Vec3),
        ("noffs", ParamKind::Vec3),
        ("flash", ParamKind::Float),
        ("fade", ParamKind::Float),
        ("dist_amt", ParamKind::Float),
        ("dist_freq", ParamKind::Float),
        ("dist_time", ParamKind::Float),
        ("overlay_alpha", ParamKind::Float),
        ("bloom_amt", ParamKind::Float),
        ("bloom_shape", ParamKind::Float),
        ("bloom_levels", ParamKind::Int),
        ("color_map_lerp", ParamKind::Float),
    ],
    textures: &[
        ("color_tex", TextureKind::D2),
        ("bloom_tex", TextureKind::D2),
        ("noise_tex", TextureKind::D2),
        ("spectrum_tex", TextureKind::D2),
        ("overlay_tex", TextureKind::D2),
        ("color_map1_tex", TextureKind::D3),
        ("color_map2_tex", TextureKind::D3),
    ],
};

impl EffectId {
    pub const ALL: [EffectId; 9] = [
        EffectId::Bust,
        EffectId::Chrome,
        EffectId::Tunnel,
        EffectId::Cloud,
        EffectId::Light,
        EffectId::Dof,
        EffectId::Antialias,
        EffectId::Blur,
        EffectId::Composite,
    ];

    pub fn desc(self) -> &'static EffectDesc {
        match self {
            EffectId::Bust => &BUST,
            EffectId::Chrome => &CHROME,
            EffectId::Tunnel => &TUNNEL,
            EffectId::Cloud => &CLOUD,
            EffectId::Light => &LIGHT,
            EffectId::Dof => &DOF,
            EffectId::Antialias => &ANTIALIAS,
            EffectId::Blur => &BLUR,
            EffectId::Composite => &COMPOSITE,
        }
    }
}

/// A parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Float(f32),
    Int(i32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    Vec4Array(Vec<[f32; 4]>),
}

impl Param {
    fn matches(&self, kind: ParamKind) -> bool {
        match (self, kind) {
            (Param::Float(_), ParamKind::Float)
            | (Param::Int(_), ParamKind::Int)
            | (Param::Vec3(_), ParamKind::Vec3)
            | (Param::Vec4(_), ParamKind::Vec4)
            | (Param::Mat4(_), ParamKind::Mat4) => true,
            (Param::Vec4Array(v), ParamKind::Vec4Array(n)) => v.len() == n,
            _ => false,
        }
    }

    fn write(&self, out: &mut Vec<[f32; 4]>) {
        match self {
            Param::Float(f) => out.push([*f, 0.0, 0.0, 0.0]),
            Param::Int(i) => out.push([*i as f32, 0.0, 0.0, 0.0]),
            Param::Vec3(v) => out.push(v.extend(0.0).to_array()),
            Param::Vec4(v) => out.push(v.to_array()),
            Param::Mat4(m) => out.extend(m.to_cols_array_2d()),
            Param::Vec4Array(v) => out.extend_from_slice(v),
        }
    }
}

/// Parameter values set on an effect, checked against its descriptor when
/// packed
#[derive(Debug, Clone)]
pub struct EffectParams {
    effect: EffectId,
    values: HashMap<&'static str, Param>,
}

impl EffectParams {
    pub fn new(effect: EffectId) -> Self {
        Self {
            effect,
            values: HashMap::new(),
        }
    }

    pub fn effect(&self) -> EffectId {
        self.effect
    }

    pub fn set(&mut self, name: &'static str, value: Param) -> &mut Self {
        self.values.insert(name, value);
        self
    }

    pub fn set_float(&mut self, name: &'static str, value: f32) -> &mut Self {
        self.set(name, Param::Float(value))
    }

    pub fn set_vec3(&mut self, name: &'static str, value: Vec3) -> &mut Self {
        self.set(name, Param::Vec3(value))
    }

    /// Set world, view and projection together
    pub fn set_matrices(&mut self, world: Mat4, view: Mat4, proj: Mat4) -> &mut Self {
        self.set("world", Param::Mat4(world))
            .set("view", Param::Mat4(view))
            .set("proj", Param::Mat4(proj))
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.values.get(name)
    }

    /// Uniform block contents in declaration order
    pub fn pack(&self) -> Result<Vec<[f32; 4]>, RenderError> {
        let desc = self.effect.desc();
        let mut out = Vec::with_capacity(desc.uniform_slots());
        for &(name, kind) in desc.params {
            let value = self.values.get(name).ok_or(RenderError::MissingParameter {
                effect: desc.label,
                name,
            })?;
            if !value.matches(kind) {
                return Err(RenderError::ParameterType {
                    effect: desc.label,
                    name,
                });
            }
            value.write(&mut out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_are_consistent() {
        for id in EffectId::ALL {
            let desc = id.desc();
            assert_eq!(desc.id, id);
            assert!(!desc.passes.is_empty());
            for pass in desc.passes {
                assert!(desc.source.contains(pass.vertex), "{} lacks {}", desc.label, pass.vertex);
                assert!(desc.source.contains(pass.fragment), "{} lacks {}", desc.label, pass.fragment);
            }
            for (name, _) in desc.textures {
                assert!(desc.source.contains(name), "{} lacks {}", desc.label, name);
            }
        }
    }

    #[test]
    fn test_pack_order_and_slots() {
        let mut params = EffectParams::new(EffectId::Antialias);
        params
            .set_float("bloom_cutoff", 0.75)
            .set_vec3("viewport_inv", Vec3::new(0.5, 0.25, 0.0));
        let packed = params.pack().unwrap();
        assert_eq!(packed, vec![[0.5, 0.25, 0.0, 0.0], [0.75, 0.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_pack_matrices() {
        let mut params = EffectParams::new(EffectId::Bust);
        let world = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        params.set_matrices(world, Mat4::IDENTITY, Mat4::IDENTITY);
        let packed = params.pack().unwrap();
        assert_eq!(packed.len(), EffectId::Bust.desc().uniform_slots());
        assert_eq!(packed.len(), 12);
        assert_eq!(packed[3], [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_missing_parameter() {
        let mut params = EffectParams::new(EffectId::Antialias);
        params.set_float("bloom_cutoff", 0.75);
        assert!(matches!(
            params.pack(),
            Err(RenderError::MissingParameter { name: "viewport_inv", .. })
        ));
    }

    #[test]
    fn test_wrong_parameter_type() {
        let mut params = EffectParams::new(EffectId::Blur);
        params.set("gauss", Param::Vec4Array(vec![[0.0; 4]; 3]));
        assert!(matches!(
            params.pack(),
            Err(RenderError::ParameterType { name: "gauss", .. })
        ));
    }

    #[test]
    fn test_texture_bindings_start_after_samplers() {
        let desc = EffectId::Composite.desc();
        assert_eq!(desc.texture_binding("color_tex"), Some(3));
        assert_eq!(desc.texture_binding("color_map2_tex"), Some(9));
        assert_eq!(desc.texture_binding("nope"), None);
    }
}
