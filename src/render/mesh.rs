//! Mesh and sprite vertex data.

use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

use crate::particles::Particle;

/// Handle of an uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) usize);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Deserialize)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Indexed triangle list
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Check every index refers to a vertex and the list is whole triangles
    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err(format!("{} indices do not form triangles", self.indices.len()));
        }
        match self.indices.iter().find(|&&i| i as usize >= self.vertices.len()) {
            Some(i) => Err(format!("index {} out of range for {} vertices", i, self.vertices.len())),
            None => Ok(()),
        }
    }
}

/// Corner of a sprite quad
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub size: f32,
    pub corner: [f32; 2],
}

const CORNERS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// Expand particles into four vertices each
pub fn sprite_vertices(particles: &[Particle]) -> Vec<SpriteVertex> {
    particles
        .iter()
        .flat_map(|p| {
            CORNERS.map(|corner| SpriteVertex {
                position: p.position,
                size: p.size,
                corner,
            })
        })
        .collect()
}

/// Index list for `count` quads, two triangles each
pub fn sprite_indices(count: usize) -> Vec<u32> {
    (0..count as u32)
        .flat_map(|q| {
            let b = q * 4;
            [b, b + 1, b + 2, b, b + 2, b + 3]
        })
        .collect()
}
