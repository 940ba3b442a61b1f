//! Particle cloud model.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::core::noise::not_rand;

/// Half-extent of the generated cloud cube
pub const CLOUD_EXTENT: f32 = 300.0;

/// A camera-facing sprite
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: [f32; 3],
    pub size: f32,
}

impl Particle {
    pub fn new(position: Vec3, size: f32) -> Self {
        Self {
            position: position.to_array(),
            size,
        }
    }
}

/// Unordered set of particles
#[derive(Debug, Clone, Default)]
pub struct ParticleCloud {
    particles: Vec<Particle>,
}

impl ParticleCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic cloud filling a cube around the origin.
    /// Particle `i` draws four hash values starting at seed `4i`.
    pub fn generate(count: usize) -> Self {
        let particles = (0..count as i32)
            .map(|i| {
                let n = |k: i32| not_rand(i.wrapping_mul(4).wrapping_add(k));
                let position = Vec3::new(n(0) * 2.0 - 1.0, n(1) * 2.0 - 1.0, n(2) * 2.0 - 1.0) * CLOUD_EXTENT;
                let size = (0.5 * n(3) * 0.5) * 20.0;
                Particle::new(position, size)
            })
            .collect();
        Self { particles }
    }

    pub fn push(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Order back-to-front along `forward`: farthest first
    pub fn sort(&mut self, forward: Vec3) {
        let depth = |p: &Particle| Vec3::from(p.position).dot(forward);
        self.particles
            .sort_by(|a, b| depth(b).total_cmp(&depth(a)));
    }
}
