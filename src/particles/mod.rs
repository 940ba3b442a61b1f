//! Particle sprites: the cloud model and the bounded GPU staging buffer.

pub mod cloud;
pub mod stream;

pub use cloud::{Particle, ParticleCloud};
pub use stream::{ParticleSink, ParticleStreamBuffer, StreamError};
