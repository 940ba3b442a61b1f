//! Bounded particle staging.
//!
//! At most `capacity` particles are staged at once. A full buffer must be
//! flushed, which issues one draw, before anything else can be added.

use crate::particles::cloud::Particle;

/// Error type for staging particles
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("Particle stream buffer is full ({capacity} particles); flush before adding")]
    Full { capacity: usize },
}

/// Receiver of flushed batches, normally one GPU draw per call
pub trait ParticleSink {
    type Error;

    fn draw_batch(&mut self, batch: &[Particle]) -> Result<(), Self::Error>;
}

/// Fixed-capacity CPU staging buffer for particle sprites
#[derive(Debug)]
pub struct ParticleStreamBuffer {
    staged: Vec<Particle>,
    capacity: usize,
}

impl ParticleStreamBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            staged: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether another particle fits before a flush is needed
    pub fn has_room(&self) -> bool {
        self.staged.len() < self.capacity
    }

    pub fn staged(&self) -> &[Particle] {
        &self.staged
    }

    pub fn add(&mut self, particle: Particle) -> Result<(), StreamError> {
        if !self.has_room() {
            return Err(StreamError::Full {
                capacity: self.capacity,
            });
        }
        self.staged.push(particle);
        Ok(())
    }

    /// Hand the staged batch to `sink` and reset. An empty buffer issues no
    /// draw. Returns the number of particles flushed.
    pub fn flush<S: ParticleSink>(&mut self, sink: &mut S) -> Result<usize, S::Error> {
        if self.staged.is_empty() {
            return Ok(0);
        }
        sink.draw_batch(&self.staged)?;
        let flushed = self.staged.len();
        self.staged.clear();
        Ok(flushed)
    }

    /// Stream every particle, flushing whenever the buffer fills and once
    /// more at the end. Returns the number of particles emitted.
    pub fn stream_all<S, I>(&mut self, particles: I, sink: &mut S) -> Result<usize, S::Error>
    where
        S: ParticleSink,
        I: IntoIterator<Item = Particle>,
    {
        let mut emitted = 0;
        for particle in particles {
            if !self.has_room() {
                emitted += self.flush(sink)?;
            }
            self.staged.push(particle);
        }
        emitted += self.flush(sink)?;
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use test_case::test_case;

    #[derive(Default)]
    struct CountingSink {
        batches: Vec<usize>,
    }

    impl ParticleSink for CountingSink {
        type Error = std::convert::Infallible;

        fn draw_batch(&mut self, batch: &[Particle]) -> Result<(), Self::Error> {
            self.batches.push(batch.len());
            Ok(())
        }
    }

    fn particle(i: usize) -> Particle {
        Particle::new(Vec3::splat(i as f32), 1.0)
    }

    #[test]
    fn test_capacity_four() {
        let mut buffer = ParticleStreamBuffer::new(4);
        let mut sink = CountingSink::default();
        for i in 0..4 {
            assert!(buffer.has_room());
            buffer.add(particle(i)).unwrap();
        }
        assert!(!buffer.has_room());
        assert_eq!(buffer.add(particle(4)), Err(StreamError::Full { capacity: 4 }));
        assert_eq!(buffer.staged().len(), 4);

        assert_eq!(buffer.flush(&mut sink).unwrap(), 4);
        assert!(buffer.has_room());
        buffer.add(particle(4)).unwrap();
        assert_eq!(buffer.flush(&mut sink).unwrap(), 1);
        assert_eq!(sink.batches, vec![4, 1]);
    }

    #[test]
    fn test_empty_flush_draws_nothing() {
        let mut buffer = ParticleStreamBuffer::new(4);
        let mut sink = CountingSink::default();
        assert_eq!(buffer.flush(&mut sink).unwrap(), 0);
        assert!(sink.batches.is_empty());
    }

    #[test_case(0, 4, &[] ; "nothing")]
    #[test_case(3, 4, &[3] ; "partial")]
    #[test_case(4, 4, &[4] ; "exactly full")]
    #[test_case(10, 4, &[4, 4, 2] ; "several flushes")]
    #[test_case(30000, 1024, &[] ; "cloud")]
    fn test_stream_all_conserves_particles(count: usize, capacity: usize, expected: &[usize]) {
        let mut buffer = ParticleStreamBuffer::new(capacity);
        let mut sink = CountingSink::default();
        let emitted = buffer.stream_all((0..count).map(particle), &mut sink).unwrap();

        assert_eq!(emitted, count);
        assert_eq!(sink.batches.iter().sum::<usize>(), count);
        assert!(sink.batches.iter().all(|&n| n > 0 && n <= capacity));
        if !expected.is_empty() {
            assert_eq!(sink.batches, expected);
        }
        assert!(buffer.staged().is_empty());
    }

    #[test]
    fn test_sink_error_propagates() {
        struct FailingSink;
        impl ParticleSink for FailingSink {
            type Error = &'static str;
            fn draw_batch(&mut self, _: &[Particle]) -> Result<(), Self::Error> {
                Err("device lost")
            }
        }
        let mut buffer = ParticleStreamBuffer::new(2);
        assert_eq!(buffer.stream_all((0..5).map(particle), &mut FailingSink), Err("device lost"));
    }
}
