//! Deterministic integer-hash noise.
//!
//! Used wherever the demo wants "random" numbers that are identical on every
//! run: particle placement, noise texture offsets, light sprite jitter.

/// Hash an integer to a float in `[0, 1)`
pub fn not_rand(seed: i32) -> f32 {
    let n = seed as u32;
    let n = (n << 13) ^ n;
    let n = n
        .wrapping_mul(n.wrapping_mul(n).wrapping_mul(15731).wrapping_add(789_221))
        .wrapping_add(1_376_312_589)
        & 0x7fff_ffff;
    // 23 bits keeps the quotient exactly representable below 1.0
    (n >> 8) as f32 / 8_388_608.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range() {
        for i in -1000..1000 {
            let v = not_rand(i);
            assert!((0.0..1.0).contains(&v), "not_rand({}) = {}", i, v);
        }
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(not_rand(42), not_rand(42));
        assert_ne!(not_rand(1), not_rand(2));
    }
}
