//! Separable Gaussian kernel for the bloom pyramid.
//!
//! Fifteen taps are folded into eight samples: the center plus seven pairs
//! of adjacent offsets merged at their weighted midpoint, relying on
//! bilinear filtering to blend the pair.

/// Standard deviation used by the bloom blur, in texels
pub const BLOOM_STD_DEV: f32 = 16.0 / 3.0;

/// Samples per axis
pub const KERNEL_TAPS: usize = 8;

/// Down-sample and blur iterations in the bloom pyramid
pub const BLOOM_LEVELS: u32 = 7;

/// Blur direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// One kernel sample: texel offset (unnormalized) and weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tap {
    pub offset: f32,
    pub weight: f32,
}

/// Drops the tail of the curve so the outermost taps reach zero
fn floor_weight(w: f64) -> f64 {
    (w * 1.004 - 0.004).max(0.0)
}

/// Compute the normalized kernel; tap 0 is the center.
pub fn gauss_kernel(std_dev: f32) -> [Tap; KERNEL_TAPS] {
    let sigma_sq = std_dev as f64 * std_dev as f64;
    let scale = 1.0 / (2.0 * std::f64::consts::PI * sigma_sq).sqrt().max(1.0);
    let gauss = |o: f64| floor_weight(scale * (-o * o / (2.0 * sigma_sq)).exp());

    let mut taps = [Tap { offset: 0.0, weight: 0.0 }; KERNEL_TAPS];
    let center = floor_weight(scale);
    taps[0].weight = center as f32;
    let mut total = center;

    for (k, tap) in taps.iter_mut().enumerate().skip(1) {
        let o1 = (2 * k - 1) as f64;
        let o2 = (2 * k) as f64;
        let w1 = gauss(o1);
        let w2 = gauss(o2);
        let w = w1 + w2;
        let offset = if w > 0.0 { (o1 * w1 + o2 * w2) / w } else { o1 };
        *tap = Tap {
            offset: offset as f32,
            weight: w as f32,
        };
        total += 2.0 * w;
    }

    for tap in &mut taps {
        tap.weight = (tap.weight as f64 / total) as f32;
    }
    taps
}

/// Pack a kernel as shader vectors: (du, dv, weight, 0) with offsets in
/// texture coordinates of a level `width`×`height` texels.
pub fn pack_kernel(taps: &[Tap; KERNEL_TAPS], axis: Axis, width: u32, height: u32) -> [[f32; 4]; KERNEL_TAPS] {
    let mut out = [[0.0; 4]; KERNEL_TAPS];
    for (dst, tap) in out.iter_mut().zip(taps) {
        *dst = match axis {
            Axis::Horizontal => [tap.offset / width.max(1) as f32, 0.0, tap.weight, 0.0],
            Axis::Vertical => [0.0, tap.offset / height.max(1) as f32, tap.weight, 0.0],
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn mirrored_sum(taps: &[Tap; KERNEL_TAPS]) -> f32 {
        taps[0].weight + 2.0 * taps[1..].iter().map(|t| t.weight).sum::<f32>()
    }

    #[test_case(BLOOM_STD_DEV)]
    #[test_case(0.25)]
    #[test_case(1.0)]
    #[test_case(3.0)]
    #[test_case(40.0)]
    fn test_weights_sum_to_one(std_dev: f32) {
        let taps = gauss_kernel(std_dev);
        assert!((mirrored_sum(&taps) - 1.0).abs() < 1e-5);
        assert!(taps.iter().all(|t| t.weight >= 0.0));
    }

    #[test]
    fn test_offsets_between_pairs() {
        let taps = gauss_kernel(BLOOM_STD_DEV);
        assert_eq!(taps[0].offset, 0.0);
        for (k, tap) in taps.iter().enumerate().skip(1) {
            let lo = (2 * k - 1) as f32;
            assert!(tap.offset >= lo && tap.offset <= lo + 1.0, "tap {} at {}", k, tap.offset);
        }
    }

    #[test]
    fn test_weights_decrease_outward() {
        let taps = gauss_kernel(BLOOM_STD_DEV);
        for pair in taps[1..].windows(2) {
            assert!(pair[0].weight >= pair[1].weight);
        }
    }

    #[test]
    fn test_narrow_kernel_zeroes_tail() {
        let taps = gauss_kernel(0.5);
        assert_eq!(taps[KERNEL_TAPS - 1].weight, 0.0);
        // zero-weight pairs fall back to the inner offset
        assert_eq!(taps[KERNEL_TAPS - 1].offset, (2 * KERNEL_TAPS - 3) as f32);
    }

    #[test]
    fn test_pack_kernel_axes() {
        let taps = gauss_kernel(BLOOM_STD_DEV);
        let h = pack_kernel(&taps, Axis::Horizontal, 200, 100);
        let v = pack_kernel(&taps, Axis::Vertical, 200, 100);
        assert_eq!(h[1][0], taps[1].offset / 200.0);
        assert_eq!(h[1][1], 0.0);
        assert_eq!(v[1][0], 0.0);
        assert_eq!(v[1][1], taps[1].offset / 100.0);
        assert_eq!(h[3][2], taps[3].weight);
    }
}
