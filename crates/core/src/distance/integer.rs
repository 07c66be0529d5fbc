//! Distance kernels for u8 vectors.
//!
//! Bytes are widened to 16-bit lanes and accumulated into 32-bit lanes. The
//! lanes are folded into a `u64` total every [`FOLD_BLOCK`] elements, so the
//! result is exact for any length.

use crate::config::LANE_WIDTH;

/// Elements accumulated in 32-bit lanes before folding them into the total.
///
/// A lane gains at most `2 * 255 * 255` per step on AVX2 and twice that on
/// NEON. 8192 steps keep both below `u32::MAX`.
const FOLD_BLOCK: usize = LANE_WIDTH * 8192;

#[inline(always)]
fn same_len<'a>(a: &'a [u8], b: &'a [u8]) -> (&'a [u8], &'a [u8]) {
    debug_assert_eq!(a.len(), b.len(), "distance operands differ in length");
    let n = a.len().min(b.len());
    (&a[..n], &b[..n])
}

/// Squared Euclidean distance between two u8 slices.
#[inline]
#[allow(unreachable_code)]
pub fn l2_u8(a: &[u8], b: &[u8]) -> u64 {
    let (a, b) = same_len(a, b);
    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { neon_l2_u8(a, b) };
    }
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") {
            return unsafe { avx2_l2_u8(a, b) };
        }
    }
    scalar_l2_u8(a, b)
}

/// Manhattan distance between two u8 slices.
#[inline]
#[allow(unreachable_code)]
pub fn l1_u8(a: &[u8], b: &[u8]) -> u64 {
    let (a, b) = same_len(a, b);
    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { neon_l1_u8(a, b) };
    }
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") {
            return unsafe { avx2_l1_u8(a, b) };
        }
    }
    scalar_l1_u8(a, b)
}

/// Dot product between two u8 slices.
#[inline]
#[allow(unreachable_code)]
pub fn dot_u8(a: &[u8], b: &[u8]) -> u64 {
    let (a, b) = same_len(a, b);
    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { neon_dot_u8(a, b) };
    }
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") {
            return unsafe { avx2_dot_u8(a, b) };
        }
    }
    scalar_dot_u8(a, b)
}

/// Cosine similarity between two u8 slices. Returns 0 when either norm is zero.
pub fn cosine_similarity_u8(a: &[u8], b: &[u8]) -> f32 {
    let (a, b) = same_len(a, b);
    let dot = dot_u8(a, b) as f64;
    let norm_a = dot_u8(a, a) as f64;
    let norm_b = dot_u8(b, b) as f64;
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (dot / denom) as f32
}

/// Number of differing bits between two u8 slices.
///
/// The main region is consumed as pairs of little-endian 64-bit words, the
/// residual byte by byte.
pub fn hamming_u8(a: &[u8], b: &[u8]) -> u64 {
    let (a, b) = same_len(a, b);
    let main = a.len() - a.len() % LANE_WIDTH;
    let mut bits = 0u64;
    for (ca, cb) in a[..main]
        .chunks_exact(LANE_WIDTH)
        .zip(b[..main].chunks_exact(LANE_WIDTH))
    {
        let (a_lo, a_hi) = split_words(ca);
        let (b_lo, b_hi) = split_words(cb);
        bits += ((a_lo ^ b_lo).count_ones() + (a_hi ^ b_hi).count_ones()) as u64;
    }
    for i in main..a.len() {
        bits += (a[i] ^ b[i]).count_ones() as u64;
    }
    bits
}

#[inline(always)]
fn split_words(chunk: &[u8]) -> (u64, u64) {
    let mut lo = [0u8; 8];
    let mut hi = [0u8; 8];
    lo.copy_from_slice(&chunk[..8]);
    hi.copy_from_slice(&chunk[8..16]);
    (u64::from_le_bytes(lo), u64::from_le_bytes(hi))
}

// ============================================================================
// Scalar fallbacks (also used for residual regions)
// ============================================================================

fn scalar_l2_u8(a: &[u8], b: &[u8]) -> u64 {
    let mut sum = 0u64;
    for i in 0..a.len() {
        let d = a[i] as i32 - b[i] as i32;
        sum += (d * d) as u64;
    }
    sum
}

fn scalar_l1_u8(a: &[u8], b: &[u8]) -> u64 {
    let mut sum = 0u64;
    for i in 0..a.len() {
        sum += a[i].abs_diff(b[i]) as u64;
    }
    sum
}

fn scalar_dot_u8(a: &[u8], b: &[u8]) -> u64 {
    let mut sum = 0u64;
    for i in 0..a.len() {
        sum += a[i] as u64 * b[i] as u64;
    }
    sum
}

// ============================================================================
// NEON implementations (aarch64)
// ============================================================================

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

#[cfg(target_arch = "aarch64")]
unsafe fn neon_l2_u8(a: &[u8], b: &[u8]) -> u64 {
    let len = a.len();
    let main = len - len % LANE_WIDTH;
    let mut total = 0u64;
    let mut start = 0;
    while start < main {
        let end = (start + FOLD_BLOCK).min(main);
        let mut acc = vdupq_n_u32(0);
        let mut i = start;
        while i < end {
            let d = vabdq_u8(vld1q_u8(a.as_ptr().add(i)), vld1q_u8(b.as_ptr().add(i)));
            acc = vpadalq_u16(acc, vmull_u8(vget_low_u8(d), vget_low_u8(d)));
            acc = vpadalq_u16(acc, vmull_u8(vget_high_u8(d), vget_high_u8(d)));
            i += LANE_WIDTH;
        }
        total += vaddlvq_u32(acc);
        start = end;
    }
    if main == len {
        return total;
    }
    total + scalar_l2_u8(&a[main..], &b[main..])
}

#[cfg(target_arch = "aarch64")]
unsafe fn neon_l1_u8(a: &[u8], b: &[u8]) -> u64 {
    let len = a.len();
    let main = len - len % LANE_WIDTH;
    let mut total = 0u64;
    let mut start = 0;
    while start < main {
        let end = (start + FOLD_BLOCK).min(main);
        let mut acc = vdupq_n_u32(0);
        let mut i = start;
        while i < end {
            let d = vabdq_u8(vld1q_u8(a.as_ptr().add(i)), vld1q_u8(b.as_ptr().add(i)));
            acc = vpadalq_u16(acc, vpaddlq_u8(d));
            i += LANE_WIDTH;
        }
        total += vaddlvq_u32(acc);
        start = end;
    }
    if main == len {
        return total;
    }
    total + scalar_l1_u8(&a[main..], &b[main..])
}

#[cfg(target_arch = "aarch64")]
unsafe fn neon_dot_u8(a: &[u8], b: &[u8]) -> u64 {
    let len = a.len();
    let main = len - len % LANE_WIDTH;
    let mut total = 0u64;
    let mut start = 0;
    while start < main {
        let end = (start + FOLD_BLOCK).min(main);
        let mut acc = vdupq_n_u32(0);
        let mut i = start;
        while i < end {
            let va = vld1q_u8(a.as_ptr().add(i));
            let vb = vld1q_u8(b.as_ptr().add(i));
            acc = vpadalq_u16(acc, vmull_u8(vget_low_u8(va), vget_low_u8(vb)));
            acc = vpadalq_u16(acc, vmull_u8(vget_high_u8(va), vget_high_u8(vb)));
            i += LANE_WIDTH;
        }
        total += vaddlvq_u32(acc);
        start = end;
    }
    if main == len {
        return total;
    }
    total + scalar_dot_u8(&a[main..], &b[main..])
}

// ============================================================================
// AVX2 implementations (x86_64)
// ============================================================================

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Sum the eight 32-bit lanes as unsigned values into a u64.
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn hsum_u32x8(v: __m256i) -> u64 {
    let mut lanes = [0u32; 8];
    _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, v);
    lanes.iter().map(|&x| x as u64).sum()
}

/// Load 16 bytes and zero-extend them into 16-bit lanes.
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn load_u8x16(ptr: *const u8) -> __m256i {
    _mm256_cvtepu8_epi16(_mm_loadu_si128(ptr as *const __m128i))
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn avx2_l2_u8(a: &[u8], b: &[u8]) -> u64 {
    let len = a.len();
    let main = len - len % LANE_WIDTH;
    let mut total = 0u64;
    let mut start = 0;
    while start < main {
        let end = (start + FOLD_BLOCK).min(main);
        let mut acc = _mm256_setzero_si256();
        let mut i = start;
        while i < end {
            let d = _mm256_sub_epi16(load_u8x16(a.as_ptr().add(i)), load_u8x16(b.as_ptr().add(i)));
            acc = _mm256_add_epi32(acc, _mm256_madd_epi16(d, d));
            i += LANE_WIDTH;
        }
        total += hsum_u32x8(acc);
        start = end;
    }
    if main == len {
        return total;
    }
    total + scalar_l2_u8(&a[main..], &b[main..])
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn avx2_l1_u8(a: &[u8], b: &[u8]) -> u64 {
    let len = a.len();
    let main = len - len % LANE_WIDTH;
    let ones = _mm256_set1_epi16(1);
    let mut total = 0u64;
    let mut start = 0;
    while start < main {
        let end = (start + FOLD_BLOCK).min(main);
        let mut acc = _mm256_setzero_si256();
        let mut i = start;
        while i < end {
            let d = _mm256_abs_epi16(_mm256_sub_epi16(
                load_u8x16(a.as_ptr().add(i)),
                load_u8x16(b.as_ptr().add(i)),
            ));
            acc = _mm256_add_epi32(acc, _mm256_madd_epi16(d, ones));
            i += LANE_WIDTH;
        }
        total += hsum_u32x8(acc);
        start = end;
    }
    if main == len {
        return total;
    }
    total + scalar_l1_u8(&a[main..], &b[main..])
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn avx2_dot_u8(a: &[u8], b: &[u8]) -> u64 {
    let len = a.len();
    let main = len - len % LANE_WIDTH;
    let mut total = 0u64;
    let mut start = 0;
    while start < main {
        let end = (start + FOLD_BLOCK).min(main);
        let mut acc = _mm256_setzero_si256();
        let mut i = start;
        while i < end {
            let va = load_u8x16(a.as_ptr().add(i));
            let vb = load_u8x16(b.as_ptr().add(i));
            acc = _mm256_add_epi32(acc, _mm256_madd_epi16(va, vb));
            i += LANE_WIDTH;
        }
        total += hsum_u32x8(acc);
        start = end;
    }
    if main == len {
        return total;
    }
    total + scalar_dot_u8(&a[main..], &b[main..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const DIMS: [usize; 11] = [1, 15, 16, 17, 31, 32, 96, 100, 128, 200, 513];

    fn random_u8(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| rng.gen()).collect()
    }

    #[test]
    fn test_u8_kernels_are_exact() {
        let mut rng = StdRng::seed_from_u64(5);
        for &dim in &DIMS {
            let a = random_u8(&mut rng, dim);
            let b = random_u8(&mut rng, dim);
            let l2: u64 = a
                .iter()
                .zip(&b)
                .map(|(&x, &y)| (x as i64 - y as i64).pow(2) as u64)
                .sum();
            let l1: u64 = a.iter().zip(&b).map(|(&x, &y)| x.abs_diff(y) as u64).sum();
            let dot: u64 = a.iter().zip(&b).map(|(&x, &y)| x as u64 * y as u64).sum();
            let ham: u64 = a.iter().zip(&b).map(|(&x, &y)| (x ^ y).count_ones() as u64).sum();

            assert_eq!(l2_u8(&a, &b), l2, "l2 dim={dim}");
            assert_eq!(l1_u8(&a, &b), l1, "l1 dim={dim}");
            assert_eq!(dot_u8(&a, &b), dot, "dot dim={dim}");
            assert_eq!(hamming_u8(&a, &b), ham, "hamming dim={dim}");
        }
    }

    #[test]
    fn test_u8_extremes_do_not_overflow() {
        let a = vec![255u8; 4096];
        let b = vec![0u8; 4096];
        assert_eq!(l2_u8(&a, &b), 255 * 255 * 4096);
        assert_eq!(l1_u8(&a, &b), 255 * 4096);
        assert_eq!(dot_u8(&a, &a), 255 * 255 * 4096);
        assert_eq!(hamming_u8(&a, &b), 8 * 4096);
    }

    #[test]
    fn test_u8_long_vectors_are_exact() {
        // Past the point where a single pass of 32-bit lanes would wrap.
        let len = 600_000 + 7;
        let a = vec![255u8; len];
        let b = vec![0u8; len];
        let n = len as u64;
        assert_eq!(l2_u8(&a, &b), 255 * 255 * n);
        assert_eq!(dot_u8(&a, &a), 255 * 255 * n);
        assert_eq!(l1_u8(&a, &b), 255 * n);
        assert_eq!(hamming_u8(&a, &b), 8 * n);

        let mut rng = StdRng::seed_from_u64(13);
        let a = random_u8(&mut rng, 3 * FOLD_BLOCK + 33);
        let b = random_u8(&mut rng, a.len());
        let l2: u64 = a
            .iter()
            .zip(&b)
            .map(|(&x, &y)| (x as i64 - y as i64).pow(2) as u64)
            .sum();
        let dot: u64 = a.iter().zip(&b).map(|(&x, &y)| x as u64 * y as u64).sum();
        assert_eq!(l2_u8(&a, &b), l2);
        assert_eq!(dot_u8(&a, &b), dot);
    }

    #[test]
    fn test_hamming_residual_bytes() {
        let a = [0b1111_0000u8; 17];
        let mut b = [0b1111_0000u8; 17];
        b[16] = 0b0000_1111;
        b[3] = 0b1111_0001;
        assert_eq!(hamming_u8(&a, &b), 9);
    }

    #[test]
    fn test_cosine_u8_matches_f64_reference() {
        let mut rng = StdRng::seed_from_u64(17);
        for &dim in &DIMS {
            let a = random_u8(&mut rng, dim);
            let b = random_u8(&mut rng, dim);
            let dot: f64 = a.iter().zip(&b).map(|(&x, &y)| x as f64 * y as f64).sum();
            let na: f64 = a.iter().map(|&x| x as f64 * x as f64).sum();
            let nb: f64 = b.iter().map(|&x| x as f64 * x as f64).sum();
            let denom = na.sqrt() * nb.sqrt();
            let truth = if denom == 0.0 { 1.0 } else { 1.0 - dot / denom };
            let pred = 1.0 - cosine_similarity_u8(&a, &b) as f64;
            let eps = truth.abs().max(1.0) * 1e-5;
            assert!(
                (pred - truth).abs() <= eps,
                "cosine dim={dim}: {pred} vs {truth}"
            );
        }
    }

    #[test]
    fn test_cosine_u8() {
        let a = [1u8, 2, 3, 4];
        assert!((cosine_similarity_u8(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity_u8(&[0, 0], &[1, 2]), 0.0);
    }
}
