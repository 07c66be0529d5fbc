//! SIMD-accelerated floating-point distance kernels.
//!
//! Provides AVX2+FMA (x86_64) and NEON (aarch64) implementations for f32 and
//! f16 inputs. Each kernel reduces a main region of `dim - dim % LANE_WIDTH`
//! elements with independent vector accumulators, then finishes the residual
//! with the scalar fallback. f16 lanes are widened to f32 before arithmetic.
//! Falls back to scalar on unsupported platforms or when the CPU lacks the
//! required features at runtime.
//!
//! The f32 kernels are monomorphised for common dimensions (see
//! `with_fixed_dim!`) so the main loop has a compile-time trip count and no
//! residual branch when the dimension is a multiple of the lane width.

use crate::config::LANE_WIDTH;
use half::f16;

/// Call `$kernel::<DIM>` with a constant dimension when the length matches a
/// common embedding size, otherwise with `DIM = 0` (runtime length).
macro_rules! with_fixed_dim {
    ($kernel:ident, $a:expr, $b:expr) => {
        match $a.len() {
            16 => $kernel::<16>($a, $b),
            32 => $kernel::<32>($a, $b),
            64 => $kernel::<64>($a, $b),
            96 => $kernel::<96>($a, $b),
            100 => $kernel::<100>($a, $b),
            128 => $kernel::<128>($a, $b),
            200 => $kernel::<200>($a, $b),
            _ => $kernel::<0>($a, $b),
        }
    };
}

#[inline(always)]
fn same_len<'a, T>(a: &'a [T], b: &'a [T]) -> (&'a [T], &'a [T]) {
    debug_assert_eq!(a.len(), b.len(), "distance operands differ in length");
    let n = a.len().min(b.len());
    (&a[..n], &b[..n])
}

// ============================================================================
// Public dispatch functions (f32)
// ============================================================================

/// Squared Euclidean distance between two f32 slices.
#[inline]
#[allow(unreachable_code)]
pub fn l2_f32(a: &[f32], b: &[f32]) -> f32 {
    let (a, b) = same_len(a, b);
    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { with_fixed_dim!(neon_l2_f32, a, b) };
    }
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        {
            return unsafe { with_fixed_dim!(avx2_l2_f32, a, b) };
        }
    }
    scalar_l2_f32(a, b)
}

/// Manhattan distance between two f32 slices.
#[inline]
#[allow(unreachable_code)]
pub fn l1_f32(a: &[f32], b: &[f32]) -> f32 {
    let (a, b) = same_len(a, b);
    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { with_fixed_dim!(neon_l1_f32, a, b) };
    }
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") {
            return unsafe { with_fixed_dim!(avx2_l1_f32, a, b) };
        }
    }
    scalar_l1_f32(a, b)
}

/// Dot product between two f32 slices.
#[inline]
#[allow(unreachable_code)]
pub fn dot_f32(a: &[f32], b: &[f32]) -> f32 {
    let (a, b) = same_len(a, b);
    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { with_fixed_dim!(neon_dot_f32, a, b) };
    }
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        {
            return unsafe { with_fixed_dim!(avx2_dot_f32, a, b) };
        }
    }
    scalar_dot_f32(a, b)
}

/// Cosine similarity between two f32 slices. Returns 0 when either norm is zero.
#[inline]
#[allow(unreachable_code)]
pub fn cosine_similarity_f32(a: &[f32], b: &[f32]) -> f32 {
    let (a, b) = same_len(a, b);
    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { with_fixed_dim!(neon_cosine_f32, a, b) };
    }
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        {
            return unsafe { with_fixed_dim!(avx2_cosine_f32, a, b) };
        }
    }
    scalar_cosine_f32(a, b)
}

// ============================================================================
// Public dispatch functions (f16)
// ============================================================================

/// Squared Euclidean distance between two f16 slices, accumulated in f32.
#[inline]
#[allow(unreachable_code)]
pub fn l2_f16(a: &[f16], b: &[f16]) -> f32 {
    let (a, b) = same_len(a, b);
    #[cfg(target_arch = "x86_64")]
    {
        if has_avx2_f16c() {
            return unsafe { avx2_l2_f16(a, b) };
        }
    }
    widened_f16(a, b, |x, y| (x - y) * (x - y))
}

/// Manhattan distance between two f16 slices, accumulated in f32.
#[inline]
#[allow(unreachable_code)]
pub fn l1_f16(a: &[f16], b: &[f16]) -> f32 {
    let (a, b) = same_len(a, b);
    #[cfg(target_arch = "x86_64")]
    {
        if has_avx2_f16c() {
            return unsafe { avx2_l1_f16(a, b) };
        }
    }
    widened_f16(a, b, |x, y| (x - y).abs())
}

/// Dot product between two f16 slices, accumulated in f32.
#[inline]
#[allow(unreachable_code)]
pub fn dot_f16(a: &[f16], b: &[f16]) -> f32 {
    let (a, b) = same_len(a, b);
    #[cfg(target_arch = "x86_64")]
    {
        if has_avx2_f16c() {
            return unsafe { avx2_dot_f16(a, b) };
        }
    }
    widened_f16(a, b, |x, y| x * y)
}

/// Cosine similarity between two f16 slices. Returns 0 when either norm is zero.
pub fn cosine_similarity_f16(a: &[f16], b: &[f16]) -> f32 {
    let (a, b) = same_len(a, b);
    let dot = widened_f16(a, b, |x, y| x * y);
    let norm_a = widened_f16(a, a, |x, y| x * y);
    let norm_b = widened_f16(b, b, |x, y| x * y);
    similarity_from_terms([dot, norm_a, norm_b])
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn has_avx2_f16c() -> bool {
    std::arch::is_x86_feature_detected!("avx2")
        && std::arch::is_x86_feature_detected!("fma")
        && std::arch::is_x86_feature_detected!("f16c")
}

/// Portable f16 path: widen one lane block at a time into f32 accumulators.
#[inline]
fn widened_f16<F: Fn(f32, f32) -> f32>(a: &[f16], b: &[f16], op: F) -> f32 {
    let len = a.len();
    let main = len - len % LANE_WIDTH;
    let mut lanes = [0.0f32; LANE_WIDTH];
    for (ca, cb) in a[..main]
        .chunks_exact(LANE_WIDTH)
        .zip(b[..main].chunks_exact(LANE_WIDTH))
    {
        for l in 0..LANE_WIDTH {
            lanes[l] += op(ca[l].to_f32(), cb[l].to_f32());
        }
    }
    let mut sum: f32 = lanes.iter().sum();
    for i in main..len {
        sum += op(a[i].to_f32(), b[i].to_f32());
    }
    sum
}

// ============================================================================
// Scalar fallbacks (also used for residual regions)
// ============================================================================

pub(crate) fn scalar_l2_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

pub(crate) fn scalar_l1_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += (a[i] - b[i]).abs();
    }
    sum
}

pub(crate) fn scalar_dot_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

/// Dot product and both squared norms, in that order.
fn scalar_cosine_terms(a: &[f32], b: &[f32]) -> [f32; 3] {
    a.iter().zip(b).fold([0.0f32; 3], |[dot, na, nb], (&x, &y)| {
        [dot + x * y, na + x * x, nb + y * y]
    })
}

#[inline]
fn similarity_from_terms([dot, norm_a, norm_b]: [f32; 3]) -> f32 {
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    dot / denom
}

fn scalar_cosine_f32(a: &[f32], b: &[f32]) -> f32 {
    similarity_from_terms(scalar_cosine_terms(a, b))
}

fn scalar_f16_tail<F: Fn(f32, f32) -> f32>(a: &[f16], b: &[f16], op: F) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += op(a[i].to_f32(), b[i].to_f32());
    }
    sum
}

// ============================================================================
// NEON implementations (aarch64)
// ============================================================================

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

#[cfg(target_arch = "aarch64")]
unsafe fn neon_l2_f32<const DIM: usize>(a: &[f32], b: &[f32]) -> f32 {
    let len = if DIM == 0 { a.len() } else { DIM };
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = vdupq_n_f32(0.0);
    let mut s1 = vdupq_n_f32(0.0);
    let mut s2 = vdupq_n_f32(0.0);
    let mut s3 = vdupq_n_f32(0.0);

    let mut i = 0;
    while i < main {
        let d0 = vsubq_f32(vld1q_f32(a_ptr.add(i)), vld1q_f32(b_ptr.add(i)));
        let d1 = vsubq_f32(vld1q_f32(a_ptr.add(i + 4)), vld1q_f32(b_ptr.add(i + 4)));
        let d2 = vsubq_f32(vld1q_f32(a_ptr.add(i + 8)), vld1q_f32(b_ptr.add(i + 8)));
        let d3 = vsubq_f32(
            vld1q_f32(a_ptr.add(i + 12)),
            vld1q_f32(b_ptr.add(i + 12)),
        );
        s0 = vfmaq_f32(s0, d0, d0);
        s1 = vfmaq_f32(s1, d1, d1);
        s2 = vfmaq_f32(s2, d2, d2);
        s3 = vfmaq_f32(s3, d3, d3);
        i += LANE_WIDTH;
    }

    let sum = vaddvq_f32(vaddq_f32(vaddq_f32(s0, s1), vaddq_f32(s2, s3)));
    if main == len {
        return sum;
    }
    sum + scalar_l2_f32(&a[main..len], &b[main..len])
}

#[cfg(target_arch = "aarch64")]
unsafe fn neon_l1_f32<const DIM: usize>(a: &[f32], b: &[f32]) -> f32 {
    let len = if DIM == 0 { a.len() } else { DIM };
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = vdupq_n_f32(0.0);
    let mut s1 = vdupq_n_f32(0.0);
    let mut s2 = vdupq_n_f32(0.0);
    let mut s3 = vdupq_n_f32(0.0);

    let mut i = 0;
    while i < main {
        s0 = vaddq_f32(s0, vabdq_f32(vld1q_f32(a_ptr.add(i)), vld1q_f32(b_ptr.add(i))));
        s1 = vaddq_f32(
            s1,
            vabdq_f32(vld1q_f32(a_ptr.add(i + 4)), vld1q_f32(b_ptr.add(i + 4))),
        );
        s2 = vaddq_f32(
            s2,
            vabdq_f32(vld1q_f32(a_ptr.add(i + 8)), vld1q_f32(b_ptr.add(i + 8))),
        );
        s3 = vaddq_f32(
            s3,
            vabdq_f32(vld1q_f32(a_ptr.add(i + 12)), vld1q_f32(b_ptr.add(i + 12))),
        );
        i += LANE_WIDTH;
    }

    let sum = vaddvq_f32(vaddq_f32(vaddq_f32(s0, s1), vaddq_f32(s2, s3)));
    if main == len {
        return sum;
    }
    sum + scalar_l1_f32(&a[main..len], &b[main..len])
}

#[cfg(target_arch = "aarch64")]
unsafe fn neon_dot_f32<const DIM: usize>(a: &[f32], b: &[f32]) -> f32 {
    let len = if DIM == 0 { a.len() } else { DIM };
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = vdupq_n_f32(0.0);
    let mut s1 = vdupq_n_f32(0.0);
    let mut s2 = vdupq_n_f32(0.0);
    let mut s3 = vdupq_n_f32(0.0);

    let mut i = 0;
    while i < main {
        s0 = vfmaq_f32(s0, vld1q_f32(a_ptr.add(i)), vld1q_f32(b_ptr.add(i)));
        s1 = vfmaq_f32(s1, vld1q_f32(a_ptr.add(i + 4)), vld1q_f32(b_ptr.add(i + 4)));
        s2 = vfmaq_f32(s2, vld1q_f32(a_ptr.add(i + 8)), vld1q_f32(b_ptr.add(i + 8)));
        s3 = vfmaq_f32(
            s3,
            vld1q_f32(a_ptr.add(i + 12)),
            vld1q_f32(b_ptr.add(i + 12)),
        );
        i += LANE_WIDTH;
    }

    let sum = vaddvq_f32(vaddq_f32(vaddq_f32(s0, s1), vaddq_f32(s2, s3)));
    if main == len {
        return sum;
    }
    sum + scalar_dot_f32(&a[main..len], &b[main..len])
}

#[cfg(target_arch = "aarch64")]
unsafe fn neon_cosine_f32<const DIM: usize>(a: &[f32], b: &[f32]) -> f32 {
    let len = if DIM == 0 { a.len() } else { DIM };
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    // Two accumulators per term, each fed one half of the 16-lane step.
    let mut dot = [vdupq_n_f32(0.0); 2];
    let mut na = [vdupq_n_f32(0.0); 2];
    let mut nb = [vdupq_n_f32(0.0); 2];

    let mut i = 0;
    while i < main {
        for (half, offset) in [(0, 0), (0, 4), (1, 8), (1, 12)] {
            let va = vld1q_f32(a_ptr.add(i + offset));
            let vb = vld1q_f32(b_ptr.add(i + offset));
            dot[half] = vfmaq_f32(dot[half], va, vb);
            na[half] = vfmaq_f32(na[half], va, va);
            nb[half] = vfmaq_f32(nb[half], vb, vb);
        }
        i += LANE_WIDTH;
    }

    let mut terms = [
        vaddvq_f32(vaddq_f32(dot[0], dot[1])),
        vaddvq_f32(vaddq_f32(na[0], na[1])),
        vaddvq_f32(vaddq_f32(nb[0], nb[1])),
    ];
    if main == len {
        return similarity_from_terms(terms);
    }
    let tail = scalar_cosine_terms(&a[main..len], &b[main..len]);
    for (t, r) in terms.iter_mut().zip(tail) {
        *t += r;
    }
    similarity_from_terms(terms)
}

// ============================================================================
// AVX2+FMA implementations (x86_64)
// ============================================================================

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Fold the eight lanes of `v` into one f32.
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn hsum_f32x8(v: __m256) -> f32 {
    let quad = _mm_add_ps(_mm256_castps256_ps128(v), _mm256_extractf128_ps(v, 1));
    let pair = _mm_hadd_ps(quad, quad);
    _mm_cvtss_f32(_mm_hadd_ps(pair, pair))
}

/// |v| for 8 packed f32 values (clears the sign bit).
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn abs_f32x8(v: __m256) -> __m256 {
    _mm256_andnot_ps(_mm256_set1_ps(-0.0), v)
}

/// Load 8 f16 values and widen them to f32.
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2,f16c")]
unsafe fn load_f16x8(ptr: *const f16) -> __m256 {
    _mm256_cvtph_ps(_mm_loadu_si128(ptr as *const __m128i))
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn avx2_l2_f32<const DIM: usize>(a: &[f32], b: &[f32]) -> f32 {
    let len = if DIM == 0 { a.len() } else { DIM };
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = _mm256_setzero_ps();
    let mut s1 = _mm256_setzero_ps();

    let mut i = 0;
    while i < main {
        let d0 = _mm256_sub_ps(_mm256_loadu_ps(a_ptr.add(i)), _mm256_loadu_ps(b_ptr.add(i)));
        let d1 = _mm256_sub_ps(
            _mm256_loadu_ps(a_ptr.add(i + 8)),
            _mm256_loadu_ps(b_ptr.add(i + 8)),
        );
        s0 = _mm256_fmadd_ps(d0, d0, s0);
        s1 = _mm256_fmadd_ps(d1, d1, s1);
        i += LANE_WIDTH;
    }

    let sum = hsum_f32x8(_mm256_add_ps(s0, s1));
    if main == len {
        return sum;
    }
    sum + scalar_l2_f32(&a[main..len], &b[main..len])
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn avx2_l1_f32<const DIM: usize>(a: &[f32], b: &[f32]) -> f32 {
    let len = if DIM == 0 { a.len() } else { DIM };
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = _mm256_setzero_ps();
    let mut s1 = _mm256_setzero_ps();

    let mut i = 0;
    while i < main {
        let d0 = _mm256_sub_ps(_mm256_loadu_ps(a_ptr.add(i)), _mm256_loadu_ps(b_ptr.add(i)));
        let d1 = _mm256_sub_ps(
            _mm256_loadu_ps(a_ptr.add(i + 8)),
            _mm256_loadu_ps(b_ptr.add(i + 8)),
        );
        s0 = _mm256_add_ps(s0, abs_f32x8(d0));
        s1 = _mm256_add_ps(s1, abs_f32x8(d1));
        i += LANE_WIDTH;
    }

    let sum = hsum_f32x8(_mm256_add_ps(s0, s1));
    if main == len {
        return sum;
    }
    sum + scalar_l1_f32(&a[main..len], &b[main..len])
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn avx2_dot_f32<const DIM: usize>(a: &[f32], b: &[f32]) -> f32 {
    let len = if DIM == 0 { a.len() } else { DIM };
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = _mm256_setzero_ps();
    let mut s1 = _mm256_setzero_ps();

    let mut i = 0;
    while i < main {
        s0 = _mm256_fmadd_ps(_mm256_loadu_ps(a_ptr.add(i)), _mm256_loadu_ps(b_ptr.add(i)), s0);
        s1 = _mm256_fmadd_ps(
            _mm256_loadu_ps(a_ptr.add(i + 8)),
            _mm256_loadu_ps(b_ptr.add(i + 8)),
            s1,
        );
        i += LANE_WIDTH;
    }

    let sum = hsum_f32x8(_mm256_add_ps(s0, s1));
    if main == len {
        return sum;
    }
    sum + scalar_dot_f32(&a[main..len], &b[main..len])
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn avx2_cosine_f32<const DIM: usize>(a: &[f32], b: &[f32]) -> f32 {
    let len = if DIM == 0 { a.len() } else { DIM };
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut dot = [_mm256_setzero_ps(); 2];
    let mut na = [_mm256_setzero_ps(); 2];
    let mut nb = [_mm256_setzero_ps(); 2];

    let mut i = 0;
    while i < main {
        for half in 0..2 {
            let va = _mm256_loadu_ps(a_ptr.add(i + 8 * half));
            let vb = _mm256_loadu_ps(b_ptr.add(i + 8 * half));
            dot[half] = _mm256_fmadd_ps(va, vb, dot[half]);
            na[half] = _mm256_fmadd_ps(va, va, na[half]);
            nb[half] = _mm256_fmadd_ps(vb, vb, nb[half]);
        }
        i += LANE_WIDTH;
    }

    let mut terms = [
        hsum_f32x8(_mm256_add_ps(dot[0], dot[1])),
        hsum_f32x8(_mm256_add_ps(na[0], na[1])),
        hsum_f32x8(_mm256_add_ps(nb[0], nb[1])),
    ];
    if main == len {
        return similarity_from_terms(terms);
    }
    let tail = scalar_cosine_terms(&a[main..len], &b[main..len]);
    for (t, r) in terms.iter_mut().zip(tail) {
        *t += r;
    }
    similarity_from_terms(terms)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma,f16c")]
unsafe fn avx2_l2_f16(a: &[f16], b: &[f16]) -> f32 {
    let len = a.len();
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = _mm256_setzero_ps();
    let mut s1 = _mm256_setzero_ps();

    let mut i = 0;
    while i < main {
        let d0 = _mm256_sub_ps(load_f16x8(a_ptr.add(i)), load_f16x8(b_ptr.add(i)));
        let d1 = _mm256_sub_ps(load_f16x8(a_ptr.add(i + 8)), load_f16x8(b_ptr.add(i + 8)));
        s0 = _mm256_fmadd_ps(d0, d0, s0);
        s1 = _mm256_fmadd_ps(d1, d1, s1);
        i += LANE_WIDTH;
    }

    hsum_f32x8(_mm256_add_ps(s0, s1))
        + scalar_f16_tail(&a[main..], &b[main..], |x, y| (x - y) * (x - y))
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma,f16c")]
unsafe fn avx2_l1_f16(a: &[f16], b: &[f16]) -> f32 {
    let len = a.len();
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = _mm256_setzero_ps();
    let mut s1 = _mm256_setzero_ps();

    let mut i = 0;
    while i < main {
        let d0 = _mm256_sub_ps(load_f16x8(a_ptr.add(i)), load_f16x8(b_ptr.add(i)));
        let d1 = _mm256_sub_ps(load_f16x8(a_ptr.add(i + 8)), load_f16x8(b_ptr.add(i + 8)));
        s0 = _mm256_add_ps(s0, abs_f32x8(d0));
        s1 = _mm256_add_ps(s1, abs_f32x8(d1));
        i += LANE_WIDTH;
    }

    hsum_f32x8(_mm256_add_ps(s0, s1))
        + scalar_f16_tail(&a[main..], &b[main..], |x, y| (x - y).abs())
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma,f16c")]
unsafe fn avx2_dot_f16(a: &[f16], b: &[f16]) -> f32 {
    let len = a.len();
    let main = len - len % LANE_WIDTH;
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = _mm256_setzero_ps();
    let mut s1 = _mm256_setzero_ps();

    let mut i = 0;
    while i < main {
        s0 = _mm256_fmadd_ps(load_f16x8(a_ptr.add(i)), load_f16x8(b_ptr.add(i)), s0);
        s1 = _mm256_fmadd_ps(load_f16x8(a_ptr.add(i + 8)), load_f16x8(b_ptr.add(i + 8)), s1);
        i += LANE_WIDTH;
    }

    hsum_f32x8(_mm256_add_ps(s0, s1)) + scalar_f16_tail(&a[main..], &b[main..], |x, y| x * y)
}
