//! CPU implementation of the 3D simplex noise field.
//!
//! This is the same lattice construction as the `noise3` WGSL function in
//! [`shader_utils::NOISE_WGSL`](crate::shader_utils::NOISE_WGSL) (Gustavson's
//! public-domain simplex noise with the mod-289 permutation polynomial), so
//! the CPU reference step and the GPU kernel sample the same field. Results
//! agree to float rounding, not bit for bit.
//!
//! # Example
//!
//! ```
//! use neural_flow::noise::noise3;
//! use neural_flow::Vec3;
//!
//! let a = noise3(Vec3::new(1.5, -2.0, 0.25));
//! let b = noise3(Vec3::new(1.5, -2.0, 0.25));
//! assert_eq!(a, b);
//! assert!(a.abs() <= 1.05);
//! ```

use glam::Vec3;

/// Skew factor onto the simplex lattice.
const F3: f32 = 1.0 / 3.0;
/// Unskew factor back into input space.
const G3: f32 = 1.0 / 6.0;

#[inline]
fn mod289(x: f32) -> f32 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

#[inline]
fn permute(x: f32) -> f32 {
    mod289((x * 34.0 + 1.0) * x)
}

#[inline]
fn taylor_inv_sqrt(r: f32) -> f32 {
    1.792_842_9 - 0.853_734_73 * r
}

/// GLSL-style `step`: 0 below the edge, 1 at or above it.
#[inline]
fn step(edge: f32, x: f32) -> f32 {
    if x < edge {
        0.0
    } else {
        1.0
    }
}

/// Gradient for one simplex corner.
///
/// The hash picks a point on a 7x7 grid over a square, which is folded onto
/// an octahedron and normalized.
#[inline]
fn gradient(hash: f32) -> Vec3 {
    let j = hash - 49.0 * (hash * (1.0 / 49.0)).floor();
    let gx = (j * (1.0 / 7.0)).floor();
    let gy = (j - 7.0 * gx).floor();

    let x = gx * (2.0 / 7.0) + (0.5 / 7.0 - 1.0);
    let y = gy * (2.0 / 7.0) + (0.5 / 7.0 - 1.0);
    let h = 1.0 - x.abs() - y.abs();

    let sh = -step(h, 0.0);
    let sx = x.floor() * 2.0 + 1.0;
    let sy = y.floor() * 2.0 + 1.0;

    let g = Vec3::new(x + sx * sh, y + sy * sh, h);
    g * taylor_inv_sqrt(g.length_squared())
}

/// Sample 3D simplex noise at `v`.
///
/// Deterministic, stateless and continuous; output lies in roughly `[-1, 1]`.
pub fn noise3(v: Vec3) -> f32 {
    // First corner
    let cell = (v + Vec3::splat(v.element_sum() * F3)).floor();
    let x0 = v - cell + Vec3::splat(cell.element_sum() * G3);

    // Other corners
    let g = Vec3::new(step(x0.y, x0.x), step(x0.z, x0.y), step(x0.x, x0.z));
    let l = Vec3::ONE - g;
    let l_zxy = Vec3::new(l.z, l.x, l.y);
    let i1 = g.min(l_zxy);
    let i2 = g.max(l_zxy);

    let corners = [Vec3::ZERO, i1, i2, Vec3::ONE];
    let offsets = [
        x0,
        x0 - i1 + Vec3::splat(G3),
        x0 - i2 + Vec3::splat(F3),
        x0 - Vec3::splat(0.5),
    ];

    let cell = Vec3::new(mod289(cell.x), mod289(cell.y), mod289(cell.z));

    let mut sum = 0.0;
    for (corner, x) in corners.iter().zip(offsets.iter()) {
        let hash = permute(
            permute(permute(cell.z + corner.z) + cell.y + corner.y) + cell.x + corner.x,
        );
        let m = (0.6 - x.length_squared()).max(0.0);
        let m2 = m * m;
        sum += m2 * m2 * gradient(hash).dot(*x);
    }

    42.0 * sum
}
