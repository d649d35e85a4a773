//! The per-particle flow step.
//!
//! [`flow_step`] turns a particle seed and the frame's uniforms into the
//! particle's render attributes. The same algorithm runs on the GPU as the
//! compute kernel from [`compute_shader_wgsl`], one invocation per particle;
//! the CPU version here is the single-threaded fallback used by tests,
//! benches and headless callers.
//!
//! In order, each step:
//!
//! 1. Samples brightness from the noise field at the seed position.
//! 2. Pushes the particle away from the pointer by the pulse blast,
//!    `pulse * 2 / (dist + 0.1)`, capped at `max_impulse`.
//! 3. Displaces each axis by noise at a differently permuted coordinate.
//! 4. Applies the continuous repulsion, a Hermite ramp from full strength at
//!    the pointer to zero at `interaction_radius`.
//! 5. Attenuates the sprite size by view depth, up to [`MAX_POINT_SIZE`], and
//!    derives alpha and color mix.
//!
//! Distances to the pointer are measured in the XY plane; push directions are 3D.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::gpu::view_depth;
use crate::noise::noise3;
use crate::pool::Particle;
use crate::shader_utils;
use crate::uniforms::{SimulationUniforms, UNIFORMS_WGSL};

/// Smallest view depth used for size attenuation.
pub const MIN_VIEW_DEPTH: f32 = 1e-3;

/// Largest sprite diameter in physical pixels.
pub const MAX_POINT_SIZE: f32 = 256.0;

/// Epsilon added to the pointer distance in the pulse blast.
const BLAST_EPSILON: f32 = 0.1;

/// Scale from seed position to brightness noise coordinates.
const BRIGHTNESS_SCALE: f32 = 0.1;

/// Output of the flow step for one particle in one frame.
///
/// Also the per-instance vertex layout of the sprite pipeline (32 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RenderAttributes {
    /// Final world-space position.
    pub position: [f32; 3],
    /// Sprite diameter in physical pixels.
    pub point_size: f32,
    /// Opacity before the rasterization clamp. Can leave `[0, 1]`.
    pub alpha: f32,
    /// Interpolation factor from color A to color B, in `[0, 1]`.
    pub color_mix: f32,
    pub _pad: [f32; 2],
}

impl RenderAttributes {
    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// Cubic Hermite interpolation between two edges.
///
/// Unlike GLSL, `edge0 > edge1` is well defined and gives a falling ramp.
/// A zero-width span returns 0.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let span = edge1 - edge0;
    if span.abs() < 1e-6 {
        return 0.0;
    }
    let t = ((x - edge0) / span).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Normalize `v`, passing a (near) zero vector through as zero.
#[inline]
pub fn safe_normalize(v: Vec3) -> Vec3 {
    let len = v.length();
    if len < 1e-6 {
        Vec3::ZERO
    } else {
        v / len
    }
}

#[inline]
fn xy_distance(a: Vec3, b: Vec3) -> f32 {
    a.truncate().distance(b.truncate())
}

/// Evaluate one particle for one frame.
pub fn flow_step(particle: &Particle, uniforms: &SimulationUniforms) -> RenderAttributes {
    let base = particle.base_position();
    let time = uniforms.flow_time();
    let pointer = uniforms.pointer_world;
    let mut pos = base;

    let phase_offset = particle.random_phase * uniforms.phase_jitter;
    let brightness = noise3(base * BRIGHTNESS_SCALE + Vec3::new(0.0, 0.0, time + phase_offset));

    let dist = xy_distance(pos, pointer);
    let blast = (uniforms.pulse * 2.0 / (dist + BLAST_EPSILON)).min(uniforms.max_impulse);
    pos += safe_normalize(pos - pointer) * blast;

    // Each axis reads the already-updated earlier axes
    let intensity = uniforms.flow_intensity;
    pos.x += noise3(Vec3::new(pos.x, time, pos.z)) * intensity;
    pos.y += noise3(Vec3::new(time, pos.y, pos.x)) * intensity;
    pos.z += noise3(Vec3::new(pos.z, pos.x, time)) * intensity;

    let dist = xy_distance(pos, pointer);
    let strength = smoothstep(uniforms.interaction_radius, 0.0, dist);
    pos += safe_normalize(pos - pointer) * strength * uniforms.interaction_force;

    let depth = view_depth(&uniforms.view, pos).max(MIN_VIEW_DEPTH);
    let point_size = (uniforms.particle_size * 100.0 * uniforms.pixel_ratio / depth).min(MAX_POINT_SIZE);

    let alpha = 0.5 + 0.5 * brightness + uniforms.pulse * 0.5;

    RenderAttributes {
        position: pos.to_array(),
        point_size,
        alpha,
        color_mix: alpha.clamp(0.0, 1.0),
        _pad: [0.0; 2],
    }
}

/// Evaluate every particle, in pool order.
pub fn evaluate_pool(particles: &[Particle], uniforms: &SimulationUniforms) -> Vec<RenderAttributes> {
    let mut out = Vec::with_capacity(particles.len());
    evaluate_into(particles, uniforms, &mut out);
    out
}

/// Like [`evaluate_pool`], reusing `out`'s allocation.
pub fn evaluate_into(particles: &[Particle], uniforms: &SimulationUniforms, out: &mut Vec<RenderAttributes>) {
    out.clear();
    out.extend(particles.iter().map(|p| flow_step(p, uniforms)));
}

/// Workgroup size of the flow compute kernel.
pub const WORKGROUP_SIZE: u32 = 256;

/// WGSL source of the flow compute kernel.
///
/// Bindings: 0 uniforms, 1 seeds (read), 2 render attributes (read-write).
pub fn compute_shader_wgsl() -> String {
    format!(
        r#"{uniforms}
{utils}
const MIN_VIEW_DEPTH: f32 = {min_depth:?};
const MAX_POINT_SIZE: f32 = {max_point:?};

struct Seed {{
    base_position: vec3<f32>,
    random_phase: f32,
}};

struct RenderAttributes {{
    position: vec3<f32>,
    point_size: f32,
    alpha: f32,
    color_mix: f32,
    _pad: vec2<f32>,
}};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@group(0) @binding(1)
var<storage, read> seeds: array<Seed>;

@group(0) @binding(2)
var<storage, read_write> attributes: array<RenderAttributes>;

@compute @workgroup_size({workgroup})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let index = global_id.x;
    if index >= arrayLength(&seeds) {{
        return;
    }}

    let seed = seeds[index];
    let base = seed.base_position;
    let time = uniforms.time * uniforms.speed;
    let pointer_pos = uniforms.pointer.xyz;
    var pos = base;

    let phase_offset = seed.random_phase * uniforms.phase_jitter;
    let brightness = noise3(base * 0.1 + vec3<f32>(0.0, 0.0, time + phase_offset));

    // Pulse blast
    let dist_blast = distance(pos.xy, pointer_pos.xy);
    let blast = min(uniforms.pulse * 2.0 / (dist_blast + 0.1), uniforms.max_impulse);
    pos += safe_normalize(pos - pointer_pos) * blast;

    // Flow field
    let intensity = uniforms.flow_intensity;
    pos.x += noise3(vec3<f32>(pos.x, time, pos.z)) * intensity;
    pos.y += noise3(vec3<f32>(time, pos.y, pos.x)) * intensity;
    pos.z += noise3(vec3<f32>(pos.z, pos.x, time)) * intensity;

    // Continuous repulsion
    let dist = distance(pos.xy, pointer_pos.xy);
    let strength = hermite(uniforms.interaction_radius, 0.0, dist);
    pos += safe_normalize(pos - pointer_pos) * strength * uniforms.interaction_force;

    let view_pos = uniforms.view * vec4<f32>(pos, 1.0);
    let depth = max(-view_pos.z, MIN_VIEW_DEPTH);

    let alpha = 0.5 + 0.5 * brightness + uniforms.pulse * 0.5;

    var out: RenderAttributes;
    out.position = pos;
    out.point_size = min(uniforms.particle_size * 100.0 * uniforms.pixel_ratio / depth, MAX_POINT_SIZE);
    out.alpha = alpha;
    out.color_mix = clamp(alpha, 0.0, 1.0);
    out._pad = vec2<f32>(0.0);
    attributes[index] = out;
}}
"#,
        uniforms = UNIFORMS_WGSL,
        utils = shader_utils::all_utils_wgsl(),
        min_depth = MIN_VIEW_DEPTH,
        max_point = MAX_POINT_SIZE,
        workgroup = WORKGROUP_SIZE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Uniforms with every dynamic force switched off and the pointer far away.
    fn neutral() -> SimulationUniforms {
        let mut u = SimulationUniforms::default();
        u.speed = 0.0;
        u.flow_intensity = 0.0;
        u.pulse = 0.0;
        u.pointer_world = Vec3::new(1000.0, 1000.0, 0.0);
        u
    }

    #[test]
    fn test_attributes_are_32_bytes() {
        assert_eq!(std::mem::size_of::<RenderAttributes>(), 32);
    }

    #[test]
    fn test_smoothstep() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);

        // Falling ramp
        assert_eq!(smoothstep(5.0, 0.0, 0.0), 1.0);
        assert_eq!(smoothstep(5.0, 0.0, 5.0), 0.0);
        assert_eq!(smoothstep(5.0, 0.0, 7.0), 0.0);

        assert_eq!(smoothstep(2.0, 2.0, 1.0), 0.0);
    }

    #[test]
    fn test_safe_normalize_zero() {
        assert_eq!(safe_normalize(Vec3::ZERO), Vec3::ZERO);
        assert!((safe_normalize(Vec3::new(3.0, 4.0, 0.0)) - Vec3::new(0.6, 0.8, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_neutral_step_leaves_base_position() {
        let u = neutral();
        for base in [Vec3::new(9.5, -3.0, 0.25), Vec3::ZERO, Vec3::new(-10.0, 10.0, -10.0)] {
            let attrs = flow_step(&Particle::new(base, 0.7), &u);
            assert_eq!(attrs.position(), base);
        }
    }

    #[test]
    fn test_size_attenuation() {
        let u = neutral();
        let near = flow_step(&Particle::new(Vec3::new(0.0, 0.0, 5.0), 0.0), &u);
        let far = flow_step(&Particle::new(Vec3::new(0.0, 0.0, -5.0), 0.0), &u);
        assert!(near.point_size > far.point_size);

        // 0.15 * 100 / 15
        assert!((near.point_size - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_behind_camera_depth_is_guarded() {
        let u = neutral();
        for z in [20.0, 30.0] {
            let attrs = flow_step(&Particle::new(Vec3::new(0.0, 0.0, z), 0.0), &u);
            assert_eq!(attrs.point_size, MAX_POINT_SIZE);
        }
    }

    #[test]
    fn test_point_size_capped_near_camera() {
        let mut u = neutral();
        u.pixel_ratio = 3.0;
        // Just in front of the camera at z = 20
        let attrs = flow_step(&Particle::new(Vec3::new(0.0, 0.0, 19.99), 0.0), &u);
        assert_eq!(attrs.point_size, MAX_POINT_SIZE);

        // Ordinary depths stay below the cap
        let attrs = flow_step(&Particle::new(Vec3::new(0.0, 0.0, 10.0), 0.0), &u);
        assert!(attrs.point_size < MAX_POINT_SIZE);
        assert!((attrs.point_size - 0.15 * 100.0 * 3.0 / 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_blast_at_pointer_is_finite() {
        let mut u = neutral();
        u.pulse = 2.0;
        u.pointer_world = Vec3::new(1.0, 2.0, 0.0);
        let attrs = flow_step(&Particle::new(Vec3::new(1.0, 2.0, 0.0), 0.0), &u);
        assert!(attrs.position().is_finite());
        assert_eq!(attrs.position(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_blast_magnitude() {
        let mut u = neutral();
        u.pulse = 1.0;
        u.pointer_world = Vec3::ZERO;
        u.interaction_force = 0.0;

        let attrs = flow_step(&Particle::new(Vec3::new(3.0, 4.0, 0.0), 0.0), &u);
        let expected = Vec3::new(3.0, 4.0, 0.0) + Vec3::new(0.6, 0.8, 0.0) * (2.0 / 5.1);
        assert!((attrs.position() - expected).length() < 1e-5);
    }

    #[test]
    fn test_blast_is_capped() {
        let mut u = neutral();
        u.pulse = 2.0;
        u.pointer_world = Vec3::ZERO;
        u.interaction_force = 0.0;
        u.max_impulse = 10.0;

        let attrs = flow_step(&Particle::new(Vec3::new(0.01, 0.0, 0.0), 0.0), &u);
        assert!((attrs.position().x - 10.01).abs() < 1e-4);
    }

    #[test]
    fn test_repulsion_inside_radius() {
        let mut u = neutral();
        u.pointer_world = Vec3::ZERO;
        u.interaction_radius = 5.0;
        u.interaction_force = 1.0;

        let attrs = flow_step(&Particle::new(Vec3::new(1.0, 0.0, 0.0), 0.0), &u);
        // smoothstep(5, 0, 1) = 0.896
        assert!((attrs.position().x - 1.896).abs() < 1e-5);

        let outside = flow_step(&Particle::new(Vec3::new(6.0, 0.0, 0.0), 0.0), &u);
        assert_eq!(outside.position().x, 6.0);
    }

    #[test]
    fn test_flow_displaces_particles() {
        let mut u = neutral();
        u.flow_intensity = 1.0;
        u.elapsed_time = 3.0;
        u.speed = 0.2;

        let moved = (0..50)
            .map(|i| Particle::new(Vec3::new(i as f32 * 0.37 - 9.0, i as f32 * 0.21 - 5.0, 1.5), 0.0))
            .filter(|p| flow_step(p, &u).position() != p.base_position())
            .count();
        assert!(moved > 40);
    }

    #[test]
    fn test_pulse_brightens() {
        let base = Particle::new(Vec3::new(2.0, -1.0, 3.0), 0.0);
        let mut u = neutral();
        let dim = flow_step(&base, &u);

        u.pulse = 1.0;
        let bright = flow_step(&base, &u);
        assert!((bright.alpha - dim.alpha - 0.5).abs() < 1e-6);
        assert!(bright.color_mix >= dim.color_mix);
        assert!((0.0..=1.0).contains(&bright.color_mix));
    }

    #[test]
    fn test_phase_only_matters_with_jitter() {
        let mut u = neutral();
        let a = flow_step(&Particle::new(Vec3::new(1.0, 2.0, 3.0), 0.1), &u);
        let b = flow_step(&Particle::new(Vec3::new(1.0, 2.0, 3.0), 0.9), &u);
        assert_eq!(a.alpha, b.alpha);

        u.phase_jitter = 5.0;
        let a = flow_step(&Particle::new(Vec3::new(1.0, 2.0, 3.0), 0.1), &u);
        let b = flow_step(&Particle::new(Vec3::new(1.0, 2.0, 3.0), 0.9), &u);
        assert_ne!(a.alpha, b.alpha);
    }

    #[test]
    fn test_evaluate_pool_keeps_order() {
        let u = neutral();
        let particles: Vec<Particle> = (0..10)
            .map(|i| Particle::new(Vec3::splat(i as f32), 0.0))
            .collect();
        let attrs = evaluate_pool(&particles, &u);
        assert_eq!(attrs.len(), 10);
        for (p, a) in particles.iter().zip(&attrs) {
            assert_eq!(a.position(), p.base_position());
        }
    }

    #[test]
    fn test_compute_shader_mentions_bindings() {
        let src = compute_shader_wgsl();
        assert!(src.contains("@workgroup_size(256)"));
        assert!(src.contains("var<storage, read_write> attributes"));
        assert!(src.contains("const MIN_VIEW_DEPTH: f32 = 0.001;"));
        assert!(src.contains("const MAX_POINT_SIZE: f32 = 256.0;"));
    }
}
