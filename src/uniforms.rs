//! Per-frame simulation uniforms.
//!
//! [`SimulationUniforms`] is the CPU-side view the flow step reads.
//! [`GpuUniforms`] is the same data packed for a WGSL uniform buffer;
//! [`UNIFORMS_WGSL`] declares the matching struct.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::config::FlowConfig;
use crate::gpu::OrbitCamera;

/// Everything the flow step and sprite shader read in one frame.
///
/// Written once per frame by the frame driver's update phase, then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationUniforms {
    /// Seconds since simulation start (sum of frame deltas).
    pub elapsed_time: f32,
    pub speed: f32,
    pub flow_intensity: f32,
    pub particle_size: f32,
    /// Linear RGB.
    pub color_a: Vec3,
    /// Linear RGB.
    pub color_b: Vec3,
    /// Physical pixels per logical pixel.
    pub pixel_ratio: f32,
    /// Viewport size in physical pixels.
    pub viewport: Vec2,
    /// Pointer projected onto the z = 0 plane.
    pub pointer_world: Vec3,
    pub interaction_radius: f32,
    pub interaction_force: f32,
    /// Current pulse magnitude, `>= 0`.
    pub pulse: f32,
    /// Cap on the pulse blast displacement.
    pub max_impulse: f32,
    /// Brightness time offset per unit of random phase.
    pub phase_jitter: f32,
    pub view: Mat4,
    pub view_proj: Mat4,
}

impl SimulationUniforms {
    /// Uniforms for `config` at time zero with no interaction.
    pub fn from_config(config: &FlowConfig, camera: &OrbitCamera, viewport: Vec2, pixel_ratio: f32) -> Self {
        let aspect = viewport.x / viewport.y.max(1.0);
        Self {
            elapsed_time: 0.0,
            speed: config.speed,
            flow_intensity: config.flow_intensity,
            particle_size: config.particle_size,
            color_a: config.color_a.to_linear(),
            color_b: config.color_b.to_linear(),
            pixel_ratio,
            viewport,
            pointer_world: Vec3::ZERO,
            interaction_radius: config.interaction_radius,
            interaction_force: config.interaction_force,
            pulse: 0.0,
            max_impulse: config.max_impulse,
            phase_jitter: config.phase_jitter,
            view: camera.view_matrix(),
            view_proj: camera.view_proj(aspect),
        }
    }

    /// Flow-field time, `elapsed_time * speed`.
    #[inline]
    pub fn flow_time(&self) -> f32 {
        self.elapsed_time * self.speed
    }

    /// Pack for upload.
    pub fn to_gpu(&self) -> GpuUniforms {
        GpuUniforms {
            view: self.view.to_cols_array_2d(),
            view_proj: self.view_proj.to_cols_array_2d(),
            color_a: self.color_a.extend(1.0).to_array(),
            color_b: self.color_b.extend(1.0).to_array(),
            pointer: self.pointer_world.extend(0.0).to_array(),
            viewport: self.viewport.to_array(),
            time: self.elapsed_time,
            speed: self.speed,
            flow_intensity: self.flow_intensity,
            particle_size: self.particle_size,
            pixel_ratio: self.pixel_ratio,
            interaction_radius: self.interaction_radius,
            interaction_force: self.interaction_force,
            pulse: self.pulse,
            max_impulse: self.max_impulse,
            phase_jitter: self.phase_jitter,
        }
    }
}

impl Default for SimulationUniforms {
    fn default() -> Self {
        Self::from_config(
            &FlowConfig::default(),
            &OrbitCamera::default(),
            Vec2::new(1280.0, 720.0),
            1.0,
        )
    }
}

/// Uniform buffer contents, laid out to match [`UNIFORMS_WGSL`].
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct GpuUniforms {
    pub view: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub color_a: [f32; 4],
    pub color_b: [f32; 4],
    pub pointer: [f32; 4],
    pub viewport: [f32; 2],
    pub time: f32,
    pub speed: f32,
    pub flow_intensity: f32,
    pub particle_size: f32,
    pub pixel_ratio: f32,
    pub interaction_radius: f32,
    pub interaction_force: f32,
    pub pulse: f32,
    pub max_impulse: f32,
    pub phase_jitter: f32,
}

/// WGSL declaration of [`GpuUniforms`].
pub const UNIFORMS_WGSL: &str = r#"
struct Uniforms {
    view: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    color_a: vec4<f32>,
    color_b: vec4<f32>,
    pointer: vec4<f32>,
    viewport: vec2<f32>,
    time: f32,
    speed: f32,
    flow_intensity: f32,
    particle_size: f32,
    pixel_ratio: f32,
    interaction_radius: f32,
    interaction_force: f32,
    pulse: f32,
    max_impulse: f32,
    phase_jitter: f32,
};
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_gpu_layout_matches_wgsl() {
        assert_eq!(size_of::<GpuUniforms>(), 224);
        assert_eq!(offset_of!(GpuUniforms, view_proj), 64);
        assert_eq!(offset_of!(GpuUniforms, color_a), 128);
        assert_eq!(offset_of!(GpuUniforms, pointer), 160);
        assert_eq!(offset_of!(GpuUniforms, viewport), 176);
        assert_eq!(offset_of!(GpuUniforms, time), 184);
        assert_eq!(offset_of!(GpuUniforms, phase_jitter), 220);
    }

    #[test]
    fn test_to_gpu_copies_values() {
        let mut uniforms = SimulationUniforms::default();
        uniforms.pulse = 1.5;
        uniforms.pointer_world = Vec3::new(1.0, -2.0, 0.0);

        let gpu = uniforms.to_gpu();
        assert_eq!(gpu.pulse, 1.5);
        assert_eq!(gpu.pointer, [1.0, -2.0, 0.0, 0.0]);
        assert_eq!(gpu.view, uniforms.view.to_cols_array_2d());
        assert_eq!(gpu.color_a[3], 1.0);
    }

    #[test]
    fn test_flow_time() {
        let mut uniforms = SimulationUniforms::default();
        uniforms.elapsed_time = 10.0;
        uniforms.speed = 0.2;
        assert!((uniforms.flow_time() - 2.0).abs() < 1e-6);
    }
}
