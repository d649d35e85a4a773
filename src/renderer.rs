//! Sprite rendering of the particle pool.
//!
//! Each particle is an instanced, camera-facing quad (6 vertices) sized to its
//! `point_size` in pixels. The fragment stage cuts a circle out of the quad
//! and softens its edge; blending is additive with no depth attachment, so
//! overlapping particles brighten instead of occluding each other.
//!
//! [`shade_fragment`] is the CPU model of the fragment stage.

use glam::{Vec2, Vec3, Vec4};

use crate::flow::RenderAttributes;
use crate::uniforms::UNIFORMS_WGSL;

/// Vertices per sprite quad.
pub const VERTICES_PER_SPRITE: u32 = 6;

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x3, // position
    1 => Float32,   // point_size
    2 => Float32,   // alpha
    3 => Float32    // color_mix
];

/// Per-instance layout reading [`RenderAttributes`] straight from the compute output.
pub fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<RenderAttributes>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRIBUTES,
    }
}

/// `src * src_alpha + dst` for color, `src + dst` for alpha.
pub fn additive_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

/// WGSL source of the sprite pipeline (`vs_main` / `fs_main`).
pub fn sprite_shader_wgsl() -> String {
    format!(
        r#"{uniforms}
@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) alpha: f32,
    @location(2) color_mix: f32,
}};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) particle_pos: vec3<f32>,
    @location(1) point_size: f32,
    @location(2) alpha: f32,
    @location(3) color_mix: f32,
) -> VertexOutput {{
    var quad_vertices = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );

    let quad_pos = quad_vertices[vertex_index];

    // A diameter of point_size pixels spans 2 * point_size / viewport in NDC
    let half_extent = point_size / uniforms.viewport;

    var clip_pos = uniforms.view_proj * vec4<f32>(particle_pos, 1.0);
    clip_pos.x += quad_pos.x * half_extent.x * clip_pos.w;
    clip_pos.y += quad_pos.y * half_extent.y * clip_pos.w;

    var out: VertexOutput;
    out.clip_position = clip_pos;
    out.uv = quad_pos * 0.5 + 0.5;
    out.alpha = alpha;
    out.color_mix = color_mix;
    return out;
}}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
    let r = distance(in.uv, vec2<f32>(0.5));
    if r > 0.5 {{
        discard;
    }}
    let edge = max(1.0 - 2.0 * r, 0.0);
    let strength = edge * sqrt(edge);
    let color = mix(uniforms.color_a.rgb, uniforms.color_b.rgb, in.color_mix);
    return vec4<f32>(color, clamp(strength * in.alpha, 0.0, 1.0));
}}
"#,
        uniforms = UNIFORMS_WGSL,
    )
}

/// Shade one sprite fragment on the CPU.
///
/// `point_coord` is the position inside the sprite, `[0, 1]` on both axes.
/// Returns `None` for fragments outside the circle, otherwise straight
/// (non-premultiplied) RGBA.
pub fn shade_fragment(point_coord: Vec2, attrs: &RenderAttributes, color_a: Vec3, color_b: Vec3) -> Option<Vec4> {
    let r = point_coord.distance(Vec2::splat(0.5));
    if r > 0.5 {
        return None;
    }
    let strength = (1.0 - 2.0 * r).max(0.0).powf(1.5);
    let color = color_a.lerp(color_b, attrs.color_mix);
    Some(color.extend((strength * attrs.alpha).clamp(0.0, 1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(alpha: f32) -> RenderAttributes {
        RenderAttributes {
            position: [0.0; 3],
            point_size: 10.0,
            alpha,
            color_mix: alpha.clamp(0.0, 1.0),
            _pad: [0.0; 2],
        }
    }

    const A: Vec3 = Vec3::new(0.1, 0.0, 0.8);
    const B: Vec3 = Vec3::new(0.3, 0.05, 0.8);

    #[test]
    fn test_outside_circle_is_discarded() {
        let a = attrs(1.0);
        assert!(shade_fragment(Vec2::new(0.0, 0.0), &a, A, B).is_none());
        assert!(shade_fragment(Vec2::new(1.0, 0.5), &a, A, B).is_some());
        assert!(shade_fragment(Vec2::new(1.01, 0.5), &a, A, B).is_none());
        assert!(shade_fragment(Vec2::new(0.9, 0.9), &a, A, B).is_none());
    }

    #[test]
    fn test_color_endpoints() {
        let dim = shade_fragment(Vec2::splat(0.5), &attrs(0.0), A, B).unwrap();
        assert!((dim.truncate() - A).length() < 1e-6);
        assert_eq!(dim.w, 0.0);

        let bright = shade_fragment(Vec2::splat(0.5), &attrs(1.0), A, B).unwrap();
        assert!((bright.truncate() - B).length() < 1e-6);
        assert_eq!(bright.w, 1.0);
    }

    #[test]
    fn test_soft_edge() {
        let a = attrs(1.0);
        let center = shade_fragment(Vec2::splat(0.5), &a, A, B).unwrap().w;
        let mid = shade_fragment(Vec2::new(0.75, 0.5), &a, A, B).unwrap().w;
        let edge = shade_fragment(Vec2::new(1.0, 0.5), &a, A, B).unwrap().w;
        assert!(center > mid && mid > edge);
        assert!((mid - 0.5f32.powf(1.5)).abs() < 1e-6);
        assert_eq!(edge, 0.0);
    }

    #[test]
    fn test_alpha_is_clamped() {
        let over = shade_fragment(Vec2::splat(0.5), &attrs(2.5), A, B).unwrap();
        assert_eq!(over.w, 1.0);
        let under = shade_fragment(Vec2::splat(0.5), &attrs(-0.3), A, B).unwrap();
        assert_eq!(under.w, 0.0);
    }

    #[test]
    fn test_instance_layout_matches_attributes() {
        let layout = instance_layout();
        assert_eq!(layout.array_stride, 32);
        let offsets: Vec<_> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 16, 20]);
    }

    #[test]
    fn test_blend_is_additive() {
        let blend = additive_blend();
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::SrcAlpha);
    }
}
