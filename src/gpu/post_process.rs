//! Bloom, grain and vignette.
//!
//! Particles are drawn into an offscreen HDR scene texture. Two fullscreen
//! passes then produce the final image:
//!
//! 1. bright pass: downsample the scene to half resolution and keep only
//!    pixels above the luminance threshold,
//! 2. composite: scene plus blurred bloom, screen-blended film grain, then the
//!    radial vignette, written to the swapchain.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::config::PostConfig;
use crate::shader_utils;

/// Format of the offscreen scene and bloom targets.
pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Uniforms shared by both post passes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct PostUniforms {
    pub bloom_intensity: f32,
    pub bloom_luminance: f32,
    pub bloom_smoothing: f32,
    pub noise_opacity: f32,
    pub vignette_offset: f32,
    pub vignette_darkness: f32,
    /// Seconds, animates the grain.
    pub time: f32,
    pub _pad0: f32,
    /// Full-resolution target size in pixels.
    pub resolution: [f32; 2],
    pub _pad1: [f32; 2],
}

impl PostUniforms {
    pub fn new(config: &PostConfig, time: f32, width: u32, height: u32) -> Self {
        Self {
            bloom_intensity: config.bloom_intensity,
            bloom_luminance: config.bloom_luminance,
            bloom_smoothing: config.bloom_smoothing,
            noise_opacity: config.noise_opacity,
            vignette_offset: config.vignette_offset,
            vignette_darkness: config.vignette_darkness,
            time,
            _pad0: 0.0,
            resolution: [width.max(1) as f32, height.max(1) as f32],
            _pad1: [0.0; 2],
        }
    }
}

const POST_UNIFORMS_WGSL: &str = r#"
struct PostUniforms {
    bloom_intensity: f32,
    bloom_luminance: f32,
    bloom_smoothing: f32,
    noise_opacity: f32,
    vignette_offset: f32,
    vignette_darkness: f32,
    time: f32,
    _pad0: f32,
    resolution: vec2<f32>,
    _pad1: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    var uvs = array<vec2<f32>, 3>(
        vec2<f32>(0.0, 1.0),
        vec2<f32>(2.0, 1.0),
        vec2<f32>(0.0, -1.0),
    );

    var out: VertexOutput;
    out.clip_position = vec4<f32>(positions[vertex_index], 0.0, 1.0);
    out.uv = uvs[vertex_index];
    return out;
}

fn luma(c: vec3<f32>) -> f32 {
    return dot(c, vec3<f32>(0.2126, 0.7152, 0.0722));
}
"#;

/// WGSL source of the bright pass.
///
/// Bindings: 0 scene texture, 1 sampler, 2 post uniforms.
pub fn bright_pass_wgsl() -> String {
    format!(
        r#"{common}
{math}
@group(0) @binding(0)
var scene: texture_2d<f32>;
@group(0) @binding(1)
var linear_sampler: sampler;
@group(0) @binding(2)
var<uniform> post: PostUniforms;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
    let texel = 1.0 / post.resolution;

    // 4-tap box downsample
    var color = textureSample(scene, linear_sampler, in.uv + texel * vec2<f32>(-0.5, -0.5)).rgb;
    color += textureSample(scene, linear_sampler, in.uv + texel * vec2<f32>(0.5, -0.5)).rgb;
    color += textureSample(scene, linear_sampler, in.uv + texel * vec2<f32>(-0.5, 0.5)).rgb;
    color += textureSample(scene, linear_sampler, in.uv + texel * vec2<f32>(0.5, 0.5)).rgb;
    color *= 0.25;

    let l = luma(color);
    let hard = step(post.bloom_luminance, l);
    let soft = hermite(post.bloom_luminance, post.bloom_luminance + post.bloom_smoothing, l);
    let weight = select(soft, hard, post.bloom_smoothing < 1e-6);
    return vec4<f32>(color * weight, 1.0);
}}
"#,
        common = POST_UNIFORMS_WGSL,
        math = shader_utils::MATH_WGSL,
    )
}

/// WGSL source of the composite pass.
///
/// Bindings: 0 scene texture, 1 bloom texture, 2 sampler, 3 post uniforms.
pub fn composite_wgsl() -> String {
    format!(
        r#"{common}
{math}
{random}
@group(0) @binding(0)
var scene: texture_2d<f32>;
@group(0) @binding(1)
var bloom: texture_2d<f32>;
@group(0) @binding(2)
var linear_sampler: sampler;
@group(0) @binding(3)
var<uniform> post: PostUniforms;

// 13 taps on a diamond of radius 2 over the half-resolution bloom texture
fn blurred_bloom(uv: vec2<f32>) -> vec3<f32> {{
    let texel = 2.0 / post.resolution;
    var sum = vec3<f32>(0.0);
    var total = 0.0;
    for (var x = -2; x <= 2; x++) {{
        for (var y = -2; y <= 2; y++) {{
            let reach = abs(x) + abs(y);
            if reach <= 2 {{
                let w = 1.0 / (1.0 + f32(reach));
                let offset = vec2<f32>(f32(x), f32(y)) * texel;
                sum += textureSampleLevel(bloom, linear_sampler, uv + offset, 0.0).rgb * w;
                total += w;
            }}
        }}
    }}
    return sum / total;
}}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
    var color = textureSample(scene, linear_sampler, in.uv).rgb;
    color += blurred_bloom(in.uv) * post.bloom_intensity;
    color = min(color, vec3<f32>(1.0));

    // Screen-blended film grain
    let grain = hash12(in.uv * post.resolution + vec2<f32>(post.time * 61.0, post.time * 37.0));
    let g = vec3<f32>(grain * post.noise_opacity);
    color = color + g - color * g;

    // Radial vignette
    let d = distance(in.uv, vec2<f32>(0.5));
    color *= hermite(0.8, post.vignette_offset * 0.799, d * (post.vignette_darkness + post.vignette_offset));

    return vec4<f32>(color, 1.0);
}}
"#,
        common = POST_UNIFORMS_WGSL,
        math = shader_utils::MATH_WGSL,
        random = shader_utils::RANDOM_WGSL,
    )
}

fn create_target(device: &wgpu::Device, label: &str, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SCENE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: String,
    layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// GPU resources for the post chain.
pub struct PostProcessState {
    scene_texture: wgpu::Texture,
    /// Render target for the particle pass.
    pub scene_view: wgpu::TextureView,
    bloom_texture: wgpu::Texture,
    bloom_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    bright_layout: wgpu::BindGroupLayout,
    bright_bind_group: wgpu::BindGroup,
    bright_pipeline: wgpu::RenderPipeline,
    composite_layout: wgpu::BindGroupLayout,
    composite_bind_group: wgpu::BindGroup,
    composite_pipeline: wgpu::RenderPipeline,
}

impl PostProcessState {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, surface_format: wgpu::TextureFormat) -> Self {
        let (scene_texture, scene_view) = create_target(device, "Scene Texture", width, height);
        let (bloom_texture, bloom_view) = create_target(device, "Bloom Texture", width / 2, height / 2);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniforms = PostUniforms::new(&PostConfig::default(), 0.0, width, height);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Post Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bright_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bright Pass Bind Group Layout"),
            entries: &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite Bind Group Layout"),
            entries: &[texture_entry(0), texture_entry(1), sampler_entry(2), uniform_entry(3)],
        });

        let bright_pipeline = fullscreen_pipeline(device, "Bright Pass", bright_pass_wgsl(), &bright_layout, SCENE_FORMAT);
        let composite_pipeline =
            fullscreen_pipeline(device, "Composite Pass", composite_wgsl(), &composite_layout, surface_format);

        let bright_bind_group = Self::bright_bind_group(device, &bright_layout, &scene_view, &sampler, &uniform_buffer);
        let composite_bind_group = Self::composite_bind_group(
            device,
            &composite_layout,
            &scene_view,
            &bloom_view,
            &sampler,
            &uniform_buffer,
        );

        Self {
            scene_texture,
            scene_view,
            bloom_texture,
            bloom_view,
            sampler,
            uniform_buffer,
            bright_layout,
            bright_bind_group,
            bright_pipeline,
            composite_layout,
            composite_bind_group,
            composite_pipeline,
        }
    }

    fn bright_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        scene_view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        uniform_buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bright Pass Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(scene_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        })
    }

    fn composite_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        scene_view: &wgpu::TextureView,
        bloom_view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        uniform_buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(scene_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(bloom_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        })
    }

    /// Recreate textures and bind groups after window resize.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let (scene_texture, scene_view) = create_target(device, "Scene Texture", width, height);
        let (bloom_texture, bloom_view) = create_target(device, "Bloom Texture", width / 2, height / 2);
        self.scene_texture = scene_texture;
        self.scene_view = scene_view;
        self.bloom_texture = bloom_texture;
        self.bloom_view = bloom_view;

        self.bright_bind_group = Self::bright_bind_group(
            device,
            &self.bright_layout,
            &self.scene_view,
            &self.sampler,
            &self.uniform_buffer,
        );
        self.composite_bind_group = Self::composite_bind_group(
            device,
            &self.composite_layout,
            &self.scene_view,
            &self.bloom_view,
            &self.sampler,
            &self.uniform_buffer,
        );
    }

    /// Upload this frame's post uniforms.
    pub fn update(&self, queue: &wgpu::Queue, uniforms: &PostUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Sizes of the scene and bloom targets.
    pub fn target_sizes(&self) -> ((u32, u32), (u32, u32)) {
        (
            (self.scene_texture.width(), self.scene_texture.height()),
            (self.bloom_texture.width(), self.bloom_texture.height()),
        )
    }

    /// Record the bright pass and the composite into `output`.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        self.fullscreen_pass(encoder, "Bright Pass", &self.bloom_view, &self.bright_pipeline, &self.bright_bind_group);
        self.fullscreen_pass(encoder, "Composite Pass", output, &self.composite_pipeline, &self.composite_bind_group);
    }

    fn fullscreen_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        target: &wgpu::TextureView,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
