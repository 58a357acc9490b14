//! Post-processing chain: scene → FXAA → SSAO → output (tone mapping).
//!
//! The scene is rendered into an HDR target; each pass is a fullscreen
//! triangle that reads the previous target and writes the other one,
//! ping-pong style, until the output pass writes the surface.

use bytemuck::{Pod, Zeroable};
use corelib::Mat4;
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType,
    BufferUsages, CommandEncoder, Device, Queue, RenderPipeline, Sampler, SamplerBindingType,
    ShaderStages, TextureFormat, TextureSampleType, TextureView, TextureViewDimension,
    util::DeviceExt,
};

use crate::chunks::{ShaderChunkRegistry, ShaderError};

pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SsaoSettings {
    /// World-space sampling radius.
    pub radius: f32,
    pub bias: f32,
    pub intensity: f32,
    pub samples: u32,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            radius: 2.0,
            bias: 0.05,
            intensity: 1.2,
            samples: 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PostSettings {
    pub fxaa: bool,
    pub ssao: Option<SsaoSettings>,
    pub exposure: f32,
    pub tone_mapping: bool,
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            fxaa: true,
            ssao: Some(SsaoSettings::default()),
            exposure: 1.0,
            tone_mapping: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassKind {
    Fxaa,
    Ssao,
    Output,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    HdrA,
    HdrB,
    Surface,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassStep {
    pub kind: PassKind,
    pub input: Target,
    pub output: Target,
}

/// Pass order for the given settings. The scene always renders into
/// `HdrA`; the last step always writes `Surface`.
pub fn plan(settings: &PostSettings) -> Vec<PassStep> {
    let mut kinds = Vec::with_capacity(3);
    if settings.fxaa {
        kinds.push(PassKind::Fxaa);
    }
    if settings.ssao.is_some() {
        kinds.push(PassKind::Ssao);
    }
    kinds.push(PassKind::Output);

    let mut input = Target::HdrA;
    kinds
        .into_iter()
        .map(|kind| {
            let output = match (kind, input) {
                (PassKind::Output, _) => Target::Surface,
                (_, Target::HdrA) => Target::HdrB,
                _ => Target::HdrA,
            };
            let step = PassStep {
                kind,
                input,
                output,
            };
            input = output;
            step
        })
        .collect()
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FxaaUniform {
    inv_resolution: [f32; 2],
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SsaoUniform {
    proj: [[f32; 4]; 4],
    inv_proj: [[f32; 4]; 4],
    resolution: [f32; 2],
    radius: f32,
    bias: f32,
    intensity: f32,
    sample_count: u32,
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct OutputUniform {
    exposure: f32,
    tone_mapping: u32,
    _pad: [f32; 2],
}

struct FullscreenPass {
    pipeline: RenderPipeline,
    bgl: BindGroupLayout,
    uniform: Buffer,
}

struct HdrTarget {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: TextureView,
}

pub struct PostChain {
    settings: PostSettings,
    sampler: Sampler,
    targets: [HdrTarget; 2],
    fxaa: FullscreenPass,
    ssao: FullscreenPass,
    output: FullscreenPass,
    steps: Vec<(PassStep, BindGroup)>,
    width: u32,
    height: u32,
}

impl PostChain {
    pub fn new(
        device: &Device,
        registry: &ShaderChunkRegistry,
        settings: PostSettings,
        surface_format: TextureFormat,
        depth_view: &TextureView,
        width: u32,
        height: u32,
    ) -> Result<Self, ShaderError> {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let fxaa = fullscreen_pass(
            device,
            "FXAA",
            &registry.resolve_includes(include_str!("shaders/post/fxaa.wgsl"))?,
            &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
            std::mem::size_of::<FxaaUniform>(),
            HDR_FORMAT,
        );
        let ssao = fullscreen_pass(
            device,
            "SSAO",
            &registry.resolve_includes(include_str!("shaders/post/ssao.wgsl"))?,
            &[
                texture_entry(0),
                sampler_entry(1),
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Depth,
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                uniform_entry(3),
            ],
            std::mem::size_of::<SsaoUniform>(),
            HDR_FORMAT,
        );
        let output = fullscreen_pass(
            device,
            "Output",
            &registry.resolve_includes(include_str!("shaders/post/output.wgsl"))?,
            &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
            std::mem::size_of::<OutputUniform>(),
            surface_format,
        );

        let width = width.max(1);
        let height = height.max(1);
        let targets = [
            create_hdr_target(device, "Post HDR A", width, height),
            create_hdr_target(device, "Post HDR B", width, height),
        ];

        let mut chain = Self {
            settings,
            sampler,
            targets,
            fxaa,
            ssao,
            output,
            steps: Vec::new(),
            width,
            height,
        };
        chain.rebuild_steps(device, depth_view);
        log::info!(
            "Post chain: {:?}",
            chain.steps.iter().map(|(s, _)| s.kind).collect::<Vec<_>>()
        );
        Ok(chain)
    }

    /// Target the scene pass must render into.
    pub fn scene_target(&self) -> &TextureView {
        &self.targets[0].view
    }

    /// Recreate size-dependent targets and bind groups.
    pub fn resize(&mut self, device: &Device, depth_view: &TextureView, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.targets = [
            create_hdr_target(device, "Post HDR A", self.width, self.height),
            create_hdr_target(device, "Post HDR B", self.width, self.height),
        ];
        self.rebuild_steps(device, depth_view);
    }

    /// Upload per-frame parameters.
    pub fn update(&self, queue: &Queue, proj: Mat4) {
        let resolution = [self.width as f32, self.height as f32];
        let fxaa = FxaaUniform {
            inv_resolution: [1.0 / resolution[0], 1.0 / resolution[1]],
            _pad: [0.0; 2],
        };
        queue.write_buffer(&self.fxaa.uniform, 0, bytemuck::bytes_of(&fxaa));

        if let Some(ssao) = self.settings.ssao {
            let u = SsaoUniform {
                proj: proj.to_cols_array_2d(),
                inv_proj: proj.inverse().to_cols_array_2d(),
                resolution,
                radius: ssao.radius,
                bias: ssao.bias,
                intensity: ssao.intensity,
                sample_count: ssao.samples,
                _pad: [0.0; 2],
            };
            queue.write_buffer(&self.ssao.uniform, 0, bytemuck::bytes_of(&u));
        }

        let out = OutputUniform {
            exposure: self.settings.exposure,
            tone_mapping: u32::from(self.settings.tone_mapping),
            _pad: [0.0; 2],
        };
        queue.write_buffer(&self.output.uniform, 0, bytemuck::bytes_of(&out));
    }

    /// Record all post passes; the last one writes `surface_view`.
    pub fn execute(&self, encoder: &mut CommandEncoder, surface_view: &TextureView) {
        for (step, bind_group) in &self.steps {
            let pass = self.pass(step.kind);
            let target = match step.output {
                Target::HdrA => &self.targets[0].view,
                Target::HdrB => &self.targets[1].view,
                Target::Surface => surface_view,
            };
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(pass_label(step.kind)),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            rpass.set_pipeline(&pass.pipeline);
            rpass.set_bind_group(0, bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }
    }

    fn pass(&self, kind: PassKind) -> &FullscreenPass {
        match kind {
            PassKind::Fxaa => &self.fxaa,
            PassKind::Ssao => &self.ssao,
            PassKind::Output => &self.output,
        }
    }

    fn rebuild_steps(&mut self, device: &Device, depth_view: &TextureView) {
        let steps = plan(&self.settings)
            .into_iter()
            .map(|step| {
                let input = match step.input {
                    Target::HdrB => &self.targets[1].view,
                    _ => &self.targets[0].view,
                };
                let pass = self.pass(step.kind);
                let mut entries = vec![
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(input),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ];
                if step.kind == PassKind::Ssao {
                    entries.push(wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(depth_view),
                    });
                    entries.push(wgpu::BindGroupEntry {
                        binding: 3,
                        resource: pass.uniform.as_entire_binding(),
                    });
                } else {
                    entries.push(wgpu::BindGroupEntry {
                        binding: 2,
                        resource: pass.uniform.as_entire_binding(),
                    });
                }
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(pass_label(step.kind)),
                    layout: &pass.bgl,
                    entries: &entries,
                });
                (step, bind_group)
            })
            .collect();
        self.steps = steps;
    }
}

fn pass_label(kind: PassKind) -> &'static str {
    match kind {
        PassKind::Fxaa => "FxaaPass",
        PassKind::Ssao => "SsaoPass",
        PassKind::Output => "OutputPass",
    }
}

fn texture_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Sampler(SamplerBindingType::Filtering),
        count: None,
    }
}

fn uniform_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn fullscreen_pass(
    device: &Device,
    name: &str,
    wgsl: &str,
    entries: &[BindGroupLayoutEntry],
    uniform_size: usize,
    format: TextureFormat,
) -> FullscreenPass {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(name),
        source: wgpu::ShaderSource::Wgsl(wgsl.into()),
    });
    let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(name),
        entries,
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(name),
        bind_group_layouts: &[&bgl],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(name),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });
    let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(name),
        contents: &vec![0u8; uniform_size],
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });
    FullscreenPass {
        pipeline,
        bgl,
        uniform,
    }
}

fn create_hdr_target(device: &Device, label: &str, width: u32, height: u32) -> HdrTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HDR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    HdrTarget { texture, view }
}
