//! Renderer: wgpu init + depth + scene meshes, line helpers and the
//! optional post-processing chain.
//! wgpu = 23.x, winit = 0.30.x

pub mod chunks;
pub mod lines;
pub mod material;
pub mod mesh;
pub mod post;

use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use bytemuck::{Pod, Zeroable};
use corelib::{
    camera::Camera,
    scene::{MeshHandle, Scene},
};
use thiserror::Error;
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    Buffer, BufferBindingType, BufferUsages, CommandEncoderDescriptor, Device, DeviceDescriptor,
    Extent3d, Features, Instance, InstanceDescriptor, Limits, LoadOp, Operations, PowerPreference,
    PresentMode, Queue, RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline,
    ShaderStages, StoreOp, Surface, SurfaceConfiguration, SurfaceError, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
    util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

pub use chunks::{InjectionPoint, ShaderChunkRegistry, ShaderComposer, ShaderError};
pub use material::{
    MaterialDesc, MaterialHooks, MaterialKind, MaterialParams, MaterialSource, build_material,
};
pub use post::{PostSettings, SsaoSettings};

use lines::LineBatch;
use mesh::{GpuMesh, MeshTargets};
use post::PostChain;

/// Directional lights forwarded to shaders; extra scene lights are ignored.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 2;

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.05,
    b: 0.08,
    a: 1.0,
};

/// Per-frame UBO (`Frame` in the `common` chunk).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    /// rgb: summed ambient light, a: directional light count.
    pub ambient: [f32; 4],
    pub light_dirs: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    pub light_colors: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
}

impl FrameUniform {
    pub fn new(scene: &Scene, camera: &Camera) -> Self {
        let mut light_dirs = [[0.0; 4]; MAX_DIRECTIONAL_LIGHTS];
        let mut light_colors = [[0.0; 4]; MAX_DIRECTIONAL_LIGHTS];
        let mut count = 0usize;
        for light in scene.directional_lights().take(MAX_DIRECTIONAL_LIGHTS) {
            light_dirs[count] = light.direction.normalize_or_zero().extend(0.0).to_array();
            light_colors[count] = (light.color * light.intensity).extend(1.0).to_array();
            count += 1;
        }

        Self {
            view_proj: camera.proj_view().to_cols_array_2d(),
            camera_pos: camera.eye.extend(1.0).to_array(),
            ambient: scene.ambient().extend(count as f32).to_array(),
            light_dirs,
            light_colors,
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("GPU rejected {label}: {message}")]
    Validation { label: String, message: String },
}

/// Startup options for [`GpuState::new`].
#[derive(Clone, Debug)]
pub struct RendererOptions {
    pub backends: wgpu::Backends,
    /// `None` renders straight to the surface.
    pub post: Option<PostSettings>,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            post: Some(PostSettings::default()),
        }
    }
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Frame uniforms (group 0) and material layout (group 1)
    frame_bgl: BindGroupLayout,
    frame_bg: BindGroup,
    frame_buf: Buffer,
    material_bgl: BindGroupLayout,

    // Scene resources
    scene_format: TextureFormat,
    line_pipeline: RenderPipeline,
    line_batches: Vec<LineBatch>,
    meshes: Vec<GpuMesh>,
    synced_nodes: usize,

    post: Option<PostChain>,

    // Depth (also sampled by SSAO)
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, options: &RendererOptions) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .context("create_surface failed")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("No suitable GPU adapter for {:?}", options.backends))?;
        let info = adapter.get_info();
        log::info!("Adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("Stratum Device"),
                    required_features: Features::empty(),
                    required_limits: Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("request_device failed")?;

        let caps = surface.get_capabilities(&adapter);
        let (surface_format, alpha_mode) = surface_format_and_alpha(&caps)?;

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);
        let registry = ShaderChunkRegistry::with_builtins();

        // ==== Frame BGL/BG ====
        let frame_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Frame BGL"),
            entries: &[uniform_layout_entry(
                0,
                ShaderStages::VERTEX_FRAGMENT,
                std::mem::size_of::<FrameUniform>(),
            )],
        });
        let frame_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame UBO"),
            contents: bytemuck::bytes_of(&FrameUniform::zeroed()),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let frame_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame BG"),
            layout: &frame_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buf.as_entire_binding(),
            }],
        });

        // Material blocks differ in size per kind, so no min size here.
        let material_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Material BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        // ==== Post chain ====
        let post = options
            .post
            .map(|settings| {
                PostChain::new(
                    &device,
                    &registry,
                    settings,
                    surface_format,
                    &depth_view,
                    width,
                    height,
                )
            })
            .transpose()
            .context("post-processing shaders")?;
        let scene_format = if post.is_some() {
            post::HDR_FORMAT
        } else {
            surface_format
        };

        // ==== Lines ====
        let line_src = registry
            .resolve_includes(include_str!("shaders/lines.wgsl"))
            .context("line shader")?;
        let line_pipeline =
            lines::create_line_pipeline(&device, &frame_bgl, &line_src, scene_format, DEPTH_FORMAT);

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            frame_bgl,
            frame_bg,
            frame_buf,
            material_bgl,
            scene_format,
            line_pipeline,
            line_batches: Vec::new(),
            meshes: Vec::new(),
            synced_nodes: 0,
            post,
            depth_view,
            width,
            height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resize: reconfigure surface & recreate depth view and post targets.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
        if let Some(post) = &mut self.post {
            post.resize(&self.device, &self.depth_view, self.width, self.height);
        }
    }

    /// Upload a mesh with its material. The pipeline is validated inside a
    /// wgpu error scope; a rejected shader yields `RenderError::Validation`
    /// and nothing is kept.
    pub fn upload_mesh(
        &mut self,
        mesh: &asset::MeshData,
        material: &MaterialDesc,
    ) -> Result<MeshHandle, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let gpu_mesh = GpuMesh::new(
            &self.device,
            &MeshTargets {
                frame_bgl: &self.frame_bgl,
                material_bgl: &self.material_bgl,
                color_format: self.scene_format,
                depth_format: DEPTH_FORMAT,
            },
            mesh,
            material,
        );
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Validation {
                label: material.label.clone(),
                message: err.to_string(),
            });
        }

        let handle = MeshHandle(self.meshes.len() as u32);
        log::info!(
            "Uploaded mesh {:?}: {} indices, {}",
            handle,
            gpu_mesh.index_count,
            gpu_mesh.label
        );
        self.meshes.push(gpu_mesh);
        Ok(handle)
    }

    /// Upload GPU resources for nodes appended since the last sync.
    fn sync_scene(&mut self, scene: &Scene) {
        for (id, node) in scene.since(self.synced_nodes) {
            if let Some(vertices) = lines::helper_vertices(&node.kind, node.transform.matrix()) {
                let label = format!("Helper {id} VB");
                self.line_batches
                    .push(LineBatch::new(&self.device, &label, &vertices));
            }
        }
        self.synced_nodes = scene.len();
    }

    /// Render one frame: update frame UBO, draw scene, run post chain.
    pub fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<(), SurfaceError> {
        self.sync_scene(scene);

        let frame_uniform = FrameUniform::new(scene, camera);
        self.queue
            .write_buffer(&self.frame_buf, 0, bytemuck::bytes_of(&frame_uniform));
        if let Some(post) = &self.post {
            post.update(&self.queue, camera.proj());
        }

        // --- frame & pass
        let frame = self.surface.get_current_texture()?;
        let surface_view = frame.texture.create_view(&Default::default());
        let scene_view = match &self.post {
            Some(post) => post.scene_target(),
            None => &surface_view,
        };

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("ScenePass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: scene_view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(CLEAR_COLOR),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            rpass.set_bind_group(0, &self.frame_bg, &[]);

            rpass.set_pipeline(&self.line_pipeline);
            for batch in &self.line_batches {
                rpass.set_vertex_buffer(0, batch.buffer.slice(..));
                rpass.draw(0..batch.vertex_count, 0..1);
            }

            for handle in scene.meshes() {
                let Some(mesh) = self.meshes.get(handle.0 as usize) else {
                    continue;
                };
                rpass.set_pipeline(&mesh.pipeline);
                rpass.set_bind_group(1, &mesh.material_bg, &[]);
                rpass.set_vertex_buffer(0, mesh.vertex_buf.slice(..));
                rpass.set_index_buffer(mesh.index_buf.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        if let Some(post) = &self.post {
            post.execute(&mut encoder, &surface_view);
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

/// Surface format (prefer sRGB) and the first supported alpha mode.
fn surface_format_and_alpha(
    caps: &wgpu::SurfaceCapabilities,
) -> Result<(TextureFormat, wgpu::CompositeAlphaMode)> {
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or_else(|| anyhow!("Surface reports no formats"))?;
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .ok_or_else(|| anyhow!("Surface reports no alpha modes"))?;
    Ok((format, alpha_mode))
}

fn uniform_layout_entry(binding: u32, visibility: ShaderStages, size: usize) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}
