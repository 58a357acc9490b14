//! GPU mesh: vertex/index buffers plus the material pipeline that draws it.

use asset::MeshData;
use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, BufferUsages, Device, RenderPipeline, VertexBufferLayout,
    VertexStepMode, util::DeviceExt,
};

use crate::material::MaterialDesc;

/// Vertex layout consumed by `MeshInput` in the `common` chunk.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshGpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshGpuVertex {
    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshGpuVertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
    };
}

pub fn gpu_vertices(mesh: &MeshData) -> Vec<MeshGpuVertex> {
    mesh.vertices
        .iter()
        .map(|v| MeshGpuVertex {
            position: v.position,
            normal: v.normal,
        })
        .collect()
}

pub struct GpuMesh {
    pub label: String,
    pub vertex_buf: Buffer,
    pub index_buf: Buffer,
    pub index_count: u32,
    pub pipeline: RenderPipeline,
    pub material_buf: Buffer,
    pub material_bg: BindGroup,
}

pub struct MeshTargets<'a> {
    pub frame_bgl: &'a BindGroupLayout,
    pub material_bgl: &'a BindGroupLayout,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
}

impl GpuMesh {
    /// Upload the mesh and build the material pipeline. Shader validation
    /// errors are reported by wgpu's error scopes around this call.
    pub fn new(
        device: &Device,
        targets: &MeshTargets<'_>,
        mesh: &MeshData,
        material: &MaterialDesc,
    ) -> Self {
        let vertices = gpu_vertices(mesh);
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh VB"),
            contents: bytemuck::cast_slice(&vertices),
            usage: BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh IB"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: BufferUsages::INDEX,
        });

        let material_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material UBO"),
            contents: material.uniforms.as_bytes(),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let material_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material BG"),
            layout: targets.material_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: material_buf.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&material.label),
            source: wgpu::ShaderSource::Wgsl(material.wgsl.as_str().into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh PipelineLayout"),
            bind_group_layouts: &[targets.frame_bgl, targets.material_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&material.label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[MeshGpuVertex::LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: targets.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            // STL winding is not reliable enough to cull.
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: targets.depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            label: material.label.clone(),
            vertex_buf,
            index_buf,
            index_count: mesh.indices.len() as u32,
            pipeline,
            material_buf,
            material_bg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset::MeshVertex;

    #[test]
    fn gpu_vertices_keep_position_and_normal() {
        let mesh = MeshData::new(
            vec![MeshVertex {
                position: [1.0, 2.0, 3.0],
                normal: [0.0, 0.0, 1.0],
            }],
            vec![0],
        );
        assert_eq!(
            gpu_vertices(&mesh),
            vec![MeshGpuVertex {
                position: [1.0, 2.0, 3.0],
                normal: [0.0, 0.0, 1.0],
            }]
        );
        assert_eq!(std::mem::size_of::<MeshGpuVertex>(), 24);
    }
}
