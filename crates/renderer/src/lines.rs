//! Line helpers (grid, axes) and the pipeline that draws them.

use bytemuck::{Pod, Zeroable};
use corelib::{Mat4, Vec3, scene::NodeKind};
use wgpu::{Buffer, Device, RenderPipeline, VertexBufferLayout, VertexStepMode, util::DeviceExt};

const GRID_CENTER_COLOR: [f32; 3] = [0.267, 0.267, 0.267];
const GRID_LINE_COLOR: [f32; 3] = [0.533, 0.533, 0.533];

/// Vertex: position + color.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
}

impl LineVertex {
    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<LineVertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
    };

    fn new(pos: [f32; 3], color: [f32; 3]) -> Self {
        Self { pos, color }
    }
}

/// Square grid in the XZ plane centred on the origin, `divisions` cells per
/// side. Both middle lines use the darker center color.
pub fn grid_vertices(size: f32, divisions: u32) -> Vec<LineVertex> {
    let divisions = divisions.max(1);
    let step = size / divisions as f32;
    let half = size * 0.5;
    let center = divisions / 2;

    let mut out = Vec::with_capacity((divisions as usize + 1) * 4);
    for i in 0..=divisions {
        let k = -half + i as f32 * step;
        let color = if i == center {
            GRID_CENTER_COLOR
        } else {
            GRID_LINE_COLOR
        };
        out.push(LineVertex::new([-half, 0.0, k], color));
        out.push(LineVertex::new([half, 0.0, k], color));
        out.push(LineVertex::new([k, 0.0, -half], color));
        out.push(LineVertex::new([k, 0.0, half], color));
    }
    out
}

/// X (red), Y (green), Z (blue) axes from the origin, each fading slightly
/// towards its tip.
pub fn axes_vertices(size: f32) -> Vec<LineVertex> {
    vec![
        LineVertex::new([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
        LineVertex::new([size, 0.0, 0.0], [1.0, 0.6, 0.0]),
        LineVertex::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        LineVertex::new([0.0, size, 0.0], [0.6, 1.0, 0.0]),
        LineVertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        LineVertex::new([0.0, 0.0, size], [0.0, 0.6, 1.0]),
    ]
}

/// World-space line list for a helper node, or `None` for other kinds.
pub fn helper_vertices(kind: &NodeKind, model: Mat4) -> Option<Vec<LineVertex>> {
    let local = match *kind {
        NodeKind::Axes { size } => axes_vertices(size),
        NodeKind::Grid { size, divisions } => grid_vertices(size, divisions),
        _ => return None,
    };
    Some(
        local
            .into_iter()
            .map(|v| LineVertex {
                pos: model.transform_point3(Vec3::from(v.pos)).to_array(),
                color: v.color,
            })
            .collect(),
    )
}

/// Uploaded line list.
pub struct LineBatch {
    pub buffer: Buffer,
    pub vertex_count: u32,
}

impl LineBatch {
    pub fn new(device: &Device, label: &str, vertices: &[LineVertex]) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            buffer,
            vertex_count: vertices.len() as u32,
        }
    }
}

pub fn create_line_pipeline(
    device: &Device,
    frame_bgl: &wgpu::BindGroupLayout,
    wgsl: &str,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
) -> RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Lines WGSL"),
        source: wgpu::ShaderSource::Wgsl(wgsl.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Lines PipelineLayout"),
        bind_group_layouts: &[frame_bgl],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Lines Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[LineVertex::LAYOUT],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::LineList,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::{transform::Transform, vec3};

    #[test]
    fn grid_has_two_lines_per_division_boundary() {
        let v = grid_vertices(350.0, 35);
        assert_eq!(v.len(), 36 * 4);
        assert!(v.iter().all(|p| p.pos[1] == 0.0));
        assert!(v.iter().all(|p| p.pos[0].abs() <= 175.0 && p.pos[2].abs() <= 175.0));
    }

    #[test]
    fn rotated_grid_lies_in_xy_plane() {
        let t = Transform::identity().with_rotation_euler(vec3(std::f32::consts::FRAC_PI_2, 0.0, 0.0));
        let v = helper_vertices(&NodeKind::Grid { size: 10.0, divisions: 2 }, t.matrix()).unwrap();
        assert!(v.iter().all(|p| p.pos[2].abs() < 1e-5));
    }

    #[test]
    fn axes_are_translated_by_node_transform() {
        let t = Transform::from_translation(vec3(-1.4, -1.4, 0.0));
        let v = helper_vertices(&NodeKind::Axes { size: 10.0 }, t.matrix()).unwrap();
        assert_eq!(v.len(), 6);
        assert_eq!(v[0].pos, [-1.4, -1.4, 0.0]);
        assert_eq!(v[5].pos, [-1.4, -1.4, 10.0]);
        assert_eq!(v[0].color, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn non_helpers_have_no_lines() {
        let kind = NodeKind::Mesh(corelib::scene::MeshHandle(0));
        assert!(helper_vertices(&kind, Mat4::IDENTITY).is_none());
    }
}
