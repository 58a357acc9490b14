//! Material construction: composed WGSL plus a uniform block.
//!
//! Everything here is CPU-side and can run on a loader thread; the GPU
//! pipeline is created later from the returned [`MaterialDesc`].

use std::fmt;

use bytemuck::{Pod, Zeroable};
use corelib::{Aabb, Vec3};

use crate::chunks::{InjectionPoint, ShaderChunkRegistry, ShaderComposer, ShaderError};

/// Built-in template for the standard (physically based) material.
pub const STANDARD_TEMPLATE: &str = include_str!("shaders/standard.wgsl");

pub const DEFAULT_LAYER_THICKNESS: f32 = 0.2;
pub const DEFAULT_LAYER_WIDTH: f32 = 0.45;
pub const DEFAULT_DISTORTION_SCALE: f32 = 0.005;

/// Material construction strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaterialKind {
    /// Custom vertex/fragment pair fetched at runtime.
    #[default]
    Layer,
    /// Built-in physically based template with the print-layer chunk
    /// injected at [`InjectionPoint::FragmentNormal`].
    Standard,
}

impl MaterialKind {
    pub fn label(self) -> &'static str {
        match self {
            MaterialKind::Layer => "layer",
            MaterialKind::Standard => "standard",
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Uniform block of the layer shader (`LayerMaterial` in WGSL).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LayerUniforms {
    pub height: f32,
    pub layer_thickness: f32,
    pub layer_width: f32,
    pub distortion_scale: f32,
}

/// Uniform block of the standard template (`StandardMaterial` in WGSL).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct StandardUniforms {
    pub base_color: [f32; 4],
    pub layer_color: [f32; 4],
    /// xyz: direction towards the key light, w: intensity (0 disables).
    pub light_direction: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub layer_thickness: f32,
    pub layer_width: f32,
    pub distortion_scale: f32,
    pub height: f32,
    pub _pad: [f32; 2],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaterialUniforms {
    Layer(LayerUniforms),
    Standard(StandardUniforms),
}

impl MaterialUniforms {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MaterialUniforms::Layer(u) => bytemuck::bytes_of(u),
            MaterialUniforms::Standard(u) => bytemuck::bytes_of(u),
        }
    }
}

/// Tunables shared by both strategies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialParams {
    pub layer_thickness: f32,
    pub layer_width: f32,
    pub distortion_scale: f32,
    pub base_color: Vec3,
    pub layer_color: Vec3,
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            layer_thickness: DEFAULT_LAYER_THICKNESS,
            layer_width: DEFAULT_LAYER_WIDTH,
            distortion_scale: DEFAULT_DISTORTION_SCALE,
            base_color: Vec3::new(0.9, 0.45, 0.12),
            layer_color: Vec3::new(0.35, 0.16, 0.05),
            roughness: 0.55,
            metalness: 0.0,
        }
    }
}

/// Shader text fetched for a material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaterialSource {
    Layer { vertex: String, fragment: String },
    Standard { print_chunk: String },
}

impl MaterialSource {
    pub fn kind(&self) -> MaterialKind {
        match self {
            MaterialSource::Layer { .. } => MaterialKind::Layer,
            MaterialSource::Standard { .. } => MaterialKind::Standard,
        }
    }
}

/// Runs once, right before the standard template is composed. May adjust
/// uniforms and add injections.
pub type BeforeCompile = Box<dyn FnOnce(&mut StandardUniforms, &mut ShaderComposer<'_>) + Send>;

#[derive(Default)]
pub struct MaterialHooks {
    pub before_compile: Option<BeforeCompile>,
}

impl MaterialHooks {
    pub fn before_compile<F>(f: F) -> Self
    where
        F: FnOnce(&mut StandardUniforms, &mut ShaderComposer<'_>) + Send + 'static,
    {
        Self {
            before_compile: Some(Box::new(f)),
        }
    }
}

/// Composed shader and uniform block, ready for pipeline creation.
#[derive(Clone, Debug)]
pub struct MaterialDesc {
    pub kind: MaterialKind,
    pub label: String,
    pub wgsl: String,
    pub uniforms: MaterialUniforms,
}

impl LayerUniforms {
    pub fn new(bounds: &Aabb, params: &MaterialParams) -> Self {
        Self {
            height: bounds.size().z,
            layer_thickness: params.layer_thickness,
            layer_width: params.layer_width,
            distortion_scale: params.distortion_scale,
        }
    }
}

impl StandardUniforms {
    pub fn new(bounds: &Aabb, params: &MaterialParams) -> Self {
        Self {
            base_color: params.base_color.extend(1.0).to_array(),
            layer_color: params.layer_color.extend(1.0).to_array(),
            light_direction: [0.0; 4],
            roughness: params.roughness,
            metalness: params.metalness,
            layer_thickness: params.layer_thickness,
            layer_width: params.layer_width,
            distortion_scale: params.distortion_scale,
            height: bounds.size().z,
            _pad: [0.0; 2],
        }
    }
}

/// Build the material for a model with the given bounds.
pub fn build_material(
    source: MaterialSource,
    params: &MaterialParams,
    bounds: &Aabb,
    registry: &ShaderChunkRegistry,
    hooks: MaterialHooks,
) -> Result<MaterialDesc, ShaderError> {
    let kind = source.kind();
    let (wgsl, uniforms) = match source {
        MaterialSource::Layer { vertex, fragment } => {
            let module = format!("{vertex}\n{fragment}");
            let wgsl = registry.resolve_includes(&module)?;
            (wgsl, MaterialUniforms::Layer(LayerUniforms::new(bounds, params)))
        }
        MaterialSource::Standard { print_chunk } => {
            let mut uniforms = StandardUniforms::new(bounds, params);
            let mut composer = ShaderComposer::new(registry);
            composer.inject(InjectionPoint::FragmentNormal, print_chunk);
            if let Some(hook) = hooks.before_compile {
                hook(&mut uniforms, &mut composer);
            }
            let wgsl = composer.compose(STANDARD_TEMPLATE)?;
            (wgsl, MaterialUniforms::Standard(uniforms))
        }
    };

    log::debug!("Built {} material ({} bytes of WGSL)", kind, wgsl.len());
    Ok(MaterialDesc {
        kind,
        label: format!("{kind} material"),
        wgsl,
        uniforms,
    })
}
