//! Runtime configuration shared by the window loop and the model loader.

use corelib::camera::DEFAULT_FOV_DEG;
use renderer::{MaterialKind, MaterialParams, PostSettings, RendererOptions};

pub const DEFAULT_MODEL: &str = "./models/3dbenchy.stl";
pub const DEFAULT_SHADER_BASE: &str = "./shader";

pub const VERTEX_SHADER_FILE: &str = "vertexShader.wgsl";
pub const FRAGMENT_SHADER_FILE: &str = "fragmentShader.wgsl";
pub const PRINT_CHUNK_FILE: &str = "PrintShaderChunk.wgsl";

pub const WINDOW_TITLE: &str = "Stratum";

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// STL path or URL.
    pub model: String,
    /// Directory or URL holding the shader files.
    pub shader_base: String,
    pub material: MaterialKind,
    pub material_params: MaterialParams,
    /// `None` renders without post-processing.
    pub post: Option<PostSettings>,
    pub backends: wgpu::Backends,
    pub fov_deg: f32,
    /// Follow window resizes with the camera aspect ratio.
    pub track_resize: bool,
    pub show_fps: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            shader_base: DEFAULT_SHADER_BASE.to_owned(),
            material: MaterialKind::default(),
            material_params: MaterialParams::default(),
            post: Some(PostSettings::default()),
            backends: wgpu::Backends::all(),
            fov_deg: DEFAULT_FOV_DEG,
            track_resize: false,
            show_fps: false,
            width: 1280,
            height: 720,
        }
    }
}

impl AppConfig {
    pub fn renderer_options(&self) -> RendererOptions {
        RendererOptions {
            backends: self.backends,
            post: self.post,
        }
    }

    pub fn fov_rad(&self) -> f32 {
        self.fov_deg.to_radians()
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// Map a `--gpu-backend` value to wgpu backends. `None` for unknown names.
pub fn parse_backend(name: &str) -> Option<wgpu::Backends> {
    let backends = match name.to_ascii_lowercase().as_str() {
        "auto" => wgpu::Backends::all(),
        "vulkan" | "vk" => wgpu::Backends::VULKAN,
        "dx12" | "d3d12" => wgpu::Backends::DX12,
        "metal" | "mtl" => wgpu::Backends::METAL,
        "gl" | "opengl" | "gles" => wgpu::Backends::GL,
        _ => return None,
    };
    Some(backends)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_startup_constants() {
        let c = AppConfig::default();
        assert_eq!(c.model, "./models/3dbenchy.stl");
        assert_eq!(c.shader_base, "./shader");
        assert_eq!(c.material, MaterialKind::Layer);
        assert_eq!(c.fov_deg, 75.0);
        assert_eq!((c.width, c.height), (1280, 720));
        assert_eq!(c.material_params.layer_thickness, 0.2);
        assert_eq!(c.material_params.layer_width, 0.45);
        assert_eq!(c.material_params.distortion_scale, 0.005);
        assert!(c.post.is_some());
        assert!(!c.track_resize);
    }

    #[test]
    fn renderer_options_follow_post_flag() {
        let c = AppConfig {
            post: None,
            backends: wgpu::Backends::GL,
            ..Default::default()
        };
        let opts = c.renderer_options();
        assert!(opts.post.is_none());
        assert_eq!(opts.backends, wgpu::Backends::GL);
    }

    #[test]
    fn backend_names() {
        assert_eq!(parse_backend("Vulkan"), Some(wgpu::Backends::VULKAN));
        assert_eq!(parse_backend("auto"), Some(wgpu::Backends::all()));
        assert_eq!(parse_backend("gles"), Some(wgpu::Backends::GL));
        assert_eq!(parse_backend("glide"), None);
    }
}
