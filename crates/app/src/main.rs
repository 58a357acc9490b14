//! Entry point for Stratum.
//! Logging + CLI, then hand off to the platform event loop.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use platform::{
    AppConfig,
    config::{DEFAULT_MODEL, DEFAULT_SHADER_BASE, parse_backend},
};
use renderer::{
    MaterialKind, PostSettings,
    material::{DEFAULT_DISTORTION_SCALE, DEFAULT_LAYER_THICKNESS, DEFAULT_LAYER_WIDTH},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MaterialArg {
    /// Layer-line vertex/fragment shaders from the shader directory
    Layer,
    /// Built-in lit material with the print chunk injected
    Standard,
}

impl From<MaterialArg> for MaterialKind {
    fn from(arg: MaterialArg) -> Self {
        match arg {
            MaterialArg::Layer => MaterialKind::Layer,
            MaterialArg::Standard => MaterialKind::Standard,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Parser, Debug)]
#[command(name = "stratum")]
#[command(about = "STL viewer that renders 3D-print layer lines", long_about = None)]
struct Cli {
    /// STL model path or URL
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Directory or URL holding vertexShader.wgsl, fragmentShader.wgsl and PrintShaderChunk.wgsl
    #[arg(long, default_value = DEFAULT_SHADER_BASE)]
    shader_base: String,

    #[arg(long, value_enum, default_value_t = MaterialArg::Layer)]
    material: MaterialArg,

    /// FXAA, SSAO and tone-mapped output
    #[arg(long, value_enum, default_value_t = Toggle::On)]
    post: Toggle,

    /// auto|vulkan|dx12|metal|gl
    #[arg(long, default_value = "auto")]
    gpu_backend: String,

    #[arg(long, default_value_t = DEFAULT_LAYER_THICKNESS)]
    layer_thickness: f32,

    #[arg(long, default_value_t = DEFAULT_LAYER_WIDTH)]
    layer_width: f32,

    #[arg(long, default_value_t = DEFAULT_DISTORTION_SCALE)]
    distortion_scale: f32,

    /// Vertical field of view in degrees
    #[arg(long, default_value_t = default_fov())]
    fov: f32,

    /// Follow window resizes with the camera aspect ratio
    #[arg(long)]
    track_resize: bool,

    /// Show frames per second in the window title
    #[arg(long)]
    show_fps: bool,

    /// Window size as WxH
    #[arg(long, default_value = "1280x720", value_parser = parse_size)]
    size: (u32, u32),
}

fn default_fov() -> f32 {
    AppConfig::default().fov_deg
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{value}'"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("bad width '{w}'"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("bad height '{h}'"))?;
    Ok((w.max(1), h.max(1)))
}

impl Cli {
    fn into_config(self) -> AppConfig {
        let backends = parse_backend(&self.gpu_backend).unwrap_or_else(|| {
            log::warn!(
                "Unknown backend '{}', falling back to auto.",
                self.gpu_backend
            );
            wgpu::Backends::all()
        });

        let defaults = AppConfig::default();
        let mut material_params = defaults.material_params;
        material_params.layer_thickness = self.layer_thickness;
        material_params.layer_width = self.layer_width;
        material_params.distortion_scale = self.distortion_scale;

        AppConfig {
            model: self.model,
            shader_base: self.shader_base,
            material: self.material.into(),
            material_params,
            post: match self.post {
                Toggle::On => Some(PostSettings::default()),
                Toggle::Off => None,
            },
            backends,
            fov_deg: self.fov,
            track_resize: self.track_resize,
            show_fps: self.show_fps,
            width: self.size.0,
            height: self.size.1,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config();
    log::info!(
        "Starting Stratum. Backend: {:?}, material={}, post={}, window_size={}x{}",
        config.backends,
        config.material,
        config.post.is_some(),
        config.width,
        config.height
    );

    platform::run(config)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
