//! Scene assembly.
//!
//! Phase 0 fills the scene with what exists before any model: ambient
//! light, the material's light rig and the ground grid. Phase 1 turns a
//! model URL plus shader files into a [`PreparedModel`] off the render
//! thread; the render thread then attaches it.

use anyhow::{Context, Result};
use asset::{MeshData, ResourceFetcher, load_text, resource::join_url, stl::load_stl};
use corelib::{
    Aabb, Framing, vec3,
    scene::{AmbientLight, DirectionalLight, MeshHandle, NodeId, NodeKind, Scene, color_from_hex},
    transform::Transform,
};
use renderer::{
    MaterialDesc, MaterialHooks, MaterialKind, MaterialSource, ShaderChunkRegistry, build_material,
};

use crate::config::{AppConfig, FRAGMENT_SHADER_FILE, PRINT_CHUNK_FILE, VERTEX_SHADER_FILE};

pub const GRID_SIZE: f32 = 350.0;
pub const GRID_DIVISIONS: u32 = 35;
pub const AXES_SIZE: f32 = 10.0;

/// Key light of the standard material, towards the light.
pub const KEY_LIGHT: DirectionalLight = DirectionalLight {
    color: corelib::Vec3::ONE,
    intensity: 1.2,
    direction: corelib::Vec3::new(-0.5, -0.8, 1.0),
};

/// Everything phase 1 computes before touching the GPU.
pub struct PreparedModel {
    pub mesh: MeshData,
    pub bounds: Aabb,
    pub framing: Framing,
    pub material: MaterialDesc,
}

impl std::fmt::Debug for PreparedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedModel")
            .field("triangles", &self.mesh.triangle_count())
            .field("bounds", &self.bounds)
            .field("material", &self.material.label)
            .finish()
    }
}

/// Directional lights added in phase 0. The layer shader is unlit.
pub fn light_rig(kind: MaterialKind) -> Vec<DirectionalLight> {
    match kind {
        MaterialKind::Layer => Vec::new(),
        MaterialKind::Standard => vec![DirectionalLight {
            color: color_from_hex(0xbfd4ff),
            intensity: 0.35,
            direction: vec3(0.6, 0.9, 0.4),
        }],
    }
}

/// Phase 0: ambient light, light rig and the grid lying in the XY plane.
pub fn populate_base_scene(scene: &mut Scene, kind: MaterialKind) {
    scene.add(
        NodeKind::AmbientLight(AmbientLight {
            color: color_from_hex(0xffffff),
            intensity: 1.0,
        }),
        Transform::identity(),
    );
    for light in light_rig(kind) {
        scene.add(NodeKind::DirectionalLight(light), Transform::identity());
    }
    scene.add(
        NodeKind::Grid {
            size: GRID_SIZE,
            divisions: GRID_DIVISIONS,
        },
        Transform::identity().with_rotation_euler(vec3(std::f32::consts::FRAC_PI_2, 0.0, 0.0)),
    );
}

/// Append the uploaded mesh and its axes helper. Returns the mesh node.
pub fn attach_nodes(scene: &mut Scene, mesh: MeshHandle, framing: &Framing) -> NodeId {
    let node = scene.add(NodeKind::Mesh(mesh), Transform::identity());
    scene.add(
        NodeKind::Axes { size: AXES_SIZE },
        Transform::from_translation(framing.axes_position),
    );
    node
}

/// Fetch the shader texts the material needs, one request at a time.
pub fn fetch_material_source(
    kind: MaterialKind,
    shader_base: &str,
    fetcher: &dyn ResourceFetcher,
) -> Result<MaterialSource> {
    let fetch = |name: &str| -> Result<String> {
        let url = join_url(shader_base, name);
        Ok(load_text(fetcher, &url)?)
    };
    Ok(match kind {
        MaterialKind::Layer => MaterialSource::Layer {
            vertex: fetch(VERTEX_SHADER_FILE)?,
            fragment: fetch(FRAGMENT_SHADER_FILE)?,
        },
        MaterialKind::Standard => MaterialSource::Standard {
            print_chunk: fetch(PRINT_CHUNK_FILE)?,
        },
    })
}

/// Aims the standard material's key light.
pub fn material_hooks(kind: MaterialKind) -> MaterialHooks {
    match kind {
        MaterialKind::Layer => MaterialHooks::default(),
        MaterialKind::Standard => MaterialHooks::before_compile(|uniforms, _composer| {
            let dir = KEY_LIGHT.direction.normalize();
            uniforms.light_direction = dir.extend(KEY_LIGHT.intensity).to_array();
        }),
    }
}

/// Phase 1: load the model, frame it and build its material.
pub fn prepare_model(config: &AppConfig, fetcher: &dyn ResourceFetcher) -> Result<PreparedModel> {
    let mut mesh = load_stl(fetcher, &config.model)
        .with_context(|| format!("Failed to load model {}", config.model))?;
    mesh.compute_vertex_normals();
    let bounds = mesh.bounds().context("Model has no vertices")?;
    let framing = Framing::from_bounds(&bounds);
    log::info!(
        "Model loaded: {} triangles, bounds {:?}..{:?}",
        mesh.triangle_count(),
        bounds.min,
        bounds.max
    );

    let source = fetch_material_source(config.material, &config.shader_base, fetcher)?;
    let registry = ShaderChunkRegistry::with_builtins();
    let material = build_material(
        source,
        &config.material_params,
        &bounds,
        &registry,
        material_hooks(config.material),
    )
    .with_context(|| format!("Failed to build {} material", config.material))?;
    log::info!("Material built: {}", material.label);

    Ok(PreparedModel {
        mesh,
        bounds,
        framing,
        material,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{fs, path::PathBuf};

    use super::*;
    use approx::assert_relative_eq;
    use asset::FileFetcher;
    use renderer::material::MaterialUniforms;

    pub(crate) const CUBE_STL: &str = "solid cube
  facet normal 0 0 -1
    outer loop
      vertex 0 0 0
      vertex 10 0 0
      vertex 10 20 0
    endloop
  endfacet
  facet normal 0 0 1
    outer loop
      vertex 0 0 30
      vertex 10 20 30
      vertex 0 20 30
    endloop
  endfacet
endsolid cube
";

    /// Fresh directory under the system temp dir holding a model and the
    /// shader files.
    pub(crate) fn fixture(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stratum-{name}-{}", std::process::id()));
        let shaders = dir.join("shader");
        fs::create_dir_all(&shaders).unwrap();
        fs::write(dir.join("cube.stl"), CUBE_STL).unwrap();
        fs::write(
            shaders.join(VERTEX_SHADER_FILE),
            "#include <common>\n@vertex fn vs_main() {}",
        )
        .unwrap();
        fs::write(
            shaders.join(FRAGMENT_SHADER_FILE),
            "@fragment fn fs_main() {}",
        )
        .unwrap();
        fs::write(
            shaders.join(PRINT_CHUNK_FILE),
            "layer_shade = layer_edge(in.world_pos);",
        )
        .unwrap();
        dir
    }

    pub(crate) fn fixture_config(dir: &std::path::Path, kind: MaterialKind) -> AppConfig {
        AppConfig {
            model: dir.join("cube.stl").to_string_lossy().into_owned(),
            shader_base: dir.join("shader").to_string_lossy().into_owned(),
            material: kind,
            ..Default::default()
        }
    }

    #[test]
    fn prepare_layer_model_end_to_end() {
        let dir = fixture("layer");
        let prepared =
            prepare_model(&fixture_config(&dir, MaterialKind::Layer), &FileFetcher).unwrap();

        assert_eq!(prepared.mesh.triangle_count(), 2);
        assert_relative_eq!(prepared.bounds.size().z, 30.0);
        assert_relative_eq!(prepared.framing.max_size, 30.0);
        assert_relative_eq!(prepared.framing.eye.x, -30.0);
        assert_relative_eq!(prepared.framing.eye.z, 30.0);
        assert_relative_eq!(prepared.framing.axes_position.x, -2.0);
        assert_relative_eq!(prepared.framing.axes_position.y, -4.0);

        // Vertex text comes first, includes resolved.
        let wgsl = &prepared.material.wgsl;
        let vs = wgsl.find("fn vs_main").unwrap();
        let fs = wgsl.find("fn fs_main").unwrap();
        assert!(vs < fs);
        assert!(wgsl.contains("struct Frame"));
        let MaterialUniforms::Layer(u) = prepared.material.uniforms else {
            panic!("expected layer uniforms");
        };
        assert_eq!(u.height, 30.0);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn prepare_standard_model_aims_key_light() {
        let dir = fixture("standard");
        let prepared =
            prepare_model(&fixture_config(&dir, MaterialKind::Standard), &FileFetcher).unwrap();
        assert!(prepared.material.wgsl.contains("layer_shade = layer_edge(in.world_pos);"));
        let MaterialUniforms::Standard(u) = prepared.material.uniforms else {
            panic!("expected standard uniforms");
        };
        assert_relative_eq!(u.light_direction[3], KEY_LIGHT.intensity);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_shader_fails_phase_one() {
        let dir = fixture("missing-shader");
        fs::remove_file(dir.join("shader").join(FRAGMENT_SHADER_FILE)).unwrap();
        let err = prepare_model(&fixture_config(&dir, MaterialKind::Layer), &FileFetcher)
            .unwrap_err()
            .to_string();
        assert!(err.starts_with("Failed to load shader from"), "{err}");
        assert!(err.contains(FRAGMENT_SHADER_FILE), "{err}");
        assert!(err.contains("Not Found"), "{err}");
        fs::remove_dir_all(dir).ok();
    }

    /// Records every URL it is asked for.
    struct Recording(std::sync::Mutex<Vec<String>>);

    impl ResourceFetcher for Recording {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, asset::ResourceLoadError> {
            if let Ok(mut urls) = self.0.lock() {
                urls.push(url.to_owned());
            }
            Ok(b"// chunk".to_vec())
        }
    }

    #[test]
    fn material_fetches_only_the_files_it_needs() {
        let fetched = |kind| {
            let recording = Recording(Default::default());
            fetch_material_source(kind, "https://example.com/s", &recording).unwrap();
            recording.0.into_inner().unwrap()
        };
        assert_eq!(
            fetched(MaterialKind::Layer),
            [
                join_url("https://example.com/s", VERTEX_SHADER_FILE),
                join_url("https://example.com/s", FRAGMENT_SHADER_FILE),
            ]
        );
        assert_eq!(
            fetched(MaterialKind::Standard),
            [join_url("https://example.com/s", PRINT_CHUNK_FILE)]
        );
    }

    #[test]
    fn missing_model_error_names_the_model() {
        let dir = fixture("missing-model");
        let mut config = fixture_config(&dir, MaterialKind::Layer);
        config.model = "/nope/benchy.stl".into();
        let err = prepare_model(&config, &FileFetcher).unwrap_err();
        let msg = format!("{err:#}");
        assert_eq!(
            msg,
            "Failed to load model /nope/benchy.stl: Failed to load /nope/benchy.stl: Not Found"
        );
        assert!(!msg.contains("shader"), "{msg}");
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn base_scene_has_grid_and_rig() {
        let mut scene = Scene::new();
        populate_base_scene(&mut scene, MaterialKind::Standard);
        assert_eq!(scene.directional_lights().count(), 1);
        assert_eq!(scene.ambient(), vec3(1.0, 1.0, 1.0));
        assert!(scene.meshes().next().is_none());
        let grids = scene
            .iter()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Grid { size, divisions } if size == 350.0 && divisions == 35))
            .count();
        assert_eq!(grids, 1);

        let mut layer_scene = Scene::new();
        populate_base_scene(&mut layer_scene, MaterialKind::Layer);
        assert_eq!(layer_scene.directional_lights().count(), 0);
    }

    #[test]
    fn attach_appends_mesh_then_axes() {
        let mut scene = Scene::new();
        populate_base_scene(&mut scene, MaterialKind::Layer);
        let before = scene.len();
        let framing = Framing::from_bounds(&Aabb::new(vec3(0.0, 0.0, 0.0), vec3(10.0, 20.0, 30.0)));
        let id = attach_nodes(&mut scene, MeshHandle(0), &framing);
        assert_eq!(id, before);
        assert_eq!(scene.len(), before + 2);
        let axes = scene.get(before + 1).unwrap();
        assert_eq!(axes.kind, NodeKind::Axes { size: 10.0 });
        assert_eq!(axes.transform.translation, framing.axes_position);
    }
}
