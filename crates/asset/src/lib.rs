//! Asset loading/parsers (meshes, shader text).
//! STL meshes become CPU-friendly `MeshData`; text and bytes come from
//! disk or over HTTP through a `ResourceFetcher`.

pub mod error;
pub mod mesh;
pub mod resource;
pub mod stl;

pub use error::ResourceLoadError;
pub use mesh::{MeshData, MeshVertex};
pub use resource::{DefaultFetcher, FileFetcher, HttpFetcher, ResourceFetcher, load_text};
