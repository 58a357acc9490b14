//! STL parser (binary and ASCII).
//!
//! STL carries no shared vertices, so the resulting mesh has three
//! vertices per triangle and sequential indices. Facet normals from the
//! file are ignored; call [`MeshData::compute_vertex_normals`] afterwards.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow, bail};

use crate::{
    mesh::{MeshData, MeshVertex},
    resource::ResourceFetcher,
};

const HEADER_LEN: usize = 80;
const PREAMBLE_LEN: usize = HEADER_LEN + 4;
const RECORD_LEN: usize = 50;

/// Load an STL mesh from a file path.
pub fn load_stl_from_path(path: impl AsRef<Path>) -> Result<MeshData> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).with_context(|| format!("Failed to open STL file: {}", path.display()))?;
    parse_stl(&bytes).with_context(|| format!("Failed to parse STL file: {}", path.display()))
}

/// Fetch an STL resource by URL or path and parse it.
pub fn load_stl(fetcher: &dyn ResourceFetcher, url: &str) -> Result<MeshData> {
    let bytes = fetcher.fetch(url)?;
    log::debug!("Fetched {} bytes of STL from {}", bytes.len(), url);
    parse_stl(&bytes).with_context(|| format!("Failed to parse STL from {url}"))
}

/// Parse STL bytes, detecting binary vs ASCII encoding.
pub fn parse_stl(bytes: &[u8]) -> Result<MeshData> {
    if is_binary(bytes) {
        parse_binary(bytes)
    } else {
        let text = std::str::from_utf8(bytes).context("ASCII STL is not valid UTF-8")?;
        parse_ascii(text)
    }
}

fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() >= PREAMBLE_LEN {
        let count = read_u32(bytes, HEADER_LEN) as usize;
        if count
            .checked_mul(RECORD_LEN)
            .and_then(|n| n.checked_add(PREAMBLE_LEN))
            == Some(bytes.len())
        {
            return true;
        }
    }
    // Binary headers may legally start with "solid", so only trust the
    // keyword once the size check above has failed.
    let head = bytes.iter().skip_while(|b| b.is_ascii_whitespace());
    !head.take(5).copied().eq(*b"solid")
}

fn parse_binary(bytes: &[u8]) -> Result<MeshData> {
    if bytes.len() < PREAMBLE_LEN {
        bail!(
            "STL file too small for header + triangle count ({} bytes)",
            bytes.len()
        );
    }

    let count = read_u32(bytes, HEADER_LEN) as usize;
    let expected = count
        .checked_mul(RECORD_LEN)
        .and_then(|n| n.checked_add(PREAMBLE_LEN))
        .ok_or_else(|| anyhow!("STL triangle count {} overflows", count))?;
    if bytes.len() < expected {
        bail!(
            "STL file truncated: expected {} bytes for {} triangles, got {}",
            expected,
            count,
            bytes.len()
        );
    }
    let vertex_count = count
        .checked_mul(3)
        .filter(|&n| u32::try_from(n).is_ok())
        .ok_or_else(|| anyhow!("Too many vertices in STL (>{})", u32::MAX))?;

    let mut vertices = Vec::with_capacity(vertex_count);
    for record in bytes[PREAMBLE_LEN..expected].chunks_exact(RECORD_LEN) {
        // 12 bytes facet normal, 3 x 12 bytes vertices, 2 bytes attributes.
        for corner in 0..3 {
            vertices.push(MeshVertex::at(read_vec3(record, 12 + corner * 12)));
        }
    }

    finish(vertices)
}

fn parse_ascii(text: &str) -> Result<MeshData> {
    let mut vertices: Vec<MeshVertex> = Vec::new();
    let mut in_loop = false;
    let mut corners = 0usize;

    for (line_no, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        match tag {
            "outer" => {
                if in_loop {
                    bail!("Nested 'outer loop' on line {}", line_no + 1);
                }
                in_loop = true;
                corners = 0;
            }
            "vertex" => {
                if !in_loop {
                    bail!("'vertex' outside of a loop on line {}", line_no + 1);
                }
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                vertices.push(MeshVertex::at([x, y, z]));
                corners += 1;
            }
            "endloop" => {
                if corners != 3 {
                    bail!(
                        "Facet ending on line {} has {} vertices, expected 3",
                        line_no + 1,
                        corners
                    );
                }
                in_loop = false;
            }
            _ => {
                // solid/facet/endfacet/endsolid carry nothing we keep.
            }
        }
    }

    if in_loop {
        bail!("ASCII STL ended inside a facet loop");
    }

    finish(vertices)
}

fn finish(vertices: Vec<MeshVertex>) -> Result<MeshData> {
    if vertices.is_empty() {
        bail!("STL contained no triangles");
    }
    let indices = (0..vertices.len() as u32).collect();
    Ok(MeshData::new(vertices, indices))
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {} on line {}", what, line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(data, offset))
}

fn read_vec3(data: &[u8], offset: usize) -> [f32; 3] {
    [
        read_f32(data, offset),
        read_f32(data, offset + 4),
        read_f32(data, offset + 8),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode triangles as a binary STL.
    fn binary_stl(header: &[u8], triangles: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_LEN];
        out[..header.len()].copy_from_slice(header);
        out.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for tri in triangles {
            out.extend_from_slice(&[0u8; 12]);
            for v in tri {
                for c in v {
                    out.extend_from_slice(&c.to_le_bytes());
                }
            }
            out.extend_from_slice(&[0u8; 2]);
        }
        out
    }

    const TRI_A: [[f32; 3]; 3] = [[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [1.0, 1.0, 2.0]];
    const TRI_B: [[f32; 3]; 3] = [[-1.0, -1.0, 0.0], [1.0, 1.0, 2.0], [-1.0, 1.0, 2.0]];

    #[test]
    fn parse_binary_triangles() {
        let bytes = binary_stl(b"benchy", &[TRI_A, TRI_B]);
        let mesh = parse_stl(&bytes).expect("parse binary");
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.vertices[2].position, [1.0, 1.0, 2.0]);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn binary_header_starting_with_solid_is_still_binary() {
        let bytes = binary_stl(b"solid exported by slicer", &[TRI_A]);
        let mesh = parse_stl(&bytes).expect("parse binary with solid header");
        assert_eq!(mesh.vertices.len(), 3);
    }

    #[test]
    fn truncated_binary_is_rejected() {
        let mut bytes = binary_stl(b"", &[TRI_A, TRI_B]);
        bytes.truncate(bytes.len() - 10);
        let err = parse_stl(&bytes).unwrap_err();
        assert!(err.to_string().contains("truncated"), "{err}");
    }

    #[test]
    fn load_from_path_reads_binary_file() {
        let path =
            std::env::temp_dir().join(format!("stratum-stl-{}.stl", std::process::id()));
        fs::write(&path, binary_stl(b"benchy", &[TRI_A, TRI_B])).expect("write temp stl");
        let mesh = load_stl_from_path(&path).expect("load from path");
        assert_eq!(mesh.triangle_count(), 2);
        let _ = fs::remove_file(&path);

        let err = load_stl_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to open STL file"), "{err}");
    }

    #[test]
    fn missing_model_is_not_reported_as_shader() {
        let url = "./definitely/not/here.stl";
        let err = load_stl(&crate::resource::FileFetcher, url).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains(url), "{msg}");
        assert!(msg.contains("Not Found"), "{msg}");
        assert!(!msg.contains("shader"), "{msg}");
    }

    #[test]
    fn tiny_input_is_rejected() {
        assert!(parse_stl(&[0u8; 20]).is_err());
    }

    #[test]
    fn parse_ascii_facets() {
        let src = r#"
            solid cube
              facet normal 0 0 1
                outer loop
                  vertex -1 -1 0
                  vertex 1 -1 0
                  vertex 1 1 2
                endloop
              endfacet
              facet normal 0 0 1
                outer loop
                  vertex -1 -1 0
                  vertex 1 1 2
                  vertex -1 1 2.0e0
                endloop
              endfacet
            endsolid cube
        "#;
        let mesh = parse_stl(src.as_bytes()).expect("parse ascii");
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.vertices[5].position, [-1.0, 1.0, 2.0]);
        let b = mesh.bounds().unwrap();
        assert_eq!(b.center(), corelib::vec3(0.0, 0.0, 1.0));
    }

    #[test]
    fn ascii_with_bad_number_reports_line() {
        let src = "solid x\nfacet normal 0 0 1\nouter loop\nvertex 0 0 nope\n";
        let err = parse_stl(src.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 4"), "{err:#}");
    }

    #[test]
    fn ascii_without_facets_is_rejected() {
        let err = parse_stl(b"solid empty\nendsolid empty\n").unwrap_err();
        assert!(err.to_string().contains("no triangles"));
    }
}
