//! Binary STL reading and writing.
//!
//! ```text
//! UINT8[80]    – Preamble (NUL padded)
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Normal vector (zero means "compute it")
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (ignored)
//! end
//! ```
//!
//! ASCII STL is rejected.

use dlprint_kernel_math::{Triangle, Vector};
use tracing::{debug, info};

use crate::error::StlError;
use crate::mesh::Mesh;

/// STL binary preamble size in bytes.
pub const HEADER_SIZE: usize = 80;

/// Size of one triangle record.
pub const TRIANGLE_SIZE: usize = 50;

/// Preamble plus the triangle count.
const PRELUDE_SIZE: usize = HEADER_SIZE + 4;

/// Parse a binary STL held in memory.
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, StlError> {
    if looks_like_ascii(data) {
        return Err(StlError::Unsupported(
            "ASCII STL files are not supported".into(),
        ));
    }
    if data.len() < PRELUDE_SIZE {
        return Err(StlError::Truncated(format!(
            "expected at least {PRELUDE_SIZE} header bytes, got {}",
            data.len()
        )));
    }

    let preamble: String = data[..HEADER_SIZE]
        .iter()
        .filter(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    let count = read_u32(&data[HEADER_SIZE..PRELUDE_SIZE]) as usize;

    let body = &data[PRELUDE_SIZE..];
    let needed = count as u64 * TRIANGLE_SIZE as u64;
    if (body.len() as u64) < needed {
        return Err(StlError::Truncated(format!(
            "{count} triangles declared but only {} complete records present",
            body.len() / TRIANGLE_SIZE
        )));
    }
    if body.len() as u64 > needed {
        return Err(StlError::Unsupported(format!(
            "{} trailing bytes after {count} triangles",
            body.len() as u64 - needed
        )));
    }

    let triangles: Vec<Triangle> = body
        .chunks_exact(TRIANGLE_SIZE)
        .map(read_triangle)
        .collect();

    let mesh = Mesh::with_preamble(triangles, preamble);
    let degenerate = mesh.degenerate_count();
    if degenerate > 0 {
        debug!(degenerate, "skipping degenerate facets during slicing");
    }
    info!(
        triangles = mesh.len(),
        preamble = %mesh.preamble(),
        "loaded binary STL"
    );
    Ok(mesh)
}

/// Serialize a mesh to binary STL.
///
/// The preamble is truncated or NUL padded to 80 bytes and every attribute
/// field is written as zero.
pub fn write_binary_stl(mesh: &Mesh) -> Vec<u8> {
    let mut out = Vec::with_capacity(PRELUDE_SIZE + mesh.len() * TRIANGLE_SIZE);

    let mut header = [0u8; HEADER_SIZE];
    for (dst, src) in header.iter_mut().zip(mesh.preamble().bytes()) {
        *dst = src;
    }
    out.extend_from_slice(&header);
    out.extend_from_slice(&(mesh.len() as u32).to_le_bytes());

    for tri in mesh.triangles() {
        write_vector(&mut out, &tri.normal());
        for v in tri.vertices() {
            write_vector(&mut out, v);
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out
}

/// "solid" prefix with a size that does not match the binary layout.
fn looks_like_ascii(data: &[u8]) -> bool {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    if !data[start..].starts_with(b"solid") {
        return false;
    }
    if data.len() < PRELUDE_SIZE {
        return true;
    }
    let count = read_u32(&data[HEADER_SIZE..PRELUDE_SIZE]) as u64;
    data.len() as u64 != PRELUDE_SIZE as u64 + count * TRIANGLE_SIZE as u64
}

fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

fn read_vector(buf: &[u8]) -> Vector {
    let x = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let y = f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let z = f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    Vector::new(f64::from(x), f64::from(y), f64::from(z))
}

fn read_triangle(record: &[u8]) -> Triangle {
    let normal = read_vector(&record[0..12]);
    let v1 = read_vector(&record[12..24]);
    let v2 = read_vector(&record[24..36]);
    let v3 = read_vector(&record[36..48]);
    Triangle::new(v1, v2, v3, Some(normal))
}

fn write_vector(out: &mut Vec<u8>, v: &Vector) {
    for c in v.to_array() {
        out.extend_from_slice(&(c as f32).to_le_bytes());
    }
}
