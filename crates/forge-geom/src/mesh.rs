/// Indexed triangle mesh. Triangles are wound counter-clockwise when viewed
/// from outside the enclosed volume, so the signed volume of a closed mesh
/// comes out positive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangles.is_empty()
    }

    /// Signed volume via the divergence theorem, summed per triangle.
    pub fn volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|tri| {
                let a = self.vertices[tri[0] as usize];
                let b = self.vertices[tri[1] as usize];
                let c = self.vertices[tri[2] as usize];
                dot(a, cross(b, c)) / 6.0
            })
            .sum()
    }

    pub fn bounding_box(&self) -> Option<([f64; 3], [f64; 3])> {
        if self.vertices.is_empty() {
            return None;
        }
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for vertex in &self.vertices {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex[axis]);
                max[axis] = max[axis].max(vertex[axis]);
            }
        }
        Some((min, max))
    }

    /// Appends another mesh, re-basing its triangle indices.
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.triangles.extend(
            other
                .triangles
                .iter()
                .map(|tri| [tri[0] + offset, tri[1] + offset, tri[2] + offset]),
        );
    }

    pub fn map_vertices(&mut self, f: impl Fn([f64; 3]) -> [f64; 3]) {
        for vertex in &mut self.vertices {
            *vertex = f(*vertex);
        }
    }
}

#[inline]
fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn normalize(v: [f64; 3]) -> [f64; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len <= f64::EPSILON {
        [0.0, 0.0, 0.0]
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}

#[inline]
fn triangle_normal(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> [f64; 3] {
    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    normalize(cross(ab, ac))
}

pub fn to_binary_stl(mesh: &Mesh, name: &str) -> Vec<u8> {
    let mut bytes = Vec::<u8>::with_capacity(84 + mesh.triangles.len() * 50);

    let mut header = [0u8; 80];
    let name_bytes = name.as_bytes();
    let header_len = name_bytes.len().min(80);
    header[..header_len].copy_from_slice(&name_bytes[..header_len]);
    bytes.extend_from_slice(&header);

    let tri_count = mesh.triangles.len() as u32;
    bytes.extend_from_slice(&tri_count.to_le_bytes());

    for tri in &mesh.triangles {
        let a = mesh.vertices[tri[0] as usize];
        let b = mesh.vertices[tri[1] as usize];
        let c = mesh.vertices[tri[2] as usize];
        let n = triangle_normal(a, b, c);

        push_f32_triplet(&mut bytes, n);
        push_f32_triplet(&mut bytes, a);
        push_f32_triplet(&mut bytes, b);
        push_f32_triplet(&mut bytes, c);
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }

    bytes
}

pub fn to_ascii_stl(mesh: &Mesh, name: &str) -> String {
    let mut out = String::new();
    out.push_str("solid ");
    out.push_str(name);
    out.push('\n');

    for tri in &mesh.triangles {
        let a = mesh.vertices[tri[0] as usize];
        let b = mesh.vertices[tri[1] as usize];
        let c = mesh.vertices[tri[2] as usize];
        let n = triangle_normal(a, b, c);

        out.push_str(&format!("  facet normal {} {} {}\n", n[0], n[1], n[2]));
        out.push_str("    outer loop\n");
        out.push_str(&format!("      vertex {} {} {}\n", a[0], a[1], a[2]));
        out.push_str(&format!("      vertex {} {} {}\n", b[0], b[1], b[2]));
        out.push_str(&format!("      vertex {} {} {}\n", c[0], c[1], c[2]));
        out.push_str("    endloop\n");
        out.push_str("  endfacet\n");
    }

    out.push_str("endsolid ");
    out.push_str(name);
    out.push('\n');
    out
}

#[inline]
fn push_f32_triplet(bytes: &mut Vec<u8>, value: [f64; 3]) {
    bytes.extend_from_slice(&(value[0] as f32).to_le_bytes());
    bytes.extend_from_slice(&(value[1] as f32).to_le_bytes());
    bytes.extend_from_slice(&(value[2] as f32).to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::{Mesh, to_ascii_stl, to_binary_stl};

    fn simple_mesh() -> Mesh {
        Mesh {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            triangles: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn binary_stl_has_valid_size_and_triangle_count() {
        let bytes = to_binary_stl(&simple_mesh(), "test");
        assert_eq!(bytes.len(), 84 + 50);
        let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]);
        assert_eq!(count, 1);
    }

    #[test]
    fn binary_stl_export_is_deterministic() {
        let mesh = simple_mesh();
        let a = to_binary_stl(&mesh, "deterministic");
        let b = to_binary_stl(&mesh, "deterministic");
        assert_eq!(a, b);
    }

    #[test]
    fn ascii_stl_contains_required_tokens() {
        let stl = to_ascii_stl(&simple_mesh(), "tri");
        assert!(stl.starts_with("solid tri"));
        assert!(stl.contains("facet normal"));
        assert!(stl.contains("outer loop"));
        assert!(stl.contains("vertex 0 0 0"));
        assert!(stl.ends_with("endsolid tri\n"));
    }

    #[test]
    fn merge_rebases_triangle_indices() {
        let mut mesh = simple_mesh();
        mesh.merge(&simple_mesh());
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.triangles[1], [3, 4, 5]);
    }

    #[test]
    fn empty_mesh_has_zero_volume_and_no_bounds() {
        let mesh = Mesh::default();
        assert!(mesh.is_empty());
        assert_eq!(mesh.volume(), 0.0);
        assert!(mesh.bounding_box().is_none());
    }
}
