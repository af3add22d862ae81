use crate::mesh::Mesh;
use crate::sketch::{CIRCLE_SEGMENTS, Sketch};

const SPHERE_STACKS: usize = 24;
const SPHERE_SLICES: usize = 48;

/// Closed 3D body backed by a watertight triangle mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Solid {
    mesh: Mesh,
}

impl Solid {
    /// Axis-aligned cuboid centered on the origin.
    pub fn cuboid(width: f64, depth: f64, height: f64) -> Self {
        let hx = width * 0.5;
        let hy = depth * 0.5;
        let hz = height * 0.5;
        let vertices = vec![
            [-hx, -hy, -hz],
            [hx, -hy, -hz],
            [hx, hy, -hz],
            [-hx, hy, -hz],
            [-hx, -hy, hz],
            [hx, -hy, hz],
            [hx, hy, hz],
            [-hx, hy, hz],
        ];
        let triangles = vec![
            [0, 3, 2],
            [0, 2, 1],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        Self {
            mesh: Mesh {
                vertices,
                triangles,
            },
        }
    }

    /// Right circular cylinder centered on the origin, axis along Z.
    pub fn cylinder(radius: f64, height: f64) -> Self {
        Self::extrude(&Sketch::circle(radius), height).translated(0.0, 0.0, -height * 0.5)
    }

    /// Conical frustum centered on the origin, axis along Z; `radius_bottom`
    /// at the low end, `radius_top` at the high end.
    pub fn cone(radius_bottom: f64, radius_top: f64, height: f64) -> Self {
        let n = CIRCLE_SEGMENTS;
        let hz = height * 0.5;
        let mut vertices = Vec::with_capacity(2 * n);
        for (radius, z) in [(radius_bottom, -hz), (radius_top, hz)] {
            for i in 0..n {
                let angle = std::f64::consts::TAU * i as f64 / n as f64;
                vertices.push([radius * angle.cos(), radius * angle.sin(), z]);
            }
        }
        let triangles = prism_triangles(n);
        Self {
            mesh: Mesh {
                vertices,
                triangles,
            },
        }
    }

    /// UV sphere centered on the origin.
    pub fn sphere(radius: f64) -> Self {
        let stacks = SPHERE_STACKS;
        let slices = SPHERE_SLICES;
        let mut vertices = Vec::with_capacity(2 + (stacks - 1) * slices);
        vertices.push([0.0, 0.0, radius]);
        for i in 1..stacks {
            let polar = std::f64::consts::PI * i as f64 / stacks as f64;
            let (ring_radius, z) = (radius * polar.sin(), radius * polar.cos());
            for j in 0..slices {
                let azimuth = std::f64::consts::TAU * j as f64 / slices as f64;
                vertices.push([ring_radius * azimuth.cos(), ring_radius * azimuth.sin(), z]);
            }
        }
        vertices.push([0.0, 0.0, -radius]);

        let ring = |i: usize, j: usize| (1 + (i - 1) * slices + j % slices) as u32;
        let top = 0u32;
        let bottom = (vertices.len() - 1) as u32;

        let mut triangles = Vec::new();
        for j in 0..slices {
            triangles.push([top, ring(1, j), ring(1, j + 1)]);
        }
        for i in 2..stacks {
            for j in 0..slices {
                let a = ring(i - 1, j);
                let b = ring(i - 1, j + 1);
                let c = ring(i, j + 1);
                let d = ring(i, j);
                triangles.push([a, d, c]);
                triangles.push([a, c, b]);
            }
        }
        for j in 0..slices {
            triangles.push([bottom, ring(stacks - 1, j + 1), ring(stacks - 1, j)]);
        }

        Self {
            mesh: Mesh {
                vertices,
                triangles,
            },
        }
    }

    /// Linear extrusion of a sketch along +Z, base in the XY plane.
    pub fn extrude(sketch: &Sketch, height: f64) -> Self {
        let outline = sketch.outline();
        let n = outline.len();
        let mut vertices = Vec::with_capacity(2 * n);
        for z in [0.0, height] {
            for [x, y] in outline {
                vertices.push([*x, *y, z]);
            }
        }
        Self {
            mesh: Mesh {
                vertices,
                triangles: prism_triangles(n),
            },
        }
    }

    /// Compound of several solids: one mesh, disjoint shells, summed volume.
    pub fn compound(parts: Vec<Solid>) -> Self {
        let mut mesh = Mesh::default();
        for part in &parts {
            mesh.merge(&part.mesh);
        }
        Self { mesh }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn volume(&self) -> f64 {
        self.mesh.volume().abs()
    }

    pub fn translated(&self, dx: f64, dy: f64, dz: f64) -> Self {
        let mut mesh = self.mesh.clone();
        mesh.map_vertices(|[x, y, z]| [x + dx, y + dy, z + dz]);
        Self { mesh }
    }

    /// Rotation about the Z axis, angle in radians.
    pub fn rotated_z(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        let mut mesh = self.mesh.clone();
        mesh.map_vertices(|[x, y, z]| [x * cos - y * sin, x * sin + y * cos, z]);
        Self { mesh }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let mut mesh = self.mesh.clone();
        mesh.map_vertices(|[x, y, z]| [x * factor, y * factor, z * factor]);
        Self { mesh }
    }
}

/// Side quads plus fan caps for two stacked rings of `n` vertices each
/// (bottom ring indices `0..n`, top ring `n..2n`), both counter-clockwise
/// seen from above.
fn prism_triangles(n: usize) -> Vec<[u32; 3]> {
    let mut triangles = Vec::with_capacity(4 * n - 4);
    for i in 0..n {
        let j = (i + 1) % n;
        let (bi, bj) = (i as u32, j as u32);
        let (ti, tj) = ((n + i) as u32, (n + j) as u32);
        triangles.push([bi, bj, tj]);
        triangles.push([bi, tj, ti]);
    }
    for i in 1..n - 1 {
        triangles.push([0, (i + 1) as u32, i as u32]);
        triangles.push([n as u32, (n + i) as u32, (n + i + 1) as u32]);
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::Solid;
    use crate::sketch::Sketch;

    #[test]
    fn cuboid_volume_is_exact() {
        let solid = Solid::cuboid(10.0, 10.0, 10.0);
        assert!((solid.volume() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn cylinder_volume_approximates_pi_r2_h() {
        let solid = Solid::cylinder(5.0, 20.0);
        let expected = std::f64::consts::PI * 25.0 * 20.0;
        let relative_error = ((solid.volume() - expected) / expected).abs();
        assert!(relative_error < 0.01);
    }

    #[test]
    fn sphere_volume_approximates_four_thirds_pi_r3() {
        let solid = Solid::sphere(10.0);
        let expected = (4.0 / 3.0) * std::f64::consts::PI * 1000.0;
        let relative_error = ((solid.volume() - expected) / expected).abs();
        assert!(relative_error < 0.02);
    }

    #[test]
    fn extruded_rect_volume_is_area_times_height() {
        let solid = Solid::extrude(&Sketch::rect(4.0, 5.0), 3.0);
        assert!((solid.volume() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn cone_volume_matches_frustum_formula() {
        let (r1, r2, h) = (6.0, 2.0, 9.0);
        let solid = Solid::cone(r1, r2, h);
        let expected = std::f64::consts::PI * h / 3.0 * (r1 * r1 + r1 * r2 + r2 * r2);
        let relative_error = ((solid.volume() - expected) / expected).abs();
        assert!(relative_error < 0.01);
    }

    #[test]
    fn compound_volume_is_sum_of_disjoint_parts() {
        let a = Solid::cuboid(2.0, 2.0, 2.0);
        let b = Solid::cuboid(3.0, 3.0, 3.0).translated(20.0, 0.0, 0.0);
        let compound = Solid::compound(vec![a, b]);
        assert!((compound.volume() - (8.0 + 27.0)).abs() < 1e-9);
    }

    #[test]
    fn rigid_transforms_preserve_volume() {
        let solid = Solid::cuboid(3.0, 4.0, 5.0);
        let moved = solid.translated(7.0, -2.0, 11.0).rotated_z(1.1);
        assert!((moved.volume() - 60.0).abs() < 1e-6);

        let scaled = solid.scaled(2.0);
        assert!((scaled.volume() - 480.0).abs() < 1e-6);
    }
}
