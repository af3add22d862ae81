/// Planar profile awaiting extrusion. Outlines are convex, counter-clockwise
/// polygons in the XY plane; a sketch has area but no volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Sketch {
    outline: Vec<[f64; 2]>,
}

pub(crate) const CIRCLE_SEGMENTS: usize = 48;

impl Sketch {
    /// Axis-aligned rectangle centered on the origin.
    pub fn rect(width: f64, depth: f64) -> Self {
        let hw = width * 0.5;
        let hd = depth * 0.5;
        Self {
            outline: vec![[-hw, -hd], [hw, -hd], [hw, hd], [-hw, hd]],
        }
    }

    /// Regular polygon approximation of a circle centered on the origin.
    pub fn circle(radius: f64) -> Self {
        let outline = (0..CIRCLE_SEGMENTS)
            .map(|i| {
                let angle = std::f64::consts::TAU * i as f64 / CIRCLE_SEGMENTS as f64;
                [radius * angle.cos(), radius * angle.sin()]
            })
            .collect();
        Self { outline }
    }

    pub fn outline(&self) -> &[[f64; 2]] {
        &self.outline
    }

    /// Shoelace area; positive for the counter-clockwise outlines built here.
    pub fn area(&self) -> f64 {
        let n = self.outline.len();
        if n < 3 {
            return 0.0;
        }
        let mut doubled = 0.0;
        for i in 0..n {
            let [x0, y0] = self.outline[i];
            let [x1, y1] = self.outline[(i + 1) % n];
            doubled += x0 * y1 - x1 * y0;
        }
        doubled * 0.5
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            outline: self.outline.iter().map(|[x, y]| [x + dx, y + dy]).collect(),
        }
    }

    /// In-plane rotation about the origin, angle in radians.
    pub fn rotated(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            outline: self
                .outline
                .iter()
                .map(|[x, y]| [x * cos - y * sin, x * sin + y * cos])
                .collect(),
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            outline: self
                .outline
                .iter()
                .map(|[x, y]| [x * factor, y * factor])
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Sketch;

    #[test]
    fn rect_area_is_width_times_depth() {
        let sketch = Sketch::rect(10.0, 4.0);
        assert!((sketch.area() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn circle_area_approximates_pi_r_squared() {
        let sketch = Sketch::circle(5.0);
        let expected = std::f64::consts::PI * 25.0;
        let relative_error = ((sketch.area() - expected) / expected).abs();
        assert!(relative_error < 0.01);
    }

    #[test]
    fn transforms_preserve_area() {
        let sketch = Sketch::rect(6.0, 3.0);
        let moved = sketch.translated(10.0, -2.0).rotated(0.7);
        assert!((moved.area() - sketch.area()).abs() < 1e-9);

        let scaled = sketch.scaled(2.0);
        assert!((scaled.area() - sketch.area() * 4.0).abs() < 1e-9);
    }
}
