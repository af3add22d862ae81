//! Post-hoc geometry sanity checks. Advisory only; analysis never fails a
//! session.

use forge_geom::Solid;

/// Parts below this volume are almost always a degenerate or accidental
/// shape rather than something worth printing.
pub const NEAR_EMPTY_VOLUME_MM3: f64 = 10.0;

pub const NEAR_EMPTY_WARNING: &str =
    "volume is very small; the shape may be empty or degenerate";

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryReport {
    pub volume: f64,
    pub warning: Option<String>,
}

pub fn analyze(solid: &Solid) -> GeometryReport {
    let volume = solid.volume();
    let warning = (volume < NEAR_EMPTY_VOLUME_MM3).then(|| NEAR_EMPTY_WARNING.to_string());
    GeometryReport { volume, warning }
}
