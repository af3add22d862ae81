//! Coerces whatever shape a script produced into the single solid the rest
//! of the pipeline works with.

use std::fmt;

use forge_geom::Solid;
use forge_script::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeError {
    /// The script ran but its result contains nothing three-dimensional.
    NoSolidResult { kind: &'static str },
    /// The result is a 2D profile that was never extruded.
    UnextrudedResult,
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::NoSolidResult { kind } => {
                write!(f, "script produced no solid geometry (result was a {kind})")
            }
            NormalizeError::UnextrudedResult => {
                f.write_str("result is a flat sketch with no volume; extrude it into a solid")
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Dispatches on the closed result tag set. A `Part` unwraps one level to
/// its compound interior; a list is filtered to its solids and compounded,
/// and a list with zero solids fails as `NoSolidResult` whatever its other
/// members are. `UnextrudedResult` is reserved for a bare sketch.
pub fn normalize(value: Value) -> Result<Solid, NormalizeError> {
    match value {
        Value::Solid(solid) => Ok(solid),
        Value::Part(part) => Ok(part.interior()),
        Value::Sketch(_) => Err(NormalizeError::UnextrudedResult),
        Value::Number(_) => Err(NormalizeError::NoSolidResult { kind: "number" }),
        Value::List(items) => {
            let mut solids = Vec::new();
            for item in items {
                match item {
                    Value::Solid(solid) => solids.push(solid),
                    Value::Part(part) => solids.push(part.interior()),
                    Value::Sketch(_) | Value::Number(_) | Value::List(_) => {}
                }
            }
            if solids.is_empty() {
                Err(NormalizeError::NoSolidResult { kind: "list" })
            } else {
                Ok(Solid::compound(solids))
            }
        }
    }
}
