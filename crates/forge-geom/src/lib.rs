mod mesh;
mod sketch;
mod solid;

pub use mesh::{Mesh, to_ascii_stl, to_binary_stl};
pub use sketch::Sketch;
pub use solid::Solid;
