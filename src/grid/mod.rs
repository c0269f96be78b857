pub mod geometry;
pub mod reducer;

pub use geometry::{
    Bounds, CellSize, CellSpacing, DEFAULT_BOUNDS, GeometryPreset, GeometryResolver, GridGeometry,
    RealCoordinates,
};
pub use reducer::{ActiveCell, reduce};
