//! Core data types and I/O operations.

pub mod loaders;
pub mod projection;
pub mod writers;

pub use loaders::{DataRow, LoaderError, Point3D, Station, UbcMesh};
pub use projection::{Crs, ProjectionError, UtmProjection};
pub use writers::WriteError;
