//! Post-processing tools for ModEM magnetotelluric inversions.
//!
//! This crate provides tools for:
//! - Cutting a 3D resistivity model into horizontal depth slices and
//!   exporting them as georeferenced GeoTIFF rasters
//! - Relocating 3DGrid UBC meshes onto the station layout
//! - Extracting the RMS decay curve from an inversion log
//! - Summarising response-file misfit per station and component
//!
//! # Example
//!
//! ```no_run
//! use modem_post::core::loaders::load_point_cloud;
//! use modem_post::processors::slicing::{extract, PaddingSpec, ZAxis};
//!
//! let points = load_point_cloud("model_sgrid.txt", 3).unwrap();
//! let padding = PaddingSpec { east: 15, north: 15 };
//! for slice in extract(points, padding, ZAxis::Elevation) {
//!     println!("{} m: {} cells", slice.depth, slice.len());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{MeshConfig, ProjectionConfig, RmsLogConfig, SliceConfig, ToolsConfig};
pub use core::loaders::Point3D;
pub use processors::slicing::{DepthSlice, PaddingSpec, ZAxis};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
