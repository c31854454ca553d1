//! Data processing modules.

pub mod export;
pub mod mesh_fix;
pub mod origin;
pub mod rms_log;
pub mod slicing;
pub mod station_rms;

// Re-export key types for convenience
pub use export::{
    process_slices, run_slices, slice_stem, ExportError, GdalTranslate, RasterExporter,
    SliceOutcome, SliceReport, SliceStatus,
};
pub use mesh_fix::{fix_mesh_file, relocate_mesh, MeshFix};
pub use origin::{apply_origin, model_origin};
pub use rms_log::{parse_rms_log, process_log, RmsLogError};
pub use slicing::{extract, DepthSlice, DepthSlices, PaddingSpec, SliceCell, ZAxis};
pub use station_rms::{
    compute_station_rms, process_response_file, ComponentRms, StationRms, StationRmsReport,
};
