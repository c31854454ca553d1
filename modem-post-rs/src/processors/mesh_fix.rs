//! UBC mesh origin relocation.
//!
//! 3DGrid writes UBC meshes with a placeholder origin. The true location is
//! recovered from the station layout of the matching ModEM data file: the
//! mesh is centred on the midpoint of the station bounding box, and the
//! south-west corner is written as the new origin.

use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;

use crate::core::loaders::{self, Station, UbcMesh};
use crate::core::projection::Crs;
use crate::core::writers;

/// Result of relocating a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFix {
    /// Midpoint of the station bounding box, (lat, lon) in degrees.
    pub centre_geo: (f64, f64),
    /// Projected station centre, (east, north) in metres.
    pub centre_projected: (f64, f64),
    /// New south-west corner, (east, north) in metres.
    pub south_west: (f64, f64),
}

/// Midpoint of the stations' lat/lon bounding box as (lat, lon).
pub fn station_centre(stations: &[Station]) -> Option<(f64, f64)> {
    if stations.is_empty() {
        return None;
    }

    let (mut lat_min, mut lat_max) = (f64::MAX, f64::MIN);
    let (mut lon_min, mut lon_max) = (f64::MAX, f64::MIN);
    for s in stations {
        lat_min = lat_min.min(s.lat);
        lat_max = lat_max.max(s.lat);
        lon_min = lon_min.min(s.lon);
        lon_max = lon_max.max(s.lon);
    }

    Some((
        lat_min + (lat_max - lat_min) / 2.0,
        lon_min + (lon_max - lon_min) / 2.0,
    ))
}

/// Move the mesh origin so the mesh is centred on the stations.
pub fn relocate_mesh(
    mesh: &mut UbcMesh,
    stations: &[Station],
    crs: &Crs,
    top_elevation: f64,
) -> Result<MeshFix> {
    let Some(centre_geo) = station_centre(stations) else {
        bail!("No stations found to centre the mesh on");
    };

    let centre_projected = crs.project(centre_geo.0, centre_geo.1);
    let south_west = (
        centre_projected.0 - mesh.east_extent() / 2.0,
        centre_projected.1 - mesh.north_extent() / 2.0,
    );

    mesh.origin = [south_west.0, south_west.1, top_elevation];

    Ok(MeshFix {
        centre_geo,
        centre_projected,
        south_west,
    })
}

/// Read a mesh and data file, relocate the mesh and write it to `output`.
///
/// `output` may be the input mesh path to rewrite it in place.
pub fn fix_mesh_file(
    mesh_file: &Path,
    data_file: &Path,
    output: &Path,
    crs: &Crs,
    top_elevation: f64,
) -> Result<MeshFix> {
    let mut mesh = loaders::load_ubc_mesh(mesh_file)
        .with_context(|| format!("Failed to read mesh file: {}", mesh_file.display()))?;
    let rows = loaders::load_modem_data(data_file)
        .with_context(|| format!("Failed to read data file: {}", data_file.display()))?;
    let stations = loaders::stations(&rows);

    let fix = relocate_mesh(&mut mesh, &stations, crs, top_elevation)?;

    info!(
        "In WGS84 coordinates data centre point is: {:.6} E, {:.6} N",
        fix.centre_geo.1, fix.centre_geo.0
    );
    info!(
        "In {} coordinates data centre point is: {:.2} m East, {:.2} m North",
        crs.label(),
        fix.centre_projected.0,
        fix.centre_projected.1
    );
    info!(
        "Southwest corner is: {:.2} m East, {:.2} m North",
        fix.south_west.0, fix.south_west.1
    );

    writers::write_ubc_mesh(output, &mesh)
        .with_context(|| format!("Failed to write mesh file: {}", output.display()))?;

    Ok(fix)
}
