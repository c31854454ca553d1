//! Model origin recovery from station locations.
//!
//! ModEM stores station positions both as lat/lon and as north/east offsets
//! from the model centre. Projecting each station and subtracting its
//! offset gives one estimate of the projected model centre; the median over
//! all stations is robust to individual stations with poor positions.

use anyhow::{bail, Result};

use crate::core::loaders::{Point3D, Station};
use crate::core::projection::Crs;

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Projected (east, north) of the model centre.
pub fn model_origin(stations: &[Station], crs: &Crs) -> Result<(f64, f64)> {
    if stations.is_empty() {
        bail!("No stations available to locate the model origin");
    }

    let (mut easts, mut norths): (Vec<f64>, Vec<f64>) = stations
        .iter()
        .map(|s| {
            let (e, n) = crs.project(s.lat, s.lon);
            (e - s.rel_east, n - s.rel_north)
        })
        .unzip();

    Ok((median(&mut easts), median(&mut norths)))
}

/// Shift model-relative points to projected coordinates and absolute depth.
pub fn apply_origin(points: &mut [Point3D], origin: (f64, f64), model_top: f64) {
    for p in points.iter_mut() {
        p.east += origin.0;
        p.north += origin.1;
        p.depth += model_top;
    }
}
