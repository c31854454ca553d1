//! Per-station RMS misfit statistics from ModEM response files.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::core::loaders::{self, DataRow};
use crate::core::projection::Crs;
use crate::core::writers;

/// RMS for one station and one data component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComponentRms {
    Computed(f64),
    /// The station has no rows for this component.
    InsufficientData,
}

impl ComponentRms {
    /// The computed value, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            ComponentRms::Computed(v) => Some(*v),
            ComponentRms::InsufficientData => None,
        }
    }
}

/// RMS summary for a single station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRms {
    pub code: String,
    pub lat: f64,
    pub lon: f64,
    pub easting: f64,
    pub northing: f64,
    pub total_rms: f64,
    /// One entry per component in `StationRmsReport::components` order.
    pub components: Vec<ComponentRms>,
}

/// RMS summary over every station in a response file.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRmsReport {
    pub crs_label: String,
    /// Sorted distinct component names.
    pub components: Vec<String>,
    pub global_rms: f64,
    pub stations: Vec<StationRms>,
}

/// Error-normalised RMS over real and imaginary residuals.
///
/// Returns `None` for an empty row set.
pub fn rms<'a>(rows: impl IntoIterator<Item = &'a DataRow>) -> Option<f64> {
    let (sum_sq, n) = rows.into_iter().fold((0.0, 0usize), |(acc, n), row| {
        let re = row.real / row.error;
        let im = row.imag / row.error;
        (acc + re * re + im * im, n + 1)
    });

    if n == 0 {
        None
    } else {
        Some((sum_sq / (2.0 * n as f64)).sqrt())
    }
}

/// Compute global, per-station and per-component RMS values.
///
/// Stations are ordered by code; each station is projected into `crs`.
pub fn compute_station_rms(rows: &[DataRow], crs: &Crs) -> StationRmsReport {
    let components: Vec<String> = rows
        .iter()
        .map(|r| r.component.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let global_rms = rms(rows).unwrap_or(0.0);

    let mut by_station: BTreeMap<&str, Vec<&DataRow>> = BTreeMap::new();
    for row in rows {
        by_station.entry(row.station.as_str()).or_default().push(row);
    }

    let stations = by_station
        .into_iter()
        .map(|(code, station_rows)| {
            let first = station_rows[0];
            let (easting, northing) = crs.project(first.lat, first.lon);
            let total_rms = rms(station_rows.iter().copied()).unwrap_or(0.0);

            let component_rms = components
                .iter()
                .map(|component| {
                    let selected = station_rows
                        .iter()
                        .copied()
                        .filter(|r| &r.component == component);
                    match rms(selected) {
                        Some(v) => ComponentRms::Computed(v),
                        None => {
                            warn!("Couldn't calculate {} component RMS for site {}", component, code);
                            ComponentRms::InsufficientData
                        }
                    }
                })
                .collect();

            StationRms {
                code: code.to_string(),
                lat: first.lat,
                lon: first.lon,
                easting,
                northing,
                total_rms,
                components: component_rms,
            }
        })
        .collect();

    StationRmsReport {
        crs_label: crs.label(),
        components,
        global_rms,
        stations,
    }
}

/// Default summary path: `<response stem>_RMS.csv` next to the response file.
pub fn default_output_path(response_file: &Path) -> PathBuf {
    let stem = response_file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "response".to_string());
    response_file.with_file_name(format!("{}_RMS.csv", stem))
}

/// Read a response file, compute RMS statistics and write the summary CSV.
pub fn process_response_file(
    response_file: &Path,
    output: &Path,
    crs: &Crs,
) -> Result<StationRmsReport> {
    let rows = loaders::load_modem_data(response_file)
        .with_context(|| format!("Failed to read response file: {}", response_file.display()))?;

    let report = compute_station_rms(&rows, crs);
    info!(
        "Global RMS over {} rows: {:.4} ({} stations, {} components)",
        rows.len(),
        report.global_rms,
        report.stations.len(),
        report.components.len()
    );

    writers::write_station_rms_csv(output, &report)
        .with_context(|| format!("Failed to write RMS summary: {}", output.display()))?;

    Ok(report)
}
