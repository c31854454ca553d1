//! Data writers for slice grids, UBC meshes and RMS tables.
//!
//! This module provides functions for writing processing results:
//! - Depth slice grids as `x,y,rho` CSV, the XYZ layout GDAL reads
//! - UBC mesh files (tab separated)
//! - RMS-vs-iteration tables
//! - Per-station RMS summaries

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::loaders::UbcMesh;
use crate::processors::slicing::DepthSlice;
use crate::processors::station_rms::StationRmsReport;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a CSV writer over a buffered file, creating parent directories.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

fn write_row<W: Write, I, T>(writer: &mut csv::Writer<W>, record: I, path: &str) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    writer.write_record(record).map_err(|e| WriteError::CsvError {
        path: path.to_string(),
        source: e,
    })
}

fn finish<W: Write>(mut writer: csv::Writer<W>, path: String) -> Result<()> {
    writer
        .flush()
        .map_err(|e| WriteError::WriteFile { path, source: e })
}

/// Write one depth slice as a CSV grid with columns `x,y,rho`.
///
/// Rows are written in slice order (north to south, west to east). An
/// empty slice produces a header-only file.
///
/// # Example
///
/// ```no_run
/// use modem_post::core::writers::write_slice_csv;
/// use modem_post::processors::slicing::DepthSlice;
/// use std::path::Path;
///
/// let slice = DepthSlice { depth: -100.0, cells: Vec::new() };
/// write_slice_csv(Path::new("slice_-0.1_km.csv"), &slice).unwrap();
/// ```
pub fn write_slice_csv(path: &Path, slice: &DepthSlice) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    write_row(&mut csv_writer, ["x", "y", "rho"], &path_str)?;

    for cell in &slice.cells {
        write_row(
            &mut csv_writer,
            [
                cell.east.to_string(),
                cell.north.to_string(),
                cell.resistivity.to_string(),
            ],
            &path_str,
        )?;
    }

    finish(csv_writer, path_str)
}

/// Write a UBC mesh file with tab-separated values.
pub fn write_ubc_mesh(path: &Path, mesh: &UbcMesh) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    let path_str = path.display().to_string();

    let join = |values: &[f64]| {
        values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\t")
    };

    let content = format!(
        "{}\t{}\t{}\n{:.3}\t{:.3}\t{:.3}\n{}\n{}\n{}\n",
        mesh.dims[0],
        mesh.dims[1],
        mesh.dims[2],
        mesh.origin[0],
        mesh.origin[1],
        mesh.origin[2],
        join(&mesh.east_widths),
        join(&mesh.north_widths),
        join(&mesh.vertical_widths),
    );

    writer
        .write_all(content.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| WriteError::WriteFile {
            path: path_str,
            source: e,
        })
}

/// Write RMS values per inversion iteration as `iter,RMS`.
pub fn write_rms_iterations_csv(path: &Path, rms: &[f64]) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    write_row(&mut csv_writer, ["iter", "RMS"], &path_str)?;
    for (iter, value) in rms.iter().enumerate() {
        write_row(
            &mut csv_writer,
            [iter.to_string(), value.to_string()],
            &path_str,
        )?;
    }

    finish(csv_writer, path_str)
}

/// Write the per-station RMS summary table.
///
/// Components without data for a station are written as empty cells.
pub fn write_station_rms_csv(path: &Path, report: &StationRmsReport) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    let mut header = vec![
        "Station".to_string(),
        "WGS84_lat".to_string(),
        "WGS84_lon".to_string(),
        format!("{}_E", report.crs_label),
        format!("{}_N", report.crs_label),
        "totalRMS".to_string(),
    ];
    header.extend(report.components.iter().map(|c| format!("{}RMS", c)));
    write_row(&mut csv_writer, &header, &path_str)?;

    for station in &report.stations {
        let mut record = vec![
            station.code.clone(),
            station.lat.to_string(),
            station.lon.to_string(),
            format!("{:.2}", station.easting),
            format!("{:.2}", station.northing),
            format!("{:.4}", station.total_rms),
        ];
        record.extend(
            station
                .components
                .iter()
                .map(|c| c.value().map(|v| format!("{:.4}", v)).unwrap_or_default()),
        );
        write_row(&mut csv_writer, &record, &path_str)?;
    }

    finish(csv_writer, path_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::slicing::SliceCell;
    use crate::processors::station_rms::{ComponentRms, StationRms};
    use std::fs;
    use tempfile::tempdir;

    fn create_test_slice() -> DepthSlice {
        DepthSlice {
            depth: -100.0,
            cells: vec![
                SliceCell {
                    east: 150.0,
                    north: 300.0,
                    resistivity: 12.5,
                },
                SliceCell {
                    east: 200.0,
                    north: 300.0,
                    resistivity: 100.0,
                },
            ],
        }
    }

    #[test]
    fn test_write_slice_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("slice_-0.1_km.csv");

        write_slice_csv(&path, &create_test_slice()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["x,y,rho", "150,300,12.5", "200,300,100"]);
    }

    #[test]
    fn test_write_empty_slice_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let slice = DepthSlice {
            depth: 0.0,
            cells: Vec::new(),
        };

        write_slice_csv(&path, &slice).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec!["x,y,rho"]);
    }

    #[test]
    fn test_write_slice_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geotiff_slices").join("nested").join("s.csv");

        write_slice_csv(&path, &create_test_slice()).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_write_ubc_mesh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.mesh");
        let mesh = UbcMesh {
            dims: [2, 2, 1],
            origin: [512_345.678, 5_400_000.0, 0.0],
            east_widths: vec![100.0, 250.5],
            north_widths: vec![500.0, 500.0],
            vertical_widths: vec![50.0],
        };

        write_ubc_mesh(&path, &mesh).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "2\t2\t1");
        assert_eq!(lines[1], "512345.678\t5400000.000\t0.000");
        assert_eq!(lines[2], "100\t250.5");
        assert_eq!(lines[3], "500\t500");
        assert_eq!(lines[4], "50");
    }

    #[test]
    fn test_write_rms_iterations_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inv_RMS_vs_iter.csv");

        write_rms_iterations_csv(&path, &[9.5, 4.25, 2.0]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["iter,RMS", "0,9.5", "1,4.25", "2,2"]);
    }

    #[test]
    fn test_write_station_rms_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run_RMS.csv");
        let report = StationRmsReport {
            crs_label: "MGA55".to_string(),
            components: vec!["ZXY".to_string(), "ZYX".to_string()],
            global_rms: 1.5,
            stations: vec![StationRms {
                code: "KU01".to_string(),
                lat: -41.6,
                lon: 146.4,
                easting: 450_000.0,
                northing: 5_390_000.0,
                total_rms: 1.5,
                components: vec![ComponentRms::Computed(2.0), ComponentRms::InsufficientData],
            }],
        };

        write_station_rms_csv(&path, &report).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "Station,WGS84_lat,WGS84_lon,MGA55_E,MGA55_N,totalRMS,ZXYRMS,ZYXRMS"
        );
        assert_eq!(
            lines[1],
            "KU01,-41.6,146.4,450000.00,5390000.00,1.5000,2.0000,"
        );
    }
}
