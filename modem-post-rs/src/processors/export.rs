//! Depth slice export to CSV grids and GeoTIFF rasters.
//!
//! Every retained slice is written as an `x,y,rho` CSV grid and handed to a
//! [`RasterExporter`]. The bundled exporter drives `gdal_translate` twice:
//! CSV to ESRI ASCII grid, then ASCII grid to compressed GeoTIFF. A failure
//! on one slice is recorded and the remaining slices are still processed.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::SliceConfig;
use crate::core::loaders;
use crate::core::projection::Crs;
use crate::core::writers;
use crate::processors::origin;
use crate::processors::slicing::{self, DepthSlice};

/// Errors raised while converting a grid into a raster.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Converts a delimited grid file into a georeferenced raster.
pub trait RasterExporter {
    fn export(&self, grid: &Path, crs: &Crs, out_path: &Path) -> Result<(), ExportError>;
}

/// Raster export through the GDAL `gdal_translate` command-line tool.
#[derive(Debug, Clone)]
pub struct GdalTranslate {
    program: String,
    compression: String,
    keep_intermediate: bool,
}

impl GdalTranslate {
    pub fn new(program: impl Into<String>, compression: impl Into<String>, keep_intermediate: bool) -> Self {
        Self {
            program: program.into(),
            compression: compression.into(),
            keep_intermediate,
        }
    }

    fn run(&self, args: &[&str]) -> Result<(), ExportError> {
        debug!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| ExportError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(ExportError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn remove_intermediate(&self, paths: &[PathBuf]) {
        for path in paths {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

impl RasterExporter for GdalTranslate {
    fn export(&self, grid: &Path, crs: &Crs, out_path: &Path) -> Result<(), ExportError> {
        let srs = crs.srs();
        let ascii_grid = out_path.with_extension("asc");
        let grid_str = grid.to_string_lossy();
        let ascii_str = ascii_grid.to_string_lossy();
        let out_str = out_path.to_string_lossy();
        let compress = format!("COMPRESS={}", self.compression);

        self.run(&["-a_srs", &srs, "-of", "AAIGrid", &grid_str, &ascii_str])?;
        self.run(&[
            "-of", "GTiff", "-a_srs", &srs, "-co", &compress, &ascii_str, &out_str,
        ])?;

        if !self.keep_intermediate {
            self.remove_intermediate(&[
                ascii_grid.clone(),
                ascii_grid.with_extension("prj"),
                PathBuf::from(format!("{}.aux.xml", ascii_str)),
                grid.to_path_buf(),
            ]);
        }
        Ok(())
    }
}

/// File stem for a slice: `slice_<depth in km, 2 decimals>_km`.
pub fn slice_stem(depth: f64) -> String {
    let mut km = (depth / 1000.0 * 100.0).round() / 100.0;
    if km == 0.0 {
        km = 0.0;
    }
    let mut text = km.to_string();
    if !text.contains('.') && km.is_finite() {
        text.push_str(".0");
    }
    format!("slice_{}_km", text)
}

/// What happened to one slice.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceStatus {
    /// Raster written.
    Exported(PathBuf),
    /// CSV grid written, raster export disabled.
    CsvOnly,
    /// No cells left after padding removal; header-only CSV written.
    Empty,
    /// CSV or raster export failed.
    Failed(String),
}

/// Outcome of exporting one slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceOutcome {
    pub depth: f64,
    pub cells: usize,
    pub grid_path: PathBuf,
    pub status: SliceStatus,
}

/// Outcomes of a whole slice batch, in slice order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceReport {
    pub outcomes: Vec<SliceOutcome>,
    /// Stems produced by more than one depth; later slices overwrote earlier files.
    pub reused_stems: Vec<String>,
}

impl SliceReport {
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SliceStatus::Failed(_)))
            .count()
    }

    pub fn exported(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SliceStatus::Exported(_)))
            .count()
    }

    pub fn empty(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == SliceStatus::Empty)
            .count()
    }
}

/// Write every slice to `output_dir` and export non-empty slices as rasters.
///
/// Passing `None` as exporter writes CSV grids only.
pub fn run_slices<I>(
    slices: I,
    output_dir: &Path,
    crs: &Crs,
    exporter: Option<&dyn RasterExporter>,
) -> SliceReport
where
    I: IntoIterator<Item = DepthSlice>,
{
    let mut report = SliceReport::default();
    let mut seen_stems = HashSet::new();

    for slice in slices {
        let stem = slice_stem(slice.depth);
        if !seen_stems.insert(stem.clone()) {
            warn!(
                "Slice at depth {} maps to {} already written in this batch, overwriting",
                slice.depth, stem
            );
            if !report.reused_stems.contains(&stem) {
                report.reused_stems.push(stem.clone());
            }
        }
        let grid_path = output_dir.join(format!("{}.csv", stem));
        let status = export_slice(&slice, &grid_path, &stem, output_dir, crs, exporter);

        if let SliceStatus::Failed(reason) = &status {
            error!("Slice at {} km failed: {}", slice.depth / 1000.0, reason);
        }

        report.outcomes.push(SliceOutcome {
            depth: slice.depth,
            cells: slice.len(),
            grid_path,
            status,
        });
    }

    report
}

/// Default slice directory: `geotiff_slices` next to the input file.
pub fn default_output_dir(input: &Path) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join("geotiff_slices")
}

/// Load a point cloud, slice it and export every slice.
///
/// With `origin_data`, points are shifted from model-relative to projected
/// coordinates using the stations of that ModEM data file. The configured
/// model top is always added to the depth column.
pub fn process_slices(
    input: &Path,
    output_dir: &Path,
    config: &SliceConfig,
    crs: &Crs,
    origin_data: Option<&Path>,
) -> anyhow::Result<SliceReport> {
    let mut points = loaders::load_point_cloud(input, config.header_lines)
        .with_context(|| format!("Failed to read point cloud: {}", input.display()))?;
    info!("Loaded {} points from {}", points.len(), input.display());

    let offset = match origin_data {
        Some(data_file) => {
            let rows = loaders::load_modem_data(data_file)
                .with_context(|| format!("Failed to read data file: {}", data_file.display()))?;
            let origin = origin::model_origin(&loaders::stations(&rows), crs)?;
            info!(
                "Model origin in {}: {:.2} m East, {:.2} m North",
                crs.label(),
                origin.0,
                origin.1
            );
            origin
        }
        None => (0.0, 0.0),
    };
    origin::apply_origin(&mut points, offset, config.model_top);

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let slices = slicing::extract(points, config.padding(), config.z_axis);

    let gdal = GdalTranslate::new(
        config.gdal_translate.clone(),
        config.compression.clone(),
        config.keep_intermediate,
    );
    let exporter: Option<&dyn RasterExporter> = if config.raster { Some(&gdal) } else { None };

    Ok(run_slices(slices, output_dir, crs, exporter))
}

fn export_slice(
    slice: &DepthSlice,
    grid_path: &Path,
    stem: &str,
    output_dir: &Path,
    crs: &Crs,
    exporter: Option<&dyn RasterExporter>,
) -> SliceStatus {
    if let Err(e) = writers::write_slice_csv(grid_path, slice) {
        return SliceStatus::Failed(e.to_string());
    }
    info!(
        "csv for {} km depth slice saved as: {}",
        slice.depth / 1000.0,
        grid_path.display()
    );

    if slice.is_empty() {
        info!("Skipping raster export for empty slice {}", stem);
        return SliceStatus::Empty;
    }

    let Some(exporter) = exporter else {
        return SliceStatus::CsvOnly;
    };

    let raster_path = output_dir.join(format!("{}_grid.tiff", stem));
    match exporter.export(grid_path, crs, &raster_path) {
        Ok(()) => SliceStatus::Exported(raster_path),
        Err(e) => SliceStatus::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::slicing::SliceCell;
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// Records calls and fails for grids whose name contains `fail_on`.
    struct RecordingExporter {
        calls: RefCell<Vec<(PathBuf, String, PathBuf)>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingExporter {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail_on,
            }
        }
    }

    impl RasterExporter for RecordingExporter {
        fn export(&self, grid: &Path, crs: &Crs, out_path: &Path) -> Result<(), ExportError> {
            self.calls
                .borrow_mut()
                .push((grid.to_path_buf(), crs.srs(), out_path.to_path_buf()));
            match self.fail_on {
                Some(pattern) if grid.to_string_lossy().contains(pattern) => {
                    Err(ExportError::Failed {
                        program: "mock".to_string(),
                        status: "exit status: 1".to_string(),
                        stderr: "boom".to_string(),
                    })
                }
                _ => Ok(()),
            }
        }
    }

    fn slice(depth: f64, cells: usize) -> DepthSlice {
        DepthSlice {
            depth,
            cells: (0..cells)
                .map(|i| SliceCell {
                    east: i as f64,
                    north: 0.0,
                    resistivity: 10.0,
                })
                .collect(),
        }
    }

    fn mga55() -> Crs {
        "EPSG:28355".parse().unwrap()
    }

    #[test]
    fn test_slice_stem() {
        assert_eq!(slice_stem(0.0), "slice_0.0_km");
        assert_eq!(slice_stem(-0.0), "slice_0.0_km");
        assert_eq!(slice_stem(-100.0), "slice_-0.1_km");
        assert_eq!(slice_stem(1250.0), "slice_1.25_km");
        assert_eq!(slice_stem(-2000.0), "slice_-2.0_km");
        assert_eq!(slice_stem(-1234.0), "slice_-1.23_km");
        assert_eq!(slice_stem(-3.0), "slice_0.0_km");
    }

    #[test]
    fn test_run_slices_exports_non_empty() {
        let dir = tempdir().unwrap();
        let exporter = RecordingExporter::new(None);

        let report = run_slices(
            vec![slice(0.0, 3), slice(-100.0, 2)],
            dir.path(),
            &mga55(),
            Some(&exporter),
        );

        assert_eq!(report.exported(), 2);
        assert_eq!(report.failed(), 0);

        let calls = exporter.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, dir.path().join("slice_0.0_km.csv"));
        assert_eq!(calls[0].1, "EPSG:28355");
        assert_eq!(calls[1].2, dir.path().join("slice_-0.1_km_grid.tiff"));
        assert!(dir.path().join("slice_-0.1_km.csv").exists());
    }

    #[test]
    fn test_empty_slice_skips_export() {
        let dir = tempdir().unwrap();
        let exporter = RecordingExporter::new(None);

        let report = run_slices(vec![slice(-500.0, 0)], dir.path(), &mga55(), Some(&exporter));

        assert_eq!(report.outcomes[0].status, SliceStatus::Empty);
        assert_eq!(report.empty(), 1);
        assert!(exporter.calls.borrow().is_empty());
        let content = fs::read_to_string(dir.path().join("slice_-0.5_km.csv")).unwrap();
        assert_eq!(content.trim(), "x,y,rho");
    }

    #[test]
    fn test_failed_slice_does_not_stop_batch() {
        let dir = tempdir().unwrap();
        let exporter = RecordingExporter::new(Some("-0.1"));

        let report = run_slices(
            vec![slice(0.0, 1), slice(-100.0, 1), slice(-200.0, 1)],
            dir.path(),
            &mga55(),
            Some(&exporter),
        );

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.exported(), 2);
        assert!(matches!(report.outcomes[1].status, SliceStatus::Failed(ref r) if r.contains("boom")));
        assert_eq!(exporter.calls.borrow().len(), 3);
    }

    #[test]
    fn test_repeated_stem_is_reported() {
        let dir = tempdir().unwrap();

        // 0 m and -4 m both round to 0.0 km
        let report = run_slices(
            vec![slice(0.0, 1), slice(-4.0, 2), slice(-100.0, 1)],
            dir.path(),
            &mga55(),
            None,
        );

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.reused_stems, vec!["slice_0.0_km".to_string()]);
        assert_eq!(report.outcomes[0].grid_path, report.outcomes[1].grid_path);
        let content = fs::read_to_string(dir.path().join("slice_0.0_km.csv")).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_distinct_stems_not_reported() {
        let dir = tempdir().unwrap();
        let report = run_slices(vec![slice(0.0, 1), slice(-100.0, 1)], dir.path(), &mga55(), None);
        assert!(report.reused_stems.is_empty());
    }

    #[test]
    fn test_csv_only_mode() {
        let dir = tempdir().unwrap();

        let report = run_slices(vec![slice(0.0, 4)], dir.path(), &mga55(), None);

        assert_eq!(report.outcomes[0].status, SliceStatus::CsvOnly);
        assert_eq!(report.outcomes[0].cells, 4);
        assert!(report.outcomes[0].grid_path.exists());
    }

    #[test]
    fn test_process_slices_csv_only() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("model.txt");
        // Three depths on a 3x3 grid; the deepest (-500) is dropped
        let mut text = String::from("header 1\nheader 2\nheader 3\n");
        for z in [0.0, -100.0, -500.0] {
            for n in [0.0, 10.0, 20.0] {
                for e in [0.0, 10.0, 20.0] {
                    text.push_str(&format!("{} {} {} 100\n", e, n, z));
                }
            }
        }
        fs::write(&input, text).unwrap();

        let config = SliceConfig {
            east_padding: 1,
            north_padding: 1,
            raster: false,
            ..SliceConfig::default()
        };
        let out = dir.path().join("slices");

        let report = process_slices(&input, &out, &config, &mga55(), None).unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| o.status == SliceStatus::CsvOnly));
        assert!(report.outcomes.iter().all(|o| o.cells == 1));
        let content = fs::read_to_string(out.join("slice_-0.1_km.csv")).unwrap();
        assert_eq!(content.lines().nth(1), Some("10,10,100"));
    }

    #[test]
    fn test_default_output_dir() {
        assert_eq!(
            default_output_dir(Path::new("/data/run3/model.txt")),
            PathBuf::from("/data/run3/geotiff_slices")
        );
    }

    #[test]
    fn test_gdal_missing_executable() {
        let dir = tempdir().unwrap();
        let grid = dir.path().join("slice_0.0_km.csv");
        fs::write(&grid, "x,y,rho\n0,0,1\n").unwrap();
        let exporter = GdalTranslate::new("/nonexistent/gdal_translate", "LZW", false);

        let result = exporter.export(&grid, &mga55(), &dir.path().join("slice_0.0_km_grid.tiff"));

        assert!(matches!(result, Err(ExportError::Spawn { .. })));
        // Nothing is cleaned up when the first step fails
        assert!(grid.exists());
    }
}
