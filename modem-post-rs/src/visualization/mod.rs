//! Visualization of inversion convergence.
//!
//! This module renders the RMS decay curve of an inversion as a PNG line
//! chart using the plotters library.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("No RMS values to plot")]
    EmptySeries,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Line colour of the RMS curve.
const CURVE_COLOR: RGBColor = RGBColor(31, 119, 180);

/// Stroke width of the RMS curve in pixels.
const CURVE_WIDTH: u32 = 5;

/// Plot RMS against iteration and save as PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `rms` - RMS value per iteration, starting at iteration 0
/// * `title` - Chart caption
/// * `size` - Image size in pixels (width, height)
pub fn plot_rms_curve(output_path: &Path, rms: &[f64], title: &str, size: (u32, u32)) -> Result<()> {
    if rms.is_empty() {
        return Err(VisualizationError::EmptySeries);
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let x_max = (rms.len() - 1).max(1) as f64;
    let (y_min, y_max) = rms_bounds(rms);

    let root = BitMapBackend::new(output_path, size).into_drawing_area();

    root.fill(&WHITE)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 36))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Iteration")
        .y_desc("Global RMS")
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(
            rms.iter().enumerate().map(|(i, v)| (i as f64, *v)),
            CURVE_COLOR.stroke_width(CURVE_WIDTH),
        ))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Vertical axis range: zero to 5% above the largest value.
fn rms_bounds(rms: &[f64]) -> (f64, f64) {
    let max = rms.iter().copied().fold(f64::MIN, f64::max);
    let min = rms.iter().copied().fold(f64::MAX, f64::min);

    let lower = if min >= 0.0 { 0.0 } else { min * 1.05 };
    let mut upper = max * 1.05;
    if (upper - lower).abs() < f64::EPSILON {
        upper = lower + 1.0;
    }

    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_series_rejected() {
        let dir = tempdir().unwrap();
        let result = plot_rms_curve(&dir.path().join("rms.png"), &[], "RMS", (800, 600));
        assert!(matches!(result, Err(VisualizationError::EmptySeries)));
    }

    #[test]
    fn test_rms_bounds() {
        let (lo, hi) = rms_bounds(&[10.0, 5.0, 2.0]);
        assert_eq!(lo, 0.0);
        assert!((hi - 10.5).abs() < 1e-12);
    }

    #[test]
    fn test_rms_bounds_all_zero() {
        assert_eq!(rms_bounds(&[0.0, 0.0]), (0.0, 1.0));
    }
}
