//! Configuration types for the ModEM post-processing tools.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::processors::slicing::{PaddingSpec, ZAxis};

/// Coordinate reference system settings shared by every subcommand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Output CRS as an EPSG identifier (e.g. "EPSG:28355" for MGA zone 55)
    #[serde(default = "default_crs")]
    pub crs: String,
}

fn default_crs() -> String {
    "EPSG:28355".to_string()
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self { crs: default_crs() }
    }
}

/// Configuration for depth slice extraction and GeoTIFF export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceConfig {
    /// Header lines to skip at the top of the point cloud file
    #[serde(default = "default_header_lines")]
    pub header_lines: usize,

    /// Padding cells stripped from each side in the east direction
    #[serde(default = "default_padding")]
    pub east_padding: usize,

    /// Padding cells stripped from each side in the north direction
    #[serde(default = "default_padding")]
    pub north_padding: usize,

    /// Model top in the depth column's convention, added to every depth
    #[serde(default)]
    pub model_top: f64,

    /// Sign convention of the depth column
    #[serde(default)]
    pub z_axis: ZAxis,

    /// gdal_translate executable name or path
    #[serde(default = "default_gdal_translate")]
    pub gdal_translate: String,

    /// GeoTIFF compression passed as `-co COMPRESS=...`
    #[serde(default = "default_compression")]
    pub compression: String,

    /// Convert slice CSVs into GeoTIFF rasters
    #[serde(default = "default_true")]
    pub raster: bool,

    /// Keep CSV and ASCII grid files after the GeoTIFF is written
    #[serde(default)]
    pub keep_intermediate: bool,
}

fn default_header_lines() -> usize {
    3
}

fn default_padding() -> usize {
    15
}

fn default_gdal_translate() -> String {
    "gdal_translate".to_string()
}

fn default_compression() -> String {
    "LZW".to_string()
}

fn default_true() -> bool {
    true
}

impl SliceConfig {
    /// Padding counts as consumed by the extractor.
    pub fn padding(&self) -> PaddingSpec {
        PaddingSpec {
            east: self.east_padding,
            north: self.north_padding,
        }
    }
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            header_lines: default_header_lines(),
            east_padding: default_padding(),
            north_padding: default_padding(),
            model_top: 0.0,
            z_axis: ZAxis::default(),
            gdal_translate: default_gdal_translate(),
            compression: default_compression(),
            raster: true,
            keep_intermediate: false,
        }
    }
}

/// Configuration for relocating UBC mesh origins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Elevation written as the mesh origin's vertical coordinate
    #[serde(default)]
    pub top_elevation: f64,
}

/// Configuration for the RMS decay curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmsLogConfig {
    /// Plot title
    #[serde(default = "default_title")]
    pub title: String,

    /// Render the PNG plot next to the CSV
    #[serde(default = "default_true")]
    pub plot: bool,

    /// Plot width in pixels
    #[serde(default = "default_plot_width")]
    pub width: u32,

    /// Plot height in pixels
    #[serde(default = "default_plot_height")]
    pub height: u32,
}

fn default_title() -> String {
    "RMS Decay Curve".to_string()
}

fn default_plot_width() -> u32 {
    1600
}

fn default_plot_height() -> u32 {
    1000
}

impl Default for RmsLogConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            plot: true,
            width: default_plot_width(),
            height: default_plot_height(),
        }
    }
}

/// Top-level configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub projection: ProjectionConfig,

    #[serde(default)]
    pub slices: SliceConfig,

    #[serde(default)]
    pub mesh: MeshConfig,

    #[serde(default)]
    pub rms_log: RmsLogConfig,
}

impl ToolsConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ToolsConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
