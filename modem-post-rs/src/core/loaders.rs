//! Data loaders for model point clouds, UBC meshes and ModEM data files.
//!
//! This module provides parsers for:
//! - Model point clouds (x, y, z, value columns; whitespace or comma delimited)
//! - UBC mesh files as written by 3DGrid
//! - ModEM data (`.dat`) and response (`.res`) files, which share one row layout

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Invalid UBC mesh: {0}")]
    InvalidMesh(String),

    #[error("Parse error in {path} line {line}: {message}")]
    ParseError {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A single model cell centre with its resistivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3D {
    pub east: f64,
    pub north: f64,
    pub depth: f64,
    pub resistivity: f64,
}

impl Point3D {
    pub fn new(east: f64, north: f64, depth: f64, resistivity: f64) -> Self {
        Self {
            east,
            north,
            depth,
            resistivity,
        }
    }
}

/// Split a data line on whitespace and commas.
fn fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
}

fn parse_field<T: std::str::FromStr>(
    token: Option<&str>,
    name: &str,
    path: &Path,
    line: usize,
) -> Result<T> {
    let token = token.ok_or_else(|| LoaderError::ParseError {
        path: path.to_path_buf(),
        line,
        message: format!("missing {} column", name),
    })?;
    token.parse().map_err(|_| LoaderError::ParseError {
        path: path.to_path_buf(),
        line,
        message: format!("invalid {} value: {}", name, token),
    })
}

/// Load a model point cloud from an ASCII file with x, y, z, value columns.
///
/// The first `header_lines` lines are skipped (three for GOCAD sgrid ASCII
/// exports). Blank lines and lines starting with `#` are ignored. Columns
/// after the fourth are ignored.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a row cannot be parsed,
/// or no points are found.
pub fn load_point_cloud<P: AsRef<Path>>(path: P, header_lines: usize) -> Result<Vec<Point3D>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut points = Vec::with_capacity(10_000);

    for (idx, line) in reader.lines().enumerate().skip(header_lines) {
        let line = line?;
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let line_no = idx + 1;
        let mut cols = fields(stripped);
        let east = parse_field(cols.next(), "x", path, line_no)?;
        let north = parse_field(cols.next(), "y", path, line_no)?;
        let depth = parse_field(cols.next(), "z", path, line_no)?;
        let resistivity = parse_field(cols.next(), "value", path, line_no)?;

        points.push(Point3D::new(east, north, depth, resistivity));
    }

    if points.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(points)
}

/// A UBC-GIF tensor mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct UbcMesh {
    /// Cell counts in east, north and vertical directions.
    pub dims: [usize; 3],
    /// South-west-top corner of the mesh.
    pub origin: [f64; 3],
    /// Cell widths in the east direction.
    pub east_widths: Vec<f64>,
    /// Cell widths in the north direction.
    pub north_widths: Vec<f64>,
    /// Cell widths in the vertical direction, top to bottom.
    pub vertical_widths: Vec<f64>,
}

impl UbcMesh {
    /// Total extent of the mesh in the east direction.
    pub fn east_extent(&self) -> f64 {
        self.east_widths.iter().sum()
    }

    /// Total extent of the mesh in the north direction.
    pub fn north_extent(&self) -> f64 {
        self.north_widths.iter().sum()
    }
}

/// Parse a row of cell widths, expanding UBC `n*width` repeat tokens.
fn parse_widths(line: &str, path: &Path, line_no: usize) -> Result<Vec<f64>> {
    let mut widths = Vec::new();
    for token in fields(line) {
        match token.split_once('*') {
            Some((count, width)) => {
                let count: usize = parse_field(Some(count), "repeat count", path, line_no)?;
                let width: f64 = parse_field(Some(width), "cell width", path, line_no)?;
                widths.extend(std::iter::repeat(width).take(count));
            }
            None => widths.push(parse_field(Some(token), "cell width", path, line_no)?),
        }
    }
    Ok(widths)
}

/// Load a UBC mesh file.
///
/// Layout: cell counts, origin, then one line each of east, north and
/// vertical cell widths.
pub fn load_ubc_mesh<P: AsRef<Path>>(path: P) -> Result<UbcMesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let lines: Vec<String> = reader
        .lines()
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|l| !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    if lines.len() < 5 {
        return Err(LoaderError::InvalidMesh(format!(
            "expected 5 lines, found {}",
            lines.len()
        )));
    }

    let mut dim_cols = fields(&lines[0]);
    let dims = [
        parse_field(dim_cols.next(), "nx", path, 1)?,
        parse_field(dim_cols.next(), "ny", path, 1)?,
        parse_field(dim_cols.next(), "nz", path, 1)?,
    ];

    let mut origin_cols = fields(&lines[1]);
    let origin = [
        parse_field(origin_cols.next(), "origin east", path, 2)?,
        parse_field(origin_cols.next(), "origin north", path, 2)?,
        parse_field(origin_cols.next(), "origin elevation", path, 2)?,
    ];

    let east_widths = parse_widths(&lines[2], path, 3)?;
    let north_widths = parse_widths(&lines[3], path, 4)?;
    let vertical_widths = parse_widths(&lines[4], path, 5)?;

    for (axis, count, widths) in [
        ("east", dims[0], &east_widths),
        ("north", dims[1], &north_widths),
        ("vertical", dims[2], &vertical_widths),
    ] {
        if widths.len() != count {
            return Err(LoaderError::InvalidMesh(format!(
                "{} widths: expected {}, found {}",
                axis,
                count,
                widths.len()
            )));
        }
    }

    Ok(UbcMesh {
        dims,
        origin,
        east_widths,
        north_widths,
        vertical_widths,
    })
}

/// One data or response row of a ModEM data file.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub period: f64,
    pub station: String,
    pub lat: f64,
    pub lon: f64,
    /// Station position north of the model centre, in metres.
    pub rel_north: f64,
    /// Station position east of the model centre, in metres.
    pub rel_east: f64,
    pub elevation: f64,
    pub component: String,
    pub real: f64,
    pub imag: f64,
    pub error: f64,
}

/// Load every data row from a ModEM `.dat` or `.res` file.
///
/// Expected columns: Period, Code, GG_Lat, GG_Lon, X(m), Y(m), Z(m),
/// Component, Real, Imag, Error. Lines starting with `#` or `>` are headers.
pub fn load_modem_data<P: AsRef<Path>>(path: P) -> Result<Vec<DataRow>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') || stripped.starts_with('>') {
            continue;
        }

        let line_no = idx + 1;
        let cols: Vec<&str> = stripped.split_whitespace().collect();
        if cols.len() < 11 {
            return Err(LoaderError::ParseError {
                path: path.to_path_buf(),
                line: line_no,
                message: format!("expected 11 columns, found {}", cols.len()),
            });
        }

        rows.push(DataRow {
            period: parse_field(Some(cols[0]), "period", path, line_no)?,
            station: cols[1].to_string(),
            lat: parse_field(Some(cols[2]), "latitude", path, line_no)?,
            lon: parse_field(Some(cols[3]), "longitude", path, line_no)?,
            rel_north: parse_field(Some(cols[4]), "X(m)", path, line_no)?,
            rel_east: parse_field(Some(cols[5]), "Y(m)", path, line_no)?,
            elevation: parse_field(Some(cols[6]), "Z(m)", path, line_no)?,
            component: cols[7].to_string(),
            real: parse_field(Some(cols[8]), "real", path, line_no)?,
            imag: parse_field(Some(cols[9]), "imag", path, line_no)?,
            error: parse_field(Some(cols[10]), "error", path, line_no)?,
        });
    }

    if rows.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(rows)
}

/// Location of one MT station.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub code: String,
    pub lat: f64,
    pub lon: f64,
    pub rel_north: f64,
    pub rel_east: f64,
}

/// Unique station locations from data rows, sorted by station code.
///
/// The first row seen for a station defines its location.
pub fn stations(rows: &[DataRow]) -> Vec<Station> {
    let mut by_code: BTreeMap<&str, Station> = BTreeMap::new();
    for row in rows {
        by_code.entry(row.station.as_str()).or_insert_with(|| Station {
            code: row.station.clone(),
            lat: row.lat,
            lon: row.lon,
            rel_north: row.rel_north,
            rel_east: row.rel_east,
        });
    }
    by_code.into_values().collect()
}
