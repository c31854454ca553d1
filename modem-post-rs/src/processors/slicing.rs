//! Depth slice extraction with padding-cell trimming.
//!
//! A resistivity model exported as a flat list of cell centres is grouped
//! into horizontal slices, one per distinct depth value. The deepest slice
//! is always discarded: the mesh generator fills the bottom layer with
//! placeholder resistivities. Padding cells are removed per axis and the
//! remaining cells are ordered north-to-south, west-to-east, the row order
//! GDAL's XYZ reader requires.
//!
//! # Example
//!
//! ```
//! use modem_post::core::loaders::Point3D;
//! use modem_post::processors::slicing::{extract, PaddingSpec, ZAxis};
//!
//! let points = vec![
//!     Point3D::new(0.0, 0.0, 0.0, 10.0),
//!     Point3D::new(0.0, 0.0, -100.0, 20.0),
//! ];
//! let slices: Vec<_> = extract(points, PaddingSpec::default(), ZAxis::Elevation).collect();
//! assert_eq!(slices.len(), 1);
//! assert_eq!(slices[0].depth, 0.0);
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::loaders::Point3D;

/// Number of extreme distinct values stripped from each side of each axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaddingSpec {
    pub east: usize,
    pub north: usize,
}

/// Sign convention of the depth column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZAxis {
    /// Positive up, as in GOCAD sgrid exports: the minimum value is deepest.
    #[default]
    Elevation,
    /// Positive down: the maximum value is deepest.
    Depth,
}

/// One retained model cell within a slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceCell {
    pub east: f64,
    pub north: f64,
    pub resistivity: f64,
}

/// A horizontal cross-section of the model at a fixed depth.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSlice {
    pub depth: f64,
    pub cells: Vec<SliceCell>,
}

impl DepthSlice {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }
}

/// Exact-value grouping key for depths; `-0.0` and `0.0` compare equal.
#[derive(Debug, Clone, Copy)]
struct DepthKey(f64);

impl DepthKey {
    fn new(depth: f64) -> Self {
        // Adding positive zero maps -0.0 to 0.0
        Self(depth + 0.0)
    }
}

impl PartialEq for DepthKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DepthKey {}

impl PartialOrd for DepthKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DepthKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Lazy sequence of depth slices, shallowest first.
///
/// The input is grouped once at construction; each call to `next` trims
/// and orders a single slice.
#[derive(Debug)]
pub struct DepthSlices {
    groups: std::vec::IntoIter<(f64, Vec<SliceCell>)>,
    padding: PaddingSpec,
}

/// Group `points` into depth slices, dropping the deepest depth.
pub fn extract<I>(points: I, padding: PaddingSpec, axis: ZAxis) -> DepthSlices
where
    I: IntoIterator<Item = Point3D>,
{
    let mut by_depth: BTreeMap<DepthKey, Vec<SliceCell>> = BTreeMap::new();
    for p in points {
        by_depth.entry(DepthKey::new(p.depth)).or_default().push(SliceCell {
            east: p.east,
            north: p.north,
            resistivity: p.resistivity,
        });
    }

    let mut groups: Vec<(f64, Vec<SliceCell>)> =
        by_depth.into_iter().map(|(k, cells)| (k.0, cells)).collect();

    // Order shallowest to deepest
    if axis == ZAxis::Elevation {
        groups.reverse();
    }

    if let Some((deepest, cells)) = groups.pop() {
        debug!(
            "Discarding deepest slice at {} ({} cells)",
            deepest,
            cells.len()
        );
    }

    info!(
        "Extracting {} depth slices (padding east={}, north={})",
        groups.len(),
        padding.east,
        padding.north
    );

    DepthSlices {
        groups: groups.into_iter(),
        padding,
    }
}

impl Iterator for DepthSlices {
    type Item = DepthSlice;

    fn next(&mut self) -> Option<DepthSlice> {
        let (depth, cells) = self.groups.next()?;
        Some(trim_slice(depth, cells, self.padding))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.groups.size_hint()
    }
}

impl ExactSizeIterator for DepthSlices {}

/// Inclusive range of retained values on one axis, or `None` if padding
/// removes every distinct value.
fn retained_range(values: impl Iterator<Item = f64>, pad: usize) -> Option<(f64, f64)> {
    let mut distinct: Vec<f64> = values.collect();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();

    if pad >= distinct.len().div_ceil(2) {
        return None;
    }
    Some((distinct[pad], distinct[distinct.len() - 1 - pad]))
}

fn trim_slice(depth: f64, cells: Vec<SliceCell>, padding: PaddingSpec) -> DepthSlice {
    let east_range = retained_range(cells.iter().map(|c| c.east), padding.east);
    let north_range = retained_range(cells.iter().map(|c| c.north), padding.north);

    let (Some((e_lo, e_hi)), Some((n_lo, n_hi))) = (east_range, north_range) else {
        info!("Slice at depth {} is empty after padding removal", depth);
        return DepthSlice {
            depth,
            cells: Vec::new(),
        };
    };

    let mut kept: Vec<SliceCell> = cells
        .into_iter()
        .filter(|c| c.east >= e_lo && c.east <= e_hi && c.north >= n_lo && c.north <= n_hi)
        .collect();

    kept.sort_by(|a, b| {
        b.north
            .total_cmp(&a.north)
            .then_with(|| a.east.total_cmp(&b.east))
    });

    for cell in &mut kept {
        cell.east = cell.east.round_ties_even();
        cell.north = cell.north.round_ties_even();
    }

    debug!("Slice at depth {}: {} cells retained", depth, kept.len());

    DepthSlice { depth, cells: kept }
}
