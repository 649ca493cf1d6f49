//! Grid definitions for gridded climate data.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// A regular lat/lon grid.
///
/// `bbox` is the outer edge of the grid cells, data is row-major starting at
/// the north-west corner (row 0 is the northernmost row).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridDefinition {
    /// Number of columns (longitude direction)
    pub width: usize,
    /// Number of rows (latitude direction)
    pub height: usize,
    /// Outer cell edges
    pub bbox: BoundingBox,
}

impl GridDefinition {
    pub fn new(width: usize, height: usize, bbox: BoundingBox) -> Self {
        Self {
            width,
            height,
            bbox,
        }
    }

    /// Cell size in degrees as `(lon, lat)`.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.bbox.width() / self.width as f64,
            self.bbox.height() / self.height as f64,
        )
    }

    /// Convert a grid cell index to geographic coordinates (center of cell).
    pub fn cell_to_coords(&self, col: usize, row: usize) -> (f64, f64) {
        let (res_x, res_y) = self.resolution();
        let lon = self.bbox.min_lon + (col as f64 + 0.5) * res_x;
        let lat = self.bbox.max_lat - (row as f64 + 0.5) * res_y;
        (lon, lat)
    }

    /// Convert geographic coordinates to the containing cell.
    pub fn coords_to_cell(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        if self.is_empty() || !self.bbox.contains(lon, lat) {
            return None;
        }

        let (res_x, res_y) = self.resolution();
        let col = ((lon - self.bbox.min_lon) / res_x).floor() as usize;
        let row = ((self.bbox.max_lat - lat) / res_y).floor() as usize;

        // Points on the south/east edge belong to the last cell
        Some((col.min(self.width - 1), row.min(self.height - 1)))
    }

    /// Get the 1D array index for a 2D grid position.
    pub fn flat_index(&self, col: usize, row: usize) -> usize {
        row * self.width + col
    }

    /// Total number of grid cells.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Grids of the reanalysis products this workspace is usually fed with.
pub mod grids {
    use super::*;

    /// ERA5-Land 0.1° global grid
    pub fn era5_land_0p1() -> GridDefinition {
        GridDefinition::new(3600, 1800, BoundingBox::new(-180.0, -90.0, 180.0, 90.0))
    }

    /// ERA5 0.25° global grid
    pub fn era5_0p25() -> GridDefinition {
        GridDefinition::new(1440, 720, BoundingBox::new(-180.0, -90.0, 180.0, 90.0))
    }
}
