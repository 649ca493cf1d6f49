//! Spatial reduction of an image band over an AOI.

use async_trait::async_trait;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use climate_common::{BoundingBox, ClimateError, ClimateResult, GridDefinition};

use crate::aoi::AoiGeometry;
use crate::image::GriddedImage;
use crate::reducer::Reducer;

/// Meters per degree along a meridian, used to turn a metric scale into a
/// lattice step.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Parameters of one areal reduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReductionParams {
    /// Statistic over the valid samples inside the AOI
    pub statistic: Reducer,
    /// Nominal sampling scale in meters
    pub scale: f64,
    /// Coarsen the scale instead of failing when over `max_pixels`
    pub best_effort: bool,
    /// Upper bound on sampled pixels
    pub max_pixels: u64,
}

impl ReductionParams {
    /// Best-effort areal mean at `scale` meters.
    pub fn mean(scale: f64, max_pixels: u64) -> Self {
        Self {
            statistic: Reducer::Mean,
            scale,
            best_effort: true,
            max_pixels,
        }
    }

    pub fn with_best_effort(mut self, best_effort: bool) -> Self {
        self.best_effort = best_effort;
        self
    }

    pub fn validate(&self) -> ClimateResult<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ClimateError::invalid_config(
                "scale",
                format!("must be a positive number of meters, got {}", self.scale),
            ));
        }
        if self.max_pixels == 0 {
            return Err(ClimateError::invalid_config("max_pixels", "must be at least 1"));
        }
        Ok(())
    }
}

/// Reduces one band of an image to a scalar over a region.
///
/// Implementations return `Ok(None)` when no valid pixel falls inside the
/// region; that is a reportable gap, not an error.
#[async_trait]
pub trait SpatialReducer: Send + Sync {
    /// Reduce `band` of `image` over `geometry`.
    ///
    /// # Arguments
    /// * `image` - Source image
    /// * `band` - Band to reduce
    /// * `geometry` - Region of interest
    /// * `params` - Statistic, scale and pixel cap
    ///
    /// # Returns
    /// * `Some(value)` if at least one valid pixel was sampled
    /// * `None` if the region holds no data at this scale
    async fn areal_reduce(
        &self,
        image: &GriddedImage,
        band: &str,
        geometry: &AoiGeometry,
        params: &ReductionParams,
    ) -> ClimateResult<Option<f64>>;
}

/// In-process reducer sampling the image on a regular lattice.
///
/// Lattice points sit at cell centers of a global grid with a step of
/// `scale / METERS_PER_DEGREE` degrees anchored at (-180, 90). Each point
/// inside the AOI takes the value of the image cell it falls in. An AOI that
/// holds no lattice point, because it is smaller than the scale or the
/// best-effort step outgrew it, is sampled from the image cells it touches.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSpatialReducer;

impl GridSpatialReducer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous reduction shared by the trait implementation.
    pub fn reduce(
        &self,
        image: &GriddedImage,
        band: &str,
        geometry: &AoiGeometry,
        params: &ReductionParams,
    ) -> ClimateResult<Option<f64>> {
        params.validate()?;
        let data = image.band(band)?;
        let grid = image.grid();

        let region = match geometry.bbox().intersection(&grid.bbox) {
            Some(region) => region,
            None => {
                warn!(
                    image = %image.id(),
                    band = %band,
                    "AOI lies outside image coverage, reduction unavailable"
                );
                return Ok(None);
            }
        };

        let mut step = params.scale / METERS_PER_DEGREE;
        let mut lattice = Lattice::covering(&region, step);
        let requested = lattice.count();

        while lattice.count() > params.max_pixels {
            if !params.best_effort {
                return Err(ClimateError::TooManyPixels {
                    pixels: lattice.count(),
                    max_pixels: params.max_pixels,
                });
            }
            step *= 2.0;
            lattice = Lattice::covering(&region, step);
        }

        if lattice.count() < requested {
            warn!(
                image = %image.id(),
                band = %band,
                requested_pixels = requested,
                sampled_pixels = lattice.count(),
                max_pixels = params.max_pixels,
                scale_m = step * METERS_PER_DEGREE,
                "Best-effort reduction coarsened the sampling scale"
            );
        }

        // Samples at lattice points inside the AOI, no-data included
        let mut values: Vec<f32> = (0..lattice.rows)
            .into_par_iter()
            .flat_map_iter(move |j| {
                let lat = lattice.lat(j);
                (0..lattice.cols).filter_map(move |i| {
                    let lon = lattice.lon(i);
                    if !geometry.contains(lon, lat) {
                        return None;
                    }
                    Some(sample(grid, data, lon, lat))
                })
            })
            .collect();

        if values.is_empty() {
            debug!(
                image = %image.id(),
                band = %band,
                lattice_points = lattice.count(),
                "No lattice point inside AOI, sampling the cells it touches"
            );
            values = touched_cells(grid, data, geometry, &region, params.max_pixels);
        }
        values.retain(|v| !v.is_nan());

        debug!(
            image = %image.id(),
            band = %band,
            lattice_points = lattice.count(),
            valid = values.len(),
            "Areal reduction"
        );

        let value = params.statistic.apply(&mut values);
        if value.is_nan() {
            warn!(
                image = %image.id(),
                band = %band,
                "No valid pixels inside AOI, reduction unavailable"
            );
            return Ok(None);
        }
        Ok(Some(value as f64))
    }
}

#[async_trait]
impl SpatialReducer for GridSpatialReducer {
    async fn areal_reduce(
        &self,
        image: &GriddedImage,
        band: &str,
        geometry: &AoiGeometry,
        params: &ReductionParams,
    ) -> ClimateResult<Option<f64>> {
        self.reduce(image, band, geometry, params)
    }
}

/// Value of the image cell containing `(lon, lat)`, `NaN` outside the grid.
fn sample(grid: &GridDefinition, data: &[f32], lon: f64, lat: f64) -> f32 {
    grid.coords_to_cell(lon, lat)
        .and_then(|(col, row)| data.get(grid.flat_index(col, row)).copied())
        .unwrap_or(f32::NAN)
}

/// Image cells an AOI too small for the lattice touches.
///
/// Cells within `region` whose centers lie inside the AOI, or the cell at
/// the center of `region` when there are none or more than `max_pixels`.
fn touched_cells(
    grid: &GridDefinition,
    data: &[f32],
    geometry: &AoiGeometry,
    region: &BoundingBox,
    max_pixels: u64,
) -> Vec<f32> {
    let corners = (
        grid.coords_to_cell(region.min_lon, region.max_lat),
        grid.coords_to_cell(region.max_lon, region.min_lat),
    );
    let (center_lon, center_lat) = region.center();
    let representative = || vec![sample(grid, data, center_lon, center_lat)];

    let ((c0, r0), (c1, r1)) = match corners {
        (Some(nw), Some(se)) => (nw, se),
        _ => return representative(),
    };
    let cells = ((c1 - c0 + 1) * (r1 - r0 + 1)) as u64;
    if cells > max_pixels {
        return representative();
    }

    let inside: Vec<f32> = (r0..=r1)
        .flat_map(|row| (c0..=c1).map(move |col| (col, row)))
        .filter(|&(col, row)| {
            let (lon, lat) = grid.cell_to_coords(col, row);
            geometry.contains(lon, lat)
        })
        .map(|(col, row)| data.get(grid.flat_index(col, row)).copied().unwrap_or(f32::NAN))
        .collect();

    if inside.is_empty() {
        representative()
    } else {
        inside
    }
}

/// Lattice points of the global sampling grid within a bounding box.
#[derive(Debug, Clone, Copy)]
struct Lattice {
    step: f64,
    first_col: i64,
    cols: i64,
    first_row: i64,
    rows: i64,
}

impl Lattice {
    fn covering(region: &BoundingBox, step: f64) -> Self {
        let (first_col, cols) = index_span(region.min_lon + 180.0, region.max_lon + 180.0, step);
        let (first_row, rows) = index_span(90.0 - region.max_lat, 90.0 - region.min_lat, step);
        Self {
            step,
            first_col,
            cols,
            first_row,
            rows,
        }
    }

    fn count(&self) -> u64 {
        (self.cols.max(0) as u64).saturating_mul(self.rows.max(0) as u64)
    }

    fn lon(&self, i: i64) -> f64 {
        -180.0 + ((self.first_col + i) as f64 + 0.5) * self.step
    }

    fn lat(&self, j: i64) -> f64 {
        90.0 - ((self.first_row + j) as f64 + 0.5) * self.step
    }
}

/// First index and count of cell centers `(k + 0.5) * step` within `[lo, hi]`.
fn index_span(lo: f64, hi: f64, step: f64) -> (i64, i64) {
    let first = (lo / step - 0.5).ceil() as i64;
    let last = (hi / step - 0.5).floor() as i64;
    (first, (last - first + 1).max(0))
}
