//! Raster export planning and the export sink.
//!
//! The planner only describes jobs. Submission goes through an
//! [`ExportSink`], which hands back a task handle and is not tracked further.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use climate_common::{BoundingBox, ClimateError, ClimateResult, GridDefinition, YearRange};

use crate::aoi::AoiGeometry;
use crate::climatology::MonthlyClimatology;
use crate::image::GriddedImage;
use crate::reducer::Metric;
use crate::spatial::METERS_PER_DEGREE;

/// Build the export file identifier, e.g. `ERA5_TPmm_mean_1990-2020_M03`.
///
/// Downstream tooling matches on this name, so the format is fixed.
pub fn export_file_id(var_label: &str, metric: Metric, start_year: i32, end_year: i32, month: u32) -> String {
    format!(
        "ERA5_{}_{}_{}-{}_M{:02}",
        var_label, metric, start_year, end_year, month
    )
}

/// Description of one monthly raster export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub file_id: String,
    pub band: String,
    pub month: u32,
    pub region: AoiGeometry,
    /// Output pixel size in meters
    pub resolution: f64,
    pub description: String,
    /// Destination folder name, passed through untouched
    pub folder: String,
}

/// Enumerates the twelve per-month export jobs of a climatology.
#[derive(Debug, Clone)]
pub struct RasterExportPlanner {
    folder: String,
}

impl RasterExportPlanner {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn plan(
        &self,
        climatology: &MonthlyClimatology,
        band: &str,
        var_label: &str,
        aoi: &AoiGeometry,
        metric: Metric,
        start_year: i32,
        end_year: i32,
        resolution: f64,
    ) -> Vec<ExportJob> {
        let years = YearRange::new(start_year, end_year);
        climatology
            .iter()
            .map(|composite| {
                let file_id = export_file_id(var_label, metric, start_year, end_year, composite.month);
                ExportJob {
                    description: format!(
                        "{} {} climatology for month {:02} ({})",
                        var_label, metric, composite.month, years
                    ),
                    file_id,
                    band: band.to_string(),
                    month: composite.month,
                    region: aoi.clone(),
                    resolution,
                    folder: self.folder.clone(),
                }
            })
            .collect()
    }
}

/// Reference to a submitted export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: Uuid,
    pub file_id: String,
}

/// Accepts export jobs with the image to export.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn submit(&self, job: &ExportJob, image: &GriddedImage) -> ClimateResult<TaskHandle>;
}

/// Metadata written next to each exported raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub task_id: Uuid,
    pub job: ExportJob,
    /// Grid of the `.f32` raster
    pub grid: GridDefinition,
    pub no_data: String,
}

/// Writes `<root>/<folder>/<file_id>.f32` (little-endian `f32`, row-major
/// from the north-west corner, `NaN` for no data) and a JSON manifest.
#[derive(Debug, Clone)]
pub struct LocalExportSink {
    root: PathBuf,
    max_pixels: u64,
}

impl LocalExportSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_pixels: 100_000_000,
        }
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// Output grid over the part of the AOI covered by the image.
    fn output_grid(&self, job: &ExportJob, image: &GriddedImage) -> ClimateResult<GridDefinition> {
        if !(job.resolution.is_finite() && job.resolution > 0.0) {
            return Err(ClimateError::invalid_config(
                "export_resolution",
                format!("must be positive, got {}", job.resolution),
            ));
        }

        let extent = job
            .region
            .bbox()
            .intersection(&image.grid().bbox)
            .ok_or_else(|| {
                ClimateError::Export(format!("{}: region does not overlap the image", job.file_id))
            })?;

        let step = job.resolution / METERS_PER_DEGREE;
        let width = ((extent.width() / step).ceil() as usize).max(1);
        let height = ((extent.height() / step).ceil() as usize).max(1);
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(ClimateError::TooManyPixels {
                pixels,
                max_pixels: self.max_pixels,
            });
        }

        let bbox = BoundingBox::new(
            extent.min_lon,
            extent.max_lat - height as f64 * step,
            extent.min_lon + width as f64 * step,
            extent.max_lat,
        );
        Ok(GridDefinition::new(width, height, bbox))
    }

    /// Nearest-neighbour resample clipped to the AOI polygons.
    fn render(job: &ExportJob, image: &GriddedImage, grid: &GridDefinition) -> ClimateResult<Vec<u8>> {
        let source = image.band(&job.band)?;
        let src_grid = image.grid();

        let mut bytes = Vec::with_capacity(grid.len() * 4);
        for row in 0..grid.height {
            for col in 0..grid.width {
                let (lon, lat) = grid.cell_to_coords(col, row);
                let value = if job.region.contains(lon, lat) {
                    src_grid
                        .coords_to_cell(lon, lat)
                        .and_then(|(c, r)| source.get(src_grid.flat_index(c, r)).copied())
                        .unwrap_or(f32::NAN)
                } else {
                    f32::NAN
                };
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        Ok(bytes)
    }
}

#[async_trait]
impl ExportSink for LocalExportSink {
    async fn submit(&self, job: &ExportJob, image: &GriddedImage) -> ClimateResult<TaskHandle> {
        let grid = self.output_grid(job, image)?;
        let raster = Self::render(job, image, &grid)?;

        let dir = self.root.join(&job.folder);
        tokio::fs::create_dir_all(&dir).await?;

        let task_id = Uuid::new_v4();
        let manifest = ExportManifest {
            task_id,
            job: job.clone(),
            grid,
            no_data: "NaN".to_string(),
        };

        tokio::fs::write(dir.join(format!("{}.f32", job.file_id)), raster).await?;
        tokio::fs::write(
            dir.join(format!("{}.json", job.file_id)),
            serde_json::to_vec_pretty(&manifest)?,
        )
        .await?;

        debug!(
            file_id = %job.file_id,
            width = grid.width,
            height = grid.height,
            "Wrote export raster"
        );

        Ok(TaskHandle {
            id: task_id,
            file_id: job.file_id.clone(),
        })
    }
}

/// Submit every job, pairing each with its month's composite.
///
/// Jobs whose region does not overlap the composite have nothing to export
/// and are skipped, leaving `None` in their slot.
pub async fn submit_all(
    sink: &dyn ExportSink,
    jobs: &[ExportJob],
    climatology: &MonthlyClimatology,
) -> ClimateResult<Vec<Option<TaskHandle>>> {
    let mut handles = Vec::with_capacity(jobs.len());
    for job in jobs {
        let composite = climatology.get(job.month).ok_or_else(|| {
            ClimateError::Export(format!("no composite for month {} of {}", job.month, job.file_id))
        })?;
        if !job.region.bbox().intersects(&composite.image.grid().bbox) {
            warn!(
                file_id = %job.file_id,
                "Export region lies outside image coverage, skipping"
            );
            handles.push(None);
            continue;
        }
        handles.push(Some(sink.submit(job, &composite.image).await?));
    }
    info!(
        band = %climatology.band(),
        submitted = handles.iter().flatten().count(),
        skipped = handles.iter().filter(|h| h.is_none()).count(),
        "Submitted export jobs"
    );
    Ok(handles)
}
