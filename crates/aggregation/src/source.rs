//! Gridded dataset sources.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use climate_common::{ClimateError, ClimateResult, DateRange, GridDefinition};

use crate::image::{GriddedImage, GriddedTimeSeries};

/// Trait for sources of monthly gridded images.
#[async_trait]
pub trait GriddedDataSource: Send + Sync {
    /// Images of `dataset_id` whose timestamp lies in `range`, restricted to
    /// `bands`. Bands an image lacks are left out rather than failing, so the
    /// caller can report them per variable.
    async fn query(
        &self,
        dataset_id: &str,
        range: DateRange,
        bands: &[&str],
    ) -> ClimateResult<GriddedTimeSeries>;
}

/// On-disk dataset layout: one JSON document per dataset.
///
/// ```json
/// {
///   "grid": {"width": 2, "height": 1, "bbox": {"min_lon": 0, "min_lat": 0, "max_lon": 2, "max_lat": 1}},
///   "images": [
///     {"time": "1990-01-01", "bands": {"temperature_2m": [280.1, null]}}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetFile {
    pub grid: GridDefinition,
    pub images: Vec<ImageRecord>,
}

/// One monthly image; `null` samples are no-data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub time: NaiveDate,
    pub bands: BTreeMap<String, Vec<Option<f32>>>,
}

impl ImageRecord {
    fn into_image(self, grid: GridDefinition, bands: &[&str]) -> ClimateResult<GriddedImage> {
        let id = self
            .id
            .unwrap_or_else(|| self.time.format("%Y%m").to_string());
        let mut image = GriddedImage::new(id, Some(self.time), grid);
        for (name, samples) in self.bands {
            if !bands.contains(&name.as_str()) {
                continue;
            }
            let data: Vec<f32> = samples
                .into_iter()
                .map(|v| v.unwrap_or(f32::NAN))
                .collect();
            image = image.with_band(name, data)?;
        }
        Ok(image)
    }
}

/// Reads `<root>/<dataset_id>.json`.
#[derive(Debug, Clone)]
pub struct FileDatasetSource {
    root: PathBuf,
}

impl FileDatasetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dataset_path(&self, dataset_id: &str) -> PathBuf {
        // Catalog ids like "ECMWF/ERA5_LAND/MONTHLY_AGGR" map to one flat file
        self.root
            .join(format!("{}.json", dataset_id.replace('/', "_")))
    }
}

#[async_trait]
impl GriddedDataSource for FileDatasetSource {
    #[instrument(skip(self, bands), fields(root = %self.root.display()))]
    async fn query(
        &self,
        dataset_id: &str,
        range: DateRange,
        bands: &[&str],
    ) -> ClimateResult<GriddedTimeSeries> {
        let path = self.dataset_path(dataset_id);
        let content = tokio::fs::read(&path).await.map_err(|e| {
            ClimateError::Source(format!("failed to read {}: {}", path.display(), e))
        })?;
        let file: DatasetFile = serde_json::from_slice(&content).map_err(|e| {
            ClimateError::Source(format!("failed to parse {}: {}", path.display(), e))
        })?;

        let total = file.images.len();
        let grid = file.grid;
        let images = file
            .images
            .into_iter()
            .filter(|record| range.contains(&record.time))
            .map(|record| record.into_image(grid, bands))
            .collect::<ClimateResult<Vec<_>>>()?;

        info!(
            dataset = %dataset_id,
            images = images.len(),
            skipped = total - images.len(),
            bands = bands.len(),
            "Loaded dataset"
        );

        GriddedTimeSeries::new(dataset_id, range, grid, images)
    }
}

/// Datasets held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatasetSource {
    datasets: HashMap<String, (GridDefinition, Vec<GriddedImage>)>,
}

impl InMemoryDatasetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(
        mut self,
        dataset_id: impl Into<String>,
        grid: GridDefinition,
        images: Vec<GriddedImage>,
    ) -> Self {
        self.datasets.insert(dataset_id.into(), (grid, images));
        self
    }
}

#[async_trait]
impl GriddedDataSource for InMemoryDatasetSource {
    async fn query(
        &self,
        dataset_id: &str,
        range: DateRange,
        bands: &[&str],
    ) -> ClimateResult<GriddedTimeSeries> {
        let (grid, images) = self
            .datasets
            .get(dataset_id)
            .ok_or_else(|| ClimateError::Source(format!("unknown dataset '{}'", dataset_id)))?;

        let selected: Vec<GriddedImage> = images
            .iter()
            .filter(|image| image.time().is_some_and(|t| range.contains(&t)))
            .map(|image| image.restrict(bands))
            .collect();

        debug!(dataset = %dataset_id, images = selected.len(), "In-memory query");
        GriddedTimeSeries::new(dataset_id, range, *grid, selected)
    }
}
