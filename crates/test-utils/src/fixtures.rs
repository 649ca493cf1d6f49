//! Common test fixtures for climate aggregation tests.
//!
//! Fixtures are plain JSON documents in the formats read by the file-backed
//! dataset source and AOI asset store, so tests can write them to a temp
//! directory and go through the real loaders.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::{json, Value};

/// Common bounding boxes as `(min_lon, min_lat, max_lon, max_lat)`.
pub mod bbox {
    /// Global coverage
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// A 4x2 degree test domain
    pub const SMALL_DOMAIN: (f64, f64, f64, f64) = (10.0, 40.0, 14.0, 42.0);

    /// Far from `SMALL_DOMAIN`
    pub const DISJOINT: (f64, f64, f64, f64) = (-60.0, -30.0, -59.0, -29.0);
}

/// GeoJSON Polygon geometry for a rectangle.
pub fn rectangle_polygon(bbox: (f64, f64, f64, f64)) -> Value {
    let (min_lon, min_lat, max_lon, max_lat) = bbox;
    json!({
        "type": "Polygon",
        "coordinates": [[
            [min_lon, min_lat],
            [max_lon, min_lat],
            [max_lon, max_lat],
            [min_lon, max_lat],
            [min_lon, min_lat]
        ]]
    })
}

/// GeoJSON Feature wrapping a geometry.
pub fn feature(geometry: Value, name: &str) -> Value {
    json!({
        "type": "Feature",
        "properties": {"name": name},
        "geometry": geometry
    })
}

/// GeoJSON FeatureCollection of features.
pub fn feature_collection(features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features
    })
}

/// Write `<dir>/<asset_id>.geojson`, creating parent directories.
pub fn write_asset(dir: &Path, asset_id: &str, asset: &Value) -> std::io::Result<PathBuf> {
    let path = dir.join(format!("{}.geojson", asset_id));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, asset.to_string())?;
    Ok(path)
}

/// Builder for dataset documents read by the file-backed dataset source.
///
/// # Example
///
/// ```
/// use test_utils::DatasetDocument;
///
/// let doc = DatasetDocument::new(2, 1, (0.0, 0.0, 2.0, 1.0))
///     .image("1990-01-01".parse().unwrap(), &[("temperature_2m", vec![Some(280.0), None])]);
/// assert_eq!(doc.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DatasetDocument {
    width: usize,
    height: usize,
    bbox: (f64, f64, f64, f64),
    images: Vec<Value>,
}

impl DatasetDocument {
    pub fn new(width: usize, height: usize, bbox: (f64, f64, f64, f64)) -> Self {
        Self {
            width,
            height,
            bbox,
            images: Vec::new(),
        }
    }

    /// Number of grid cells per band.
    pub fn cells(&self) -> usize {
        self.width * self.height
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Add an image; `None` samples are written as `null`.
    pub fn image(mut self, time: NaiveDate, bands: &[(&str, Vec<Option<f32>>)]) -> Self {
        let bands: serde_json::Map<String, Value> = bands
            .iter()
            .map(|(name, values)| ((*name).to_string(), json!(values)))
            .collect();
        self.images.push(json!({
            "time": time.to_string(),
            "bands": bands
        }));
        self
    }

    /// Add an image whose bands are uniform across the grid.
    pub fn uniform_image(self, time: NaiveDate, bands: &[(&str, f32)]) -> Self {
        let cells = self.cells();
        let bands: Vec<(&str, Vec<Option<f32>>)> = bands
            .iter()
            .map(|&(name, value)| (name, vec![Some(value); cells]))
            .collect();
        self.image(time, &bands)
    }

    pub fn to_json(&self) -> Value {
        let (min_lon, min_lat, max_lon, max_lat) = self.bbox;
        json!({
            "grid": {
                "width": self.width,
                "height": self.height,
                "bbox": {
                    "min_lon": min_lon,
                    "min_lat": min_lat,
                    "max_lon": max_lon,
                    "max_lat": max_lat
                }
            },
            "images": self.images
        })
    }

    /// Write `<dir>/<dataset_id>.json`, with `/` in the id mapped to `_`.
    pub fn write(&self, dir: &Path, dataset_id: &str) -> std::io::Result<PathBuf> {
        let path = dir.join(format!("{}.json", dataset_id.replace('/', "_")));
        std::fs::write(&path, self.to_json().to_string())?;
        Ok(path)
    }
}
