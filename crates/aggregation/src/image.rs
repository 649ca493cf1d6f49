//! Gridded images and time series.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use climate_common::{CalendarField, ClimateError, ClimateResult, DateRange, GridDefinition, YearRange};

/// A set of named bands sampled on one grid, optionally tagged with the
/// month-start date it represents.
///
/// Samples are `f32` with `NaN` meaning no data. Band buffers are shared
/// and never mutated; transforms always build a new image.
#[derive(Debug, Clone)]
pub struct GriddedImage {
    id: String,
    time: Option<NaiveDate>,
    grid: GridDefinition,
    bands: BTreeMap<String, Arc<[f32]>>,
}

impl GriddedImage {
    /// Create an image with no bands.
    pub fn new(id: impl Into<String>, time: Option<NaiveDate>, grid: GridDefinition) -> Self {
        Self {
            id: id.into(),
            time,
            grid,
            bands: BTreeMap::new(),
        }
    }

    /// An image whose only band is entirely no-data.
    pub fn no_data(id: impl Into<String>, grid: GridDefinition, band: &str) -> Self {
        let data: Arc<[f32]> = vec![f32::NAN; grid.len()].into();
        let mut image = Self::new(id, None, grid);
        image.bands.insert(band.to_string(), data);
        image
    }

    /// Return a copy of this image with `band` added (or replaced).
    pub fn with_band(mut self, band: impl Into<String>, data: impl Into<Arc<[f32]>>) -> ClimateResult<Self> {
        let band = band.into();
        let data = data.into();
        if data.len() != self.grid.len() {
            return Err(ClimateError::Source(format!(
                "band '{}' of image {} has {} samples, grid has {}",
                band,
                self.id,
                data.len(),
                self.grid.len()
            )));
        }
        self.bands.insert(band, data);
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn time(&self) -> Option<NaiveDate> {
        self.time
    }

    pub fn grid(&self) -> &GridDefinition {
        &self.grid
    }

    pub fn has_band(&self, band: &str) -> bool {
        self.bands.contains_key(band)
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(String::as_str)
    }

    /// Samples of `band`, or `MissingBand`.
    pub fn band(&self, band: &str) -> ClimateResult<&[f32]> {
        self.bands
            .get(band)
            .map(|data| &**data)
            .ok_or_else(|| ClimateError::missing_band(band, self.id.as_str()))
    }

    /// Value of the calendar field of this image's timestamp.
    pub fn calendar_value(&self, field: CalendarField) -> Option<i32> {
        self.time.as_ref().map(|t| field.value_of(t))
    }

    /// Keep only the listed bands that this image carries.
    pub fn restrict(&self, bands: &[&str]) -> Self {
        Self {
            id: self.id.clone(),
            time: self.time,
            grid: self.grid,
            bands: self
                .bands
                .iter()
                .filter(|(name, _)| bands.contains(&name.as_str()))
                .map(|(name, data)| (name.clone(), Arc::clone(data)))
                .collect(),
        }
    }

    /// Nearest-cell value of `band` at a coordinate. `None` when outside the
    /// grid or no-data.
    pub fn value_at(&self, band: &str, lon: f64, lat: f64) -> ClimateResult<Option<f32>> {
        let data = self.band(band)?;
        Ok(self
            .grid
            .coords_to_cell(lon, lat)
            .and_then(|(col, row)| data.get(self.grid.flat_index(col, row)).copied())
            .filter(|v| !v.is_nan()))
    }
}

/// An ordered run of monthly images on a shared grid.
#[derive(Debug, Clone)]
pub struct GriddedTimeSeries {
    dataset_id: String,
    range: DateRange,
    grid: GridDefinition,
    images: Vec<GriddedImage>,
}

impl GriddedTimeSeries {
    /// Build a series, sorting images by timestamp.
    ///
    /// Every image must carry a timestamp inside `range` and share `grid`.
    pub fn new(
        dataset_id: impl Into<String>,
        range: DateRange,
        grid: GridDefinition,
        mut images: Vec<GriddedImage>,
    ) -> ClimateResult<Self> {
        let dataset_id = dataset_id.into();
        for image in &images {
            let time = image.time().ok_or_else(|| {
                ClimateError::Source(format!("image {} of {} has no timestamp", image.id(), dataset_id))
            })?;
            if !range.contains(&time) {
                return Err(ClimateError::Source(format!(
                    "image {} ({}) lies outside {}..{}",
                    image.id(),
                    time,
                    range.start,
                    range.end
                )));
            }
            if image.grid() != &grid {
                return Err(ClimateError::Source(format!(
                    "image {} does not share the grid of {}",
                    image.id(),
                    dataset_id
                )));
            }
        }
        images.sort_by_key(|image| image.time());

        Ok(Self {
            dataset_id,
            range,
            grid,
            images,
        })
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Calendar years spanned by the query range.
    pub fn years(&self) -> YearRange {
        self.range.year_range()
    }

    pub fn grid(&self) -> &GridDefinition {
        &self.grid
    }

    pub fn images(&self) -> &[GriddedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Images whose timestamp has `field == value`.
    pub fn filter_by_calendar_field(&self, field: CalendarField, value: i32) -> Self {
        Self {
            dataset_id: self.dataset_id.clone(),
            range: self.range,
            grid: self.grid,
            images: self
                .images
                .iter()
                .filter(|image| image.calendar_value(field) == Some(value))
                .cloned()
                .collect(),
        }
    }

    /// Apply a fallible per-image transform.
    pub fn try_map<F>(&self, f: F) -> ClimateResult<Self>
    where
        F: Fn(&GriddedImage) -> ClimateResult<GriddedImage>,
    {
        let images = self.images.iter().map(f).collect::<ClimateResult<Vec<_>>>()?;
        Self::new(self.dataset_id.clone(), self.range, self.grid, images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climate_common::BoundingBox;

    fn grid() -> GridDefinition {
        GridDefinition::new(2, 2, BoundingBox::new(0.0, 0.0, 2.0, 2.0))
    }

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn image(y: i32, m: u32, v: f32) -> GriddedImage {
        GriddedImage::new(format!("{}{:02}", y, m), Some(date(y, m)), grid())
            .with_band("t", vec![v; 4])
            .unwrap()
    }

    #[test]
    fn test_with_band_checks_length() {
        let err = GriddedImage::new("x", None, grid())
            .with_band("t", vec![1.0; 3])
            .unwrap_err();
        assert!(matches!(err, ClimateError::Source(_)));
    }

    #[test]
    fn test_missing_band_names_band() {
        let img = image(2000, 1, 1.0);
        match img.band("precip") {
            Err(ClimateError::MissingBand { band, image }) => {
                assert_eq!(band, "precip");
                assert_eq!(image, "200001");
            }
            other => panic!("Expected MissingBand, got {:?}", other),
        }
    }

    #[test]
    fn test_restrict_keeps_present_bands() {
        let img = image(2000, 1, 1.0).with_band("p", vec![0.0; 4]).unwrap();
        let restricted = img.restrict(&["p", "absent"]);
        assert_eq!(restricted.band_names().collect::<Vec<_>>(), vec!["p"]);
        assert_eq!(restricted.time(), img.time());
    }

    #[test]
    fn test_value_at() {
        let img = GriddedImage::new("a", None, grid())
            .with_band("t", vec![1.0, 2.0, 3.0, f32::NAN])
            .unwrap();
        assert_eq!(img.value_at("t", 0.5, 1.5).unwrap(), Some(1.0));
        assert_eq!(img.value_at("t", 1.5, 1.5).unwrap(), Some(2.0));
        assert_eq!(img.value_at("t", 0.5, 0.5).unwrap(), Some(3.0));
        assert_eq!(img.value_at("t", 1.5, 0.5).unwrap(), None);
        assert_eq!(img.value_at("t", 5.0, 5.0).unwrap(), None);
    }

    #[test]
    fn test_series_sorted_and_filtered() {
        let range = DateRange::new(date(2000, 1), date(2001, 12));
        let series = GriddedTimeSeries::new(
            "ds",
            range,
            grid(),
            vec![image(2001, 3, 3.0), image(2000, 3, 1.0), image(2000, 4, 2.0)],
        )
        .unwrap();

        assert_eq!(series.images()[0].id(), "200003");
        assert_eq!(series.filter_by_calendar_field(CalendarField::Month, 3).len(), 2);
        assert_eq!(series.filter_by_calendar_field(CalendarField::Year, 2000).len(), 2);
        assert!(series.filter_by_calendar_field(CalendarField::Month, 7).is_empty());
        assert_eq!(series.years(), YearRange::new(2000, 2001));
    }

    #[test]
    fn test_series_rejects_foreign_grid() {
        let other = GriddedImage::new("b", Some(date(2000, 1)), GridDefinition::new(1, 1, BoundingBox::default()));
        let range = DateRange::new(date(2000, 1), date(2000, 12));
        assert!(GriddedTimeSeries::new("ds", range, grid(), vec![other]).is_err());
    }
}
