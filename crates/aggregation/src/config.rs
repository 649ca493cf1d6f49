//! Configuration for an aggregation run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use climate_common::{ClimateError, ClimateResult, DateRange, YearRange};

use crate::reducer::Metric;
use crate::variable::Variable;

/// Configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset identifier passed to the data source.
    pub dataset_id: String,

    /// Directory holding dataset files.
    pub data_dir: PathBuf,

    /// Directory holding AOI assets.
    pub asset_dir: PathBuf,

    /// AOI asset identifier.
    pub aoi_asset: String,

    /// First year of the analysis period (inclusive).
    pub start_year: i32,

    /// Last year of the analysis period (inclusive).
    pub end_year: i32,

    /// Central-tendency metric for monthly climatologies.
    pub metric: Metric,

    /// Output pixel size of exported rasters, in meters.
    pub export_resolution: f64,

    /// Sampling scale for chart statistics, in meters.
    pub stats_resolution: f64,

    /// Cap on pixels per spatial reduction.
    pub max_pixels: u64,

    /// Coarsen instead of failing when a reduction exceeds `max_pixels`.
    pub best_effort: bool,

    /// Export destination folder name. Not interpreted.
    pub export_folder: String,

    /// Where reports and exports are written.
    pub output_dir: PathBuf,

    /// Variables to process, in report order.
    pub variables: Vec<Variable>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_id: "ECMWF/ERA5_LAND/MONTHLY_AGGR".to_string(),
            data_dir: PathBuf::from("data"),
            asset_dir: PathBuf::from("assets"),
            aoi_asset: String::new(),
            start_year: 1991,
            end_year: 2020,
            metric: Metric::Mean,
            export_resolution: 10_000.0,
            stats_resolution: 10_000.0,
            max_pixels: 10_000_000_000_000,
            best_effort: true,
            export_folder: "climate_exports".to_string(),
            output_dir: PathBuf::from("output"),
            variables: vec![
                Variable::Precipitation,
                Variable::MeanTemperature,
                Variable::MinTemperature,
                Variable::MaxTemperature,
            ],
        }
    }
}

impl PipelineConfig {
    /// Parse YAML. Missing keys take their defaults.
    pub fn from_yaml_str(content: &str) -> ClimateResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ClimateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClimateError::Io(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply overrides from environment variables.
    pub fn apply_env(&mut self) -> ClimateResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// Recognized keys: `CLIMATE_AOI_ASSET`, `CLIMATE_START_YEAR`,
    /// `CLIMATE_END_YEAR`, `CLIMATE_METRIC`, `CLIMATE_EXPORT_RESOLUTION`,
    /// `CLIMATE_EXPORT_FOLDER`. Unparseable values are an error naming the
    /// parameter.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ClimateResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("CLIMATE_AOI_ASSET") {
            self.aoi_asset = val;
        }

        if let Some(val) = lookup("CLIMATE_START_YEAR") {
            self.start_year = parse_param("start_year", &val)?;
        }

        if let Some(val) = lookup("CLIMATE_END_YEAR") {
            self.end_year = parse_param("end_year", &val)?;
        }

        if let Some(val) = lookup("CLIMATE_METRIC") {
            self.metric = val.parse()?;
        }

        if let Some(val) = lookup("CLIMATE_EXPORT_RESOLUTION") {
            self.export_resolution = parse_param("export_resolution", &val)?;
        }

        if let Some(val) = lookup("CLIMATE_EXPORT_FOLDER") {
            self.export_folder = val;
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ClimateResult<()> {
        if self.aoi_asset.trim().is_empty() {
            return Err(ClimateError::invalid_config("aoi_asset", "must not be empty"));
        }

        if self.dataset_id.trim().is_empty() {
            return Err(ClimateError::invalid_config("dataset_id", "must not be empty"));
        }

        if self.start_year > self.end_year {
            return Err(ClimateError::invalid_config(
                "start_year",
                format!("{} is after end_year {}", self.start_year, self.end_year),
            ));
        }

        if self.date_range().is_none() {
            return Err(ClimateError::invalid_config(
                "start_year",
                format!("{}-{} is not a valid calendar range", self.start_year, self.end_year),
            ));
        }

        for (param, value) in [
            ("export_resolution", self.export_resolution),
            ("stats_resolution", self.stats_resolution),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ClimateError::invalid_config(
                    param,
                    format!("must be a positive number of meters, got {}", value),
                ));
            }
        }

        if self.max_pixels == 0 {
            return Err(ClimateError::invalid_config("max_pixels", "must be > 0"));
        }

        if self.variables.is_empty() {
            return Err(ClimateError::invalid_config("variables", "at least one variable is required"));
        }

        Ok(())
    }

    pub fn years(&self) -> YearRange {
        YearRange::new(self.start_year, self.end_year)
    }

    /// January 1st of `start_year` through December 31st of `end_year`.
    pub fn date_range(&self) -> Option<DateRange> {
        self.years().date_range()
    }
}

fn parse_param<T>(param: &str, value: &str) -> ClimateResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ClimateError::invalid_config(param, format!("'{}': {}", value, e)))
}
