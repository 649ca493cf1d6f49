//! Conversion from raw dataset units to analysis units.

use serde::{Deserialize, Serialize};

use climate_common::ClimateResult;

use crate::image::GriddedImage;
use crate::variable::Variable;

const KELVIN_OFFSET: f32 = 273.15;
const MILLIMETERS_PER_METER: f32 = 1000.0;

/// Per-sample unit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversion {
    /// Water depth in meters to millimeters
    MetersToMillimeters,
    /// Kelvin to degrees Celsius
    KelvinToCelsius,
    /// Values unchanged, band renamed only
    Rename,
}

impl Conversion {
    pub fn apply(&self, value: f32) -> f32 {
        match self {
            Conversion::MetersToMillimeters => value * MILLIMETERS_PER_METER,
            Conversion::KelvinToCelsius => value - KELVIN_OFFSET,
            Conversion::Rename => value,
        }
    }
}

/// One raw band to analysis band mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandConversion {
    pub source: String,
    pub target: String,
    pub conversion: Conversion,
}

impl BandConversion {
    pub fn for_variable(variable: Variable) -> Self {
        Self {
            source: variable.raw_band().to_string(),
            target: variable.band().to_string(),
            conversion: variable.conversion(),
        }
    }
}

/// Pure per-image transform producing renamed, unit-corrected bands.
#[derive(Debug, Clone, Default)]
pub struct UnitConverter {
    conversions: Vec<BandConversion>,
}

impl UnitConverter {
    pub fn new(conversions: Vec<BandConversion>) -> Self {
        Self { conversions }
    }

    /// Converter for a set of variables.
    pub fn for_variables(variables: &[Variable]) -> Self {
        Self::new(variables.iter().copied().map(BandConversion::for_variable).collect())
    }

    /// Produce an image holding only the converted bands, with the source
    /// image's id and timestamp. Fails with `MissingBand` if any source band
    /// is absent.
    pub fn convert(&self, image: &GriddedImage) -> ClimateResult<GriddedImage> {
        let mut out = GriddedImage::new(image.id(), image.time(), *image.grid());
        for bc in &self.conversions {
            let data: Vec<f32> = image
                .band(&bc.source)?
                .iter()
                .map(|&v| if v.is_nan() { v } else { bc.conversion.apply(v) })
                .collect();
            out = out.with_band(bc.target.as_str(), data)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use climate_common::{BoundingBox, ClimateError, GridDefinition};

    fn raw_image() -> GriddedImage {
        let grid = GridDefinition::new(1, 1, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        GriddedImage::new("199003", NaiveDate::from_ymd_opt(1990, 3, 1), grid)
            .with_band("total_precipitation_sum", vec![0.001])
            .unwrap()
            .with_band("temperature_2m", vec![273.15])
            .unwrap()
            .with_band("u_component_of_wind_10m", vec![-3.5])
            .unwrap()
    }

    #[test]
    fn test_precipitation_and_temperature() {
        let converter = UnitConverter::for_variables(&[
            Variable::Precipitation,
            Variable::MeanTemperature,
            Variable::WindU,
        ]);
        let out = converter.convert(&raw_image()).unwrap();

        assert!((out.band("precipitation_mm").unwrap()[0] - 1.0).abs() < 1e-6);
        assert!(out.band("tmean_c").unwrap()[0].abs() < 1e-4);
        assert_eq!(out.band("wind_u_ms").unwrap()[0], -3.5);
        assert!(!out.has_band("total_precipitation_sum"));
    }

    #[test]
    fn test_timestamp_preserved() {
        let converter = UnitConverter::for_variables(&[Variable::Precipitation]);
        let out = converter.convert(&raw_image()).unwrap();
        assert_eq!(out.time(), NaiveDate::from_ymd_opt(1990, 3, 1));
        assert_eq!(out.id(), "199003");
    }

    #[test]
    fn test_missing_source_band() {
        let converter = UnitConverter::for_variables(&[Variable::MaxTemperature]);
        match converter.convert(&raw_image()) {
            Err(ClimateError::MissingBand { band, .. }) => assert_eq!(band, "temperature_2m_max"),
            other => panic!("Expected MissingBand, got {:?}", other),
        }
    }
}
