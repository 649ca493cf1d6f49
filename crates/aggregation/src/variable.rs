//! Analysis variables derived from the ERA5 monthly bands.

use serde::{Deserialize, Serialize};

use climate_common::{ClimateError, Palette, VisParams};

use crate::reducer::AnnualMethod;
use crate::units::Conversion;

/// A climate variable the pipeline reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    Precipitation,
    MeanTemperature,
    MinTemperature,
    MaxTemperature,
    WindU,
    WindV,
}

impl Variable {
    /// Every variable, in reporting order.
    pub fn all() -> &'static [Variable] {
        &[
            Variable::Precipitation,
            Variable::MeanTemperature,
            Variable::MinTemperature,
            Variable::MaxTemperature,
            Variable::WindU,
            Variable::WindV,
        ]
    }

    /// Band name in the raw dataset.
    pub fn raw_band(&self) -> &'static str {
        match self {
            Variable::Precipitation => "total_precipitation_sum",
            Variable::MeanTemperature => "temperature_2m",
            Variable::MinTemperature => "temperature_2m_min",
            Variable::MaxTemperature => "temperature_2m_max",
            Variable::WindU => "u_component_of_wind_10m",
            Variable::WindV => "v_component_of_wind_10m",
        }
    }

    /// Band name after unit conversion.
    pub fn band(&self) -> &'static str {
        match self {
            Variable::Precipitation => "precipitation_mm",
            Variable::MeanTemperature => "tmean_c",
            Variable::MinTemperature => "tmin_c",
            Variable::MaxTemperature => "tmax_c",
            Variable::WindU => "wind_u_ms",
            Variable::WindV => "wind_v_ms",
        }
    }

    /// Short label used in export file names.
    pub fn label(&self) -> &'static str {
        match self {
            Variable::Precipitation => "TPmm",
            Variable::MeanTemperature => "T2mC",
            Variable::MinTemperature => "TminC",
            Variable::MaxTemperature => "TmaxC",
            Variable::WindU => "U10",
            Variable::WindV => "V10",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Variable::Precipitation => "mm",
            Variable::MeanTemperature | Variable::MinTemperature | Variable::MaxTemperature => {
                "°C"
            }
            Variable::WindU | Variable::WindV => "m/s",
        }
    }

    /// Annual aggregation: totals for precipitation, averages otherwise.
    pub fn annual_method(&self) -> AnnualMethod {
        match self {
            Variable::Precipitation => AnnualMethod::Sum,
            _ => AnnualMethod::Mean,
        }
    }

    pub fn conversion(&self) -> Conversion {
        match self {
            Variable::Precipitation => Conversion::MetersToMillimeters,
            Variable::MeanTemperature | Variable::MinTemperature | Variable::MaxTemperature => {
                Conversion::KelvinToCelsius
            }
            Variable::WindU | Variable::WindV => Conversion::Rename,
        }
    }

    /// Fixed map styling for monthly composites.
    pub fn vis_params(&self) -> VisParams {
        match self {
            Variable::Precipitation => VisParams::new(0.0, 300.0, Palette::precipitation()),
            Variable::MeanTemperature => VisParams::new(-20.0, 35.0, Palette::temperature()),
            Variable::MinTemperature => VisParams::new(-30.0, 25.0, Palette::temperature()),
            Variable::MaxTemperature => VisParams::new(-10.0, 45.0, Palette::temperature()),
            Variable::WindU | Variable::WindV => {
                VisParams::new(-10.0, 10.0, Palette::wind_component())
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::Precipitation => "precipitation",
            Variable::MeanTemperature => "mean_temperature",
            Variable::MinTemperature => "min_temperature",
            Variable::MaxTemperature => "max_temperature",
            Variable::WindU => "wind_u",
            Variable::WindV => "wind_v",
        }
    }
}

impl std::str::FromStr for Variable {
    type Err = ClimateError;

    /// Accepts the snake_case name or the export label, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Variable::all()
            .iter()
            .copied()
            .find(|v| v.as_str() == needle || v.label().to_lowercase() == needle)
            .ok_or_else(|| {
                ClimateError::invalid_config("variables", format!("unknown variable '{}'", s))
            })
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_by_name_and_label() {
        assert_eq!("precipitation".parse::<Variable>().unwrap(), Variable::Precipitation);
        assert_eq!("TPmm".parse::<Variable>().unwrap(), Variable::Precipitation);
        assert_eq!("t2mc".parse::<Variable>().unwrap(), Variable::MeanTemperature);
        assert_eq!("Wind_U".parse::<Variable>().unwrap(), Variable::WindU);
        assert!("humidity".parse::<Variable>().is_err());
    }

    #[test]
    fn test_annual_methods() {
        assert_eq!(Variable::Precipitation.annual_method(), AnnualMethod::Sum);
        for v in &Variable::all()[1..] {
            assert_eq!(v.annual_method(), AnnualMethod::Mean, "{}", v);
        }
    }

    #[test]
    fn test_bands_and_labels_unique() {
        let mut bands: Vec<_> = Variable::all().iter().map(|v| v.band()).collect();
        let mut labels: Vec<_> = Variable::all().iter().map(|v| v.label()).collect();
        bands.sort();
        bands.dedup();
        labels.sort();
        labels.dedup();
        assert_eq!(bands.len(), Variable::all().len());
        assert_eq!(labels.len(), Variable::all().len());
    }

    #[test]
    fn test_vis_params_valid() {
        for v in Variable::all() {
            assert!(v.vis_params().validate().is_ok(), "{}", v);
        }
    }
}
