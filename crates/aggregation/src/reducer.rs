//! Pixel-wise temporal reducers and calendar grouping.
//!
//! All reducers skip no-data (`NaN`) samples. A pixel with no valid sample in
//! any input image stays no-data in the output, including for `Sum`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use climate_common::{CalendarField, ClimateError, ClimateResult};

use crate::image::{GriddedImage, GriddedTimeSeries};

/// Temporal reduction applied pixel by pixel across a stack of images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Mean,
    Median,
    Sum,
}

impl Reducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Sum => "sum",
        }
    }

    /// Reduce one pixel's valid samples. `values` may be reordered.
    pub(crate) fn apply(&self, values: &mut [f32]) -> f32 {
        if values.is_empty() {
            return f32::NAN;
        }
        match self {
            Self::Sum => values.iter().map(|&v| v as f64).sum::<f64>() as f32,
            Self::Mean => {
                (values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64) as f32
            }
            Self::Median => {
                values.sort_by(|a, b| a.total_cmp(b));
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    ((values[mid - 1] as f64 + values[mid] as f64) / 2.0) as f32
                } else {
                    values[mid]
                }
            }
        }
    }

    /// Reduce equally sized sample buffers into one.
    pub fn reduce_pixels(&self, stack: &[&[f32]], len: usize) -> Vec<f32> {
        (0..len)
            .into_par_iter()
            .map_init(
                || Vec::with_capacity(stack.len()),
                |valid, idx| {
                    valid.clear();
                    valid.extend(
                        stack
                            .iter()
                            .filter_map(|band| band.get(idx).copied())
                            .filter(|v| !v.is_nan()),
                    );
                    self.apply(valid)
                },
            )
            .collect()
    }
}

impl std::fmt::Display for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Central-tendency metric for climatologies, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Mean,
    Median,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            other => Err(ClimateError::invalid_config(
                "metric",
                format!("expected 'mean' or 'median', got '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Metric> for Reducer {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Mean => Reducer::Mean,
            Metric::Median => Reducer::Median,
        }
    }
}

/// How a year's monthly images collapse into one annual image.
///
/// `Sum` suits flux quantities (precipitation totals), `Mean` suits state
/// quantities (temperatures, wind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnualMethod {
    Sum,
    Mean,
}

impl From<AnnualMethod> for Reducer {
    fn from(method: AnnualMethod) -> Self {
        match method {
            AnnualMethod::Sum => Reducer::Sum,
            AnnualMethod::Mean => Reducer::Mean,
        }
    }
}

impl std::fmt::Display for AnnualMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Reducer::from(*self))
    }
}

/// Reduce `band` across every image of a series into a single image.
///
/// An empty series yields a no-data image on the series grid.
pub fn reduce_series(
    series: &GriddedTimeSeries,
    band: &str,
    reducer: Reducer,
    id: impl Into<String>,
) -> ClimateResult<GriddedImage> {
    let id = id.into();
    let grid = *series.grid();
    if series.is_empty() {
        return Ok(GriddedImage::no_data(id, grid, band));
    }

    let stack = series
        .images()
        .iter()
        .map(|image| image.band(band))
        .collect::<ClimateResult<Vec<_>>>()?;

    let data = reducer.reduce_pixels(&stack, grid.len());
    GriddedImage::new(id, None, grid).with_band(band, data)
}

/// One calendar group reduced to a composite.
#[derive(Debug, Clone)]
pub struct CalendarGroup {
    /// Calendar field value (month 1-12 or year)
    pub value: i32,
    /// Number of source images in the group
    pub image_count: usize,
    /// Reduced image, all no-data when `image_count == 0`
    pub composite: GriddedImage,
}

impl CalendarGroup {
    pub fn is_empty(&self) -> bool {
        self.image_count == 0
    }
}

/// Group a series by a calendar field and reduce each group.
///
/// Groups are returned in the order of `values`. Groups without source
/// images are logged and yield a no-data composite rather than an error.
pub fn reduce_by_calendar_field(
    series: &GriddedTimeSeries,
    field: CalendarField,
    values: &[i32],
    band: &str,
    reducer: Reducer,
) -> ClimateResult<Vec<CalendarGroup>> {
    values
        .iter()
        .map(|&value| {
            let group = series.filter_by_calendar_field(field, value);
            let id = format!("{}_{}{:02}_{}", band, field, value, reducer);

            if group.is_empty() {
                warn!(
                    dataset = %series.dataset_id(),
                    band = %band,
                    field = %field,
                    value,
                    "Empty calendar group, emitting no-data composite"
                );
            } else {
                debug!(
                    band = %band,
                    field = %field,
                    value,
                    images = group.len(),
                    reducer = %reducer,
                    "Reducing calendar group"
                );
            }

            Ok(CalendarGroup {
                value,
                image_count: group.len(),
                composite: reduce_series(&group, band, reducer, id)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use climate_common::{BoundingBox, DateRange, GridDefinition};

    fn grid() -> GridDefinition {
        GridDefinition::new(2, 1, BoundingBox::new(0.0, 0.0, 2.0, 1.0))
    }

    fn series(values: &[(i32, u32, [f32; 2])]) -> GriddedTimeSeries {
        let images = values
            .iter()
            .map(|&(y, m, v)| {
                GriddedImage::new(
                    format!("{}{:02}", y, m),
                    NaiveDate::from_ymd_opt(y, m, 1),
                    grid(),
                )
                .with_band("b", v.to_vec())
                .unwrap()
            })
            .collect();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2002, 12, 31).unwrap(),
        );
        GriddedTimeSeries::new("test", range, grid(), images).unwrap()
    }

    #[test]
    fn test_reducers_skip_nan() {
        let a = [1.0, f32::NAN];
        let b = [3.0, f32::NAN];
        let c = [8.0, f32::NAN];
        let stack: Vec<&[f32]> = vec![&a[..], &b[..], &c[..]];

        let mean = Reducer::Mean.reduce_pixels(&stack, 2);
        assert_eq!(mean[0], 4.0);
        assert!(mean[1].is_nan());

        let sum = Reducer::Sum.reduce_pixels(&stack, 2);
        assert_eq!(sum[0], 12.0);
        assert!(sum[1].is_nan());

        let median = Reducer::Median.reduce_pixels(&stack, 2);
        assert_eq!(median[0], 3.0);
    }

    #[test]
    fn test_median_even_count() {
        let a = [1.0];
        let b = [10.0];
        let c = [2.0];
        let d = [4.0];
        let stack: Vec<&[f32]> = vec![&a[..], &b[..], &c[..], &d[..]];
        assert_eq!(Reducer::Median.reduce_pixels(&stack, 1), vec![3.0]);
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("Median".parse::<Metric>().unwrap(), Metric::Median);
        assert_eq!(" mean ".parse::<Metric>().unwrap(), Metric::Mean);
        assert!("sum".parse::<Metric>().is_err());
        assert_eq!(Reducer::from(Metric::Median), Reducer::Median);
        assert_eq!(AnnualMethod::Sum.to_string(), "sum");
    }

    #[test]
    fn test_reduce_by_month_groups_across_years() {
        let s = series(&[
            (2000, 1, [1.0, 2.0]),
            (2001, 1, [3.0, 4.0]),
            (2000, 2, [10.0, 10.0]),
        ]);
        let groups =
            reduce_by_calendar_field(&s, CalendarField::Month, &[1, 2, 3], "b", Reducer::Mean)
                .unwrap();

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].value, 1);
        assert_eq!(groups[0].image_count, 2);
        assert_eq!(groups[0].composite.band("b").unwrap(), &[2.0, 3.0]);
        assert_eq!(groups[1].composite.band("b").unwrap(), &[10.0, 10.0]);

        assert!(groups[2].is_empty());
        assert!(groups[2].composite.band("b").unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_reduce_missing_band_fails() {
        let s = series(&[(2000, 1, [1.0, 2.0])]);
        let err = reduce_by_calendar_field(&s, CalendarField::Year, &[2000], "x", Reducer::Sum)
            .unwrap_err();
        assert!(matches!(err, ClimateError::MissingBand { .. }));
    }
}
