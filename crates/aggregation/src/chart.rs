//! Chart-ready tables: monthly climatology rows and the annual series with
//! its linear trend.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use climate_common::{month_label, ClimateResult};

use crate::annual::AnnualRecord;
use crate::aoi::AoiGeometry;
use crate::climatology::MonthlyClimatology;
use crate::spatial::{ReductionParams, SpatialReducer};

/// One row of the monthly chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRow {
    pub month: u32,
    /// Jan..Dec
    pub label: String,
    pub value: Option<f64>,
}

/// Least-squares line `value = slope * year + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trendline {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl Trendline {
    /// Fit over the non-null records.
    ///
    /// With fewer than two points the line is flat through the only value
    /// (or zero) and `r_squared` is 0. A constant series also has
    /// `r_squared` 0.
    pub fn fit(records: &[AnnualRecord]) -> Self {
        let points: Vec<(f64, f64)> = records
            .iter()
            .filter_map(|r| r.value.map(|v| (r.year as f64, v)))
            .filter(|(_, v)| v.is_finite())
            .collect();

        let n = points.len() as f64;
        if points.len() < 2 {
            return Self {
                slope: 0.0,
                intercept: points.first().map(|&(_, y)| y).unwrap_or(0.0),
                r_squared: 0.0,
            };
        }

        let mean_x = points.iter().map(|&(x, _)| x).sum::<f64>() / n;
        let mean_y = points.iter().map(|&(_, y)| y).sum::<f64>() / n;

        let (sxx, sxy, ss_tot) = points.iter().fold((0.0, 0.0, 0.0), |(sxx, sxy, sst), &(x, y)| {
            let dx = x - mean_x;
            let dy = y - mean_y;
            (sxx + dx * dx, sxy + dx * dy, sst + dy * dy)
        });

        if sxx == 0.0 {
            return Self {
                slope: 0.0,
                intercept: mean_y,
                r_squared: 0.0,
            };
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        // Residuals in centered form to avoid cancellation against the intercept
        let ss_res: f64 = points
            .iter()
            .map(|&(x, y)| {
                let r = (y - mean_y) - slope * (x - mean_x);
                r * r
            })
            .sum();

        let r_squared = if ss_tot == 0.0 {
            0.0
        } else {
            (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
        };

        Self {
            slope,
            intercept,
            r_squared,
        }
    }

    /// Value of the line at `year`.
    pub fn predict(&self, year: i32) -> f64 {
        self.slope * year as f64 + self.intercept
    }
}

/// Annual series handed to the chart consumer unchanged, plus its trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualChart {
    pub records: Vec<AnnualRecord>,
    pub trend: Trendline,
}

/// Produces chart tables by reducing composites over the AOI.
pub struct ChartTableBuilder<'a> {
    reducer: &'a dyn SpatialReducer,
    best_effort: bool,
    max_pixels: u64,
}

impl<'a> ChartTableBuilder<'a> {
    pub fn new(reducer: &'a dyn SpatialReducer, best_effort: bool, max_pixels: u64) -> Self {
        Self {
            reducer,
            best_effort,
            max_pixels,
        }
    }

    /// Twelve rows, one per month, each the areal mean of that month's
    /// composite at `resolution` meters. Empty months are `None`.
    pub async fn monthly_table(
        &self,
        climatology: &MonthlyClimatology,
        band: &str,
        aoi: &AoiGeometry,
        resolution: f64,
    ) -> ClimateResult<Vec<ChartRow>> {
        let params =
            ReductionParams::mean(resolution, self.max_pixels).with_best_effort(self.best_effort);
        params.validate()?;

        let reductions = climatology.iter().map(|composite| async move {
            if !composite.has_data() {
                return Ok(None);
            }
            self.reducer
                .areal_reduce(&composite.image, band, aoi, &params)
                .await
        });
        let values = join_all(reductions)
            .await
            .into_iter()
            .collect::<ClimateResult<Vec<_>>>()?;

        let rows: Vec<ChartRow> = climatology
            .iter()
            .zip(values)
            .map(|(composite, value)| ChartRow {
                month: composite.month,
                label: month_label(composite.month).unwrap_or_default().to_string(),
                value,
            })
            .collect();

        debug!(
            band = %band,
            rows = rows.len(),
            null_rows = rows.iter().filter(|r| r.value.is_none()).count(),
            "Built monthly chart table"
        );
        Ok(rows)
    }

    /// Pass the annual records through and attach the fitted trendline.
    pub fn annual_chart(&self, records: Vec<AnnualRecord>) -> AnnualChart {
        let trend = Trendline::fit(&records);
        AnnualChart { records, trend }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(year: i32, value: Option<f64>) -> AnnualRecord {
        AnnualRecord { year, value }
    }

    #[test]
    fn test_perfect_line() {
        let trend = Trendline::fit(&[rec(2000, Some(1.0)), rec(2001, Some(2.0)), rec(2002, Some(3.0))]);
        assert!((trend.slope - 1.0).abs() < 1e-9);
        assert!((trend.intercept + 1999.0).abs() < 1e-6);
        assert!((trend.r_squared - 1.0).abs() < 1e-9);
        assert!((trend.predict(2003) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_nulls_ignored() {
        let trend = Trendline::fit(&[
            rec(2000, Some(1.0)),
            rec(2001, None),
            rec(2002, Some(3.0)),
        ]);
        assert!((trend.slope - 1.0).abs() < 1e-9);
        assert!((trend.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_too_few_points() {
        let trend = Trendline::fit(&[rec(2000, Some(5.0)), rec(2001, None)]);
        assert_eq!(trend.r_squared, 0.0);
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.intercept, 5.0);

        let empty = Trendline::fit(&[]);
        assert_eq!(empty.r_squared, 0.0);
        assert_eq!(empty.intercept, 0.0);
    }

    #[test]
    fn test_constant_series() {
        let trend = Trendline::fit(&[rec(2000, Some(2.0)), rec(2001, Some(2.0)), rec(2002, Some(2.0))]);
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.intercept, 2.0);
        assert_eq!(trend.r_squared, 0.0);
    }

    #[test]
    fn test_noisy_fit() {
        let trend = Trendline::fit(&[
            rec(2000, Some(1.0)),
            rec(2001, Some(3.0)),
            rec(2002, Some(2.0)),
            rec(2003, Some(4.0)),
        ]);
        // slope = 0.8, r² = 0.64
        assert!((trend.slope - 0.8).abs() < 1e-9);
        assert!((trend.r_squared - 0.64).abs() < 1e-9);
    }
}
