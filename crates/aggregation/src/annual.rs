//! Annual aggregate series over an AOI.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;

use climate_common::{CalendarField, ClimateResult};

use crate::aoi::AoiGeometry;
use crate::image::GriddedTimeSeries;
use crate::reducer::{reduce_by_calendar_field, AnnualMethod};
use crate::spatial::{ReductionParams, SpatialReducer};

/// One year's areal value; `None` when the year has no valid data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualRecord {
    pub year: i32,
    pub value: Option<f64>,
}

/// Collapses each calendar year to one image, then to one scalar over the AOI.
pub struct AnnualSeriesBuilder<'a> {
    reducer: &'a dyn SpatialReducer,
    best_effort: bool,
    max_pixels: u64,
}

impl<'a> AnnualSeriesBuilder<'a> {
    pub fn new(reducer: &'a dyn SpatialReducer, best_effort: bool, max_pixels: u64) -> Self {
        Self {
            reducer,
            best_effort,
            max_pixels,
        }
    }

    /// Areal-mean parameters at `resolution` meters.
    pub fn params(&self, resolution: f64) -> ReductionParams {
        ReductionParams::mean(resolution, self.max_pixels).with_best_effort(self.best_effort)
    }

    /// One record per year of the series range, ascending.
    ///
    /// Years without source images yield `value: None` without calling the
    /// spatial reducer. Partial years reduce over whatever months exist.
    pub async fn build(
        &self,
        series: &GriddedTimeSeries,
        band: &str,
        method: AnnualMethod,
        aoi: &AoiGeometry,
        resolution: f64,
    ) -> ClimateResult<Vec<AnnualRecord>> {
        let params = self.params(resolution);
        params.validate()?;

        let years: Vec<i32> = series.years().years().collect();
        let groups =
            reduce_by_calendar_field(series, CalendarField::Year, &years, band, method.into())?;

        let reductions = groups.iter().map(|group| async move {
            if group.is_empty() {
                return Ok(None);
            }
            self.reducer
                .areal_reduce(&group.composite, band, aoi, &params)
                .await
        });
        let values = join_all(reductions)
            .await
            .into_iter()
            .collect::<ClimateResult<Vec<_>>>()?;

        let records: Vec<AnnualRecord> = groups
            .iter()
            .zip(values)
            .map(|(group, value)| AnnualRecord {
                year: group.value,
                value,
            })
            .collect();

        info!(
            band = %band,
            method = %method,
            years = records.len(),
            null_years = records.iter().filter(|r| r.value.is_none()).count(),
            "Built annual series"
        );

        Ok(records)
    }
}
