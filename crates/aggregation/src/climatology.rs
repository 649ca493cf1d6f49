//! Per-calendar-month climatologies.

use serde::Serialize;
use tracing::info;

use climate_common::{CalendarField, ClimateResult, YearRange, MONTHS};

use crate::image::{GriddedImage, GriddedTimeSeries};
use crate::reducer::{reduce_by_calendar_field, Metric};

/// One month's composite across all years of a series.
#[derive(Debug, Clone)]
pub struct MonthlyComposite {
    pub month: u32,
    pub band: String,
    pub metric: Metric,
    /// Source images that went into the composite
    pub image_count: usize,
    /// No-data everywhere when `image_count == 0`
    pub image: GriddedImage,
}

impl MonthlyComposite {
    pub fn tag(&self) -> CompositeTag {
        CompositeTag {
            month: self.month,
            band: self.band.clone(),
            metric: self.metric,
        }
    }

    pub fn has_data(&self) -> bool {
        self.image_count > 0
    }
}

/// Identifying metadata of a composite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CompositeTag {
    pub month: u32,
    pub band: String,
    pub metric: Metric,
}

/// Exactly twelve monthly composites, January first.
#[derive(Debug, Clone)]
pub struct MonthlyClimatology {
    band: String,
    metric: Metric,
    years: YearRange,
    composites: Vec<MonthlyComposite>,
}

impl MonthlyClimatology {
    pub fn band(&self) -> &str {
        &self.band
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn years(&self) -> YearRange {
        self.years
    }

    /// Composite for month 1-12.
    pub fn get(&self, month: u32) -> Option<&MonthlyComposite> {
        month
            .checked_sub(1)
            .and_then(|idx| self.composites.get(idx as usize))
    }

    pub fn composites(&self) -> &[MonthlyComposite] {
        &self.composites
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonthlyComposite> {
        self.composites.iter()
    }

    pub fn tags(&self) -> Vec<CompositeTag> {
        self.composites.iter().map(MonthlyComposite::tag).collect()
    }
}

/// Builds [`MonthlyClimatology`] values with one metric fixed for the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClimatologyBuilder {
    metric: Metric,
}

impl ClimatologyBuilder {
    pub fn new(metric: Metric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Reduce `band` of `series` per calendar month across all years.
    pub fn build(&self, series: &GriddedTimeSeries, band: &str) -> ClimateResult<MonthlyClimatology> {
        let values: Vec<i32> = MONTHS.iter().map(|&m| m as i32).collect();
        let groups = reduce_by_calendar_field(
            series,
            CalendarField::Month,
            &values,
            band,
            self.metric.into(),
        )?;

        let composites: Vec<MonthlyComposite> = groups
            .into_iter()
            .zip(MONTHS)
            .map(|(group, month)| MonthlyComposite {
                month,
                band: band.to_string(),
                metric: self.metric,
                image_count: group.image_count,
                image: group.composite,
            })
            .collect();

        info!(
            dataset = %series.dataset_id(),
            band = %band,
            metric = %self.metric,
            images = series.len(),
            empty_months = composites.iter().filter(|c| !c.has_data()).count(),
            "Built monthly climatology"
        );

        Ok(MonthlyClimatology {
            band: band.to_string(),
            metric: self.metric,
            years: series.years(),
            composites,
        })
    }
}
