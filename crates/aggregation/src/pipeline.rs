//! Run orchestration: AOI, dataset query, per-variable builders, exports.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use climate_common::{ClimateError, ClimateResult, YearRange};

use crate::annual::AnnualSeriesBuilder;
use crate::aoi::{AoiAssetStore, AoiGeometry, AoiResolver};
use crate::chart::{AnnualChart, ChartRow, ChartTableBuilder};
use crate::climatology::{ClimatologyBuilder, MonthlyClimatology};
use crate::config::PipelineConfig;
use crate::export::{submit_all, ExportJob, ExportSink, RasterExportPlanner};
use crate::image::GriddedTimeSeries;
use crate::layer::MapState;
use crate::reducer::{AnnualMethod, Metric};
use crate::source::GriddedDataSource;
use crate::spatial::SpatialReducer;
use crate::units::UnitConverter;
use crate::variable::Variable;

/// Serializable summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub dataset_id: String,
    pub aoi_asset: String,
    pub years: YearRange,
    pub metric: Metric,
    pub variables: Vec<VariableReport>,
    pub failures: Vec<VariableFailure>,
}

impl PipelineReport {
    pub fn variable(&self, variable: Variable) -> Option<&VariableReport> {
        self.variables.iter().find(|v| v.variable == variable)
    }

    pub fn failure(&self, variable: Variable) -> Option<&VariableFailure> {
        self.failures.iter().find(|f| f.variable == variable)
    }
}

/// Results for one variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableReport {
    pub variable: Variable,
    pub band: String,
    pub label: String,
    pub units: String,
    pub annual_method: AnnualMethod,
    pub monthly: Vec<ChartRow>,
    pub annual: AnnualChart,
    pub exports: Vec<PlannedExport>,
}

/// An export job as recorded in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedExport {
    pub file_id: String,
    pub month: u32,
    pub description: String,
    pub folder: String,
    pub resolution: f64,
    /// Set once submitted to a sink
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
}

impl From<&ExportJob> for PlannedExport {
    fn from(job: &ExportJob) -> Self {
        Self {
            file_id: job.file_id.clone(),
            month: job.month,
            description: job.description.clone(),
            folder: job.folder.clone(),
            resolution: job.resolution,
            task_id: None,
        }
    }
}

/// Where a variable failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// Nothing was produced for the variable
    #[default]
    Aggregation,
    /// Charts are in the report, the rasters were not exported
    Export,
}

/// A variable that could not be processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableFailure {
    pub variable: Variable,
    #[serde(default)]
    pub stage: FailureStage,
    /// Band or parameter at fault, when known
    pub parameter: Option<String>,
    pub message: String,
}

impl VariableFailure {
    fn new(variable: Variable, stage: FailureStage, err: &ClimateError) -> Self {
        Self {
            variable,
            stage,
            parameter: err.parameter().map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// A finished variable, with the export error that did not stop it.
struct VariableOutcome {
    report: VariableReport,
    climatology: MonthlyClimatology,
    export_error: Option<ClimateError>,
}

/// Report plus the in-memory state needed to draw map layers.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: PipelineReport,
    pub map_state: MapState,
}

/// Wires the collaborators together for a run.
pub struct ClimatePipeline {
    source: Arc<dyn GriddedDataSource>,
    assets: Arc<dyn AoiAssetStore>,
    reducer: Arc<dyn SpatialReducer>,
    sink: Option<Arc<dyn ExportSink>>,
}

impl ClimatePipeline {
    pub fn new(
        source: Arc<dyn GriddedDataSource>,
        assets: Arc<dyn AoiAssetStore>,
        reducer: Arc<dyn SpatialReducer>,
    ) -> Self {
        Self {
            source,
            assets,
            reducer,
            sink: None,
        }
    }

    /// Submit export jobs to `sink`. Without a sink jobs are only planned.
    pub fn with_sink(mut self, sink: Arc<dyn ExportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run every configured variable.
    ///
    /// Configuration, AOI and dataset errors abort the run. Errors confined to
    /// one variable (a missing band, a pixel cap) are recorded as failures and
    /// the remaining variables continue. A variable whose export hits such an
    /// error keeps its report and also gets an export-stage failure.
    pub async fn run(&self, config: &PipelineConfig) -> ClimateResult<PipelineOutput> {
        config.validate()?;
        let run_id = Uuid::new_v4();
        let years = config.years();

        info!(
            run_id = %run_id,
            dataset = %config.dataset_id,
            aoi = %config.aoi_asset,
            years = %years,
            metric = %config.metric,
            variables = config.variables.len(),
            "Starting climate aggregation run"
        );

        let aoi = AoiResolver::new(self.assets.as_ref())
            .resolve(&config.aoi_asset)
            .await?;

        let range = config.date_range().ok_or_else(|| {
            ClimateError::invalid_config("start_year", format!("{} is not a valid range", years))
        })?;
        let mut raw_bands: Vec<&str> = config.variables.iter().map(|v| v.raw_band()).collect();
        raw_bands.sort_unstable();
        raw_bands.dedup();

        let series = self
            .source
            .query(&config.dataset_id, range, &raw_bands)
            .await?;

        let mut map_state = MapState::new(config.metric, years);
        let mut variables = Vec::new();
        let mut failures = Vec::new();

        for &variable in &config.variables {
            match self.run_variable(variable, &series, &aoi, config).await {
                Ok(outcome) => {
                    if let Some(e) = &outcome.export_error {
                        warn!(variable = %variable, error = %e, "Export failed, keeping charts");
                        failures.push(VariableFailure::new(variable, FailureStage::Export, e));
                    }
                    map_state.insert(variable, outcome.climatology);
                    variables.push(outcome.report);
                }
                Err(e) if e.is_fatal_for_run() => return Err(e),
                Err(e) => {
                    warn!(variable = %variable, error = %e, "Variable failed, continuing");
                    failures.push(VariableFailure::new(variable, FailureStage::Aggregation, &e));
                }
            }
        }

        info!(
            run_id = %run_id,
            completed = variables.len(),
            failed = failures.len(),
            "Climate aggregation run finished"
        );

        Ok(PipelineOutput {
            report: PipelineReport {
                run_id,
                generated_at: Utc::now(),
                dataset_id: config.dataset_id.clone(),
                aoi_asset: config.aoi_asset.clone(),
                years,
                metric: config.metric,
                variables,
                failures,
            },
            map_state,
        })
    }

    async fn run_variable(
        &self,
        variable: Variable,
        series: &GriddedTimeSeries,
        aoi: &AoiGeometry,
        config: &PipelineConfig,
    ) -> ClimateResult<VariableOutcome> {
        let band = variable.band();
        let converter = UnitConverter::for_variables(&[variable]);
        let converted = series.try_map(|image| converter.convert(image))?;

        let climatology = ClimatologyBuilder::new(config.metric).build(&converted, band)?;

        let charts =
            ChartTableBuilder::new(self.reducer.as_ref(), config.best_effort, config.max_pixels);
        let monthly = charts
            .monthly_table(&climatology, band, aoi, config.stats_resolution)
            .await?;

        let records =
            AnnualSeriesBuilder::new(self.reducer.as_ref(), config.best_effort, config.max_pixels)
                .build(
                    &converted,
                    band,
                    variable.annual_method(),
                    aoi,
                    config.stats_resolution,
                )
                .await?;
        let annual = charts.annual_chart(records);

        let jobs = RasterExportPlanner::new(config.export_folder.as_str()).plan(
            &climatology,
            band,
            variable.label(),
            aoi,
            config.metric,
            config.start_year,
            config.end_year,
            config.export_resolution,
        );
        let mut exports: Vec<PlannedExport> = jobs.iter().map(PlannedExport::from).collect();

        let mut export_error = None;
        if let Some(sink) = &self.sink {
            match submit_all(sink.as_ref(), &jobs, &climatology).await {
                Ok(handles) => {
                    for (export, handle) in exports.iter_mut().zip(handles) {
                        export.task_id = handle.map(|h| h.id);
                    }
                }
                Err(e) if e.is_fatal_for_run() => return Err(e),
                Err(e) => export_error = Some(e),
            }
        }

        info!(
            variable = %variable,
            band = %band,
            slope = annual.trend.slope,
            r_squared = annual.trend.r_squared,
            exports = exports.len(),
            "Variable complete"
        );

        Ok(VariableOutcome {
            report: VariableReport {
                variable,
                band: band.to_string(),
                label: variable.label().to_string(),
                units: variable.units().to_string(),
                annual_method: variable.annual_method(),
                monthly,
                annual,
                exports,
            },
            climatology,
            export_error,
        })
    }
}
