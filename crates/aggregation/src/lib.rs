//! Climate Aggregation Engine
//!
//! Turns a time-indexed stack of monthly gridded images into per-month
//! climatologies, annual series over an area of interest, chart tables and
//! raster export plans:
//!
//! - **Unit conversion**: raw ERA5 bands to millimeters, degrees Celsius, m/s
//! - **Calendar grouping**: one shared `reduce_by_calendar_field` for months and years
//! - **Null propagation**: empty groups and empty reductions surface as `None`, never 0
//!
//! # Architecture
//!
//! ```text
//! GriddedDataSource::query(dataset, range, bands)
//!      │
//!      ▼
//! UnitConverter::convert (per image, per variable)
//!      │
//!      ├─► ClimatologyBuilder::build ──► 12 monthly composites
//!      │         │
//!      │         ├─► ChartTableBuilder::monthly_table ──► ChartRow × 12
//!      │         ├─► RasterExportPlanner::plan ──► ExportJob × 12 ──► ExportSink
//!      │         └─► render_map ──► LayerDescriptor
//!      │
//!      └─► AnnualSeriesBuilder::build ──► AnnualRecord per year
//!                │
//!                └─► ChartTableBuilder::annual_chart ──► records + Trendline
//! ```
//!
//! Spatial reductions go through the [`SpatialReducer`] trait; the AOI comes
//! from an [`AoiAssetStore`] via [`AoiResolver`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use aggregation::{
//!     ClimatePipeline, FileDatasetSource, GeoJsonAssetStore, GridSpatialReducer, PipelineConfig,
//! };
//!
//! let config = PipelineConfig::load("climate.yaml")?;
//! let pipeline = ClimatePipeline::new(
//!     Arc::new(FileDatasetSource::new(&config.data_dir)),
//!     Arc::new(GeoJsonAssetStore::new(&config.asset_dir)),
//!     Arc::new(GridSpatialReducer::new()),
//! );
//! let output = pipeline.run(&config).await?;
//! ```

pub mod annual;
pub mod aoi;
pub mod chart;
pub mod climatology;
pub mod config;
pub mod export;
pub mod image;
pub mod layer;
pub mod pipeline;
pub mod reducer;
pub mod source;
pub mod spatial;
pub mod units;
pub mod variable;

// Re-export commonly used types at crate root
pub use annual::{AnnualRecord, AnnualSeriesBuilder};
pub use aoi::{AoiAssetStore, AoiGeometry, AoiResolver, GeoJson, GeoJsonAssetStore, InMemoryAssetStore, Polygon};
pub use chart::{AnnualChart, ChartRow, ChartTableBuilder, Trendline};
pub use climatology::{ClimatologyBuilder, CompositeTag, MonthlyClimatology, MonthlyComposite};
pub use config::PipelineConfig;
pub use export::{
    export_file_id, submit_all, ExportJob, ExportManifest, ExportSink, LocalExportSink,
    RasterExportPlanner, TaskHandle,
};
pub use image::{GriddedImage, GriddedTimeSeries};
pub use layer::{render_map, LayerDescriptor, MapState};
pub use pipeline::{
    ClimatePipeline, FailureStage, PipelineOutput, PipelineReport, PlannedExport,
    VariableFailure, VariableReport,
};
pub use reducer::{reduce_by_calendar_field, reduce_series, AnnualMethod, CalendarGroup, Metric, Reducer};
pub use source::{DatasetFile, FileDatasetSource, GriddedDataSource, ImageRecord, InMemoryDatasetSource};
pub use spatial::{GridSpatialReducer, ReductionParams, SpatialReducer, METERS_PER_DEGREE};
pub use units::{BandConversion, Conversion, UnitConverter};
pub use variable::Variable;

pub use climate_common::{ClimateError, ClimateResult};
