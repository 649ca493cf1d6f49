//! Climate Report
//!
//! Runs the aggregation pipeline once for a configured AOI and period,
//! writes chart tables and submits the monthly raster exports.

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use aggregation::{
    ClimatePipeline, FileDatasetSource, GeoJsonAssetStore, GridSpatialReducer, LocalExportSink,
    PipelineConfig, Variable,
};

/// Climate Report
#[derive(Parser, Debug)]
#[command(name = "climate-report")]
#[command(about = "Monthly climatologies, annual series and raster exports for an area of interest")]
struct Args {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, default_value = "climate.yaml", env = "CLIMATE_CONFIG")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Only process these variables (repeatable); overrides the config list
    #[arg(long = "variable")]
    variables: Vec<String>,

    /// Plan exports without writing them
    #[arg(long)]
    skip_export: bool,

    /// Number of worker threads
    #[arg(long, env = "CLIMATE_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let config = load_config(&args)?;
    info!(
        config = %args.config.display(),
        aoi = %config.aoi_asset,
        start_year = config.start_year,
        end_year = config.end_year,
        metric = %config.metric,
        "Starting climate report"
    );

    let mut pipeline = ClimatePipeline::new(
        Arc::new(FileDatasetSource::new(&config.data_dir)),
        Arc::new(GeoJsonAssetStore::new(&config.asset_dir)),
        Arc::new(GridSpatialReducer::new()),
    );
    if args.skip_export {
        info!("Export submission disabled");
    } else {
        pipeline = pipeline.with_sink(Arc::new(LocalExportSink::new(&config.output_dir)));
    }

    let run_output = match pipeline.run(&config).await {
        Ok(run_output) => run_output,
        Err(e) => {
            error!(
                error = %e,
                parameter = e.parameter().unwrap_or("-"),
                "Climate report failed"
            );
            return Err(e).context("Pipeline run failed");
        }
    };

    for failure in &run_output.report.failures {
        warn!(
            variable = %failure.variable,
            stage = ?failure.stage,
            parameter = failure.parameter.as_deref().unwrap_or("-"),
            "{}",
            failure.message
        );
    }

    let written = output::write_report(&config.output_dir, &run_output.report).await?;
    info!(
        files = written.len(),
        output_dir = %config.output_dir.display(),
        variables = run_output.report.variables.len(),
        failures = run_output.report.failures.len(),
        "Climate report written"
    );

    Ok(())
}

/// YAML file, then environment overrides, then command-line variables.
fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(&args.config)
        .with_context(|| format!("Failed to load config: {}", args.config.display()))?;

    config
        .apply_env()
        .context("Invalid environment override")?;

    if !args.variables.is_empty() {
        config.variables = args
            .variables
            .iter()
            .map(|v| v.parse::<Variable>())
            .collect::<Result<Vec<Variable>, _>>()
            .context("Invalid --variable")?;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
