//! Writing run results to the output directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use aggregation::{AnnualChart, ChartRow, PipelineReport};

/// Per-variable chart tables as consumed by the chart renderer.
#[derive(Debug, Serialize)]
struct ChartFile<'a> {
    variable: &'a str,
    label: &'a str,
    units: &'a str,
    monthly: &'a [ChartRow],
    annual: &'a AnnualChart,
}

/// Write `report.json` and `charts/<variable>.json` under `output_dir`.
///
/// Returns the paths written.
pub async fn write_report(output_dir: &Path, report: &PipelineReport) -> Result<Vec<PathBuf>> {
    let charts_dir = output_dir.join("charts");
    tokio::fs::create_dir_all(&charts_dir)
        .await
        .with_context(|| format!("Failed to create {}", charts_dir.display()))?;

    let mut written = Vec::new();

    let report_path = output_dir.join("report.json");
    write_json(&report_path, report).await?;
    written.push(report_path);

    for variable in &report.variables {
        let chart = ChartFile {
            variable: variable.variable.as_str(),
            label: &variable.label,
            units: &variable.units,
            monthly: &variable.monthly,
            annual: &variable.annual,
        };
        let path = charts_dir.join(format!("{}.json", variable.variable.as_str()));
        write_json(&path, &chart).await?;
        written.push(path);
    }

    Ok(written)
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregation::{
        AnnualMethod, AnnualRecord, FailureStage, Metric, Trendline, Variable, VariableFailure,
        VariableReport,
    };
    use climate_common::YearRange;

    fn report() -> PipelineReport {
        let records = vec![AnnualRecord {
            year: 2000,
            value: Some(1.0),
        }];
        PipelineReport {
            run_id: Default::default(),
            generated_at: Default::default(),
            dataset_id: "ds".into(),
            aoi_asset: "aoi".into(),
            years: YearRange::new(2000, 2000),
            metric: Metric::Mean,
            variables: vec![VariableReport {
                variable: Variable::WindV,
                band: "wind_v_ms".into(),
                label: "V10".into(),
                units: "m/s".into(),
                annual_method: AnnualMethod::Mean,
                monthly: vec![ChartRow {
                    month: 1,
                    label: "Jan".into(),
                    value: None,
                }],
                annual: AnnualChart {
                    trend: Trendline::fit(&records),
                    records,
                },
                exports: Vec::new(),
            }],
            failures: vec![VariableFailure {
                variable: Variable::MaxTemperature,
                stage: FailureStage::Aggregation,
                parameter: Some("temperature_2m_max".into()),
                message: "missing".into(),
            }],
        }
    }

    #[tokio::test]
    async fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_report(dir.path(), &report()).await.unwrap();
        assert_eq!(written.len(), 2);

        let chart: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("charts/wind_v.json")).unwrap())
                .unwrap();
        assert_eq!(chart["label"], "V10");
        assert!(chart["monthly"][0]["value"].is_null());
        assert_eq!(chart["annual"]["records"][0]["year"], 2000);

        let report: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("report.json")).unwrap()).unwrap();
        assert_eq!(report["failures"][0]["parameter"], "temperature_2m_max");
        assert_eq!(report["failures"][0]["stage"], "aggregation");
    }
}
