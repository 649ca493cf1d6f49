//! Behavioural tests for the aggregation builders on synthetic series.

use aggregation::{
    export_file_id, AnnualMethod, AnnualRecord, AnnualSeriesBuilder, AoiGeometry, ChartTableBuilder,
    ClimatologyBuilder, GriddedImage, GriddedTimeSeries, GridSpatialReducer, Metric,
    RasterExportPlanner, Trendline, UnitConverter, Variable, METERS_PER_DEGREE,
};
use chrono::{Datelike, NaiveDate};
use climate_common::{BoundingBox, GridDefinition, YearRange};
use test_utils::{
    assert_approx_eq, assert_some_approx_eq, bbox, celsius_to_kelvin, constant_grid, linear_trend,
    mm_to_meters, monthly_dates, seasonal_celsius,
};

// ============================================================================
// Helpers
// ============================================================================

fn grid() -> GridDefinition {
    GridDefinition::new(4, 2, BoundingBox::new(10.0, 40.0, 14.0, 42.0))
}

fn aoi() -> AoiGeometry {
    AoiGeometry::from_bbox(BoundingBox::new(10.0, 40.0, 14.0, 42.0))
}

/// Raw ERA5-style series over `dates`, with per-date band values.
fn raw_series<F>(start: i32, end: i32, dates: &[NaiveDate], bands: F) -> GriddedTimeSeries
where
    F: Fn(NaiveDate) -> Vec<(&'static str, f32)>,
{
    let grid = grid();
    let images = dates
        .iter()
        .map(|&date| {
            bands(date).into_iter().fold(
                GriddedImage::new(date.format("%Y%m").to_string(), Some(date), grid),
                |image, (band, value)| {
                    image
                        .with_band(band, constant_grid(grid.width, grid.height, value))
                        .unwrap()
                },
            )
        })
        .collect();
    let range = YearRange::new(start, end).date_range().unwrap();
    GriddedTimeSeries::new("synthetic", range, grid, images).unwrap()
}

fn convert(series: &GriddedTimeSeries, variable: Variable) -> GriddedTimeSeries {
    let converter = UnitConverter::for_variables(&[variable]);
    series.try_map(|image| converter.convert(image)).unwrap()
}

// ============================================================================
// Unit conversion
// ============================================================================

#[test]
fn test_conversion_of_reference_values() {
    let date = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
    let series = raw_series(1990, 1990, &[date], |_| {
        vec![("total_precipitation_sum", 0.001), ("temperature_2m", 273.15)]
    });

    let precip = convert(&series, Variable::Precipitation);
    assert_approx_eq!(precip.images()[0].band("precipitation_mm").unwrap()[0], 1.0, 1e-6);

    let temp = convert(&series, Variable::MeanTemperature);
    assert_approx_eq!(temp.images()[0].band("tmean_c").unwrap()[0], 0.0, 1e-4);
    assert_eq!(temp.images()[0].time(), Some(date));
}

// ============================================================================
// Climatology
// ============================================================================

#[test]
fn test_climatology_has_twelve_unique_months() {
    let dates = monthly_dates(1990, 1992);
    let series = raw_series(1990, 1992, &dates, |d| {
        vec![("temperature_2m", celsius_to_kelvin(seasonal_celsius(d.month(), 10.0, 8.0)))]
    });
    let series = convert(&series, Variable::MeanTemperature);

    let clim = ClimatologyBuilder::new(Metric::Mean).build(&series, "tmean_c").unwrap();
    let mut months: Vec<u32> = clim.tags().iter().map(|t| t.month).collect();
    assert_eq!(months, (1..=12).collect::<Vec<_>>());
    months.dedup();
    assert_eq!(months.len(), 12);

    assert!(clim.iter().all(|c| c.image_count == 3));
    assert_approx_eq!(clim.get(1).unwrap().image.band("tmean_c").unwrap()[0], 2.0, 1e-3);
    assert_approx_eq!(clim.get(7).unwrap().image.band("tmean_c").unwrap()[0], 18.0, 1e-3);
}

#[test]
fn test_climatology_is_idempotent() {
    let dates = monthly_dates(2000, 2001);
    let series = raw_series(2000, 2001, &dates, |d| {
        vec![("total_precipitation_sum", mm_to_meters(d.month() as f32 + d.year() as f32 % 7.0))]
    });
    let series = convert(&series, Variable::Precipitation);
    let builder = ClimatologyBuilder::new(Metric::Median);

    let a = builder.build(&series, "precipitation_mm").unwrap();
    let b = builder.build(&series, "precipitation_mm").unwrap();
    assert_eq!(a.tags(), b.tags());
    for (ca, cb) in a.iter().zip(b.iter()) {
        let va = ca.image.band("precipitation_mm").unwrap();
        let vb = cb.image.band("precipitation_mm").unwrap();
        assert_eq!(va.iter().map(|v| v.to_bits()).collect::<Vec<_>>(), vb.iter().map(|v| v.to_bits()).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_month_absent_from_series_charts_as_null() {
    // Northern summer only
    let dates: Vec<NaiveDate> = monthly_dates(1990, 1991)
        .into_iter()
        .filter(|d| (6..=8).contains(&d.month()))
        .collect();
    let series = raw_series(1990, 1991, &dates, |_| vec![("temperature_2m", celsius_to_kelvin(25.0))]);
    let series = convert(&series, Variable::MeanTemperature);

    let clim = ClimatologyBuilder::new(Metric::Mean).build(&series, "tmean_c").unwrap();
    assert_eq!(clim.composites().len(), 12);

    let reducer = GridSpatialReducer::new();
    let rows = ChartTableBuilder::new(&reducer, true, 1_000)
        .monthly_table(&clim, "tmean_c", &aoi(), METERS_PER_DEGREE)
        .await
        .unwrap();

    let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"]
    );
    assert_eq!(rows[0].value, None);
    assert_some_approx_eq!(rows[6].value, Some(25.0), 1e-3);
    assert_eq!(rows.iter().filter(|r| r.value.is_some()).count(), 3);
}

// ============================================================================
// Annual series
// ============================================================================

#[tokio::test]
async fn test_annual_precipitation_total() {
    let dates = monthly_dates(2000, 2002);
    let series = raw_series(2000, 2002, &dates, |_| vec![("total_precipitation_sum", mm_to_meters(10.0))]);
    let series = convert(&series, Variable::Precipitation);

    let reducer = GridSpatialReducer::new();
    let records = AnnualSeriesBuilder::new(&reducer, true, 1_000)
        .build(&series, "precipitation_mm", AnnualMethod::Sum, &aoi(), METERS_PER_DEGREE)
        .await
        .unwrap();

    assert_eq!(records.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2000, 2001, 2002]);
    for record in &records {
        assert_some_approx_eq!(record.value, Some(120.0), 1e-3);
    }
}

#[tokio::test]
async fn test_annual_temperature_mean() {
    let dates = monthly_dates(2010, 2010);
    let series = raw_series(2010, 2010, &dates, |_| vec![("temperature_2m", celsius_to_kelvin(20.0))]);
    let series = convert(&series, Variable::MeanTemperature);

    let reducer = GridSpatialReducer::new();
    let records = AnnualSeriesBuilder::new(&reducer, true, 1_000)
        .build(&series, "tmean_c", AnnualMethod::Mean, &aoi(), METERS_PER_DEGREE)
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_some_approx_eq!(records[0].value, Some(20.0), 1e-3);
}

#[tokio::test]
async fn test_year_without_images_is_null_not_zero() {
    let dates: Vec<NaiveDate> = monthly_dates(2000, 2002)
        .into_iter()
        .filter(|d| d.year() != 2001)
        .collect();
    let series = raw_series(2000, 2002, &dates, |_| vec![("total_precipitation_sum", mm_to_meters(5.0))]);
    let series = convert(&series, Variable::Precipitation);

    let reducer = GridSpatialReducer::new();
    let records = AnnualSeriesBuilder::new(&reducer, true, 1_000)
        .build(&series, "precipitation_mm", AnnualMethod::Sum, &aoi(), METERS_PER_DEGREE)
        .await
        .unwrap();

    assert_eq!(records[1], AnnualRecord { year: 2001, value: None });
    assert_some_approx_eq!(records[0].value, Some(60.0), 1e-3);
    assert_some_approx_eq!(records[2].value, Some(60.0), 1e-3);
}

#[tokio::test]
async fn test_aoi_outside_data_is_null() {
    let dates = monthly_dates(2000, 2000);
    let series = raw_series(2000, 2000, &dates, |_| vec![("total_precipitation_sum", mm_to_meters(5.0))]);
    let series = convert(&series, Variable::Precipitation);
    let (min_lon, min_lat, max_lon, max_lat) = bbox::DISJOINT;
    let elsewhere = AoiGeometry::from_bbox(BoundingBox::new(min_lon, min_lat, max_lon, max_lat));

    let reducer = GridSpatialReducer::new();
    let records = AnnualSeriesBuilder::new(&reducer, true, 1_000)
        .build(&series, "precipitation_mm", AnnualMethod::Sum, &elsewhere, METERS_PER_DEGREE)
        .await
        .unwrap();
    assert_eq!(records[0].value, None);
}

#[tokio::test]
async fn test_linear_precipitation_trend() {
    // Annual totals 120, 132, 144, 156 mm
    let dates = monthly_dates(2000, 2003);
    let series = raw_series(2000, 2003, &dates, |d| {
        let total = linear_trend(d.year(), 2000, 120.0, 12.0) as f32;
        vec![("total_precipitation_sum", mm_to_meters(total / 12.0))]
    });
    let series = convert(&series, Variable::Precipitation);

    let reducer = GridSpatialReducer::new();
    let builder = ChartTableBuilder::new(&reducer, true, 1_000);
    let records = AnnualSeriesBuilder::new(&reducer, true, 1_000)
        .build(&series, "precipitation_mm", AnnualMethod::Sum, &aoi(), METERS_PER_DEGREE)
        .await
        .unwrap();
    assert_some_approx_eq!(records[3].value, Some(156.0), 1e-3);

    let chart = builder.annual_chart(records);
    assert_approx_eq!(chart.trend.slope, 12.0, 1e-3);
    assert_approx_eq!(chart.trend.r_squared, 1.0, 1e-6);
    assert_approx_eq!(chart.trend.predict(2004), 168.0, 1e-2);
}

// ============================================================================
// Charts and exports
// ============================================================================

#[test]
fn test_trendline_reference_points() {
    let records = [
        AnnualRecord { year: 2000, value: Some(1.0) },
        AnnualRecord { year: 2001, value: Some(2.0) },
        AnnualRecord { year: 2002, value: Some(3.0) },
    ];
    let trend = Trendline::fit(&records);
    assert_approx_eq!(trend.slope, 1.0, 1e-9);
    assert_approx_eq!(trend.intercept, -1999.0, 1e-6);
    assert_approx_eq!(trend.r_squared, 1.0, 1e-9);
}

#[test]
fn test_annual_chart_passes_records_through() {
    let reducer = GridSpatialReducer::new();
    let records = vec![
        AnnualRecord { year: 1990, value: Some(3.0) },
        AnnualRecord { year: 1991, value: None },
    ];
    let chart = ChartTableBuilder::new(&reducer, true, 1_000).annual_chart(records.clone());
    assert_eq!(chart.records, records);
    assert_eq!(chart.trend.r_squared, 0.0);
}

#[test]
fn test_export_plan_names_and_regions() {
    let dates = monthly_dates(1990, 1991);
    let series = raw_series(1990, 1991, &dates, |_| vec![("total_precipitation_sum", 0.002)]);
    let series = convert(&series, Variable::Precipitation);
    let clim = ClimatologyBuilder::new(Metric::Mean).build(&series, "precipitation_mm").unwrap();

    let jobs = RasterExportPlanner::new("drive_folder").plan(
        &clim,
        "precipitation_mm",
        "TPmm",
        &aoi(),
        Metric::Mean,
        1990,
        2020,
        5_000.0,
    );

    assert_eq!(jobs.len(), 12);
    assert_eq!(jobs[2].file_id, "ERA5_TPmm_mean_1990-2020_M03");
    assert_eq!(jobs[2].file_id, export_file_id("TPmm", Metric::Mean, 1990, 2020, 3));
    assert_eq!(jobs[11].file_id, "ERA5_TPmm_mean_1990-2020_M12");
    assert!(jobs.iter().all(|j| j.region == aoi()));
    assert!(jobs.iter().all(|j| j.resolution == 5_000.0 && j.folder == "drive_folder"));
    assert!(jobs.iter().map(|j| j.month).eq(1..=12));
}
