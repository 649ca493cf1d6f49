//! Generators for synthetic monthly climate data.
//!
//! Values are raw ERA5 units (meters of water, Kelvin, m/s) so they can be
//! fed through unit conversion and checked against hand-computed results.

use chrono::NaiveDate;

/// Kelvin offset of 0 °C.
pub const KELVIN_OFFSET: f32 = 273.15;

/// Month-start dates for every month of `start_year..=end_year`.
///
/// # Example
///
/// ```
/// use test_utils::monthly_dates;
///
/// let dates = monthly_dates(1990, 1991);
/// assert_eq!(dates.len(), 24);
/// assert_eq!(dates[0].to_string(), "1990-01-01");
/// assert_eq!(dates[23].to_string(), "1991-12-01");
/// ```
pub fn monthly_dates(start_year: i32, end_year: i32) -> Vec<NaiveDate> {
    (start_year..=end_year)
        .flat_map(|year| (1..=12).filter_map(move |month| NaiveDate::from_ymd_opt(year, month, 1)))
        .collect()
}

/// A grid filled with one value.
pub fn constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Millimeters of precipitation as raw meters.
pub fn mm_to_meters(mm: f32) -> f32 {
    mm / 1000.0
}

/// Degrees Celsius as raw Kelvin.
pub fn celsius_to_kelvin(celsius: f32) -> f32 {
    celsius + KELVIN_OFFSET
}

/// Idealized seasonal cycle in °C: coldest in January, warmest in July.
///
/// `mean` is the annual mean and `amplitude` half the peak-to-peak range.
pub fn seasonal_celsius(month: u32, mean: f32, amplitude: f32) -> f32 {
    let phase = (month as f32 - 1.0) / 12.0 * std::f32::consts::TAU;
    mean - amplitude * phase.cos()
}

/// Linear annual trend: `base + slope * (year - start_year)`.
pub fn linear_trend(year: i32, start_year: i32, base: f64, slope: f64) -> f64 {
    base + slope * (year - start_year) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_dates_are_month_starts() {
        let dates = monthly_dates(2000, 2002);
        assert_eq!(dates.len(), 36);
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        assert!(dates.iter().all(|d| d.to_string().ends_with("-01")));
        assert!(monthly_dates(2001, 2000).is_empty());
    }

    #[test]
    fn test_unit_helpers() {
        assert_eq!(mm_to_meters(10.0), 0.01);
        assert_eq!(celsius_to_kelvin(0.0), 273.15);
    }

    #[test]
    fn test_seasonal_cycle() {
        assert!((seasonal_celsius(1, 10.0, 8.0) - 2.0).abs() < 1e-5);
        assert!((seasonal_celsius(7, 10.0, 8.0) - 18.0).abs() < 1e-5);
    }

    #[test]
    fn test_linear_trend() {
        assert_eq!(linear_trend(2003, 2000, 1.0, 0.5), 2.5);
    }
}
