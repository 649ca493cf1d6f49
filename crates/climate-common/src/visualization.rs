//! Visualization parameters handed to map-layer consumers.
//!
//! A layer is described by a value range and an ordered list of hex colors
//! spread evenly across that range. Rendering is the consumer's job.

use serde::{Deserialize, Serialize};

/// Ordered list of "RRGGBB" hex colors, low to high.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette(pub Vec<String>);

impl Palette {
    pub fn from_hex(colors: &[&str]) -> Self {
        Self(colors.iter().map(|c| c.trim_start_matches('#').to_string()).collect())
    }

    /// Blue ramp for precipitation totals.
    pub fn precipitation() -> Self {
        Self::from_hex(&[
            "ffffff", "c6dbef", "9ecae1", "6baed6", "4292c6", "2171b5", "08519c", "08306b",
        ])
    }

    /// Diverging blue-to-red ramp for temperatures.
    pub fn temperature() -> Self {
        Self::from_hex(&[
            "313695", "4575b4", "74add1", "abd9e9", "ffffbf", "fdae61", "f46d43", "d73027",
            "a50026",
        ])
    }

    /// Diverging purple-to-green ramp for signed wind components.
    pub fn wind_component() -> Self {
        Self::from_hex(&["40004b", "9970ab", "e7d4e8", "f7f7f7", "d9f0d3", "5aae61", "00441b"])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validate every entry is a 6-digit hex color.
    pub fn validate(&self) -> Result<(), String> {
        if self.0.len() < 2 {
            return Err("Palette must have at least 2 colors".to_string());
        }
        for color in &self.0 {
            if color.len() != 6 || u32::from_str_radix(color, 16).is_err() {
                return Err(format!("Invalid hex color '{}'", color));
            }
        }
        Ok(())
    }
}

/// Value range and palette for a map layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    pub palette: Palette,
}

impl VisParams {
    pub fn new(min: f64, max: f64, palette: Palette) -> Self {
        Self { min, max, palette }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.min < self.max) {
            return Err(format!("min ({}) must be below max ({})", self.min, self.max));
        }
        self.palette.validate()
    }
}
