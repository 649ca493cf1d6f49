//! Error types for the climate aggregation workspace.

use thiserror::Error;

/// Result type alias using ClimateError.
pub type ClimateResult<T> = Result<T, ClimateError>;

/// Primary error type for aggregation runs.
///
/// Only fatal conditions are errors. Empty calendar groups and spatial
/// reductions that find no valid pixels travel through the data model as
/// `None` values instead.
#[derive(Debug, Error)]
pub enum ClimateError {
    // === Configuration Errors ===
    #[error("AOI asset '{asset_id}' resolved to zero geometries")]
    InvalidAoi { asset_id: String },

    #[error("Invalid configuration value for '{param}': {message}")]
    InvalidConfig { param: String, message: String },

    // === Data Errors ===
    #[error("Band '{band}' is missing from image {image}")]
    MissingBand { band: String, image: String },

    #[error("Spatial reduction needs {pixels} pixels, exceeding max_pixels={max_pixels}")]
    TooManyPixels { pixels: u64, max_pixels: u64 },

    #[error("Dataset source error: {0}")]
    Source(String),

    #[error("AOI asset store error: {0}")]
    Asset(String),

    // === Output Errors ===
    #[error("Export failed: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ClimateError {
    /// Build an `InvalidConfig` error for a named parameter.
    pub fn invalid_config(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Build a `MissingBand` error.
    pub fn missing_band(band: impl Into<String>, image: impl Into<String>) -> Self {
        Self::MissingBand {
            band: band.into(),
            image: image.into(),
        }
    }

    /// Whether this error aborts the whole run rather than a single variable.
    pub fn is_fatal_for_run(&self) -> bool {
        match self {
            ClimateError::InvalidAoi { .. }
            | ClimateError::InvalidConfig { .. }
            | ClimateError::Source(_)
            | ClimateError::Asset(_) => true,

            ClimateError::MissingBand { .. } | ClimateError::TooManyPixels { .. } => false,

            _ => true,
        }
    }

    /// The configuration parameter responsible for this error, if known.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            ClimateError::InvalidAoi { asset_id } => Some(asset_id),
            ClimateError::InvalidConfig { param, .. } => Some(param),
            ClimateError::MissingBand { band, .. } => Some(band),
            ClimateError::TooManyPixels { .. } => Some("max_pixels"),
            _ => None,
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for ClimateError {
    fn from(err: std::io::Error) -> Self {
        ClimateError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ClimateError {
    fn from(err: serde_json::Error) -> Self {
        ClimateError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for ClimateError {
    fn from(err: serde_yaml::Error) -> Self {
        ClimateError::Serialization(format!("YAML error: {}", err))
    }
}
