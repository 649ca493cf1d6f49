//! Common types and utilities shared across the climate aggregation workspace.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod time;
pub mod visualization;

pub use bbox::BoundingBox;
pub use error::{ClimateError, ClimateResult};
pub use grid::GridDefinition;
pub use time::{month_label, CalendarField, DateRange, YearRange, MONTHS, MONTH_LABELS};
pub use visualization::{Palette, VisParams};
