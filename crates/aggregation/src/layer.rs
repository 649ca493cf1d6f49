//! Map layer descriptors for the map consumer.

use std::collections::BTreeMap;

use climate_common::{month_label, VisParams, YearRange};

use crate::climatology::MonthlyClimatology;
use crate::image::GriddedImage;
use crate::reducer::Metric;
use crate::variable::Variable;

/// Everything needed to draw a layer: the climatologies of one run.
#[derive(Debug, Clone)]
pub struct MapState {
    pub metric: Metric,
    pub years: YearRange,
    pub climatologies: BTreeMap<Variable, MonthlyClimatology>,
}

impl MapState {
    pub fn new(metric: Metric, years: YearRange) -> Self {
        Self {
            metric,
            years,
            climatologies: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, variable: Variable, climatology: MonthlyClimatology) {
        self.climatologies.insert(variable, climatology);
    }

    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.climatologies.keys().copied()
    }
}

/// A composite ready to draw.
#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    pub variable: Variable,
    pub month: u32,
    pub image: GriddedImage,
    pub vis: VisParams,
    /// e.g. `TPmm mean Mar 1990-2020`
    pub label: String,
}

/// Describe the layer for `(variable, month)`. `None` for an unknown
/// variable or a month outside 1-12.
pub fn render_map(state: &MapState, variable: Variable, month: u32) -> Option<LayerDescriptor> {
    let composite = state.climatologies.get(&variable)?.get(month)?;
    let label = format!(
        "{} {} {} {}",
        variable.label(),
        state.metric,
        month_label(month)?,
        state.years
    );

    Some(LayerDescriptor {
        variable,
        month,
        image: composite.image.clone(),
        vis: variable.vis_params(),
        label,
    })
}
