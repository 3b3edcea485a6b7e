use serde::Serialize;

use crate::config::{
    DEFAULT_COVERAGE_THRESHOLD, DEFAULT_DENSITY_FROM_RASTER, DEFAULT_MAXIMUM_PLOT_SIZE,
    DEFAULT_MINIMUM_DEVELOPMENT_AREA, DEFAULT_PEOPLE_PER_DWELLING,
};

use super::ManifestTable;

pub const PARAMETER_COLUMNS: &[&str] = &[
    "density_from_raster",
    "people_per_dwelling",
    "coverage_threshold",
    "minimum_development_area",
    "maximum_plot_size",
];

/// The five scalar simulation parameters. Field order is column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelParameters {
    pub density_from_raster: u8,
    pub people_per_dwelling: f64,
    pub coverage_threshold: f64,
    pub minimum_development_area: u32,
    pub maximum_plot_size: u32,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            density_from_raster: DEFAULT_DENSITY_FROM_RASTER,
            people_per_dwelling: DEFAULT_PEOPLE_PER_DWELLING,
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
            minimum_development_area: DEFAULT_MINIMUM_DEVELOPMENT_AREA,
            maximum_plot_size: DEFAULT_MAXIMUM_PLOT_SIZE,
        }
    }
}

impl ModelParameters {
    /// Always exactly one row.
    pub fn to_table(self) -> ManifestTable<ModelParameters> {
        ManifestTable::new(PARAMETER_COLUMNS, vec![self])
    }
}
