use bevy::prelude::*;
use serde::Serialize;

use crate::error::SetupResult;
use crate::layer_spec::LayerSpec;
use crate::output_area::OutputArea;
use crate::resolver::{LayerResolver, ResolvedLayer};

use super::ManifestTable;

pub const ATTRACTOR_COLUMNS: &[&str] = &["layer_name", "reverse_polarity_flag", "layer_weight"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttractorRow {
    pub layer_name: String,
    pub reverse_polarity_flag: u8,
    pub layer_weight: String,
}

impl From<&ResolvedLayer> for AttractorRow {
    fn from(layer: &ResolvedLayer) -> Self {
        Self {
            layer_name: layer.file_name().to_string(),
            reverse_polarity_flag: layer.spec().flag,
            layer_weight: layer.spec().declared.clone(),
        }
    }
}

/// One row per declared attractor that resolves, in declaration order, using
/// the declared weight and polarity.
pub fn build_attractors(
    specs: &[LayerSpec],
    resolver: &LayerResolver,
    area: &OutputArea,
) -> SetupResult<ManifestTable<AttractorRow>> {
    info!(
        "Attractors input: {:?}",
        specs.iter().map(|s| &s.name).collect::<Vec<_>>()
    );
    let mut rows = Vec::with_capacity(specs.len());
    for spec in specs {
        if let Some(layer) = resolver.resolve(spec, area)? {
            rows.push(AttractorRow::from(&layer));
        }
    }
    Ok(ManifestTable::new(ATTRACTOR_COLUMNS, rows))
}
