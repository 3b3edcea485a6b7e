use bevy::prelude::*;
use serde::Serialize;

use crate::error::SetupResult;
use crate::layer_spec::LayerSpec;
use crate::output_area::OutputArea;
use crate::resolver::{LayerResolver, ResolvedLayer};

use super::ManifestTable;

pub const CONSTRAINT_COLUMNS: &[&str] =
    &["layer_name", "current_development_flag", "layer_threshold"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintRow {
    pub layer_name: String,
    pub current_development_flag: u8,
    pub layer_threshold: String,
}

impl ConstraintRow {
    fn new(layer: &ResolvedLayer, current_development: bool) -> Self {
        Self {
            layer_name: layer.file_name().to_string(),
            current_development_flag: u8::from(current_development),
            layer_threshold: layer.spec().declared.clone(),
        }
    }
}

/// Regular constraints in declaration order, then the current-development
/// layer last. Exactly one row carries `current_development_flag = 1`.
///
/// Regular misses are dropped; a current-development miss fails the whole
/// table, although regular layers resolved before it have already been copied.
pub fn build_constraints(
    specs: &[LayerSpec],
    current_development: &LayerSpec,
    resolver: &LayerResolver,
    area: &OutputArea,
) -> SetupResult<ManifestTable<ConstraintRow>> {
    info!(
        "Constraints input: {:?}, current development: {}",
        specs.iter().map(|s| &s.name).collect::<Vec<_>>(),
        current_development.name
    );
    let mut rows = Vec::with_capacity(specs.len() + 1);
    for spec in specs {
        if let Some(layer) = resolver.resolve(spec, area)? {
            rows.push(ConstraintRow::new(&layer, false));
        }
    }
    let current = resolver.resolve_mandatory(current_development, area)?;
    rows.push(ConstraintRow::new(&current, true));
    Ok(ManifestTable::new(CONSTRAINT_COLUMNS, rows))
}
