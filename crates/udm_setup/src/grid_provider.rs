//! The one spatial grid every layer of a run is rasterised against.
//!
//! A grid is either supplied as the single vector file in
//! `<DATA_PATH>/inputs/grid`, or synthesised as a square fishnet over
//! `GRID_BBOX`. Either way it is validated once, written to the raster work
//! area, and published as the [`SharedGrid`] resource. Nothing replaces it
//! for the rest of the run.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{
    SetupConfig, CELL_ID_COLUMN, CELL_ID_VARIANTS, MAX_GRID_CELLS, SYNTHESISED_GRID_FILE,
    VALIDATED_GRID_FILE,
};
use crate::error::{SetupError, SetupResult};
use crate::geometry::{BoundingBox, Feature, FeatureCollection};
use crate::vector_io::{list_vector_files, read_layer};

/// Where the run's grid came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "origin", content = "path")]
pub enum GridOrigin {
    Supplied(PathBuf),
    Synthesised(PathBuf),
}

/// The validated grid, shared read-only by every rasterisation call.
#[derive(Resource, Debug, Clone, PartialEq, Serialize)]
pub struct SharedGrid {
    pub origin: GridOrigin,
    /// Validated copy with the canonical cell id column, given to the engine.
    pub path: PathBuf,
    pub cell_size: f64,
    pub cell_count: usize,
}

/// The single grid file in `dir`, if any. More than one is fatal.
pub fn locate_grid_file(dir: &Path) -> SetupResult<Option<PathBuf>> {
    let mut files = list_vector_files(dir)?;
    match files.len() {
        0 => Ok(None),
        1 => Ok(files.pop()),
        count => {
            debug!("Grid files found in {}: {:?}", dir.display(), files);
            Err(SetupError::GridAmbiguous { count })
        }
    }
}

/// Square cells covering `bbox`, numbered from 1 row by row starting at the
/// top-left cell. Edge cells extend past `bbox` when it is not a whole number
/// of cells wide or high. More than [`MAX_GRID_CELLS`] cells is refused.
pub fn synthesise_fishnet(bbox: &BoundingBox, cell_size: f64) -> SetupResult<FeatureCollection> {
    if !bbox.is_valid() {
        return Err(SetupError::GridMissing(format!(
            "cannot synthesise a grid over an empty extent {bbox:?}"
        )));
    }
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(SetupError::GridMissing(format!(
            "cannot synthesise a grid with cell size {cell_size}"
        )));
    }
    let ncols = (bbox.width() / cell_size).ceil() as usize;
    let nrows = (bbox.height() / cell_size).ceil() as usize;
    let cell_count = ncols
        .checked_mul(nrows)
        .filter(|count| *count <= MAX_GRID_CELLS)
        .ok_or_else(|| {
            SetupError::GridMissing(format!(
                "{ncols} x {nrows} cells of size {cell_size} exceed the {MAX_GRID_CELLS} cell limit"
            ))
        })?;

    let mut features = Vec::with_capacity(cell_count);
    for row in 0..nrows {
        let ymax = bbox.ymax - row as f64 * cell_size;
        for col in 0..ncols {
            let xmin = bbox.xmin + col as f64 * cell_size;
            let cell = BoundingBox {
                xmin,
                ymin: ymax - cell_size,
                xmax: xmin + cell_size,
                ymax,
            };
            let mut properties = Map::new();
            let id = Value::from(row * ncols + col + 1);
            properties.insert(CELL_ID_COLUMN.to_string(), id);
            features.push(Feature::new(cell.to_polygon(), properties));
        }
    }
    Ok(FeatureCollection::new(features))
}

/// Name of the cell id column the grid carries, canonical spelling first.
fn cell_id_column(first: &Feature) -> Option<&'static str> {
    std::iter::once(CELL_ID_COLUMN)
        .chain(CELL_ID_VARIANTS.iter().copied())
        .find(|column| first.properties.contains_key(*column))
}

/// Ensure the grid carries unique integer ids under [`CELL_ID_COLUMN`],
/// renaming an accepted variant in place. Returns the cell size, taken from
/// the extent of the first cell.
pub fn validate_grid(grid: &mut FeatureCollection) -> SetupResult<f64> {
    let Some(first) = grid.features.first() else {
        return Err(SetupError::GridInvalid("grid has no cells".into()));
    };
    let Some(column) = cell_id_column(first) else {
        return Err(SetupError::GridInvalid(format!(
            "no '{CELL_ID_COLUMN}' cell id column (accepted variants: {CELL_ID_VARIANTS:?})"
        )));
    };
    let cell_size = BoundingBox::of_geometry(&first.geometry)
        .map(|b| b.width())
        .filter(|w| *w > 0.0)
        .ok_or_else(|| SetupError::GridInvalid("first cell has no extent".into()))?;

    if column != CELL_ID_COLUMN {
        debug!("Renaming grid column '{column}' to '{CELL_ID_COLUMN}'");
    }
    let mut seen = HashSet::with_capacity(grid.len());
    for (index, feature) in grid.features.iter_mut().enumerate() {
        let id = feature
            .properties
            .remove(column)
            .ok_or_else(|| SetupError::GridInvalid(format!("cell {index} has no '{column}'")))?;
        let Some(value) = id.as_i64() else {
            return Err(SetupError::GridInvalid(format!("cell {index} has non-integer id {id}")));
        };
        if !seen.insert(value) {
            return Err(SetupError::GridInvalid(format!("duplicate cell id {value}")));
        }
        feature.properties.insert(CELL_ID_COLUMN.to_string(), id);
    }
    Ok(cell_size)
}

/// Obtain, validate and stage the run's grid.
pub fn establish_grid(config: &SetupConfig) -> SetupResult<SharedGrid> {
    let (origin, mut grid) = match locate_grid_file(&config.grid_input_dir())? {
        Some(path) => {
            let grid = read_layer(&path)?;
            (GridOrigin::Supplied(path), grid)
        }
        None => {
            let Some(bbox) = config.grid_bbox else {
                return Err(SetupError::GridMissing(format!(
                    "no grid file in {} and GRID_BBOX is not set",
                    config.grid_input_dir().display()
                )));
            };
            let path = config.data_path.join(SYNTHESISED_GRID_FILE);
            synthesise_fishnet(&bbox, config.grid_cell_size)?.write(&path)?;
            let grid = read_layer(&path)?;
            (GridOrigin::Synthesised(path), grid)
        }
    };

    let cell_size = validate_grid(&mut grid)?;
    let work_dir = config.raster_work_dir();
    fs::create_dir_all(&work_dir)?;
    let path = work_dir.join(VALIDATED_GRID_FILE);
    grid.write(&path)?;

    info!(
        "Grid established from {:?}: {} cells of {} units",
        origin,
        grid.len(),
        cell_size
    );
    Ok(SharedGrid {
        origin,
        path,
        cell_size,
        cell_count: grid.len(),
    })
}
