//! Loading vector layers into [`FeatureCollection`]s.
//!
//! GeoJSON is read natively. GeoPackage and shapefiles go through GDAL when
//! the `gdal` feature is enabled.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SetupError, SetupResult};
use crate::geometry::FeatureCollection;

const GEOJSON_EXTENSIONS: &[&str] = &["geojson", "json"];
const GDAL_EXTENSIONS: &[&str] = &["gpkg", "shp"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Whether `path` looks like a vector layer this module may be able to read.
pub fn is_vector_file(path: &Path) -> bool {
    extension(path).is_some_and(|ext| {
        GEOJSON_EXTENSIONS.contains(&ext.as_str()) || GDAL_EXTENSIONS.contains(&ext.as_str())
    })
}

/// Vector files directly inside `dir`, sorted by name. A missing directory
/// yields an empty list.
pub fn list_vector_files(dir: &Path) -> SetupResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_vector_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_layer(path: &Path) -> SetupResult<FeatureCollection> {
    match extension(path).as_deref() {
        Some(ext) if GEOJSON_EXTENSIONS.contains(&ext) => FeatureCollection::read(path),
        #[cfg(feature = "gdal")]
        Some(ext) if GDAL_EXTENSIONS.contains(&ext) => gdal_reader::read(path),
        _ => Err(SetupError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(feature = "gdal")]
mod gdal_reader {
    use std::path::Path;

    use gdal::vector::{FieldValue, LayerAccess};
    use gdal::Dataset;
    use serde_json::{Map, Value};

    use crate::error::{SetupError, SetupResult};
    use crate::geometry::{Feature, FeatureCollection};

    fn gdal_err(path: &Path, e: gdal::errors::GdalError) -> SetupError {
        SetupError::MalformedInput(format!("{}: {e}", path.display()))
    }

    fn to_json(value: FieldValue) -> Value {
        match value {
            FieldValue::IntegerValue(v) => Value::from(v),
            FieldValue::Integer64Value(v) => Value::from(v),
            FieldValue::RealValue(v) => Value::from(v),
            FieldValue::StringValue(v) => Value::from(v),
            FieldValue::StringListValue(v) => Value::from(v),
            other => other.into_string().map(Value::from).unwrap_or(Value::Null),
        }
    }

    /// First layer of the dataset. The feature id is exposed as `fid` unless
    /// the layer already has a field of that name.
    pub fn read(path: &Path) -> SetupResult<FeatureCollection> {
        let dataset = Dataset::open(path).map_err(|e| gdal_err(path, e))?;
        let mut layer = dataset.layer(0).map_err(|e| gdal_err(path, e))?;
        let mut features = Vec::new();
        for feature in layer.features() {
            let geometry = match feature.geometry() {
                Some(g) => serde_json::from_str(&g.json().map_err(|e| gdal_err(path, e))?)?,
                None => Value::Null,
            };
            let mut properties = Map::new();
            for (name, value) in feature.fields() {
                properties.insert(name, value.map(to_json).unwrap_or(Value::Null));
            }
            if !properties.keys().any(|k| k.eq_ignore_ascii_case("fid")) {
                if let Some(fid) = feature.fid() {
                    properties.insert("fid".to_string(), Value::from(fid));
                }
            }
            features.push(Feature::new(geometry, properties));
        }
        Ok(FeatureCollection::new(features))
    }
}
