//! Minimal GeoJSON model: just enough structure to filter features on their
//! attributes, inspect grid columns and hand payloads to the rendering engine.
//! Geometry itself stays an opaque `serde_json::Value`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{SetupError, SetupResult};

/// Axis-aligned extent in the grid's coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    /// Parse `xmin,ymin,xmax,ymax`.
    pub fn parse(raw: &str) -> SetupResult<Self> {
        let values: Vec<f64> = raw
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| SetupError::Config(format!("bounding box '{raw}' is not numeric")))?;
        let &[xmin, ymin, xmax, ymax] = values.as_slice() else {
            return Err(SetupError::Config(format!(
                "bounding box '{raw}' should be xmin,ymin,xmax,ymax"
            )));
        };
        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// True when the extent encloses a positive area.
    pub fn is_valid(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }

    /// Closed exterior ring, clockwise from the top-left corner.
    pub fn ring(&self) -> Vec<[f64; 2]> {
        vec![
            [self.xmin, self.ymax],
            [self.xmax, self.ymax],
            [self.xmax, self.ymin],
            [self.xmin, self.ymin],
            [self.xmin, self.ymax],
        ]
    }

    pub fn to_polygon(&self) -> Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [self.ring()],
        })
    }

    /// Extent of every coordinate pair nested anywhere in a GeoJSON geometry.
    pub fn of_geometry(geometry: &Value) -> Option<Self> {
        let mut acc: Option<Self> = None;
        collect_positions(geometry.get("coordinates")?, &mut |x, y| {
            acc = Some(match acc {
                None => Self {
                    xmin: x,
                    ymin: y,
                    xmax: x,
                    ymax: y,
                },
                Some(b) => Self {
                    xmin: b.xmin.min(x),
                    ymin: b.ymin.min(y),
                    xmax: b.xmax.max(x),
                    ymax: b.ymax.max(y),
                },
            });
        });
        acc
    }
}

fn collect_positions(value: &Value, visit: &mut dyn FnMut(f64, f64)) {
    let Some(items) = value.as_array() else {
        return;
    };
    match (items.first().and_then(Value::as_f64), items.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => visit(x, y),
        _ => {
            for item in items {
                collect_positions(item, visit);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Value,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
    let properties = Option::<Map<String, Value>>::deserialize(d)?;
    Ok(properties.unwrap_or_default())
}

fn feature_type() -> String {
    "Feature".to_string()
}

fn collection_type() -> String {
    "FeatureCollection".to_string()
}

impl Feature {
    pub fn new(geometry: Value, properties: Map<String, Value>) -> Self {
        Self {
            kind: feature_type(),
            properties,
            geometry,
        }
    }

    /// Text values of an attribute. Scalar strings yield one value, arrays
    /// (multi-valued attributes such as `theme`) yield every string element.
    pub fn attribute_values(&self, key: &str) -> Vec<&str> {
        match self.properties.get(key) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "collection_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Coordinate reference system member, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Value>,
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: collection_type(),
            features,
            crs: None,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn from_json(text: &str) -> SetupResult<Self> {
        let collection: Self = serde_json::from_str(text)?;
        if collection.kind != "FeatureCollection" {
            return Err(SetupError::Json(format!(
                "expected a FeatureCollection, got '{}'",
                collection.kind
            )));
        }
        Ok(collection)
    }

    pub fn read(path: &Path) -> SetupResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn write(&self, path: &Path) -> SetupResult<()> {
        let bytes = serde_json::to_vec(self)?;
        crate::output_area::atomic_write(path, &bytes)?;
        Ok(())
    }
}
