//! DCAT-style catalogue documents describing a run's outputs.

use std::path::Path;

use bevy::prelude::*;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::error::SetupResult;
use crate::geometry::BoundingBox;
use crate::output_area::atomic_write;

/// One catalogue document: file stem, title suffix, description prefix.
const DOCUMENTS: &[(&str, &str, &str)] = &[
    ("metadata_udm", "", ""),
    ("metadata_udm_inputs", "-inputs", "All inputs"),
    (
        "metadata_udm_flood_outputs",
        "-UDM and flood impacts",
        "Outputs from UDM and flood impacts (with default flood settings)",
    ),
];

pub fn catalogue_document(title: &str, description: &str, bbox: &BoundingBox) -> Value {
    json!({
        "@context": ["metadata-v1"],
        "@type": "dcat:Dataset",
        "dct:language": "en",
        "dct:title": title,
        "dct:description": description,
        "dcat:keyword": ["UDM"],
        "dct:subject": "Environment",
        "dct:license": {
            "@type": "LicenseDocument",
            "@id": "https://creativecommons.org/licences/by/4.0/",
            "rdfs:label": null
        },
        "dct:creator": [{"@type": "foaf:Organization"}],
        "dcat:contactPoint": {
            "@type": "vcard:Organization",
            "vcard:fn": "DAFNI",
            "vcard:hasEmail": "support@dafni.ac.uk"
        },
        "dct:created": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "dct:PeriodOfTime": {
            "type": "dct:PeriodOfTime",
            "time:hasBeginning": null,
            "time:hasEnd": null
        },
        "dafni_version_note": "created",
        "dct:spatial": {
            "@type": "dct:Location",
            "rdfs:label": null
        },
        "geojson": bbox.to_polygon(),
    })
}

/// Write the three catalogue documents into `dir`. Returns the files written.
pub fn write_catalogue(
    dir: &Path,
    title: &str,
    description: &str,
    bbox: &BoundingBox,
) -> SetupResult<Vec<String>> {
    let mut written = Vec::with_capacity(DOCUMENTS.len());
    for (stem, title_suffix, description_prefix) in DOCUMENTS {
        let doc = catalogue_document(
            &format!("{title}{title_suffix}"),
            &format!("{description_prefix}{description}"),
            bbox,
        );
        let file_name = format!("{stem}.json");
        atomic_write(&dir.join(&file_name), &serde_json::to_vec_pretty(&doc)?)?;
        info!("Written catalogue metadata {file_name}");
        written.push(file_name);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox {
            xmin: 0.0,
            ymin: 0.0,
            xmax: 10.0,
            ymax: 20.0,
        }
    }

    #[test]
    fn test_document_carries_title_and_polygon() {
        let doc = catalogue_document("Leeds 2050", "baseline", &bbox());
        assert_eq!(doc["dct:title"], "Leeds 2050");
        assert_eq!(doc["geojson"]["type"], "Polygon");
        assert_eq!(doc["geojson"]["coordinates"][0][0], json!([0.0, 20.0]));
        assert!(doc["dct:created"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_write_catalogue_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_catalogue(dir.path(), "Run", " for Leeds", &bbox()).unwrap();
        assert_eq!(written.len(), 3);
        let inputs: Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("metadata_udm_inputs.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(inputs["dct:title"], "Run-inputs");
        assert_eq!(inputs["dct:description"], "All inputs for Leeds");
    }
}
