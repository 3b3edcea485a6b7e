//! Canonical layer keys for discovered files.
//!
//! `major_roads_clip.asc`, `/data/in/Major_Roads.asc` and `major_roads` all
//! normalise to `major_roads`. The rule is applied until it reaches a fixed
//! point, so normalising an already-normalised key is a no-op.

use std::path::Path;

use crate::config::CLIP_MARKER;

/// Extensions stripped from the final path segment.
const KNOWN_EXTENSIONS: &[&str] = &[
    "asc", "tif", "tiff", "geotiff", "gpkg", "csv", "geojson", "json",
];

fn final_segment(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if KNOWN_EXTENSIONS.contains(&ext) => stem,
        _ => name,
    }
}

fn normalize_once(key: &str) -> String {
    strip_extension(key).replace(CLIP_MARKER, "")
}

/// Canonical, lower-case layer key for a file path or bare name.
pub fn normalize(path: &str) -> String {
    let mut key = final_segment(path).to_lowercase();
    loop {
        let next = normalize_once(&key);
        if next == key {
            return key;
        }
        key = next;
    }
}
