//! Directory scan for candidate layer files.

use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::SetupResult;

/// File types the scan accepts. Anything else under the root is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileExtension {
    Asc,
    Tiff,
    GeoTiff,
    Gpkg,
    Csv,
}

impl FileExtension {
    pub const ALL: [FileExtension; 5] = [
        FileExtension::Asc,
        FileExtension::Tiff,
        FileExtension::GeoTiff,
        FileExtension::Gpkg,
        FileExtension::Csv,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileExtension::Asc => "asc",
            FileExtension::Tiff => "tiff",
            FileExtension::GeoTiff => "geotiff",
            FileExtension::Gpkg => "gpkg",
            FileExtension::Csv => "csv",
        }
    }

    /// Exact (case-sensitive) match on the text after the last `.`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::ALL.into_iter().find(|e| e.as_str() == ext)
    }
}

/// A candidate input found by the scan. Read-only to the rest of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub extension: FileExtension,
}

impl DiscoveredFile {
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let extension = FileExtension::from_file_name(path.file_name()?.to_str()?)?;
        Some(Self { path, extension })
    }

    /// Final path segment, which is also the name the file is copied under.
    pub fn base_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Scan result, in scan order.
#[derive(Resource, Debug, Clone, Default)]
pub struct DiscoveredInputs(pub Vec<DiscoveredFile>);

/// Walk `root` for accepted files, skipping anything beneath `excluded`.
///
/// Entries are visited in file-name order within each directory so repeated
/// scans of the same tree yield the same list.
pub fn find_files(root: &Path, excluded: &[PathBuf]) -> SetupResult<Vec<DiscoveredFile>> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !excluded.iter().any(|ex| entry.path() == ex.as_path()));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(file) = DiscoveredFile::new(entry.path()) {
            debug!("Discovered {}", file.path.display());
            found.push(file);
        }
    }
    info!(
        "Found {} candidate input files under {}",
        found.len(),
        root.display()
    );
    Ok(found)
}
