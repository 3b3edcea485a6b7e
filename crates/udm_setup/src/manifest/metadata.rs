use std::path::Path;

use bevy::prelude::*;

use crate::discovery::{DiscoveredFile, FileExtension};
use crate::error::{SetupError, SetupResult};
use crate::layer_spec::ExtraParameter;
use crate::normalizer::normalize;
use crate::output_area::OutputArea;

const METADATA_KEY: &str = "metadata";

/// Outcome of looking for a pre-existing metadata table among the inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataMerge<'a> {
    Single(&'a DiscoveredFile),
    NotFound,
    /// Merging several tables is unsupported; the merge is skipped.
    Ambiguous(usize),
}

pub fn find_metadata_table(files: &[DiscoveredFile]) -> MetadataMerge<'_> {
    let candidates: Vec<&DiscoveredFile> = files
        .iter()
        .filter(|f| f.extension == FileExtension::Csv)
        .filter(|f| normalize(&f.path.to_string_lossy()).contains(METADATA_KEY))
        .collect();
    match candidates.as_slice() {
        [] => MetadataMerge::NotFound,
        [single] => MetadataMerge::Single(*single),
        many => MetadataMerge::Ambiguous(many.len()),
    }
}

/// A free-form table whose first two columns are parameter name and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MetadataTable {
    pub fn read(path: &Path) -> SetupResult<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        if headers.len() < 2 {
            return Err(SetupError::Csv(format!(
                "metadata table {} needs a name and a value column",
                path.display()
            )));
        }
        let rows = reader
            .records()
            .map(|r| r.map(|rec| rec.iter().map(String::from).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(Self { headers, rows })
    }

    /// Append one row per extra parameter, padding any further columns.
    pub fn append(&mut self, extras: &[ExtraParameter]) {
        let width = self.headers.len();
        for extra in extras {
            let mut row = vec![extra.name.clone(), extra.value.clone()];
            row.resize(width, String::new());
            self.rows.push(row);
        }
    }

    pub fn to_csv(&self) -> SetupResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| SetupError::Csv(e.to_string()))
    }
}

/// Merge extra parameters into the single metadata table found among the
/// inputs and write the result as `file_name`. Zero or several tables skip the
/// merge with a warning. Returns whether a merged table was written.
pub fn merge_metadata(
    files: &[DiscoveredFile],
    extras: &[ExtraParameter],
    area: &OutputArea,
    file_name: &str,
) -> SetupResult<bool> {
    let source = match find_metadata_table(files) {
        MetadataMerge::Single(file) => file,
        MetadataMerge::NotFound => {
            warn!("No metadata table found among inputs; skipping metadata merge");
            return Ok(false);
        }
        MetadataMerge::Ambiguous(count) => {
            warn!("Found {count} metadata tables; merging more than one is unsupported, skipping");
            return Ok(false);
        }
    };
    let mut table = MetadataTable::read(&source.path)?;
    table.append(extras);
    let path = area.write_file(file_name, &table.to_csv()?)?;
    info!(
        "Merged {} extra parameters into {} -> {}",
        extras.len(),
        source.path.display(),
        path.display()
    );
    Ok(true)
}
