use bevy::prelude::*;
use serde::Serialize;

use crate::error::{SetupError, SetupResult};
use crate::output_area::OutputArea;

/// A strict-schema manifest: fixed header plus zero or more rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestTable<R> {
    pub columns: &'static [&'static str],
    pub rows: Vec<R>,
}

impl<R: Serialize> ManifestTable<R> {
    pub fn new(columns: &'static [&'static str], rows: Vec<R>) -> Self {
        Self { columns, rows }
    }

    /// CSV bytes. The header is always present, even with no rows.
    pub fn to_csv(&self) -> SetupResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(self.columns)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| SetupError::Csv(e.to_string()))
    }
}

/// Write `table` into the output area as `file_name`, replacing any previous
/// version.
pub fn write_table<R: Serialize>(
    area: &OutputArea,
    file_name: &str,
    table: &ManifestTable<R>,
) -> SetupResult<()> {
    let bytes = table.to_csv()?;
    let path = area.write_file(file_name, &bytes)?;
    info!(
        "Written {} ({} rows) to {}",
        file_name,
        table.rows.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        a: &'static str,
        b: f64,
    }

    #[test]
    fn test_header_without_rows() {
        let table: ManifestTable<Row> = ManifestTable::new(&["a", "b"], Vec::new());
        assert_eq!(String::from_utf8(table.to_csv().unwrap()).unwrap(), "a,b\n");
    }

    #[test]
    fn test_rows_follow_header() {
        let table = ManifestTable::new(&["a", "b"], vec![Row { a: "x.asc", b: 0.5 }]);
        assert_eq!(
            String::from_utf8(table.to_csv().unwrap()).unwrap(),
            "a,b\nx.asc,0.5\n"
        );
    }

    #[test]
    fn test_write_table_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let area = OutputArea::prepare(dir.path().join("outputs")).unwrap();
        let first = ManifestTable::new(
            &["a", "b"],
            vec![Row { a: "x", b: 1.0 }, Row { a: "y", b: 2.0 }],
        );
        let second = ManifestTable::new(&["a", "b"], vec![Row { a: "z", b: 3.0 }]);

        write_table(&area, "t.csv", &first).unwrap();
        write_table(&area, "t.csv", &second).unwrap();

        let text = std::fs::read_to_string(area.path_of("t.csv")).unwrap();
        assert_eq!(text, "a,b\nz,3.0\n");
    }
}
