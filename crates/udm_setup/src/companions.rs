//! Non-layer inputs the model needs next to its manifests.

use std::path::PathBuf;

use bevy::prelude::*;

use crate::discovery::DiscoveredFile;
use crate::error::SetupResult;
use crate::output_area::OutputArea;

/// Name fragment -> fixed destination name in the output area.
pub const COMPANION_FILES: &[(&str, &str)] = &[
    ("zone_identity", "zone_identity.asc"),
    ("population", "population.csv"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopiedCompanions {
    pub zone_identity: Option<PathBuf>,
    pub population: Option<PathBuf>,
}

/// Copy the first discovered file whose name contains each fragment.
pub fn copy_companions(
    files: &[DiscoveredFile],
    area: &OutputArea,
) -> SetupResult<CopiedCompanions> {
    let mut copied = CopiedCompanions::default();
    for (fragment, dest_name) in COMPANION_FILES {
        let source = files
            .iter()
            .find(|f| f.base_name().to_lowercase().contains(fragment));
        let Some(source) = source else {
            warn!("No {fragment} input found; {dest_name} will be missing from outputs");
            continue;
        };
        let dest = area.copy_in(&source.path, dest_name)?;
        match *fragment {
            "zone_identity" => copied.zone_identity = Some(dest),
            _ => copied.population = Some(dest),
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_first_match_copied_under_fixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir_all(&input).unwrap();
        let mut files = Vec::new();
        for name in [
            "Zone_Identity_clip.asc",
            "population_2050.csv",
            "population_2020.csv",
        ] {
            fs::write(input.join(name), name).unwrap();
            files.push(DiscoveredFile::new(input.join(name)).unwrap());
        }
        let area = OutputArea::prepare(dir.path().join("outputs")).unwrap();

        let copied = copy_companions(&files, &area).unwrap();

        assert_eq!(
            copied.zone_identity,
            Some(area.path_of("zone_identity.asc"))
        );
        assert_eq!(
            fs::read_to_string(area.path_of("population.csv")).unwrap(),
            "population_2050.csv"
        );
    }

    #[test]
    fn test_missing_companions_are_not_errors() {
        let dir = tempfile::tempdir().unwrap();
        let area = OutputArea::prepare(dir.path().join("outputs")).unwrap();
        let copied = copy_companions(&[], &area).unwrap();
        assert_eq!(copied, CopiedCompanions::default());
    }
}
