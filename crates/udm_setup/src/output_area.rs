//! The run's managed output area.
//!
//! Every file a manifest references is copied in here, every manifest is
//! written here, and rasters are relocated here. Writes use the write-rename
//! pattern: data goes to `{path}.tmp`, is synced, then renamed over the final
//! path, so a run that dies mid-write never leaves a truncated table behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use bevy::prelude::*;

use crate::config::{Stages, OUTPUT_DATA_DIR, OUTPUT_META_DIR, RUN_LOG_FILE};
use crate::error::SetupResult;

/// Atomically writes `data` to `path` using the write-rename pattern.
///
/// If the process dies before the rename, whatever was at `path` before is
/// untouched.
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Create `path` if missing, otherwise delete the regular files directly in it
/// except those named in `keep`. Sub-directories are left alone.
pub fn ensure_clean_dir(path: &Path, keep: &[&str]) -> std::io::Result<()> {
    if !path.is_dir() {
        return fs::create_dir_all(path);
    }
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if keep.iter().any(|name| entry.file_name() == *name) {
            continue;
        }
        fs::remove_file(entry.path())?;
    }
    Ok(())
}

/// Handle on `<DATA_PATH>/outputs` for the lifetime of a run.
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct OutputArea {
    root: PathBuf,
}

impl OutputArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create (or empty) the root and its `data/` and `metadata/` children.
    pub fn prepare(root: impl Into<PathBuf>) -> SetupResult<Self> {
        Self::prepare_for(root, &Stages::all())
    }

    /// Create the area, emptying only what the selected stages rewrite:
    /// manifests and catalogue documents for the manifest stage, `data/` for
    /// rasterisation. A rasterise-only run keeps earlier manifests. The run
    /// log is already open by now and always survives.
    pub fn prepare_for(root: impl Into<PathBuf>, stages: &Stages) -> SetupResult<Self> {
        let area = Self::new(root);
        let keep_log: &[&str] = &[RUN_LOG_FILE];
        let keep_none: &[&str] = &[];
        for (dir, owned, keep) in [
            (area.root.clone(), stages.manifests, keep_log),
            (area.metadata_dir(), stages.manifests, keep_none),
            (area.data_dir(), stages.rasterise, keep_none),
        ] {
            if owned {
                ensure_clean_dir(&dir, keep)?;
            } else {
                fs::create_dir_all(&dir)?;
            }
        }
        info!("Output area prepared at {}", area.root.display());
        Ok(area)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DATA_DIR)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_META_DIR)
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Copy `source` into the area as `dest_name`.
    pub fn copy_in(&self, source: &Path, dest_name: &str) -> SetupResult<PathBuf> {
        let dest = self.path_of(dest_name);
        fs::copy(source, &dest)?;
        info!(
            "Copied {} into output area as {}",
            source.display(),
            dest_name
        );
        Ok(dest)
    }

    /// Replace `file_name` in the area with `data`.
    pub fn write_file(&self, file_name: &str, data: &[u8]) -> SetupResult<PathBuf> {
        let dest = self.path_of(file_name);
        atomic_write(&dest, data)?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/table.csv");

        atomic_write(&path, b"a,b\n").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"a,b\n");
        assert!(!dir.path().join("nested/deep/table.csv.tmp").exists());
    }

    #[test]
    fn test_atomic_write_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");

        atomic_write(&path, b"version 1").unwrap();
        atomic_write(&path, b"version 2").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"version 2");
    }

    #[test]
    fn test_atomic_write_replaces_leftover_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let tmp = dir.path().join("table.csv.tmp");
        fs::write(&path, b"original").unwrap();
        fs::write(&tmp, b"partial garbage").unwrap();

        atomic_write(&path, b"new").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert!(!tmp.exists());
    }

    #[test]
    fn test_prepare_clears_stale_files_but_keeps_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("outputs");
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::write(root.join("stale.csv"), b"old").unwrap();

        let area = OutputArea::prepare(&root).unwrap();

        assert!(!root.join("stale.csv").exists());
        assert!(root.join("keep").is_dir());
        assert!(area.data_dir().is_dir());
        assert!(area.metadata_dir().is_dir());
    }

    #[test]
    fn test_prepare_keeps_the_run_log() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("outputs");
        fs::create_dir_all(root.join("metadata")).unwrap();
        fs::write(root.join(RUN_LOG_FILE), b"INFO started\n").unwrap();
        fs::write(root.join("metadata").join(RUN_LOG_FILE), b"stray").unwrap();

        OutputArea::prepare(&root).unwrap();

        assert_eq!(
            fs::read(root.join(RUN_LOG_FILE)).unwrap(),
            b"INFO started\n"
        );
        assert!(!root.join("metadata").join(RUN_LOG_FILE).exists());
    }

    #[test]
    fn test_rasterise_only_keeps_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("outputs");
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(root.join("attractors.csv"), b"layer_name").unwrap();
        fs::write(root.join("data/old.tif"), b"old").unwrap();
        let stages = Stages {
            manifests: false,
            rasterise: true,
        };

        OutputArea::prepare_for(&root, &stages).unwrap();

        assert!(root.join("attractors.csv").exists());
        assert!(!root.join("data/old.tif").exists());
    }

    #[test]
    fn test_copy_in_uses_given_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("greenbelt_clip.asc");
        fs::write(&source, b"ncols 1").unwrap();
        let area = OutputArea::prepare(dir.path().join("outputs")).unwrap();

        let dest = area.copy_in(&source, "greenbelt_clip.asc").unwrap();

        assert_eq!(dest, area.root().join("greenbelt_clip.asc"));
        assert_eq!(fs::read(dest).unwrap(), b"ncols 1");
    }
}
