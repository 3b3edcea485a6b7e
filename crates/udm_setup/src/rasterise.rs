//! Layer rasterisation against the run's shared grid.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::Serialize;

use crate::config::{COMPOSITE_LAYER_NAME, RASTER_EXTENSION};
use crate::error::{SetupError, SetupResult};
use crate::feature_api::{FeatureRequest, FeatureSource};
use crate::feature_filter::{partition, CURRENT_DEVELOPMENT_RULES};
use crate::geometry::FeatureCollection;
use crate::grid_provider::SharedGrid;
use crate::output_area::OutputArea;
use crate::raster_engine::{RasterEngine, RasterJob, RasterPolicy};
use crate::vector_io::read_layer;

/// Payloads live apart from the validated grid so no layer name can clobber it.
const PAYLOAD_DIR: &str = "layers";

/// A raster relocated into `outputs/data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RasterOutput {
    pub name: String,
    pub path: PathBuf,
}

/// Move `from` to `to`, copying when a rename is not possible (different
/// filesystems).
fn relocate(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

pub struct Rasteriser<'a> {
    engine: &'a dyn RasterEngine,
    grid: &'a SharedGrid,
    work_dir: &'a Path,
    area: &'a OutputArea,
}

impl<'a> Rasteriser<'a> {
    pub fn new(
        engine: &'a dyn RasterEngine,
        grid: &'a SharedGrid,
        work_dir: &'a Path,
        area: &'a OutputArea,
    ) -> Self {
        Self {
            engine,
            grid,
            work_dir,
            area,
        }
    }

    /// Write `layer` as the engine payload, rasterise it and move the
    /// artifact to `outputs/data/<name>.tif`.
    pub fn rasterise_collection(
        &self,
        name: &str,
        layer: &FeatureCollection,
    ) -> SetupResult<RasterOutput> {
        let payload = self
            .work_dir
            .join(PAYLOAD_DIR)
            .join(format!("{name}.geojson"));
        layer.write(&payload)?;

        let file_name = format!("{name}.{RASTER_EXTENSION}");
        let artifact = self.work_dir.join(&file_name);
        // A leftover from an earlier run must not stand in for this one.
        if artifact.exists() {
            fs::remove_file(&artifact)?;
        }

        let job = RasterJob {
            name,
            payload: &payload,
            grid: &self.grid.path,
            resolution: self.grid.cell_size,
            policy: RasterPolicy::FIXED,
            output: artifact.clone(),
        };
        self.engine.rasterise(&job)?;

        if !artifact.is_file() {
            return Err(SetupError::MissingArtifact(artifact));
        }
        let dest = self.area.data_dir().join(&file_name);
        relocate(&artifact, &dest)?;
        info!(
            "Rasterised '{}' ({} features) to {}",
            name,
            layer.len(),
            dest.display()
        );
        Ok(RasterOutput {
            name: name.to_string(),
            path: dest,
        })
    }

    /// Rasterise one vector file under its file stem.
    pub fn rasterise_file(&self, path: &Path) -> SetupResult<RasterOutput> {
        let name = layer_name(path)?;
        let layer = read_layer(path)?;
        self.rasterise_collection(&name, &layer)
    }

    /// Rasterise every file in `paths`. A file whose stem is in `reserved`,
    /// or repeats an earlier one, is skipped.
    pub fn rasterise_files(
        &self,
        paths: &[PathBuf],
        reserved: &[&str],
    ) -> SetupResult<Vec<RasterOutput>> {
        let mut seen = HashSet::new();
        let mut outputs = Vec::with_capacity(paths.len());
        for path in paths {
            let name = layer_name(path)?;
            if reserved.contains(&name.as_str()) {
                warn!(
                    "Skipping {}: '{}' is produced from the feature API",
                    path.display(),
                    name
                );
                continue;
            }
            if !seen.insert(name.clone()) {
                warn!(
                    "Skipping {}: a layer named '{}' was already rasterised",
                    path.display(),
                    name
                );
                continue;
            }
            outputs.push(self.rasterise_file(path)?);
        }
        Ok(outputs)
    }

    /// Fetch the composite feature set, keep the features matching the
    /// current-development rules and rasterise them once.
    pub fn rasterise_composite(
        &self,
        source: &dyn FeatureSource,
        request: &FeatureRequest,
    ) -> SetupResult<RasterOutput> {
        let fetched = source.fetch(request)?;
        let raw = self
            .work_dir
            .join(format!("mastermap_{}.geojson", request.label()));
        fetched.write(&raw)?;

        let parts = partition(&fetched, CURRENT_DEVELOPMENT_RULES);
        for (rule, features) in &parts.subsets {
            info!("Composite rule '{}' kept {} features", rule, features.len());
        }
        debug!("{} fetched features matched no rule", parts.unmatched);
        let merged = parts.merged(fetched.crs.clone());
        if merged.is_empty() {
            warn!("No fetched feature matched a current-development rule");
        }
        self.rasterise_collection(COMPOSITE_LAYER_NAME, &merged)
    }
}

fn layer_name(path: &Path) -> SetupResult<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(String::from)
        .ok_or_else(|| {
            SetupError::MalformedInput(format!("no layer name in {}", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid_provider::GridOrigin;
    use serde_json::json;
    use std::sync::Mutex;

    /// Writes the grid path into the artifact and records each job.
    #[derive(Default)]
    struct RecordingEngine {
        jobs: Mutex<Vec<(String, f64, RasterPolicy)>>,
        skip_output: bool,
    }

    impl RasterEngine for RecordingEngine {
        fn rasterise(&self, job: &RasterJob) -> SetupResult<()> {
            self.jobs
                .lock()
                .unwrap()
                .push((job.name.to_string(), job.resolution, job.policy));
            if !self.skip_output {
                fs::write(&job.output, job.grid.to_string_lossy().as_bytes())?;
            }
            Ok(())
        }
    }

    struct FixedSource(FeatureCollection);

    impl FeatureSource for FixedSource {
        fn fetch(&self, _request: &FeatureRequest) -> SetupResult<FeatureCollection> {
            Ok(self.0.clone())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        work: PathBuf,
        inputs: PathBuf,
        area: OutputArea,
        grid: SharedGrid,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        let inputs = dir.path().join("vectors");
        fs::create_dir_all(&work).unwrap();
        fs::create_dir_all(&inputs).unwrap();
        let area = OutputArea::prepare(dir.path().join("outputs")).unwrap();
        let grid = SharedGrid {
            origin: GridOrigin::Supplied(dir.path().join("grid.geojson")),
            path: work.join("grid.geojson"),
            cell_size: 100.0,
            cell_count: 4,
        };
        Fixture {
            _dir: dir,
            work,
            inputs,
            area,
            grid,
        }
    }

    fn write_layer(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, r#"{"type":"FeatureCollection","features":[]}"#).unwrap();
        path
    }

    #[test]
    fn test_file_layer_is_relocated_under_its_stem() {
        let fx = fixture();
        let engine = RecordingEngine::default();
        let rasteriser = Rasteriser::new(&engine, &fx.grid, &fx.work, &fx.area);
        let path = write_layer(&fx.inputs, "rail.geojson");

        let output = rasteriser.rasterise_file(&path).unwrap();

        assert_eq!(output.name, "rail");
        assert_eq!(output.path, fx.area.data_dir().join("rail.tif"));
        assert!(output.path.is_file());
        assert!(!fx.work.join("rail.tif").exists());
        let jobs = engine.jobs.lock().unwrap();
        assert_eq!(jobs[0], ("rail".to_string(), 100.0, RasterPolicy::FIXED));
    }

    #[test]
    fn test_missing_artifact_is_fatal() {
        let fx = fixture();
        let engine = RecordingEngine {
            skip_output: true,
            ..Default::default()
        };
        let rasteriser = Rasteriser::new(&engine, &fx.grid, &fx.work, &fx.area);
        let path = write_layer(&fx.inputs, "rail.geojson");

        let err = rasteriser.rasterise_file(&path).unwrap_err();

        assert!(matches!(err, SetupError::MissingArtifact(_)));
        assert!(!fx.area.data_dir().join("rail.tif").exists());
    }

    #[test]
    fn test_stale_artifact_does_not_mask_failure() {
        let fx = fixture();
        fs::write(fx.work.join("rail.tif"), b"stale").unwrap();
        let engine = RecordingEngine {
            skip_output: true,
            ..Default::default()
        };
        let rasteriser = Rasteriser::new(&engine, &fx.grid, &fx.work, &fx.area);
        let path = write_layer(&fx.inputs, "rail.geojson");

        assert!(rasteriser.rasterise_file(&path).is_err());
    }

    #[test]
    fn test_repeated_stem_is_skipped() {
        let fx = fixture();
        let engine = RecordingEngine::default();
        let rasteriser = Rasteriser::new(&engine, &fx.grid, &fx.work, &fx.area);
        let first = write_layer(&fx.inputs, "rail.geojson");
        let second = write_layer(&fx.inputs, "rail.json");

        let outputs = rasteriser.rasterise_files(&[first, second], &[]).unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(engine.jobs.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_reserved_stem_is_left_to_the_composite_layer() {
        let fx = fixture();
        let engine = RecordingEngine::default();
        let rasteriser = Rasteriser::new(&engine, &fx.grid, &fx.work, &fx.area);
        let clash = write_layer(&fx.inputs, "current_development.geojson");
        let rail = write_layer(&fx.inputs, "rail.geojson");

        let outputs = rasteriser
            .rasterise_files(&[clash, rail], &[COMPOSITE_LAYER_NAME])
            .unwrap();

        let names: Vec<_> = outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["rail"]);
        assert!(!fx.area.data_dir().join("current_development.tif").exists());
        let jobs = engine.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0, "rail");
    }

    #[test]
    fn test_composite_layer_keeps_only_matching_features() {
        let fx = fixture();
        let engine = RecordingEngine::default();
        let rasteriser = Rasteriser::new(&engine, &fx.grid, &fx.work, &fx.area);
        let fetched = FeatureCollection::from_json(
            &json!({
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "properties": {"theme": "Buildings", "make": "Manmade"}, "geometry": null},
                    {"type": "Feature", "properties": {"theme": "Roads Tracks And Paths", "make": "Unknown"}, "geometry": null},
                    {"type": "Feature", "properties": {"theme": "Water", "make": "Natural"}, "geometry": null}
                ]
            })
            .to_string(),
        )
        .unwrap();
        let request = FeatureRequest {
            area_codes: vec!["E08000021".into()],
            year: None,
        };

        let output = rasteriser
            .rasterise_composite(&FixedSource(fetched), &request)
            .unwrap();

        assert_eq!(output.name, COMPOSITE_LAYER_NAME);
        assert!(fx.area.data_dir().join("current_development.tif").is_file());
        let payload_path = fx
            .work
            .join(PAYLOAD_DIR)
            .join("current_development.geojson");
        let payload = FeatureCollection::read(&payload_path).unwrap();
        assert_eq!(payload.len(), 2);
        assert!(fx.work.join("mastermap_E08000021.geojson").is_file());
    }
}
