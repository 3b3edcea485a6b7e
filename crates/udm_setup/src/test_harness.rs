//! # TestRun: headless harness for end-to-end setup runs
//!
//! Wraps `bevy::app::App` + `SetupPlugin` over a scratch `DATA_PATH`. Builder
//! methods lay out input files and configuration; `run()` executes the
//! Startup pipeline once with a fake rendering engine (and, optionally, a fake
//! feature API) and returns a [`FinishedRun`] to assert on.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bevy::app::App;
use bevy::prelude::*;

use crate::config::{SetupConfig, Stages, INPUT_GRID_DIR, INPUT_VECTOR_DIR};
use crate::error::{SetupError, SetupResult};
use crate::feature_api::{FeatureRequest, FeatureSource, FeatureSourceHandle};
use crate::geometry::{BoundingBox, FeatureCollection};
use crate::grid_provider::synthesise_fishnet;
use crate::raster_engine::{RasterEngine, RasterEngineHandle, RasterJob};
use crate::{RunFailure, RunReport, SetupPlugin};

/// Rendering engine stand-in. Writes a small text artifact naming the grid
/// and resolution it was given, and records each layer name.
#[derive(Clone, Default)]
pub struct FakeEngine {
    jobs: Arc<Mutex<Vec<String>>>,
    produce_artifact: bool,
}

impl RasterEngine for FakeEngine {
    fn rasterise(&self, job: &RasterJob) -> SetupResult<()> {
        self.jobs.lock().unwrap().push(job.name.to_string());
        if self.produce_artifact {
            let body = format!(
                "grid={}\nresolution={}\ninvert={}\nnodata={}\n",
                job.grid.display(),
                job.resolution,
                job.policy.invert,
                job.policy.nodata
            );
            fs::write(&job.output, body)?;
        }
        Ok(())
    }
}

/// What the fake feature API answers: a collection, or an HTTP status.
type ApiAnswer = Result<FeatureCollection, u16>;

/// Feature API stand-in answering every request the same way.
pub struct FakeFeatureSource {
    answer: ApiAnswer,
    requests: Arc<Mutex<Vec<FeatureRequest>>>,
}

impl FeatureSource for FakeFeatureSource {
    fn fetch(&self, request: &FeatureRequest) -> SetupResult<FeatureCollection> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.answer {
            Ok(features) => Ok(features.clone()),
            Err(status) => Err(SetupError::Api {
                status: *status,
                url: request.url("http://feature-api.test"),
            }),
        }
    }
}

pub struct TestRun {
    dir: tempfile::TempDir,
    env: HashMap<String, String>,
    stages: Stages,
    engine: FakeEngine,
    api: Option<ApiAnswer>,
}

impl TestRun {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Empty data directory, manifests stage only, engine that produces
    /// artifacts.
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            env: HashMap::new(),
            stages: Stages::default(),
            engine: FakeEngine {
                jobs: Arc::default(),
                produce_artifact: true,
            },
            api: None,
        }
    }

    // -----------------------------------------------------------------------
    // Builder methods
    // -----------------------------------------------------------------------

    pub fn with_stages(mut self, stages: Stages) -> Self {
        self.stages = stages;
        self
    }

    /// Set a configuration key as if it were an environment variable.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Create a file at `relative` under the data directory.
    pub fn with_file(self, relative: &str, contents: &str) -> Self {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self
    }

    /// A supplied grid of `cols` x `rows` cells of `cell_size`, written under
    /// `inputs/grid/<name>`.
    pub fn with_grid(self, name: &str, cols: u32, rows: u32, cell_size: f64) -> Self {
        let bbox = BoundingBox {
            xmin: 0.0,
            ymin: 0.0,
            xmax: f64::from(cols) * cell_size,
            ymax: f64::from(rows) * cell_size,
        };
        let grid = synthesise_fishnet(&bbox, cell_size).unwrap();
        let body = serde_json::to_string(&grid).unwrap();
        self.with_file(&format!("{INPUT_GRID_DIR}/{name}"), &body)
    }

    /// An (empty) vector layer under `inputs/vectors/<name>`.
    pub fn with_vector_layer(self, name: &str) -> Self {
        let body = serde_json::to_string(&FeatureCollection::default()).unwrap();
        self.with_file(&format!("{INPUT_VECTOR_DIR}/{name}"), &body)
    }

    /// Answer feature API requests with `features`.
    pub fn with_api_features(mut self, features: FeatureCollection) -> Self {
        self.api = Some(Ok(features));
        self
    }

    /// Answer feature API requests with HTTP `status` and no body.
    pub fn with_failing_api(mut self, status: u16) -> Self {
        self.api = Some(Err(status));
        self
    }

    /// Make the fake engine report success without writing anything.
    pub fn with_silent_engine(mut self) -> Self {
        self.engine.produce_artifact = false;
        self
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Parse the configuration and run the Startup pipeline once.
    pub fn run(self) -> FinishedRun {
        let data_path = self.dir.path().to_path_buf();
        let env = self.env;
        let config = SetupConfig::from_lookup(|key| match key {
            "DATA_PATH" => Some(data_path.to_string_lossy().into_owned()),
            _ => env.get(key).cloned(),
        })
        .expect("test configuration should parse");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.insert_resource(config);
        app.insert_resource(RasterEngineHandle(Box::new(self.engine.clone())));
        if let Some(answer) = self.api {
            app.insert_resource(FeatureSourceHandle(Box::new(FakeFeatureSource {
                answer,
                requests: Arc::clone(&requests),
            })));
        }
        app.add_plugins(SetupPlugin {
            stages: self.stages,
        });
        app.update();

        FinishedRun {
            app,
            dir: self.dir,
            engine: self.engine,
            requests,
        }
    }
}

impl Default for TestRun {
    fn default() -> Self {
        Self::new()
    }
}

/// A completed run and its scratch directory.
pub struct FinishedRun {
    app: App,
    dir: tempfile::TempDir,
    engine: FakeEngine,
    requests: Arc<Mutex<Vec<FeatureRequest>>>,
}

impl FinishedRun {
    pub fn data_path(&self) -> &Path {
        self.dir.path()
    }

    pub fn outputs(&self) -> PathBuf {
        self.dir.path().join("outputs")
    }

    pub fn output(&self, relative: &str) -> PathBuf {
        self.outputs().join(relative)
    }

    pub fn read_output(&self, relative: &str) -> String {
        fs::read_to_string(self.output(relative))
            .unwrap_or_else(|e| panic!("reading {relative}: {e}"))
    }

    /// Regular files directly inside `outputs/<relative>`, sorted.
    pub fn files_in(&self, relative: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.output(relative))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn resource<T: Resource>(&self) -> &T {
        self.app.world().resource::<T>()
    }

    pub fn report(&self) -> &RunReport {
        self.resource::<RunReport>()
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.app.world().get_resource::<RunFailure>()
    }

    pub fn app_exit(&self) -> Option<AppExit> {
        self.app.should_exit()
    }

    pub fn engine_jobs(&self) -> Vec<String> {
        self.engine.jobs.lock().unwrap().clone()
    }

    pub fn api_requests(&self) -> Vec<FeatureRequest> {
        self.requests.lock().unwrap().clone()
    }

    // -----------------------------------------------------------------------
    // Assertions
    // -----------------------------------------------------------------------

    pub fn assert_success(&self) {
        if let Some(failure) = self.failure() {
            panic!(
                "run failed with status {}: {}",
                failure.exit_code, failure.message
            );
        }
    }

    pub fn assert_failed_with(&self, exit_code: u8) {
        let failure = self.failure().expect("run should have failed");
        assert_eq!(
            failure.exit_code, exit_code,
            "unexpected status, message: {}",
            failure.message
        );
    }
}
