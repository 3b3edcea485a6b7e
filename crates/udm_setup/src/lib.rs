use bevy::prelude::*;
use serde::Serialize;

pub mod ascii_grid;
pub mod companions;
pub mod config;
pub mod dafni_metadata;
pub mod discovery;
pub mod error;
pub mod feature_api;
pub mod feature_filter;
pub mod geometry;
pub mod grid_provider;
pub mod layer_spec;
pub mod manifest;
pub mod normalizer;
pub mod output_area;
pub mod raster_engine;
pub mod rasterise;
pub mod resolver;
pub mod run_log;
pub mod stages;
pub mod vector_io;

#[cfg(test)]
pub mod test_harness;

use config::Stages;
use error::SetupResult;
use grid_provider::SharedGrid;
use rasterise::RasterOutput;

// ---------------------------------------------------------------------------
// Run outcome resources
// ---------------------------------------------------------------------------

/// Present once a stage has failed. Every later stage is skipped.
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub message: String,
    pub exit_code: u8,
}

/// What a run produced, logged as JSON when the app exits.
#[derive(Resource, Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub discovered_files: usize,
    pub constraint_rows: Option<usize>,
    pub attractor_rows: Option<usize>,
    pub metadata_merged: bool,
    pub catalogue_documents: Vec<String>,
    pub grid: Option<SharedGrid>,
    pub rasters: Vec<RasterOutput>,
}

/// Terminal stage of every pipelined system: a failure is logged once,
/// recorded, and turned into the process status.
pub fn report_failure(
    In(result): In<SetupResult<()>>,
    mut commands: Commands,
    mut exit: EventWriter<AppExit>,
) {
    if let Err(err) = result {
        error!("{err}");
        let exit_code = err.exit_code();
        commands.insert_resource(RunFailure {
            message: err.to_string(),
            exit_code,
        });
        exit.send(AppExit::from_code(exit_code));
    }
}

pub fn run_healthy(failure: Option<Res<RunFailure>>) -> bool {
    failure.is_none()
}

fn manifests_selected(stages: Res<Stages>) -> bool {
    stages.manifests
}

fn rasterise_selected(stages: Res<Stages>) -> bool {
    stages.rasterise
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// Runs the selected pipeline stages once, in order, during `Startup`.
///
/// Expects a [`config::SetupConfig`] resource. Inserting a
/// [`raster_engine::RasterEngineHandle`] or [`feature_api::FeatureSourceHandle`]
/// before startup replaces the production collaborators.
#[derive(Default)]
pub struct SetupPlugin {
    pub stages: Stages,
}

impl Plugin for SetupPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.stages)
            .init_resource::<RunReport>()
            .add_systems(
                Startup,
                (
                    stages::check_configuration.pipe(report_failure),
                    stages::install_collaborators
                        .pipe(report_failure)
                        .run_if(rasterise_selected),
                    stages::prepare_output_area.pipe(report_failure),
                    stages::discover_inputs
                        .pipe(report_failure)
                        .run_if(manifests_selected),
                    stages::write_manifests
                        .pipe(report_failure)
                        .run_if(manifests_selected),
                    stages::write_companions
                        .pipe(report_failure)
                        .run_if(manifests_selected),
                    stages::establish_shared_grid
                        .pipe(report_failure)
                        .run_if(rasterise_selected),
                    stages::rasterise_layers
                        .pipe(report_failure)
                        .run_if(rasterise_selected),
                )
                    .chain()
                    .distributive_run_if(run_healthy),
            );
    }
}
