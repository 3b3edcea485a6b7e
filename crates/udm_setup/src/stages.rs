//! Startup systems, one per pipeline stage. Each returns a [`SetupResult`]
//! that is piped into [`crate::report_failure`].

use bevy::prelude::*;

use crate::ascii_grid::AsciiGridHeader;
use crate::companions::copy_companions;
use crate::config::{
    SetupConfig, Stages, ATTRACTORS_FILE, COMPOSITE_LAYER_NAME, CONSTRAINTS_FILE, METADATA_FILE,
    PARAMETERS_FILE,
};
use crate::dafni_metadata::write_catalogue;
use crate::discovery::{find_files, DiscoveredInputs};
use crate::error::{SetupError, SetupResult};
use crate::feature_api::{FeatureRequest, FeatureSourceHandle, HttpFeatureSource};
use crate::grid_provider::{establish_grid, SharedGrid};
use crate::manifest::{build_attractors, build_constraints, merge_metadata, write_table};
use crate::output_area::OutputArea;
use crate::raster_engine::{CommandEngine, RasterEngineHandle};
use crate::rasterise::Rasteriser;
use crate::resolver::LayerResolver;
use crate::vector_io::list_vector_files;
use crate::RunReport;

pub fn check_configuration(config: Res<SetupConfig>, stages: Res<Stages>) -> SetupResult<()> {
    info!(
        "Running stages: manifests={}, rasterise={}",
        stages.manifests, stages.rasterise
    );
    debug!("Configuration: {}", serde_json::to_string(&*config)?);
    config.validate(&stages)
}

/// Install the production engine and feature source unless a caller already
/// inserted replacements.
pub fn install_collaborators(
    mut commands: Commands,
    config: Res<SetupConfig>,
    engine: Option<Res<RasterEngineHandle>>,
    source: Option<Res<FeatureSourceHandle>>,
) -> SetupResult<()> {
    if engine.is_none() {
        let engine = CommandEngine::from_command_line(&config.rasterise_command)?;
        commands.insert_resource(RasterEngineHandle(Box::new(engine)));
    }
    if source.is_none() {
        match &config.api {
            Some(api) if config.wants_composite_layer() => {
                let source = HttpFeatureSource::new(api.clone())?;
                commands.insert_resource(FeatureSourceHandle(Box::new(source)));
            }
            Some(_) => warn!("API_URL is set but area_codes is empty; no composite layer"),
            None => debug!("No feature API configured"),
        }
    }
    Ok(())
}

pub fn prepare_output_area(
    mut commands: Commands,
    config: Res<SetupConfig>,
    stages: Res<Stages>,
) -> SetupResult<()> {
    let area = OutputArea::prepare_for(config.output_dir(), &stages)?;
    commands.insert_resource(area);
    Ok(())
}

pub fn discover_inputs(
    mut commands: Commands,
    config: Res<SetupConfig>,
    mut report: ResMut<RunReport>,
) -> SetupResult<()> {
    let excluded = [config.output_dir(), config.raster_work_dir()];
    let files = find_files(config.scan_root(), &excluded)?;
    report.discovered_files = files.len();
    commands.insert_resource(DiscoveredInputs(files));
    Ok(())
}

/// Build every manifest before writing any, so a mandatory-layer miss leaves
/// no table behind.
pub fn write_manifests(
    config: Res<SetupConfig>,
    inputs: Res<DiscoveredInputs>,
    area: Res<OutputArea>,
    mut report: ResMut<RunReport>,
) -> SetupResult<()> {
    let current_development = config.current_development.as_ref().ok_or_else(|| {
        SetupError::Config("current_development is required to build manifests".into())
    })?;
    let resolver = LayerResolver::new(&inputs.0, &config.aliases);

    let constraints =
        build_constraints(&config.constraints, current_development, &resolver, &area)?;
    let attractors = build_attractors(&config.attractors, &resolver, &area)?;
    let parameters = config.parameters.to_table();

    write_table(&area, CONSTRAINTS_FILE, &constraints)?;
    write_table(&area, ATTRACTORS_FILE, &attractors)?;
    write_table(&area, PARAMETERS_FILE, &parameters)?;
    report.constraint_rows = Some(constraints.rows.len());
    report.attractor_rows = Some(attractors.rows.len());

    report.metadata_merged =
        merge_metadata(&inputs.0, &config.extra_parameters, &area, METADATA_FILE)?;
    Ok(())
}

/// Copy the zone identity grid and population table, then describe the run
/// in the catalogue documents.
pub fn write_companions(
    config: Res<SetupConfig>,
    inputs: Res<DiscoveredInputs>,
    area: Res<OutputArea>,
    mut report: ResMut<RunReport>,
) -> SetupResult<()> {
    let copied = copy_companions(&inputs.0, &area)?;
    let Some(zone_identity) = copied.zone_identity else {
        warn!("No zone identity grid; catalogue metadata not written");
        return Ok(());
    };
    let extent = AsciiGridHeader::read(&zone_identity)?.bounds();
    report.catalogue_documents = write_catalogue(
        &area.metadata_dir(),
        &config.output_title,
        &config.output_description,
        &extent,
    )?;
    Ok(())
}

pub fn establish_shared_grid(
    mut commands: Commands,
    config: Res<SetupConfig>,
    existing: Option<Res<SharedGrid>>,
) -> SetupResult<()> {
    if let Some(grid) = existing {
        debug!("Reusing grid from {:?}", grid.origin);
        return Ok(());
    }
    commands.insert_resource(establish_grid(&config)?);
    Ok(())
}

/// Rasterise every supplied vector layer, then the composite layer when a
/// feature source is available.
pub fn rasterise_layers(
    config: Res<SetupConfig>,
    grid: Res<SharedGrid>,
    area: Res<OutputArea>,
    engine: Res<RasterEngineHandle>,
    source: Option<Res<FeatureSourceHandle>>,
    mut report: ResMut<RunReport>,
) -> SetupResult<()> {
    let work_dir = config.raster_work_dir();
    let rasteriser = Rasteriser::new(engine.0.as_ref(), &grid, &work_dir, &area);

    let layers = list_vector_files(&config.vector_input_dir())?;
    info!(
        "Rasterising {} vector layers from {}",
        layers.len(),
        config.vector_input_dir().display()
    );
    // A supplied file must not overwrite the composite layer's raster.
    let reserved: &[&str] = if source.is_some() {
        &[COMPOSITE_LAYER_NAME]
    } else {
        &[]
    };
    report.rasters = rasteriser.rasterise_files(&layers, reserved)?;

    if let Some(source) = source {
        let request = FeatureRequest {
            area_codes: config.area_codes.clone(),
            year: config.year.clone(),
        };
        let output = rasteriser.rasterise_composite(source.0.as_ref(), &request)?;
        report.rasters.push(output);
    }
    report.grid = Some(SharedGrid::clone(&grid));
    Ok(())
}
