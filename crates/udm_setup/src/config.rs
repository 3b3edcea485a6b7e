use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::Serialize;

use crate::error::{SetupError, SetupResult};
use crate::geometry::BoundingBox;
use crate::layer_spec::{self, ExtraParameter, LayerAliases, LayerSpec};
use crate::manifest::ModelParameters;

pub const DEFAULT_DATA_PATH: &str = "/data";
pub const OUTPUT_DIR: &str = "outputs";
pub const OUTPUT_DATA_DIR: &str = "data";
pub const OUTPUT_META_DIR: &str = "metadata";
pub const INPUT_GRID_DIR: &str = "inputs/grid";
pub const INPUT_VECTOR_DIR: &str = "inputs/vectors";
/// Scratch area handed to the rendering engine; lives outside `outputs/`.
pub const RASTER_WORK_DIR: &str = "rasterise_work";

pub const ATTRACTORS_FILE: &str = "attractors.csv";
pub const CONSTRAINTS_FILE: &str = "constraints.csv";
pub const PARAMETERS_FILE: &str = "parameters.csv";
pub const METADATA_FILE: &str = "metadata.csv";
/// Plain-text copy of the run's log, kept when the output area is emptied.
pub const RUN_LOG_FILE: &str = "udm-setup.log";
pub const SYNTHESISED_GRID_FILE: &str = "fishnet.geojson";
/// Validated grid handed to the rendering engine, inside [`RASTER_WORK_DIR`].
pub const VALIDATED_GRID_FILE: &str = "grid.geojson";
/// Raster name of the API-sourced composite layer.
pub const COMPOSITE_LAYER_NAME: &str = "current_development";

/// Disambiguation marker stripped from discovered file names.
pub const CLIP_MARKER: &str = "_clip";

/// Cell identifier column the rendering engine joins on.
pub const CELL_ID_COLUMN: &str = "FID";
/// Lower-case spellings accepted and renamed to [`CELL_ID_COLUMN`].
pub const CELL_ID_VARIANTS: &[&str] = &["fid"];

// Rasterisation policy, identical for every layer in a run.
/// Minimum percentage of a cell covered by geometry for the cell to count.
pub const RASTER_AREA_THRESHOLD: f64 = 50.0;
/// Cells over the threshold are written as 0 (unavailable for development).
pub const RASTER_INVERT: bool = true;
pub const RASTER_NODATA: i32 = -9999;
pub const RASTER_EXTENSION: &str = "tif";

pub const DEFAULT_GRID_CELL_SIZE: f64 = 100.0;
/// Upper bound on the number of cells a synthesised fishnet may hold.
pub const MAX_GRID_CELLS: usize = 10_000_000;
pub const DEFAULT_RASTERISE_COMMAND: &str = "rasterise";

// Scalar parameter defaults.
pub const DEFAULT_DENSITY_FROM_RASTER: u8 = 0;
pub const DEFAULT_PEOPLE_PER_DWELLING: f64 = 2.5;
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 50.0;
pub const DEFAULT_MINIMUM_DEVELOPMENT_AREA: u32 = 4;
pub const DEFAULT_MAXIMUM_PLOT_SIZE: u32 = 4;

/// Which pipeline stages a run executes.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stages {
    pub manifests: bool,
    pub rasterise: bool,
}

impl Default for Stages {
    fn default() -> Self {
        Self {
            manifests: true,
            rasterise: false,
        }
    }
}

impl Stages {
    pub fn all() -> Self {
        Self {
            manifests: true,
            rasterise: true,
        }
    }

    /// Stage selection from command-line flags. No flag means manifests only.
    pub fn from_args<I, S>(args: I) -> SetupResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut manifests = false;
        let mut rasterise = false;
        for arg in args {
            match arg.as_ref() {
                "--manifests" => manifests = true,
                "--rasterise" => rasterise = true,
                "--all" => return Ok(Self::all()),
                other => {
                    return Err(SetupError::Config(format!(
                        "unknown argument '{other}' (expected --manifests, --rasterise or --all)"
                    )));
                }
            }
        }
        if !manifests && !rasterise {
            return Ok(Self::default());
        }
        Ok(Self {
            manifests,
            rasterise,
        })
    }
}

/// Credentials and endpoint for the remote feature API.
#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// Everything a run reads from its environment, parsed up front.
#[derive(Resource, Debug, Clone, Serialize)]
pub struct SetupConfig {
    pub data_path: PathBuf,
    pub attractors: Vec<LayerSpec>,
    pub constraints: Vec<LayerSpec>,
    /// Mandatory for the manifest stage; checked by [`SetupConfig::validate`].
    pub current_development: Option<LayerSpec>,
    pub parameters: ModelParameters,
    pub extra_parameters: Vec<ExtraParameter>,
    pub aliases: LayerAliases,
    pub output_title: String,
    pub output_description: String,
    pub api: Option<ApiConfig>,
    pub area_codes: Vec<String>,
    pub year: Option<String>,
    pub grid_bbox: Option<BoundingBox>,
    pub grid_cell_size: f64,
    pub rasterise_command: String,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            attractors: Vec::new(),
            constraints: Vec::new(),
            current_development: None,
            parameters: ModelParameters::default(),
            extra_parameters: Vec::new(),
            aliases: LayerAliases::default(),
            output_title: String::new(),
            output_description: String::new(),
            api: None,
            area_codes: Vec::new(),
            year: None,
            grid_bbox: None,
            grid_cell_size: DEFAULT_GRID_CELL_SIZE,
            rasterise_command: DEFAULT_RASTERISE_COMMAND.to_string(),
        }
    }
}

/// Treat unset, empty and the literal `None` identically.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "None")
}

fn parse_scalar<T: std::str::FromStr>(
    key: &str,
    raw: Option<String>,
    default: T,
) -> SetupResult<T> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| {
            SetupError::Config(format!("parameter {key}='{raw}' could not be parsed"))
        }),
    }
}

impl SetupConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> SetupResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> SetupResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| present(lookup(key));

        let data_path = get("DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

        let attractors = match get("attractors") {
            Some(raw) => layer_spec::parse_attractors(&raw)?,
            None => Vec::new(),
        };
        let constraints = match get("constraints") {
            Some(raw) => layer_spec::parse_constraints(&raw)?,
            None => Vec::new(),
        };
        let current_development = get("current_development")
            .map(|raw| layer_spec::parse_current_development(&raw))
            .transpose()?;

        let parameters = ModelParameters {
            density_from_raster: parse_scalar(
                "density_from_raster",
                get("density_from_raster"),
                DEFAULT_DENSITY_FROM_RASTER,
            )?,
            people_per_dwelling: parse_scalar(
                "people_per_dwelling",
                get("people_per_dwelling"),
                DEFAULT_PEOPLE_PER_DWELLING,
            )?,
            coverage_threshold: parse_scalar(
                "coverage_threshold",
                get("coverage_threshold"),
                DEFAULT_COVERAGE_THRESHOLD,
            )?,
            minimum_development_area: parse_scalar(
                "minimum_development_area",
                get("minimum_development_area"),
                DEFAULT_MINIMUM_DEVELOPMENT_AREA,
            )?,
            maximum_plot_size: parse_scalar(
                "maximum_plot_size",
                get("maximum_plot_size"),
                DEFAULT_MAXIMUM_PLOT_SIZE,
            )?,
        };
        if parameters.density_from_raster > 1 {
            return Err(SetupError::Config(format!(
                "density_from_raster must be 0 or 1, got {}",
                parameters.density_from_raster
            )));
        }

        let extra_parameters = match get("extra_parameters") {
            Some(raw) => layer_spec::parse_extra_parameters(&raw)?,
            None => Vec::new(),
        };
        let aliases = match get("layer_aliases") {
            Some(raw) => layer_spec::parse_aliases(&raw)?,
            None => LayerAliases::default(),
        };

        let api = get("API_URL").map(|url| ApiConfig {
            url: url.trim_end_matches('/').to_string(),
            username: get("USERNAME").unwrap_or_default(),
            password: get("PASSWORD").unwrap_or_default(),
        });
        let area_codes = get("area_codes")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let grid_bbox = get("GRID_BBOX")
            .map(|raw| BoundingBox::parse(&raw))
            .transpose()?;
        let grid_cell_size = parse_scalar(
            "GRID_CELL_SIZE",
            get("GRID_CELL_SIZE"),
            DEFAULT_GRID_CELL_SIZE,
        )?;
        if !(grid_cell_size.is_finite() && grid_cell_size > 0.0) {
            return Err(SetupError::Config(format!(
                "GRID_CELL_SIZE must be a positive number, got {grid_cell_size}"
            )));
        }

        Ok(Self {
            data_path,
            attractors,
            constraints,
            current_development,
            parameters,
            extra_parameters,
            aliases,
            output_title: get("OUTPUT_TITLE").unwrap_or_default(),
            output_description: get("OUTPUT_DESCRIPTION").unwrap_or_default(),
            api,
            area_codes,
            year: get("year"),
            grid_bbox,
            grid_cell_size,
            rasterise_command: get("RASTERISE_COMMAND")
                .unwrap_or_else(|| DEFAULT_RASTERISE_COMMAND.to_string()),
        })
    }

    /// Cross-field checks that depend on which stages run.
    pub fn validate(&self, stages: &Stages) -> SetupResult<()> {
        if stages.manifests && self.current_development.is_none() {
            return Err(SetupError::Config(
                "current_development must declare the mandatory name:threshold layer".into(),
            ));
        }
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.data_path.join(OUTPUT_DIR)
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.output_dir().join(RUN_LOG_FILE)
    }

    pub fn grid_input_dir(&self) -> PathBuf {
        self.data_path.join(INPUT_GRID_DIR)
    }

    pub fn vector_input_dir(&self) -> PathBuf {
        self.data_path.join(INPUT_VECTOR_DIR)
    }

    pub fn raster_work_dir(&self) -> PathBuf {
        self.data_path.join(RASTER_WORK_DIR)
    }

    /// Root scanned for candidate layer files.
    pub fn scan_root(&self) -> &Path {
        &self.data_path
    }

    /// The composite layer is requested only when an endpoint and at least
    /// one area code are configured.
    pub fn wants_composite_layer(&self) -> bool {
        self.api.is_some() && !self.area_codes.is_empty()
    }
}
