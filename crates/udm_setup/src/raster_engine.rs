//! The vector-to-raster rendering engine boundary.
//!
//! The pipeline never samples geometry itself. It hands the engine a GeoJSON
//! payload, the shared grid, the grid resolution and the fixed
//! [`RasterPolicy`], and expects one artifact at the requested path.

use std::path::{Path, PathBuf};
use std::process::Command;

use bevy::prelude::*;
use serde::Serialize;

use crate::config::{RASTER_AREA_THRESHOLD, RASTER_INVERT, RASTER_NODATA};
use crate::error::{SetupError, SetupResult};

/// Sampling policy shared by every rasterisation call in a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RasterPolicy {
    /// Percentage of a cell that must be covered for the cell to count.
    pub area_threshold: f64,
    /// Write counted cells as 0 rather than 1.
    pub invert: bool,
    pub nodata: i32,
}

impl RasterPolicy {
    pub const FIXED: RasterPolicy = RasterPolicy {
        area_threshold: RASTER_AREA_THRESHOLD,
        invert: RASTER_INVERT,
        nodata: RASTER_NODATA,
    };
}

/// One call into the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterJob<'a> {
    pub name: &'a str,
    pub payload: &'a Path,
    pub grid: &'a Path,
    pub resolution: f64,
    pub policy: RasterPolicy,
    /// Where the engine must leave the raster.
    pub output: PathBuf,
}

pub trait RasterEngine: Send + Sync {
    fn rasterise(&self, job: &RasterJob) -> SetupResult<()>;
}

/// The engine used by a run, replaceable before startup.
#[derive(Resource)]
pub struct RasterEngineHandle(pub Box<dyn RasterEngine>);

/// Runs an external executable once per layer:
///
/// ```text
/// <program> [args..] --payload P --grid G --resolution R
///           --area-threshold T [--invert] --nodata N --output O
/// ```
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    /// Split `command_line` on whitespace into program and leading arguments.
    pub fn from_command_line(command_line: &str) -> SetupResult<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| SetupError::Config("RASTERISE_COMMAND is empty".into()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn command(&self, job: &RasterJob) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--payload")
            .arg(job.payload)
            .arg("--grid")
            .arg(job.grid)
            .arg("--resolution")
            .arg(job.resolution.to_string())
            .arg("--area-threshold")
            .arg(job.policy.area_threshold.to_string());
        if job.policy.invert {
            command.arg("--invert");
        }
        command
            .arg("--nodata")
            .arg(job.policy.nodata.to_string())
            .arg("--output")
            .arg(&job.output);
        command
    }
}

impl RasterEngine for CommandEngine {
    fn rasterise(&self, job: &RasterJob) -> SetupResult<()> {
        debug!("Running {} for layer '{}'", self.program, job.name);
        let status = self
            .command(job)
            .status()
            .map_err(|e| SetupError::Engine(format!("could not launch '{}': {e}", self.program)))?;
        if !status.success() {
            return Err(SetupError::Engine(format!(
                "'{}' failed for layer '{}' ({status})",
                self.program, job.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job<'a>(payload: &'a Path, grid: &'a Path) -> RasterJob<'a> {
        RasterJob {
            name: "rail",
            payload,
            grid,
            resolution: 100.0,
            policy: RasterPolicy::FIXED,
            output: PathBuf::from("/work/rail.tif"),
        }
    }

    #[test]
    fn test_policy_is_fixed() {
        assert_eq!(RasterPolicy::FIXED.area_threshold, 50.0);
        assert!(RasterPolicy::FIXED.invert);
        assert_eq!(RasterPolicy::FIXED.nodata, -9999);
    }

    #[test]
    fn test_command_line_carries_every_parameter() {
        let engine = CommandEngine::from_command_line("python3 rasterise.py").unwrap();
        let payload = PathBuf::from("/work/rail.geojson");
        let grid = PathBuf::from("/work/grid.geojson");
        let command = engine.command(&job(&payload, &grid));

        assert_eq!(command.get_program(), "python3");
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "rasterise.py",
                "--payload",
                "/work/rail.geojson",
                "--grid",
                "/work/grid.geojson",
                "--resolution",
                "100",
                "--area-threshold",
                "50",
                "--invert",
                "--nodata",
                "-9999",
                "--output",
                "/work/rail.tif",
            ]
        );
    }

    #[test]
    fn test_empty_command_is_config_error() {
        assert!(matches!(
            CommandEngine::from_command_line("  "),
            Err(SetupError::Config(_))
        ));
    }

    #[test]
    fn test_missing_program_is_engine_error() {
        let engine = CommandEngine::from_command_line("udm-no-such-rasteriser-binary").unwrap();
        let payload = PathBuf::from("/work/rail.geojson");
        let grid = PathBuf::from("/work/grid.geojson");
        let err = engine.rasterise(&job(&payload, &grid)).unwrap_err();
        assert!(matches!(err, SetupError::Engine(_)));
        assert_eq!(err.exit_code(), 6);
    }
}
