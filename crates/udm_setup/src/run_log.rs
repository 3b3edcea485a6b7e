//! Plain-text run log in the output area.
//!
//! The console log is mirrored into `outputs/udm-setup.log` by a
//! `tracing_subscriber` fmt layer, installed through `LogPlugin::custom_layer`
//! before any stage runs. Output-area preparation leaves the file in place.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use bevy::log::tracing_subscriber::{fmt, Layer};
use bevy::log::BoxedLayer;

use crate::error::SetupResult;

/// Create the run log at `path`, truncating the previous run's, along with
/// any missing parent directories.
pub fn open_run_log(path: &Path) -> SetupResult<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

/// A layer writing each event to `file` as one uncoloured line.
pub fn file_layer(file: File) -> BoxedLayer {
    fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .boxed()
}
