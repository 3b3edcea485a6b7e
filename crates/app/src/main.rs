//! `udm-setup`: prepare UDM model inputs under `DATA_PATH`.
//!
//! ```text
//! udm-setup               # manifests only
//! udm-setup --rasterise   # rasterise layers against the shared grid
//! udm-setup --all         # both
//! ```
//!
//! Configuration comes from environment variables (see `SetupConfig`). The
//! process status is 0 on success, otherwise the status of the failure class.
//! Everything logged also lands in `<DATA_PATH>/outputs/udm-setup.log`.

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::{BoxedLayer, Level, LogPlugin};
use bevy::prelude::*;

use udm_setup::config::{SetupConfig, Stages};
use udm_setup::run_log::{file_layer, open_run_log};
use udm_setup::{RunReport, SetupPlugin};

fn main() -> AppExit {
    let mut app = App::new();
    // The configuration goes in before logging starts so the run log can be
    // opened under its data path.
    let setup = Stages::from_args(std::env::args().skip(1))
        .and_then(|stages| SetupConfig::from_env().map(|config| (stages, config)))
        .map(|(stages, config)| {
            app.insert_resource(config);
            stages
        });
    app.add_plugins((
        MinimalPlugins.set(ScheduleRunnerPlugin::run_once()),
        LogPlugin {
            level: Level::INFO,
            filter: "info".to_string(),
            custom_layer: run_log_layer,
            ..default()
        },
    ));

    let stages = match setup {
        Ok(stages) => stages,
        Err(err) => {
            error!("{err}");
            return AppExit::from_code(err.exit_code());
        }
    };

    app.add_plugins(SetupPlugin { stages })
        .add_systems(PostStartup, log_run_report);
    app.run()
}

/// Mirror the log into `outputs/udm-setup.log`. Without a configuration
/// there is no data path, and only the console gets the error.
fn run_log_layer(app: &mut App) -> Option<BoxedLayer> {
    let path = app.world().get_resource::<SetupConfig>()?.run_log_path();
    match open_run_log(&path) {
        Ok(file) => Some(file_layer(file)),
        Err(err) => {
            eprintln!("Cannot open run log {}: {err}", path.display());
            None
        }
    }
}

/// Summarise the run once every stage has had its turn, failed or not.
fn log_run_report(report: Res<RunReport>) {
    match serde_json::to_string(&*report) {
        Ok(json) => info!("Run report: {json}"),
        Err(e) => warn!("Could not serialise run report: {e}"),
    }
}
