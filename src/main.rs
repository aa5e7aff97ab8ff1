use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::state::app::StatesPlugin;

use essentia_cell::cell::CellPlugin;
use essentia_cell::data::DataPlugin;
use essentia_cell::interface::debug_cli::DebugCliPlugin;
use essentia_cell::runtime::{resources::StorageConfig, RuntimePlugin};

fn main() -> anyhow::Result<()> {
    let config = StorageConfig::load("assets/config/storage.toml")?;
    let tick = Duration::from_secs_f64(1.0 / config.tick_hz);

    let exit = App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(tick)), // 无窗口，固定频率
            LogPlugin::default(),
            AssetPlugin::default(),
            StatesPlugin,
        ))
        .insert_resource(config)
        .add_plugins(RuntimePlugin)
        .add_plugins(DataPlugin)
        .add_plugins(CellPlugin)
        .add_plugins(DebugCliPlugin)
        .run();

    match exit {
        AppExit::Success => Ok(()),
        AppExit::Error(code) => anyhow::bail!("exited with code {code}"),
    }
}
