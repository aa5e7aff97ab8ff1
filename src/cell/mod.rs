pub mod components;
pub mod events;
mod systems;

pub use systems::describe;

use std::sync::Arc;

use crate::runtime::{resources::StorageConfig, states::AppState};
use crate::storage::{JsonFileStore, MemoryStore};
use bevy::prelude::*;
use components::*;
use events::*;
use systems::*;

/// 单元事件处理系统，命令来源应排在它之前
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellSystems;

pub struct CellPlugin;

impl CellPlugin {
    pub fn register_events(app: &mut App) {
        app.add_event::<CreateCell>()
            .add_event::<InsertAspect>()
            .add_event::<ExtractAspect>()
            .add_event::<SetPartition>()
            .add_event::<DescribeCell>()
            .add_event::<ListCells>()
            .add_event::<DetachStorage>()
            .add_event::<StorageDetached>()
            .add_event::<CellChanged>();
    }
}

impl Plugin for CellPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<StorageConfig>()
            .cloned()
            .unwrap_or_default();

        let drive = if config.persist {
            info!("cell snapshots in {}", config.save_dir.display());
            let store = Arc::new(JsonFileStore::new(config.save_dir));
            CellDrive::new(store.clone(), store)
        } else {
            let store = Arc::new(MemoryStore::default());
            CellDrive::new(store.clone(), store)
        };

        app.insert_resource(drive);
        Self::register_events(app);
        app.add_systems(
            Update,
            (
                create_cells,
                insert_aspects,
                extract_aspects,
                apply_partitions,
                detach_storage,
                describe_cells,
                list_cells,
            )
                .chain()
                .in_set(CellSystems)
                .run_if(in_state(AppState::InGame)),
        );
    }
}
