pub mod loader;
pub mod schema;

use std::sync::Arc;

use bevy::asset::LoadState;
use bevy::prelude::*;
use schema::{CellTierEntry, StorageCatalog};

use crate::aspect::AspectRegistry;
use crate::runtime::{resources::StorageConfig, states::AppState};

// --------------------------- 资源 ---------------------------
#[derive(Resource, Default)]
pub struct CatalogAssets {
    handle: Option<Handle<StorageCatalog>>,
}

/// 加载完成后的只读目录，整个运行期共享
#[derive(Resource, Clone)]
pub struct Catalog {
    pub registry: Arc<AspectRegistry>,
    pub tiers: Vec<CellTierEntry>,
}

impl Catalog {
    pub fn tier(&self, id: &str) -> Option<&CellTierEntry> {
        self.tiers.iter().find(|t| t.id.eq_ignore_ascii_case(id))
    }
}

// --------------------------- 插件 ---------------------------
pub struct DataPlugin;
impl Plugin for DataPlugin {
    fn build(&self, app: &mut App) {
        app
            // 注册资产类型 & Loader
            .init_asset::<StorageCatalog>()
            .register_asset_loader(loader::RonCatalogLoader)
            .init_resource::<CatalogAssets>()
            // Loading 流程
            .add_systems(OnEnter(AppState::Loading), start_loading)
            .add_systems(Update, check_loaded.run_if(in_state(AppState::Loading)));
    }
}

// --------------------------- 系统 ---------------------------
fn start_loading(
    mut catalog_assets: ResMut<CatalogAssets>,
    asset_server: Res<AssetServer>,
    config: Res<StorageConfig>,
) {
    let handle: Handle<StorageCatalog> = asset_server.load(config.catalog_path.clone());
    catalog_assets.handle = Some(handle);
}

fn check_loaded(
    mut commands: Commands,
    mut next: ResMut<NextState<AppState>>,
    catalog_assets: Res<CatalogAssets>,
    catalogs: Res<Assets<StorageCatalog>>,
    asset_server: Res<AssetServer>,
) {
    let Some(h) = &catalog_assets.handle else {
        return;
    };

    if let Some(LoadState::Failed(err)) = asset_server.get_load_state(h) {
        error!("目录加载失败: {err}");
        next.set(AppState::Shutdown);
        return;
    }

    if let Some(catalog) = catalogs.get(h) {
        match catalog.registry() {
            Ok(registry) => {
                info!(
                    "✔ Catalog loaded: {} aspects, {} tiers",
                    registry.len(),
                    catalog.tiers.len()
                );
                commands.insert_resource(Catalog {
                    registry: Arc::new(registry),
                    tiers: catalog.tiers.clone(),
                });
                next.set(AppState::InGame);
            }
            Err(err) => {
                error!("目录无效: {err}");
                next.set(AppState::Shutdown);
            }
        }
    }
}
