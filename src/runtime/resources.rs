use std::path::{Path, PathBuf};

use anyhow::Context;
use bevy::prelude::*;
use serde::Deserialize;

/// 运行配置，来自 `assets/config/storage.toml`
#[derive(Resource, Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 相对 assets 目录
    pub catalog_path: String,
    /// 关闭后快照只保存在内存里
    pub persist: bool,
    pub save_dir: PathBuf,
    pub tick_hz: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            catalog_path: "data/essentia.catalog.ron".into(),
            persist: true,
            save_dir: PathBuf::from("saves/cells"),
            tick_hz: 30.0,
        }
    }
}

impl StorageConfig {
    /// 文件不存在时使用默认值
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        anyhow::ensure!(
            config.tick_hz.is_finite() && config.tick_hz > 0.0,
            "tick_hz must be positive"
        );
        Ok(config)
    }
}
