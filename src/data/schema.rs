use bevy::asset::Asset;
use bevy::reflect::TypePath;
use serde::Deserialize;
use thiserror::Error;

use crate::aspect::{AspectDef, AspectKind, AspectRegistry, CatalogError};
use crate::storage::CapacityPolicy;

fn one() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct AspectEntry {
    pub tag: String,
    pub name: String,
    #[serde(default = "one")]
    pub units_per_byte: u64,
}

/// 单元等级对应的容量规则
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum TierKind {
    Finite { capacity: u64, max_types: usize },
    Creative,
    Quantum,
    Singularity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellTierEntry {
    pub id: String,
    pub name: String,
    pub kind: TierKind,
    /// AE 能量 / tick
    #[serde(default)]
    pub idle_drain: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TierError {
    #[error("{0} cells must be bound to an aspect")]
    MissingBoundAspect(String),
    #[error("{0} cells cannot be bound to an aspect")]
    UnexpectedBoundAspect(String),
}

impl CellTierEntry {
    /// 量子 / 奇点单元创建时必须指定唯一要素
    pub fn requires_bound_aspect(&self) -> bool {
        matches!(self.kind, TierKind::Quantum | TierKind::Singularity)
    }

    pub fn policy(&self, bound: Option<AspectKind>) -> Result<CapacityPolicy, TierError> {
        let idle_drain = self.idle_drain;
        match (&self.kind, bound) {
            (TierKind::Finite { capacity, max_types }, None) => Ok(CapacityPolicy::Finite {
                total_bytes: *capacity,
                total_types: *max_types,
                idle_drain,
            }),
            (TierKind::Creative, None) => Ok(CapacityPolicy::Infinite { idle_drain }),
            (TierKind::Quantum | TierKind::Singularity, Some(kind)) => {
                Ok(CapacityPolicy::FixedSingleton { kind, idle_drain })
            }
            (TierKind::Quantum | TierKind::Singularity, None) => {
                Err(TierError::MissingBoundAspect(self.id.clone()))
            }
            (TierKind::Finite { .. } | TierKind::Creative, Some(_)) => {
                Err(TierError::UnexpectedBoundAspect(self.id.clone()))
            }
        }
    }
}

/// 要素目录 + 单元等级表（RON 资产）
#[derive(Asset, TypePath, Deserialize, Debug)]
pub struct StorageCatalog {
    pub aspects: Vec<AspectEntry>,
    pub tiers: Vec<CellTierEntry>,
}

impl StorageCatalog {
    pub fn registry(&self) -> Result<AspectRegistry, CatalogError> {
        AspectRegistry::from_entries(self.aspects.iter().map(|e| AspectDef {
            tag: e.tag.clone(),
            name: e.name.clone(),
            units_per_byte: e.units_per_byte,
        }))
    }
}
