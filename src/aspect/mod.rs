//! 要素（aspect）目录：只负责身份与比较

mod order;

pub use order::DisplayOrder;

use std::collections::HashMap;
use thiserror::Error;

use crate::storage::CellError;

/// 要素种类，注册表中的稠密下标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AspectKind(u32);

impl AspectKind {
    /// 宿主传来的下标不一定有效，使用前须经过 [`AspectRegistry::get`] 校验
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// 单个要素的静态定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AspectDef {
    pub tag: String,
    pub name: String,
    /// 每字节可容纳的数量，至少为 1
    pub units_per_byte: u64,
}

/// 要素 + 数量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectQuantity {
    pub kind: AspectKind,
    pub amount: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate aspect tag: {0}")]
    DuplicateAspect(String),
    #[error("aspect tag must not be empty")]
    EmptyTag,
    #[error("too many aspects in catalog")]
    TooManyAspects,
}

/// 不可变的要素目录
#[derive(Debug, Default)]
pub struct AspectRegistry {
    defs: Vec<AspectDef>,
    by_tag: HashMap<String, AspectKind>,
}

impl AspectRegistry {
    pub fn from_entries<I>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = AspectDef>,
    {
        let mut registry = Self::default();
        for mut def in entries {
            let key = def.tag.trim().to_lowercase();
            if key.is_empty() {
                return Err(CatalogError::EmptyTag);
            }
            if registry.by_tag.contains_key(&key) {
                return Err(CatalogError::DuplicateAspect(def.tag));
            }
            let index = u32::try_from(registry.defs.len()).map_err(|_| CatalogError::TooManyAspects)?;
            def.units_per_byte = def.units_per_byte.max(1);
            registry.by_tag.insert(key, AspectKind(index));
            registry.defs.push(def);
        }
        Ok(registry)
    }

    /// 按标签查找（忽略大小写）
    pub fn resolve(&self, tag: &str) -> Result<AspectKind, CellError> {
        self.by_tag
            .get(&tag.trim().to_lowercase())
            .copied()
            .ok_or_else(|| CellError::InvalidKind(tag.to_string()))
    }

    pub fn get(&self, kind: AspectKind) -> Result<&AspectDef, CellError> {
        self.defs
            .get(kind.index())
            .ok_or_else(|| CellError::InvalidKind(format!("#{}", kind.index())))
    }

    pub fn contains(&self, kind: AspectKind) -> bool {
        kind.index() < self.defs.len()
    }

    pub fn tag(&self, kind: AspectKind) -> Result<&str, CellError> {
        self.get(kind).map(|def| def.tag.as_str())
    }

    pub fn units_per_byte(&self, kind: AspectKind) -> Result<u64, CellError> {
        self.get(kind).map(|def| def.units_per_byte)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AspectKind, &AspectDef)> {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, def)| (AspectKind(i as u32), def))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
