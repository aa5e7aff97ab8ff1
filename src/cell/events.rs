use bevy::prelude::*;

use crate::aspect::DisplayOrder;
use super::components::StorageComponent;
use crate::storage::CellStatus;

/// 挂载（或新建）一个单元
#[derive(Event, Debug, Clone)]
pub struct CreateCell {
    pub label: String,
    pub tier: String,
    pub bound: Option<String>, // 量子 / 奇点单元的唯一要素
}

#[derive(Event, Debug, Clone)]
pub struct InsertAspect {
    pub label: String,
    pub aspect: String,
    pub amount: u64,
}

#[derive(Event, Debug, Clone)]
pub struct ExtractAspect {
    pub label: String,
    pub aspect: String,
    pub amount: u64,
}

/// 空列表 = 解除分区
#[derive(Event, Debug, Clone)]
pub struct SetPartition {
    pub label: String,
    pub aspects: Vec<String>,
}

#[derive(Event, Debug, Clone)]
pub struct DescribeCell {
    pub label: String,
    pub order: DisplayOrder,
}

#[derive(Event)]
pub struct ListCells;

#[derive(Event, Debug, Clone)]
pub struct DetachStorage {
    pub label: String,
}

/// 存储元件已拆出；`tier` 是目录里容量相同的等级
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct StorageDetached {
    pub label: String,
    pub tier: Option<String>,
    pub component: StorageComponent,
}

/// 单元内容或挂载状态变化后发出。插件本身不消费，供宿主的网络层 / 界面刷新
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct CellChanged {
    pub label: String,
    pub status: CellStatus,
}
