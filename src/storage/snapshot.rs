use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{AspectLedger, CapacityPolicy, CellError, PartitionFilter};
use crate::aspect::AspectRegistry;

/// 持久化的容量规则。要素以标签保存，注册表重排后仍可还原。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum PolicySnapshot {
    Finite {
        total_bytes: u64,
        total_types: usize,
        idle_drain: f64,
    },
    Infinite {
        idle_drain: f64,
    },
    FixedSingleton {
        kind: String,
        idle_drain: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub kind: String,
    pub amount: u64,
}

/// 单个存储介质的持久化布局
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub policy: PolicySnapshot,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition: Vec<String>,
    /// 只含数量 > 0 的条目
    #[serde(default)]
    pub entries: Vec<EntrySnapshot>,
}

impl PolicySnapshot {
    pub fn capture(policy: &CapacityPolicy, registry: &AspectRegistry) -> Result<Self, CellError> {
        Ok(match *policy {
            CapacityPolicy::Finite {
                total_bytes,
                total_types,
                idle_drain,
            } => Self::Finite {
                total_bytes,
                total_types,
                idle_drain,
            },
            CapacityPolicy::Infinite { idle_drain } => Self::Infinite { idle_drain },
            CapacityPolicy::FixedSingleton { kind, idle_drain } => Self::FixedSingleton {
                kind: registry.tag(kind)?.to_string(),
                idle_drain,
            },
        })
    }

    pub fn to_policy(&self, registry: &AspectRegistry) -> Result<CapacityPolicy, CellError> {
        Ok(match self {
            Self::Finite {
                total_bytes,
                total_types,
                idle_drain,
            } => CapacityPolicy::Finite {
                total_bytes: *total_bytes,
                total_types: *total_types,
                idle_drain: *idle_drain,
            },
            Self::Infinite { idle_drain } => CapacityPolicy::Infinite {
                idle_drain: *idle_drain,
            },
            Self::FixedSingleton { kind, idle_drain } => CapacityPolicy::FixedSingleton {
                kind: registry.resolve(kind)?,
                idle_drain: *idle_drain,
            },
        })
    }
}

impl CellSnapshot {
    pub fn capture(
        policy: &CapacityPolicy,
        filter: &PartitionFilter,
        ledger: &AspectLedger,
    ) -> Result<Self, CellError> {
        let registry = ledger.registry();
        let partition = match policy {
            // 单一类型单元的分区是隐含的，不落盘
            CapacityPolicy::FixedSingleton { .. } => Vec::new(),
            _ => filter
                .kinds()
                .map(|kind| registry.tag(kind).map(str::to_string))
                .collect::<Result<_, _>>()?,
        };
        let entries = ledger
            .iter()
            .map(|q| -> Result<_, CellError> {
                Ok(EntrySnapshot {
                    kind: registry.tag(q.kind)?.to_string(),
                    amount: q.amount,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            policy: PolicySnapshot::capture(policy, registry)?,
            partition,
            entries,
        })
    }

    /// 还原为 (规则, 分区, 账本)；任何未知标签都会使整个还原失败
    pub fn rehydrate(
        &self,
        registry: Arc<AspectRegistry>,
    ) -> Result<(CapacityPolicy, PartitionFilter, AspectLedger), CellError> {
        let policy = self.policy.to_policy(&registry)?;
        let filter = match policy.bound_kind() {
            Some(kind) => PartitionFilter::new([kind]),
            None => PartitionFilter::new(
                self.partition
                    .iter()
                    .map(|tag| registry.resolve(tag))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        let entries = self
            .entries
            .iter()
            .map(|e| -> Result<_, CellError> { Ok((registry.resolve(&e.kind)?, e.amount)) })
            .collect::<Result<Vec<_>, _>>()?;
        let ledger = AspectLedger::restored(registry, policy.bounds(), entries)?;
        Ok((policy, filter, ledger))
    }
}
