use super::{AspectLedger, CellError, LedgerBounds};
use crate::aspect::AspectKind;

/// 容量规则。封闭的三种变体，按标签选择。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapacityPolicy {
    /// 普通有限单元
    Finite {
        total_bytes: u64,
        total_types: usize,
        idle_drain: f64,
    },
    /// 创造模式单元：任意数量、任意种类（仍受分区限制）
    Infinite { idle_drain: f64 },
    /// 量子 / 奇点单元：只收一种要素，数量无限，分区不可改
    FixedSingleton { kind: AspectKind, idle_drain: f64 },
}

/// 总量：有限值或无上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Limited(u64),
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityReport {
    pub used_bytes: u64,
    pub total_bytes: Capacity,
    pub used_types: u64,
    pub total_types: Capacity,
}

impl CapacityPolicy {
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Finite { .. } => "finite",
            Self::Infinite { .. } => "infinite",
            Self::FixedSingleton { .. } => "fixed_singleton",
        }
    }

    /// 账本需要强制执行的上限
    pub const fn bounds(&self) -> LedgerBounds {
        match *self {
            Self::Finite {
                total_bytes,
                total_types,
                ..
            } => LedgerBounds {
                total_bytes: Some(total_bytes),
                total_types: Some(total_types),
            },
            Self::Infinite { .. } | Self::FixedSingleton { .. } => LedgerBounds::UNBOUNDED,
        }
    }

    pub const fn bound_kind(&self) -> Option<AspectKind> {
        match *self {
            Self::FixedSingleton { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// 本次最多可放入多少。分区检查由调用方在此之前完成。
    pub fn admissible_insert_amount(
        &self,
        ledger: &AspectLedger,
        kind: AspectKind,
        requested: u64,
    ) -> Result<u64, CellError> {
        ledger.registry().get(kind)?;
        if let Self::FixedSingleton { kind: bound, .. } = *self {
            if kind != bound {
                return Ok(0);
            }
        }
        // 无限单元的余量只受 u64 饱和限制
        Ok(requested.min(ledger.headroom(kind)?))
    }

    pub fn report_capacity(&self, ledger: &AspectLedger) -> CapacityReport {
        let used_bytes = ledger.used_bytes();
        let used_types = ledger.used_types() as u64;
        match *self {
            Self::Finite {
                total_bytes,
                total_types,
                ..
            } => CapacityReport {
                used_bytes,
                total_bytes: Capacity::Limited(total_bytes),
                used_types,
                total_types: Capacity::Limited(total_types as u64),
            },
            Self::Infinite { .. } | Self::FixedSingleton { .. } => CapacityReport {
                used_bytes,
                total_bytes: Capacity::Unbounded,
                used_types,
                total_types: Capacity::Unbounded,
            },
        }
    }

    /// 接入网络时每 tick 的待机能耗，与内容无关
    pub const fn idle_upkeep_cost(&self) -> f64 {
        match *self {
            Self::Finite { idle_drain, .. }
            | Self::Infinite { idle_drain }
            | Self::FixedSingleton { idle_drain, .. } => idle_drain,
        }
    }

    /// 空单元能否拆出存储元件：创造 / 量子 / 奇点永远不能
    pub const fn yields_storage_component(&self) -> bool {
        matches!(self, Self::Finite { .. })
    }

    pub const fn allows_partition_change(&self) -> bool {
        !matches!(self, Self::FixedSingleton { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspect::tests::sample_registry;
    use std::sync::Arc;

    fn ledger_for(policy: &CapacityPolicy) -> AspectLedger {
        AspectLedger::new(Arc::new(sample_registry()), policy.bounds())
    }

    #[test]
    fn finite_rejects_new_type_when_slots_are_full() {
        let policy = CapacityPolicy::Finite {
            total_bytes: 100,
            total_types: 1,
            idle_drain: 0.5,
        };
        let mut ledger = ledger_for(&policy);
        let aer = ledger.registry().resolve("aer").unwrap();
        let ignis = ledger.registry().resolve("ignis").unwrap();
        ledger.insert(aer, 10).unwrap();

        assert_eq!(policy.admissible_insert_amount(&ledger, ignis, 1).unwrap(), 0);
        assert_eq!(policy.admissible_insert_amount(&ledger, aer, 5).unwrap(), 5);
        assert_eq!(policy.admissible_insert_amount(&ledger, aer, 500).unwrap(), 90);
    }

    #[test]
    fn infinite_reports_unbounded_totals() {
        let policy = CapacityPolicy::Infinite { idle_drain: 0.0 };
        let mut ledger = ledger_for(&policy);
        let aer = ledger.registry().resolve("aer").unwrap();
        assert_eq!(
            policy.admissible_insert_amount(&ledger, aer, 1 << 60).unwrap(),
            1 << 60
        );
        ledger.insert(aer, 1 << 60).unwrap();

        let report = policy.report_capacity(&ledger);
        assert_eq!(report.total_bytes, Capacity::Unbounded);
        assert_eq!(report.total_types, Capacity::Unbounded);
        assert_eq!(report.used_types, 1);
        assert_eq!(report.used_bytes, 1 << 60);
    }

    #[test]
    fn singleton_only_admits_its_kind() {
        let registry = sample_registry();
        let ignis = registry.resolve("ignis").unwrap();
        let aer = registry.resolve("aer").unwrap();
        let policy = CapacityPolicy::FixedSingleton {
            kind: ignis,
            idle_drain: 2.5,
        };
        let ledger = AspectLedger::new(Arc::new(registry), policy.bounds());
        assert_eq!(policy.admissible_insert_amount(&ledger, aer, 5).unwrap(), 0);
        assert_eq!(policy.admissible_insert_amount(&ledger, ignis, 5).unwrap(), 5);
        assert!(!policy.yields_storage_component());
        assert!(!policy.allows_partition_change());
        assert_eq!(policy.bound_kind(), Some(ignis));
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let policy = CapacityPolicy::Infinite { idle_drain: 0.0 };
        let ledger = ledger_for(&policy);
        let err = policy
            .admissible_insert_amount(&ledger, AspectKind::from_index(50), 1)
            .unwrap_err();
        assert!(matches!(err, CellError::InvalidKind(_)));
    }

    #[test]
    fn idle_drain_is_per_variant_constant() {
        let finite = CapacityPolicy::Finite {
            total_bytes: 4096,
            total_types: 12,
            idle_drain: 1.0,
        };
        assert_eq!(finite.idle_upkeep_cost(), 1.0);
        assert!(finite.yields_storage_component());
        assert_eq!(CapacityPolicy::Infinite { idle_drain: 0.0 }.idle_upkeep_cost(), 0.0);
    }
}
