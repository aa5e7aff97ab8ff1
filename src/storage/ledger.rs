use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::log::trace;

use super::CellError;
use crate::aspect::{AspectKind, AspectQuantity, AspectRegistry};

/// 账本的硬上限，`None` 表示无上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerBounds {
    pub total_bytes: Option<u64>,
    pub total_types: Option<usize>,
}

impl LedgerBounds {
    pub const UNBOUNDED: Self = Self {
        total_bytes: None,
        total_types: None,
    };
}

/// 要素 → 数量 的映射，带字节与类型计数
///
/// 每次变更都在提交前检查上限，不会出现先写后查的越界状态。
/// 只有 [`CellHandle`](super::CellHandle) 持有可变引用。
#[derive(Debug, Clone)]
pub struct AspectLedger {
    registry: Arc<AspectRegistry>,
    bounds: LedgerBounds,
    entries: BTreeMap<AspectKind, u64>,
    used_bytes: u64,
}

impl AspectLedger {
    pub fn new(registry: Arc<AspectRegistry>, bounds: LedgerBounds) -> Self {
        Self {
            registry,
            bounds,
            entries: BTreeMap::new(),
            used_bytes: 0,
        }
    }

    /// 从快照条目重建；数量为 0 的条目跳过，重复条目合并
    pub fn restored<I>(
        registry: Arc<AspectRegistry>,
        bounds: LedgerBounds,
        entries: I,
    ) -> Result<Self, CellError>
    where
        I: IntoIterator<Item = (AspectKind, u64)>,
    {
        let mut ledger = Self::new(registry, bounds);
        for (kind, amount) in entries {
            ledger.registry.get(kind)?;
            if amount == 0 {
                continue;
            }
            let slot = ledger.entries.entry(kind).or_insert(0);
            *slot = slot.saturating_add(amount);
        }

        let used_bytes = ledger.recount_bytes()?;
        ledger.used_bytes = used_bytes;

        let over_bytes = bounds.total_bytes.is_some_and(|t| used_bytes > t);
        let over_types = bounds.total_types.is_some_and(|t| ledger.entries.len() > t);
        if over_bytes || over_types {
            return Err(CellError::unavailable("snapshot exceeds cell capacity"));
        }
        Ok(ledger)
    }

    pub fn registry(&self) -> &Arc<AspectRegistry> {
        &self.registry
    }

    pub const fn bounds(&self) -> LedgerBounds {
        self.bounds
    }

    pub fn quantity_of(&self, kind: AspectKind) -> u64 {
        self.entries.get(&kind).copied().unwrap_or(0)
    }

    pub const fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn used_types(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 某数量占用的字节数：按条目向上取整
    pub fn bytes_for(&self, kind: AspectKind, amount: u64) -> Result<u64, CellError> {
        let per_byte = self.registry.units_per_byte(kind)?;
        Ok(amount.div_ceil(per_byte))
    }

    /// 在不突破上限的前提下，`kind` 还能放入的最大数量
    pub fn headroom(&self, kind: AspectKind) -> Result<u64, CellError> {
        let per_byte = self.registry.units_per_byte(kind)?;
        let current = self.quantity_of(kind);

        // 新类型先过类型槽检查，与字节预算相互独立
        if current == 0
            && self
                .bounds
                .total_types
                .is_some_and(|total| self.used_types() >= total)
        {
            return Ok(0);
        }

        let by_amount = u64::MAX - current;
        let Some(total_bytes) = self.bounds.total_bytes else {
            return Ok(by_amount);
        };

        let entry_bytes = current.div_ceil(per_byte);
        let free = total_bytes.saturating_sub(self.used_bytes);
        let max_amount = entry_bytes.saturating_add(free).saturating_mul(per_byte);
        Ok(max_amount.saturating_sub(current).min(by_amount))
    }

    /// 放入至多 `amount`，返回实际接受量（可能为 0）
    pub fn insert(&mut self, kind: AspectKind, amount: u64) -> Result<u64, CellError> {
        let accepted = amount.min(self.headroom(kind)?);
        if accepted == 0 {
            return Ok(0);
        }

        let before = self.quantity_of(kind);
        let after = before + accepted;
        let grown = self.bytes_for(kind, after)? - self.bytes_for(kind, before)?;
        self.entries.insert(kind, after);
        // 无上限单元可能同时存有多个接近 u64::MAX 的条目
        self.used_bytes = self.used_bytes.saturating_add(grown);

        trace!(kind = kind.index(), accepted, used_bytes = self.used_bytes, "ledger insert");
        Ok(accepted)
    }

    /// 取出至多 `amount`，数量归零时删除条目
    pub fn extract(&mut self, kind: AspectKind, amount: u64) -> Result<u64, CellError> {
        self.registry.get(kind)?;
        let before = self.quantity_of(kind);
        let removed = amount.min(before);
        if removed == 0 {
            return Ok(0);
        }

        let after = before - removed;
        let shrunk = self.bytes_for(kind, before)? - self.bytes_for(kind, after)?;
        if after == 0 {
            self.entries.remove(&kind);
        } else {
            self.entries.insert(kind, after);
        }
        // 计数器饱和后已不精确，只能从条目重算
        self.used_bytes = if self.used_bytes == u64::MAX {
            self.recount_bytes()?
        } else {
            self.used_bytes - shrunk
        };

        trace!(kind = kind.index(), removed, used_bytes = self.used_bytes, "ledger extract");
        Ok(removed)
    }

    fn recount_bytes(&self) -> Result<u64, CellError> {
        let mut total = 0u64;
        for (&kind, &amount) in &self.entries {
            total = total.saturating_add(self.bytes_for(kind, amount)?);
        }
        Ok(total)
    }

    /// 按下标顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = AspectQuantity> + '_ {
        self.entries
            .iter()
            .map(|(&kind, &amount)| AspectQuantity { kind, amount })
    }

    /// 按调用方给出的比较器排序后的快照，不修改账本
    pub fn list_sorted<F>(&self, mut compare: F) -> Vec<AspectQuantity>
    where
        F: FnMut(&AspectQuantity, &AspectQuantity) -> Ordering,
    {
        let mut list: Vec<_> = self.iter().collect();
        list.sort_by(|a, b| compare(a, b));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspect::tests::sample_registry;

    fn finite(total_bytes: u64, total_types: usize) -> AspectLedger {
        AspectLedger::new(
            Arc::new(sample_registry()),
            LedgerBounds {
                total_bytes: Some(total_bytes),
                total_types: Some(total_types),
            },
        )
    }

    fn kind(ledger: &AspectLedger, tag: &str) -> AspectKind {
        ledger.registry().resolve(tag).unwrap()
    }

    #[test]
    fn insert_truncates_to_byte_budget() {
        let mut ledger = finite(10, 4);
        let aer = kind(&ledger, "aer");
        assert_eq!(ledger.insert(aer, 25).unwrap(), 10);
        assert_eq!(ledger.quantity_of(aer), 10);
        assert_eq!(ledger.used_bytes(), 10);
        assert_eq!(ledger.insert(aer, 1).unwrap(), 0);
    }

    #[test]
    fn packed_kinds_round_bytes_up_per_entry() {
        let mut ledger = finite(3, 4);
        let terra = kind(&ledger, "terra");
        let aer = kind(&ledger, "aer");

        assert_eq!(ledger.insert(terra, 1).unwrap(), 1);
        assert_eq!(ledger.used_bytes(), 1);
        // 同一字节内还能再放 7 个
        assert_eq!(ledger.insert(terra, 7).unwrap(), 7);
        assert_eq!(ledger.used_bytes(), 1);

        assert_eq!(ledger.insert(aer, 1).unwrap(), 1);
        assert_eq!(ledger.used_bytes(), 2);
        // 剩 1 字节 → terra 还能放 8
        assert_eq!(ledger.headroom(terra).unwrap(), 8);
        assert_eq!(ledger.insert(terra, 100).unwrap(), 8);
        assert_eq!(ledger.used_bytes(), 3);

        assert_eq!(ledger.extract(terra, 9).unwrap(), 9);
        assert_eq!(ledger.quantity_of(terra), 7);
        assert_eq!(ledger.used_bytes(), 2);
    }

    #[test]
    fn type_slots_are_independent_of_bytes() {
        let mut ledger = finite(100, 1);
        let aer = kind(&ledger, "aer");
        let ignis = kind(&ledger, "ignis");
        assert_eq!(ledger.insert(aer, 10).unwrap(), 10);
        assert_eq!(ledger.insert(ignis, 1).unwrap(), 0);
        assert_eq!(ledger.insert(aer, 5).unwrap(), 5);
        assert_eq!(ledger.used_types(), 1);
    }

    #[test]
    fn extract_removes_empty_entries() {
        let mut ledger = finite(64, 2);
        let aer = kind(&ledger, "aer");
        ledger.insert(aer, 5).unwrap();
        assert_eq!(ledger.extract(aer, 50).unwrap(), 5);
        assert!(ledger.is_empty());
        assert_eq!(ledger.used_bytes(), 0);
        assert_eq!(ledger.extract(aer, 1).unwrap(), 0);
    }

    #[test]
    fn zero_amounts_leave_ledger_untouched() {
        let mut ledger = finite(64, 2);
        let aer = kind(&ledger, "aer");
        assert_eq!(ledger.insert(aer, 0).unwrap(), 0);
        assert_eq!(ledger.extract(aer, 0).unwrap(), 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn unknown_kind_is_rejected_without_effect() {
        let mut ledger = finite(64, 2);
        let ghost = AspectKind::from_index(99);
        assert!(matches!(ledger.insert(ghost, 1), Err(CellError::InvalidKind(_))));
        assert!(matches!(ledger.extract(ghost, 1), Err(CellError::InvalidKind(_))));
        assert!(ledger.is_empty());
    }

    #[test]
    fn unbounded_ledger_saturates_at_u64_max() {
        let mut ledger = AspectLedger::new(Arc::new(sample_registry()), LedgerBounds::UNBOUNDED);
        let aer = kind(&ledger, "aer");
        assert_eq!(ledger.insert(aer, u64::MAX - 1).unwrap(), u64::MAX - 1);
        assert_eq!(ledger.insert(aer, 10).unwrap(), 1);
        assert_eq!(ledger.quantity_of(aer), u64::MAX);
    }

    #[test]
    fn unbounded_byte_counter_saturates_across_kinds() {
        let mut ledger = AspectLedger::new(Arc::new(sample_registry()), LedgerBounds::UNBOUNDED);
        let aer = kind(&ledger, "aer");
        let ignis = kind(&ledger, "ignis");
        let terra = kind(&ledger, "terra");

        assert_eq!(ledger.insert(aer, u64::MAX).unwrap(), u64::MAX);
        assert_eq!(ledger.insert(ignis, 1).unwrap(), 1);
        assert_eq!(ledger.insert(ignis, u64::MAX).unwrap(), u64::MAX - 1);
        assert_eq!(ledger.used_bytes(), u64::MAX);
        assert_eq!(ledger.used_types(), 2);

        // 饱和后取出：计数器回到真实值
        assert_eq!(ledger.extract(aer, u64::MAX).unwrap(), u64::MAX);
        assert_eq!(ledger.used_bytes(), u64::MAX);
        assert_eq!(ledger.extract(ignis, 10).unwrap(), 10);
        assert_eq!(ledger.used_bytes(), u64::MAX - 10);
        assert_eq!(ledger.insert(terra, 16).unwrap(), 16);
        assert_eq!(ledger.used_bytes(), u64::MAX - 8);
        assert_eq!(ledger.extract(ignis, u64::MAX).unwrap(), u64::MAX - 10);
        assert_eq!(ledger.used_bytes(), 2);
        assert_eq!(ledger.extract(terra, 16).unwrap(), 16);
        assert!(ledger.is_empty());
        assert_eq!(ledger.used_bytes(), 0);
    }

    #[test]
    fn restored_saturated_snapshot_can_be_drained() {
        let registry = Arc::new(sample_registry());
        let aer = registry.resolve("aer").unwrap();
        let ignis = registry.resolve("ignis").unwrap();
        let mut ledger = AspectLedger::restored(
            registry,
            LedgerBounds::UNBOUNDED,
            [(aer, u64::MAX), (ignis, u64::MAX - 3)],
        )
        .unwrap();
        assert_eq!(ledger.used_bytes(), u64::MAX);

        assert_eq!(ledger.extract(ignis, u64::MAX).unwrap(), u64::MAX - 3);
        assert_eq!(ledger.used_bytes(), u64::MAX);
        assert_eq!(ledger.extract(aer, 5).unwrap(), 5);
        assert_eq!(ledger.used_bytes(), u64::MAX - 5);
        assert_eq!(ledger.extract(aer, u64::MAX).unwrap(), u64::MAX - 5);
        assert!(ledger.is_empty());
        assert_eq!(ledger.used_bytes(), 0);
    }

    #[test]
    fn invariants_hold_over_mixed_operations() {
        let mut ledger = finite(97, 3);
        let kinds: Vec<_> = ledger.registry().iter().map(|(k, _)| k).collect();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..2_000 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let k = kinds[(seed >> 33) as usize % kinds.len()];
            let amount = (seed >> 40) % 40;
            if seed & 1 == 0 {
                let accepted = ledger.insert(k, amount).unwrap();
                assert!(accepted <= amount);
            } else {
                let before = ledger.quantity_of(k);
                let removed = ledger.extract(k, amount).unwrap();
                assert_eq!(removed, amount.min(before));
            }
            assert!(ledger.used_bytes() <= 97);
            assert!(ledger.used_types() <= 3);
            assert!(ledger.iter().all(|q| q.amount > 0));
            let recount: u64 = ledger
                .iter()
                .map(|q| ledger.bytes_for(q.kind, q.amount).unwrap())
                .sum();
            assert_eq!(recount, ledger.used_bytes());
        }
    }

    #[test]
    fn restore_rejects_overfull_snapshots() {
        let registry = Arc::new(sample_registry());
        let aer = registry.resolve("aer").unwrap();
        let bounds = LedgerBounds {
            total_bytes: Some(10),
            total_types: Some(1),
        };
        let ok = AspectLedger::restored(registry.clone(), bounds, [(aer, 4), (aer, 6)]).unwrap();
        assert_eq!(ok.quantity_of(aer), 10);

        let err = AspectLedger::restored(registry, bounds, [(aer, 11)]).unwrap_err();
        assert!(matches!(err, CellError::Unavailable(_)));
    }

    #[test]
    fn list_sorted_uses_caller_order() {
        let mut ledger = finite(64, 4);
        let aer = kind(&ledger, "aer");
        let ignis = kind(&ledger, "ignis");
        ledger.insert(aer, 1).unwrap();
        ledger.insert(ignis, 9).unwrap();
        let list = ledger.list_sorted(|a, b| b.amount.cmp(&a.amount));
        assert_eq!(list[0].kind, ignis);
        assert_eq!(list[1].kind, aer);
    }
}
