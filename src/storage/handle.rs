use std::fmt;
use std::sync::Arc;

use bevy::log::debug;

use super::{
    AspectLedger, CapacityPolicy, CapacityReport, CellError, CellResolver, CellSnapshot,
    MediumId, PartitionFilter, SaveProvider,
};
use crate::aspect::{AspectKind, AspectQuantity, AspectRegistry, DisplayOrder};

/// 单元状态。`Missing` 表示介质不存在，区别于“存在但为空”。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellStatus {
    Missing,
    Empty,
    Partial,
    TypeFull,
    Full,
    Unbounded,
}

impl CellStatus {
    pub fn of(handle: Option<&CellHandle>) -> Self {
        handle.map_or(Self::Missing, CellHandle::status)
    }

    /// 驱动器指示灯：0 缺失，1 有空间，2 类型已满，3 已满
    pub const fn indicator(self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Empty | Self::Partial | Self::Unbounded => 1,
            Self::TypeFull => 2,
            Self::Full => 3,
        }
    }
}

/// 账本 + 分区 + 容量规则，绑定到一个存储介质。
///
/// 所有变更都先在副本上完成，保存成功后才提交；保存失败时内存状态保持不变。
pub struct CellHandle {
    medium: MediumId,
    policy: CapacityPolicy,
    filter: PartitionFilter,
    ledger: AspectLedger,
    saver: Arc<dyn SaveProvider>,
}

impl fmt::Debug for CellHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellHandle")
            .field("medium", &self.medium)
            .field("policy", &self.policy)
            .field("filter", &self.filter)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl CellHandle {
    /// 新介质：空账本，创建即保存
    pub fn create(
        medium: MediumId,
        registry: Arc<AspectRegistry>,
        policy: CapacityPolicy,
        saver: Arc<dyn SaveProvider>,
    ) -> Result<Self, CellError> {
        let filter = match policy.bound_kind() {
            Some(kind) => {
                registry.get(kind)?;
                PartitionFilter::new([kind])
            }
            None => PartitionFilter::default(),
        };
        let ledger = AspectLedger::new(registry, policy.bounds());
        let handle = Self {
            medium,
            policy,
            filter,
            ledger,
            saver,
        };
        handle.save(&handle.filter, &handle.ledger)?;
        debug!("created {} cell {medium}", policy.variant_name());
        Ok(handle)
    }

    /// 从宿主还原；介质上没有单元时返回 `None`
    pub fn open(
        medium: MediumId,
        registry: Arc<AspectRegistry>,
        resolver: &dyn CellResolver,
        saver: Arc<dyn SaveProvider>,
    ) -> Result<Option<Self>, CellError> {
        let Some(snapshot) = resolver.resolve(medium)? else {
            return Ok(None);
        };
        let (policy, filter, ledger) = snapshot.rehydrate(registry)?;
        Ok(Some(Self {
            medium,
            policy,
            filter,
            ledger,
            saver,
        }))
    }

    pub const fn medium(&self) -> MediumId {
        self.medium
    }

    pub const fn policy(&self) -> &CapacityPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<AspectRegistry> {
        self.ledger.registry()
    }

    pub fn quantity_of(&self, kind: AspectKind) -> Result<u64, CellError> {
        self.registry().get(kind)?;
        Ok(self.ledger.quantity_of(kind))
    }

    pub fn status(&self) -> CellStatus {
        if self.ledger.is_empty() {
            return CellStatus::Empty;
        }
        match self.policy {
            CapacityPolicy::Finite {
                total_bytes,
                total_types,
                ..
            } => {
                if self.ledger.used_bytes() >= total_bytes {
                    CellStatus::Full
                } else if self.ledger.used_types() >= total_types {
                    CellStatus::TypeFull
                } else {
                    CellStatus::Partial
                }
            }
            CapacityPolicy::Infinite { .. } | CapacityPolicy::FixedSingleton { .. } => {
                CellStatus::Unbounded
            }
        }
    }

    /// 分区 → 容量 → 账本，顺序固定；返回实际接受量
    pub fn insert(&mut self, kind: AspectKind, amount: u64) -> Result<u64, CellError> {
        self.registry().get(kind)?;
        if amount == 0 {
            return Ok(0);
        }
        if !self.filter.permits(kind) {
            debug!("cell {} partition rejects #{}", self.medium, kind.index());
            return Ok(0);
        }
        let admissible = self
            .policy
            .admissible_insert_amount(&self.ledger, kind, amount)?;
        if admissible == 0 {
            return Ok(0);
        }

        let mut staged = self.ledger.clone();
        let accepted = staged.insert(kind, admissible)?;
        self.save(&self.filter, &staged)?;
        self.ledger = staged;
        Ok(accepted)
    }

    /// 取出不受分区与容量约束
    pub fn extract(&mut self, kind: AspectKind, amount: u64) -> Result<u64, CellError> {
        self.registry().get(kind)?;
        if amount == 0 || self.ledger.quantity_of(kind) == 0 {
            return Ok(0);
        }

        let mut staged = self.ledger.clone();
        let removed = staged.extract(kind, amount)?;
        self.save(&self.filter, &staged)?;
        self.ledger = staged;
        Ok(removed)
    }

    /// 替换分区白名单，空集合即解除分区。已有库存保留。
    pub fn set_partition<I>(&mut self, kinds: I) -> Result<(), CellError>
    where
        I: IntoIterator<Item = AspectKind>,
    {
        if !self.policy.allows_partition_change() {
            return Err(CellError::PartitionLocked(self.policy.variant_name()));
        }
        let kinds: Vec<_> = kinds.into_iter().collect();
        for &kind in &kinds {
            self.registry().get(kind)?;
        }

        let mut staged = self.filter.clone();
        staged.set_whitelist(kinds);
        if staged == self.filter {
            return Ok(());
        }
        self.save(&staged, &self.ledger)?;
        self.filter = staged;
        Ok(())
    }

    pub fn is_partitioned(&self) -> bool {
        self.filter.is_active()
    }

    pub fn describe_contents(&self, order: DisplayOrder) -> Vec<AspectQuantity> {
        let registry = self.registry();
        self.ledger
            .list_sorted(|a, b| order.compare(registry, a, b))
    }

    /// 调用方自带比较器的版本
    pub fn describe_contents_by<F>(&self, compare: F) -> Vec<AspectQuantity>
    where
        F: FnMut(&AspectQuantity, &AspectQuantity) -> std::cmp::Ordering,
    {
        self.ledger.list_sorted(compare)
    }

    /// 分区中的种类；未分区时为空
    pub fn describe_partition(&self, order: DisplayOrder) -> Vec<AspectKind> {
        let registry = self.registry();
        let mut list: Vec<_> = self
            .filter
            .kinds()
            .map(|kind| AspectQuantity { kind, amount: 1 })
            .collect();
        list.sort_by(|a, b| order.compare(registry, a, b));
        list.into_iter().map(|q| q.kind).collect()
    }

    pub fn report_capacity(&self) -> CapacityReport {
        self.policy.report_capacity(&self.ledger)
    }

    pub const fn idle_upkeep_cost(&self) -> f64 {
        self.policy.idle_upkeep_cost()
    }

    /// 只有空的有限单元可以拆出存储元件
    pub fn is_storage_detachable(&self) -> bool {
        self.policy.yields_storage_component() && self.ledger.used_bytes() == 0
    }

    pub fn snapshot(&self) -> Result<CellSnapshot, CellError> {
        CellSnapshot::capture(&self.policy, &self.filter, &self.ledger)
    }

    fn save(&self, filter: &PartitionFilter, ledger: &AspectLedger) -> Result<(), CellError> {
        let snapshot = CellSnapshot::capture(&self.policy, filter, ledger)?;
        self.saver.save(self.medium, &snapshot)
    }
}
