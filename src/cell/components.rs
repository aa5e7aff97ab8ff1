use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::prelude::*;

use crate::aspect::AspectRegistry;
use crate::storage::{
    CapacityPolicy, CellError, CellHandle, CellResolver, CellStatus, MediumId, SaveProvider,
};

/// 从空的有限单元里拆出来的存储元件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageComponent {
    pub total_bytes: u64,
    pub total_types: usize,
}

impl StorageComponent {
    /// 只有有限单元带有可拆的元件
    pub const fn of(policy: &CapacityPolicy) -> Option<Self> {
        match *policy {
            CapacityPolicy::Finite {
                total_bytes,
                total_types,
                ..
            } => Some(Self {
                total_bytes,
                total_types,
            }),
            _ => None,
        }
    }
}

/// 驱动器：当前挂载的所有单元，按标签排序
///
/// 网络层经由它串行访问每个单元；ECS 的 `ResMut` 保证同一时刻只有一个写者。
#[derive(Resource)]
pub struct CellDrive {
    cells: BTreeMap<String, CellHandle>,
    resolver: Arc<dyn CellResolver>,
    saver: Arc<dyn SaveProvider>,
}

impl CellDrive {
    pub fn new(resolver: Arc<dyn CellResolver>, saver: Arc<dyn SaveProvider>) -> Self {
        Self {
            cells: BTreeMap::new(),
            resolver,
            saver,
        }
    }

    /// 挂载介质：已有快照则还原，否则按给定规则新建
    pub fn mount(
        &mut self,
        label: &str,
        registry: Arc<AspectRegistry>,
        policy: CapacityPolicy,
    ) -> Result<&CellHandle, CellError> {
        let medium = MediumId::from_label(label);
        let handle = match CellHandle::open(
            medium,
            registry.clone(),
            self.resolver.as_ref(),
            self.saver.clone(),
        )? {
            Some(existing) => existing,
            None => CellHandle::create(medium, registry, policy, self.saver.clone())?,
        };
        Ok(self.cells.entry(label.to_string()).or_insert(handle))
    }

    pub fn get(&self, label: &str) -> Option<&CellHandle> {
        self.cells.get(label)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut CellHandle> {
        self.cells.get_mut(label)
    }

    pub fn status(&self, label: &str) -> CellStatus {
        CellStatus::of(self.get(label))
    }

    /// 拆出存储元件：仅空的有限单元可以，成功后介质被移除，返回拆出的元件
    pub fn detach(&mut self, label: &str) -> Result<Option<StorageComponent>, CellError> {
        let Some(cell) = self.cells.get(label) else {
            return Ok(None);
        };
        if !cell.is_storage_detachable() {
            return Ok(None);
        }
        let Some(component) = StorageComponent::of(cell.policy()) else {
            return Ok(None);
        };
        self.saver.discard(cell.medium())?;
        self.cells.remove(label);
        Ok(Some(component))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellHandle)> {
        self.cells.iter().map(|(label, cell)| (label.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 所有已挂载单元的待机能耗之和
    pub fn idle_drain(&self) -> f64 {
        self.cells.values().map(CellHandle::idle_upkeep_cost).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspect::tests::sample_registry;
    use crate::storage::MemoryStore;

    fn drive() -> (CellDrive, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (CellDrive::new(store.clone(), store.clone()), store)
    }

    const FINITE: CapacityPolicy = CapacityPolicy::Finite {
        total_bytes: 64,
        total_types: 2,
        idle_drain: 0.5,
    };

    #[test]
    fn mount_rehydrates_saved_media() {
        let registry = Arc::new(sample_registry());
        let aer = registry.resolve("aer").unwrap();
        let (mut first, store) = drive();
        first.mount("slot-1", registry.clone(), FINITE).unwrap();
        first.get_mut("slot-1").unwrap().insert(aer, 12).unwrap();

        let mut second = CellDrive::new(store.clone(), store);
        // 已有快照时忽略传入的规则
        let cell = second
            .mount("slot-1", registry, CapacityPolicy::Infinite { idle_drain: 0.0 })
            .unwrap();
        assert_eq!(cell.quantity_of(aer).unwrap(), 12);
        assert_eq!(*cell.policy(), FINITE);
    }

    #[test]
    fn detach_requires_empty_finite_cell() {
        let registry = Arc::new(sample_registry());
        let aer = registry.resolve("aer").unwrap();
        let (mut drive, store) = drive();
        drive.mount("a", registry.clone(), FINITE).unwrap();
        drive
            .mount("c", registry, CapacityPolicy::Infinite { idle_drain: 0.0 })
            .unwrap();

        drive.get_mut("a").unwrap().insert(aer, 1).unwrap();
        assert_eq!(drive.detach("a").unwrap(), None);
        drive.get_mut("a").unwrap().extract(aer, 1).unwrap();
        assert_eq!(
            drive.detach("a").unwrap(),
            Some(StorageComponent {
                total_bytes: 64,
                total_types: 2,
            })
        );
        assert_eq!(drive.status("a"), CellStatus::Missing);
        assert!(store.get(MediumId::from_label("a")).is_none());

        assert_eq!(drive.detach("c").unwrap(), None);
        assert_eq!(drive.detach("nope").unwrap(), None);
        assert_eq!(drive.len(), 1);
    }

    #[test]
    fn idle_drain_sums_mounted_cells() {
        let registry = Arc::new(sample_registry());
        let (mut drive, _) = drive();
        drive.mount("a", registry.clone(), FINITE).unwrap();
        drive.mount("b", registry, FINITE).unwrap();
        assert_eq!(drive.idle_drain(), 1.0);
    }
}
