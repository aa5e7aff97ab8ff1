use std::sync::{Arc, Mutex};

use super::{CapacityReport, CellError, CellHandle, CellStatus};
use crate::aspect::{AspectKind, AspectQuantity, DisplayOrder};

/// 多个观察者共享同一单元时使用：每次调用持有一次锁
#[derive(Debug, Clone)]
pub struct SharedCell(Arc<Mutex<CellHandle>>);

impl SharedCell {
    pub fn new(handle: CellHandle) -> Self {
        Self(Arc::new(Mutex::new(handle)))
    }

    pub fn with<R, F>(&self, f: F) -> Result<R, CellError>
    where
        F: FnOnce(&mut CellHandle) -> Result<R, CellError>,
    {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| CellError::unavailable("cell lock poisoned"))?;
        f(&mut guard)
    }

    pub fn insert(&self, kind: AspectKind, amount: u64) -> Result<u64, CellError> {
        self.with(|cell| cell.insert(kind, amount))
    }

    pub fn extract(&self, kind: AspectKind, amount: u64) -> Result<u64, CellError> {
        self.with(|cell| cell.extract(kind, amount))
    }

    pub fn status(&self) -> Result<CellStatus, CellError> {
        self.with(|cell| Ok(cell.status()))
    }

    pub fn report_capacity(&self) -> Result<CapacityReport, CellError> {
        self.with(|cell| Ok(cell.report_capacity()))
    }

    pub fn describe_contents(&self, order: DisplayOrder) -> Result<Vec<AspectQuantity>, CellError> {
        self.with(|cell| Ok(cell.describe_contents(order)))
    }
}
