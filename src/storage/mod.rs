//! 定容类型化存储单元：账本、分区、容量规则与对外句柄

mod error;
mod handle;
mod ledger;
mod partition;
mod persistence;
mod policy;
mod shared;
mod snapshot;

pub use error::CellError;
pub use handle::{CellHandle, CellStatus};
pub use ledger::{AspectLedger, LedgerBounds};
pub use partition::PartitionFilter;
pub use persistence::{CellResolver, JsonFileStore, MediumId, MemoryStore, SaveProvider};
pub use policy::{Capacity, CapacityPolicy, CapacityReport};
pub use shared::SharedCell;
pub use snapshot::{CellSnapshot, EntrySnapshot, PolicySnapshot};
