use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use bevy::log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CellError, CellSnapshot};

/// 宿主存储介质（物品实例 / 槽位）的身份
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MediumId(pub Uuid);

impl MediumId {
    /// 固定 namespace + 标签生成 v5 UUID，同一标签总是得到同一身份
    pub fn from_label(label: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, label.as_bytes()))
    }
}

impl fmt::Display for MediumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 入站：把介质映射到它的快照
pub trait CellResolver: Send + Sync {
    fn resolve(&self, medium: MediumId) -> Result<Option<CellSnapshot>, CellError>;
}

/// 入站：每次变更后请求宿主保存
pub trait SaveProvider: Send + Sync {
    fn save(&self, medium: MediumId, snapshot: &CellSnapshot) -> Result<(), CellError>;

    /// 介质被移除时调用
    fn discard(&self, _medium: MediumId) -> Result<(), CellError> {
        Ok(())
    }
}

/// 进程内快照表
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<MediumId, CellSnapshot>>,
}

impl MemoryStore {
    pub fn get(&self, medium: MediumId) -> Option<CellSnapshot> {
        self.snapshots.lock().ok()?.get(&medium).cloned()
    }
}

impl CellResolver for MemoryStore {
    fn resolve(&self, medium: MediumId) -> Result<Option<CellSnapshot>, CellError> {
        let snapshots = self.snapshots.lock().map_err(CellError::unavailable)?;
        Ok(snapshots.get(&medium).cloned())
    }
}

impl SaveProvider for MemoryStore {
    fn save(&self, medium: MediumId, snapshot: &CellSnapshot) -> Result<(), CellError> {
        let mut snapshots = self.snapshots.lock().map_err(CellError::unavailable)?;
        snapshots.insert(medium, snapshot.clone());
        Ok(())
    }

    fn discard(&self, medium: MediumId) -> Result<(), CellError> {
        let mut snapshots = self.snapshots.lock().map_err(CellError::unavailable)?;
        snapshots.remove(&medium);
        Ok(())
    }
}

/// 每个介质一个 JSON 文件：`<dir>/<uuid>.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, medium: MediumId) -> PathBuf {
        self.dir.join(format!("{medium}.json"))
    }
}

impl CellResolver for JsonFileStore {
    fn resolve(&self, medium: MediumId) -> Result<Option<CellSnapshot>, CellError> {
        let path = self.path_for(medium);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CellError::unavailable(format!("{}: {e}", path.display()))),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| CellError::unavailable(format!("{}: {e}", path.display())))
    }
}

impl SaveProvider for JsonFileStore {
    fn save(&self, medium: MediumId, snapshot: &CellSnapshot) -> Result<(), CellError> {
        let path = self.path_for(medium);
        let json = serde_json::to_string_pretty(snapshot).map_err(CellError::unavailable)?;

        // 先写临时文件再改名，失败时旧快照保持完整
        let tmp = path.with_extension("json.tmp");
        fs::create_dir_all(&self.dir)
            .and_then(|()| fs::write(&tmp, json))
            .and_then(|()| fs::rename(&tmp, &path))
            .map_err(|e| CellError::unavailable(format!("{}: {e}", path.display())))?;

        debug!("saved cell snapshot {}", path.display());
        Ok(())
    }

    fn discard(&self, medium: MediumId) -> Result<(), CellError> {
        match fs::remove_file(self.path_for(medium)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CellError::unavailable(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EntrySnapshot, PolicySnapshot};

    fn snapshot(amount: u64) -> CellSnapshot {
        CellSnapshot {
            policy: PolicySnapshot::Finite {
                total_bytes: 64,
                total_types: 2,
                idle_drain: 0.5,
            },
            partition: vec!["aer".into()],
            entries: vec![EntrySnapshot {
                kind: "aer".into(),
                amount,
            }],
        }
    }

    #[test]
    fn medium_ids_are_stable_per_label() {
        assert_eq!(MediumId::from_label("drive-1"), MediumId::from_label("drive-1"));
        assert_ne!(MediumId::from_label("drive-1"), MediumId::from_label("drive-2"));
    }

    #[test]
    fn memory_store_round_trip_and_discard() {
        let store = MemoryStore::default();
        let medium = MediumId::from_label("a");
        assert_eq!(store.resolve(medium).unwrap(), None);
        store.save(medium, &snapshot(3)).unwrap();
        assert_eq!(store.resolve(medium).unwrap(), Some(snapshot(3)));
        store.discard(medium).unwrap();
        assert!(store.get(medium).is_none());
    }

    #[test]
    fn json_store_overwrites_and_discards() {
        let dir = std::env::temp_dir().join(format!(
            "essentia-cell-test-{}",
            MediumId::from_label(&format!("{:?}", std::thread::current().id()))
        ));
        let store = JsonFileStore::new(&dir);
        let medium = MediumId::from_label("json");

        assert_eq!(store.resolve(medium).unwrap(), None);
        store.save(medium, &snapshot(1)).unwrap();
        store.save(medium, &snapshot(7)).unwrap();
        assert_eq!(store.resolve(medium).unwrap(), Some(snapshot(7)));

        store.discard(medium).unwrap();
        store.discard(medium).unwrap();
        assert_eq!(store.resolve(medium).unwrap(), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_json_is_unavailable() {
        let dir = std::env::temp_dir().join(format!(
            "essentia-cell-corrupt-{}",
            MediumId::from_label(&format!("{:?}", std::thread::current().id()))
        ));
        fs::create_dir_all(&dir).unwrap();
        let store = JsonFileStore::new(&dir);
        let medium = MediumId::from_label("broken");
        fs::write(dir.join(format!("{medium}.json")), "{not json").unwrap();

        assert!(matches!(store.resolve(medium), Err(CellError::Unavailable(_))));
        let _ = fs::remove_dir_all(&dir);
    }
}
