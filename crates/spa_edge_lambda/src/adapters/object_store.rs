use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Static origin store keyed by asset path.
pub trait AssetStore {
    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), String>;

    /// Latest generation of `key`, or `None` when absent or deleted.
    fn get_object(&self, key: &str) -> Result<Option<StoredObject>, String>;

    fn list_keys(&self) -> Result<Vec<String>, String>;

    fn delete_object(&self, key: &str) -> Result<(), String>;
}

#[derive(Debug, Default)]
struct VersionedEntry {
    generations: Vec<StoredObject>,
    deleted: bool,
}

/// In-process versioned store. Every put appends a generation and a delete
/// only hides the key, so history is retained the way a versioned bucket
/// keeps it.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    entries: Mutex<BTreeMap<String, VersionedEntry>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation_count(&self, key: &str) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.get(key).map_or(0, |entry| entry.generations.len()))
            .unwrap_or(0)
    }
}

impl AssetStore for MemoryAssetStore {
    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), String> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "asset store lock poisoned".to_string())?;
        let entry = entries.entry(key.to_string()).or_default();
        entry.generations.push(StoredObject {
            body: body.to_vec(),
            content_type: content_type.to_string(),
        });
        entry.deleted = false;
        Ok(())
    }

    fn get_object(&self, key: &str) -> Result<Option<StoredObject>, String> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| "asset store lock poisoned".to_string())?;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.deleted)
            .and_then(|entry| entry.generations.last().cloned()))
    }

    fn list_keys(&self) -> Result<Vec<String>, String> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| "asset store lock poisoned".to_string())?;
        Ok(entries
            .iter()
            .filter(|(_, entry)| !entry.deleted)
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn delete_object(&self, key: &str) -> Result<(), String> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "asset store lock poisoned".to_string())?;
        if let Some(entry) = entries.get_mut(key) {
            entry.deleted = true;
        }
        Ok(())
    }
}
