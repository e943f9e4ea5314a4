//! Key-value snapshot persistence for the registry. Values are JSON text.

use std::collections::HashMap;

pub const KEY_SCHOOLS: &str = "educa_schools";
pub const KEY_STUDENTS: &str = "educa_students";
pub const KEY_LAST_BACKUP: &str = "educa_last_backup";

pub const REGISTRY_KEYS: [&str; 3] = [KEY_SCHOOLS, KEY_STUDENTS, KEY_LAST_BACKUP];

pub trait SnapshotStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Writes every pair or none of them.
    fn save(&mut self, entries: &[(&str, String)]) -> anyhow::Result<()>;
    fn remove(&mut self, keys: &[&str]) -> anyhow::Result<()>;
}

/// Process-local store. Used by tests and when no workspace is selected.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: HashMap<String, String>,
    read_only: bool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail.
    pub fn read_only() -> Self {
        MemorySnapshotStore {
            entries: HashMap::new(),
            read_only: true,
        }
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if self.read_only {
            anyhow::bail!("snapshot store is read-only");
        }
        Ok(())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, entries: &[(&str, String)]) -> anyhow::Result<()> {
        self.check_writable()?;
        for (k, v) in entries {
            self.entries.insert(k.to_string(), v.clone());
        }
        Ok(())
    }

    fn remove(&mut self, keys: &[&str]) -> anyhow::Result<()> {
        self.check_writable()?;
        for k in keys {
            self.entries.remove(*k);
        }
        Ok(())
    }
}
