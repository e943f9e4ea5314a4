use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::persist::SnapshotStore;

pub const DB_FILE: &str = "educa.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshots(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    Ok(conn)
}

/// Registry snapshots in the workspace database.
pub struct SqliteSnapshotStore {
    conn: Connection,
}

impl SqliteSnapshotStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        let conn = open_db(workspace)
            .with_context(|| format!("failed to open workspace {}", workspace.to_string_lossy()))?;
        Ok(SqliteSnapshotStore { conn })
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let v = self
            .conn
            .query_row("SELECT value FROM snapshots WHERE key = ?", [key], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(v)
    }

    fn save(&mut self, entries: &[(&str, String)]) -> anyhow::Result<()> {
        let now = chrono::Local::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        for (k, v) in entries {
            tx.execute(
                "INSERT INTO snapshots(key, value, updated_at) VALUES(?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                (k, v, &now),
            )
            .with_context(|| format!("failed to write snapshot {k}"))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove(&mut self, keys: &[&str]) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        for k in keys {
            tx.execute("DELETE FROM snapshots WHERE key = ?", [k])?;
        }
        tx.commit()?;
        Ok(())
    }
}
