//! Profile persistence.

use crate::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use zgate_types::Profile;

/// Key-value store of profiles, keyed by identity. Last write wins.
pub trait ProfileStore: Send + Sync {
    fn get(&self, identity: &str) -> Result<Option<Profile>>;

    fn put(&self, identity: &str, profile: &Profile) -> Result<()>;

    /// Load a profile, creating and storing an empty one if absent.
    /// The flag is true when the profile was just created.
    fn get_or_create(&self, identity: &str) -> Result<(Profile, bool)> {
        if let Some(profile) = self.get(identity)? {
            return Ok((profile, false));
        }

        info!(target: "zgate::store", "Profile not found for {}, creating one", identity);
        let profile = Profile::new(identity);
        self.put(identity, &profile)?;
        Ok((profile, true))
    }
}

/// SQLite-backed profile store; each profile is one JSON document.
pub struct SqliteProfileStore {
    conn: Mutex<Connection>,
}

impl SqliteProfileStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        store.init_schema()?;
        debug!(target: "zgate::store", "Opened profile store at {:?}", path);
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                email TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProfileStore for SqliteProfileStore {
    fn get(&self, identity: &str) -> Result<Option<Profile>> {
        let data: Option<String> = self
            .conn()
            .query_row(
                "SELECT data FROM profiles WHERE email = ?1",
                params![identity],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put(&self, identity: &str, profile: &Profile) -> Result<()> {
        let data = serde_json::to_string(profile)?;
        self.conn().execute(
            r#"
            INSERT INTO profiles (email, data, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(email) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
            "#,
            params![identity, data, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zgate_types::{GameTitle, AUTOSAVE_LABEL};

    #[test]
    fn test_get_missing_profile() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        assert!(store.get("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_get_or_create() {
        let store = SqliteProfileStore::open_in_memory().unwrap();

        let (profile, created) = store.get_or_create("u1").unwrap();
        assert!(created);
        assert_eq!(profile, Profile::new("u1"));

        let (again, created) = store.get_or_create("u1").unwrap();
        assert!(!created);
        assert_eq!(again, profile);
    }

    #[test]
    fn test_put_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("profiles.db");
        let store = SqliteProfileStore::open(&path).unwrap();

        let mut profile = Profile::new("u1");
        store.put("u1", &profile).unwrap();

        profile.record_save(GameTitle::Zork2, AUTOSAVE_LABEL);
        profile.last_game = Some(GameTitle::Zork2);
        store.put("u1", &profile).unwrap();
        drop(store);

        let reopened = SqliteProfileStore::open(&path).unwrap();
        let loaded = reopened.get("u1").unwrap().unwrap();
        assert_eq!(loaded, profile);
    }
}
