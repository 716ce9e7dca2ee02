//! Per-tenant directory of named key-value databases.
//!
//! Layout on disk: `<data_dir>/<tenant>/<database>/data.sqlite`. The tenant
//! component always comes from the authenticated request context.

use crate::db::connection::{close_pool, create_pool, DbPool};
use crate::db::migrate::migrate;
use crate::error::StoreError;
use crate::models::entry;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const DB_FILE: &str = "data.sqlite";

pub struct TenantStore {
    data_dir: PathBuf,
    pool_size: u32,
    pools: DashMap<PathBuf, DbPool>,
}

/// One open tenant database. Cheap to clone; all clones share the pool.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    tenant: String,
    name: String,
}

/// Reject anything that is not a single plain path component.
pub fn validate_name(kind: &str, name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::MalformedInput(format!("invalid {kind} name: {name:?}")));
    }
    Ok(())
}

impl TenantStore {
    pub fn new(data_dir: impl Into<PathBuf>, pool_size: u32) -> Self {
        Self {
            data_dir: data_dir.into(),
            pool_size,
            pools: DashMap::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn tenant_dir(&self, tenant: &str) -> Result<PathBuf, StoreError> {
        validate_name("tenant", tenant)?;
        Ok(self.data_dir.join(tenant))
    }

    fn database_dir(&self, tenant: &str, name: &str) -> Result<PathBuf, StoreError> {
        validate_name("database", name)?;
        Ok(self.tenant_dir(tenant)?.join(name))
    }

    /// Create the tenant's namespace directory if it does not exist yet.
    pub fn ensure_tenant(&self, tenant: &str) -> Result<PathBuf, StoreError> {
        let dir = self.tenant_dir(tenant)?;
        if !dir.is_dir() {
            tracing::info!(tenant = %tenant, "Creating namespace directory {}", dir.display());
            fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    pub fn list_databases(&self, tenant: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.ensure_tenant(tenant)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn database_exists(&self, tenant: &str, name: &str) -> Result<bool, StoreError> {
        validate_name("database", name)?;
        Ok(self.list_databases(tenant)?.iter().any(|n| n == name))
    }

    /// Idempotent: an existing database is left untouched.
    pub fn create_database(&self, tenant: &str, name: &str) -> Result<(), StoreError> {
        let dir = self.database_dir(tenant, name)?;
        fs::create_dir_all(&dir)?;
        self.pool_for(dir.join(DB_FILE))?;
        tracing::info!(tenant = %tenant, database = %name, "Database ready in {}", dir.display());
        Ok(())
    }

    /// The pool entry stays locked until the files are gone, so a concurrent
    /// `open` cannot cache a pool for a file that is being unlinked.
    pub fn delete_database(&self, tenant: &str, name: &str) -> Result<(), StoreError> {
        let dir = self.database_dir(tenant, name)?;
        let entry = self.pools.entry(dir.join(DB_FILE));
        if !dir.is_dir() {
            return Err(StoreError::NotFound(format!("database {name} not found")));
        }
        if let Entry::Occupied(pool) = &entry {
            close_pool(pool.get());
        }
        fs::remove_dir_all(&dir)?;
        if let Entry::Occupied(pool) = entry {
            pool.remove();
        }
        tracing::info!(tenant = %tenant, database = %name, "Database deleted");
        Ok(())
    }

    /// Open an existing database. Never creates one.
    pub fn open(&self, tenant: &str, name: &str) -> Result<Database, StoreError> {
        let dir = self.database_dir(tenant, name)?;
        if !dir.is_dir() {
            return Err(StoreError::NotFound(format!("database {name} not found")));
        }
        Ok(Database {
            pool: self.pool_for(dir.join(DB_FILE))?,
            tenant: tenant.to_string(),
            name: name.to_string(),
        })
    }

    /// Pools are created under the entry lock; a database directory removed
    /// in the meantime is reported as missing instead of being recreated.
    fn pool_for(&self, path: PathBuf) -> Result<DbPool, StoreError> {
        if let Some(pool) = self.pools.get(&path) {
            return Ok(pool.value().clone());
        }
        match self.pools.entry(path) {
            Entry::Occupied(pool) => Ok(pool.get().clone()),
            Entry::Vacant(slot) => {
                if !slot.key().parent().is_some_and(Path::is_dir) {
                    return Err(StoreError::NotFound(format!(
                        "database at {} not found",
                        slot.key().display()
                    )));
                }
                let pool = create_pool(slot.key(), self.pool_size)?;
                migrate(&pool)?;
                Ok(slot.insert(pool).value().clone())
            }
        }
    }

    pub fn close_all(&self) {
        for item in self.pools.iter() {
            close_pool(item.value());
        }
        self.pools.clear();
    }
}

impl Database {
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Result<Value, StoreError> {
        let conn = self.pool.get()?;
        entry::get(&conn, key)?.ok_or_else(|| StoreError::NotFound(format!("key {key} not found")))
    }

    pub fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        entry::set(&conn, key, value)
    }

    /// Returns whether the stored value changed.
    pub fn union_append(&self, key: &str, value: &Value) -> Result<bool, StoreError> {
        let mut conn = self.pool.get()?;
        entry::union_append(&mut conn, key, value)
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        if entry::delete(&conn, key)? {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("key {key} not found")))
        }
    }

    pub fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.pool.get()?;
        entry::list_keys(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (TenantStore, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        (TenantStore::new(tmp.path(), 2), tmp)
    }

    #[test]
    fn test_create_is_idempotent() {
        let (store, _tmp) = store();
        store.create_database("acme", "d").unwrap();
        store.open("acme", "d").unwrap().set("k", &json!(["x"])).unwrap();
        store.create_database("acme", "d").unwrap();

        assert_eq!(store.list_databases("acme").unwrap(), vec!["d"]);
        // Second create must not truncate existing content.
        assert_eq!(store.open("acme", "d").unwrap().get("k").unwrap(), json!(["x"]));
    }

    #[test]
    fn test_tenants_are_isolated() {
        let (store, _tmp) = store();
        store.create_database("acme", "d").unwrap();
        assert!(store.database_exists("acme", "d").unwrap());
        assert!(!store.database_exists("globex", "d").unwrap());
        assert!(matches!(store.open("globex", "d"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete_database() {
        let (store, tmp) = store();
        store.create_database("acme", "d").unwrap();
        store.delete_database("acme", "d").unwrap();
        assert!(!tmp.path().join("acme").join("d").exists());
        assert!(store.list_databases("acme").unwrap().is_empty());

        let err = store.delete_database("acme", "d").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_delete_racing_open_leaves_no_stale_pool() {
        let (store, tmp) = store();
        let store = std::sync::Arc::new(store);
        let file = tmp.path().join("acme").join("d").join(DB_FILE);

        for round in 0..20 {
            store.create_database("acme", "d").unwrap();
            let opener = {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        if let Ok(db) = store.open("acme", "d") {
                            let _ = db.set("k", &json!(round));
                        }
                    }
                })
            };
            store.delete_database("acme", "d").unwrap();
            opener.join().unwrap();

            assert!(!file.exists());
            assert!(!store.pools.contains_key(&file), "round {round} cached a pool");
            assert!(matches!(store.open("acme", "d"), Err(StoreError::NotFound(_))));
        }
    }

    #[test]
    fn test_missing_key_and_delete() {
        let (store, _tmp) = store();
        store.create_database("acme", "d").unwrap();
        let db = store.open("acme", "d").unwrap();
        db.set("a", &json!(1)).unwrap();

        assert!(matches!(db.get("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(db.delete("nope"), Err(StoreError::NotFound(_))));
        assert_eq!(db.list_keys().unwrap(), vec!["a"]);

        db.delete("a").unwrap();
        assert!(db.list_keys().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let (store, _tmp) = store();
        for name in ["", ".", "..", "a/b", "..\\x"] {
            assert!(matches!(
                store.create_database("acme", name),
                Err(StoreError::MalformedInput(_))
            ));
        }
    }
}
