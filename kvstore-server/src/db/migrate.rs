use crate::db::connection::DbPool;
use crate::error::StoreError;

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Create the entries table if the file is new. Safe to run on every open.
pub fn migrate(pool: &DbPool) -> Result<(), StoreError> {
    let conn = pool.get()?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
