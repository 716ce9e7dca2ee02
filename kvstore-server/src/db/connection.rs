use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Open (creating if absent) the SQLite file backing one tenant database.
pub fn create_pool(db_path: &Path, max_size: u32) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode = DELETE;
             PRAGMA synchronous = FULL;",
        )
    });

    Pool::builder()
        .max_size(max_size.max(1))
        .min_idle(Some(0))
        .build(manager)
}

pub fn close_pool(pool: &DbPool) {
    // r2d2 closes connections when the last pool clone is dropped.
    if let Ok(conn) = pool.get() {
        let _ = conn.execute_batch("PRAGMA optimize");
    }
}
