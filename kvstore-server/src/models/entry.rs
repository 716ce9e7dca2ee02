use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;

pub fn get(conn: &Connection, key: &str) -> Result<Option<Value>, StoreError> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM entries WHERE key = ?", params![key], |row| row.get(0))
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// Overwrite: replaces whatever is stored under `key`.
pub fn set(conn: &Connection, key: &str, value: &Value) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO entries (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![key, serde_json::to_string(value)?],
    )?;
    Ok(())
}

/// Union-append as the store implements it: the submitted array replaces the
/// stored value only when the two differ. The caller computes the merge.
///
/// Returns `true` if a write happened.
pub fn union_append(conn: &mut Connection, key: &str, value: &Value) -> Result<bool, StoreError> {
    if !value.is_array() {
        return Err(StoreError::MalformedInput(
            "union-append value must be a list".into(),
        ));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = get(&tx, key)?;
    let written = match current {
        Some(ref stored) if stored == value => false,
        _ => {
            set(&tx, key, value)?;
            true
        }
    };
    tx.commit()?;
    Ok(written)
}

pub fn delete(conn: &Connection, key: &str) -> Result<bool, StoreError> {
    let changes = conn.execute("DELETE FROM entries WHERE key = ?", params![key])?;
    Ok(changes > 0)
}

/// All keys in insertion order.
pub fn list_keys(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT key FROM entries ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut keys = Vec::new();
    for r in rows {
        keys.push(r?);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(crate::db::migrate::SCHEMA).unwrap();
        conn
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let conn = memory_conn();
        let value = json!({"basename": "host_daily_2017-01-01T00:00:00", "n": [1, 2]});
        set(&conn, "k", &value).unwrap();
        assert_eq!(get(&conn, "k").unwrap(), Some(value));

        set(&conn, "k", &json!("replaced")).unwrap();
        assert_eq!(get(&conn, "k").unwrap(), Some(json!("replaced")));
    }

    #[test]
    fn test_union_append_writes_only_when_different() {
        let mut conn = memory_conn();
        assert!(union_append(&mut conn, "k", &json!(["x"])).unwrap());
        assert!(!union_append(&mut conn, "k", &json!(["x"])).unwrap());
        assert!(union_append(&mut conn, "k", &json!(["x", "y"])).unwrap());
        // No merge happens in the store: the submitted list wins.
        assert!(union_append(&mut conn, "k", &json!(["z"])).unwrap());
        assert_eq!(get(&conn, "k").unwrap(), Some(json!(["z"])));
    }

    #[test]
    fn test_union_append_rejects_non_list() {
        let mut conn = memory_conn();
        let err = union_append(&mut conn, "k", &json!("x")).unwrap_err();
        assert!(matches!(err, StoreError::MalformedInput(_)));
        assert_eq!(get(&conn, "k").unwrap(), None);
    }

    #[test]
    fn test_keys_keep_insertion_order() {
        let conn = memory_conn();
        for k in ["b", "a", "c"] {
            set(&conn, k, &json!(1)).unwrap();
        }
        assert_eq!(list_keys(&conn).unwrap(), vec!["b", "a", "c"]);
        assert!(delete(&conn, "a").unwrap());
        assert!(!delete(&conn, "a").unwrap());
        assert_eq!(list_keys(&conn).unwrap(), vec!["b", "c"]);
    }
}
