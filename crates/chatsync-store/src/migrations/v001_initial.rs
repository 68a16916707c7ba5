//! v001: named cache slots.

use rusqlite::Connection;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cache_slots (
            name       TEXT PRIMARY KEY NOT NULL,
            payload    TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )
}
