use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY,
            room_id     INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            payload     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON messages(room_id, id);

        CREATE INDEX IF NOT EXISTS idx_messages_created
            ON messages(created_at);

        CREATE TABLE IF NOT EXISTS rooms (
            id          INTEGER PRIMARY KEY,
            payload     TEXT NOT NULL,
            cached_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS settings (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS assets (
            url           TEXT PRIMARY KEY,
            content_type  TEXT,
            body          BLOB NOT NULL,
            fetched_at    TEXT NOT NULL
        );
        ",
    )?;

    info!("Cache migrations complete");
    Ok(())
}
