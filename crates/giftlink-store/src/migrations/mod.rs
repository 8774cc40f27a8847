//! SQLite migration runner.
//!
//! Migrations are executed in order on every [`Database::open_at`] /
//! [`Database::open_in_memory`] call. Each migration is guarded by the
//! `user_version` pragma so it runs exactly once.
//!
//! [`Database::open_at`]: crate::Database::open_at
//! [`Database::open_in_memory`]: crate::Database::open_in_memory

pub mod v001_initial;
pub mod v002_invitation_pairs;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version. Bump this and add a new migration module whenever
/// the schema changes.
pub const CURRENT_VERSION: u32 = 2;

/// Run all pending migrations against the open connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );

    if current < 1 {
        tracing::info!("applying migration v001_initial");
        v001_initial::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    if current < 2 {
        tracing::info!("applying migration v002_invitation_pairs");
        v002_invitation_pairs::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 2)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrades_legacy_schema_with_duplicate_invitations() {
        let conn = Connection::open_in_memory().unwrap();
        // Tables as written by the check-then-insert era, user_version 0.
        conn.execute_batch(
            "CREATE TABLE users (user_id TEXT PRIMARY KEY, username TEXT, first_name TEXT,
                 created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP);
             CREATE TABLE invitations (id INTEGER PRIMARY KEY AUTOINCREMENT,
                 inviter_id TEXT NOT NULL, invited_id TEXT NOT NULL,
                 created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP);
             INSERT INTO invitations (inviter_id, invited_id) VALUES ('1', '2');
             INSERT INTO invitations (inviter_id, invited_id) VALUES ('1', '2');
             INSERT INTO invitations (inviter_id, invited_id) VALUES ('2', '1');",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM invitations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let dup = conn.execute(
            "INSERT INTO invitations (inviter_id, invited_id) VALUES ('1', '2')",
            [],
        );
        assert!(dup.is_err());

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn rerun_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
    }
}
