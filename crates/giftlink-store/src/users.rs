//! SQLite operations on the `users` table.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::{format_timestamp, timestamp_column};
use crate::error::Result;
use crate::models::{NewUser, User};

/// Insert `user` unless a row with the same id exists. Returns `true` if a
/// row was inserted. Existing rows are never refreshed.
pub fn ensure_user(conn: &Connection, user: &NewUser) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (user_id, username, first_name, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            user.user_id,
            user.username,
            user.first_name,
            format_timestamp(Utc::now()),
        ],
    )?;
    Ok(inserted > 0)
}

/// Fetch a user by platform identity.
pub fn get_user(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT user_id, username, first_name, created_at
             FROM users
             WHERE user_id = ?1",
            params![user_id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn user_exists(conn: &Connection, user_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn ensure_user_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock().unwrap();

        let mut user = NewUser::new("100");
        user.first_name = Some("Ann".into());
        assert!(ensure_user(&conn, &user).unwrap());

        user.first_name = Some("Renamed".into());
        assert!(!ensure_user(&conn, &user).unwrap());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let stored = get_user(&conn, "100").unwrap().unwrap();
        assert_eq!(stored.first_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn missing_user_is_none() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock().unwrap();
        assert!(get_user(&conn, "nope").unwrap().is_none());
        assert!(!user_exists(&conn, "nope").unwrap());
    }
}
