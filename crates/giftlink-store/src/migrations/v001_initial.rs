//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `users`, `close_people`, and
//! `invitations`. `IF NOT EXISTS` keeps databases created before schema
//! versioning intact.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    user_id    TEXT PRIMARY KEY,                      -- platform identity
    username   TEXT,
    first_name TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP    -- RFC-3339 when written by us
);

-- ----------------------------------------------------------------
-- Close people
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS close_people (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id   TEXT NOT NULL,                         -- FK -> users(user_id)
    person_id  TEXT,                                  -- set when a registered user
    name       TEXT NOT NULL,
    gender     TEXT,
    birthdate  TEXT,                                  -- free-form
    interests  TEXT,
    age        INTEGER,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,

    FOREIGN KEY (owner_id) REFERENCES users(user_id)
);

-- ----------------------------------------------------------------
-- Invitations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS invitations (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    inviter_id TEXT NOT NULL,                         -- FK -> users(user_id)
    invited_id TEXT NOT NULL,                         -- FK -> users(user_id)
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,

    FOREIGN KEY (inviter_id) REFERENCES users(user_id),
    FOREIGN KEY (invited_id) REFERENCES users(user_id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
