//! v002 -- One invitation per ordered pair.
//!
//! Collapses duplicate `(inviter_id, invited_id)` rows left by concurrent
//! check-then-insert writers, keeping the oldest, then enforces the pair
//! with a unique index.

use rusqlite::Connection;

const UP_SQL: &str = r#"
DELETE FROM invitations
 WHERE id NOT IN (
     SELECT MIN(id) FROM invitations GROUP BY inviter_id, invited_id
 );

CREATE UNIQUE INDEX IF NOT EXISTS idx_invitations_pair
    ON invitations(inviter_id, invited_id);

CREATE INDEX IF NOT EXISTS idx_close_people_owner_created
    ON close_people(owner_id, created_at DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
