//! SQLite operations on the `invitations` table, and the compound
//! accept-invitation transaction.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::close_people::add_close_person;
use crate::database::{format_timestamp, timestamp_column};
use crate::error::{Result, StoreError};
use crate::models::{AcceptOutcome, Invitation, InvitationAcceptance, NewClosePerson};
use crate::users::{ensure_user, user_exists};

/// Record the ordered pair unless it already exists. Returns `true` if a
/// row was inserted.
///
/// Uniqueness is enforced by `idx_invitations_pair`; a conflicting insert
/// is the idempotent success case.
pub fn record_invitation_if_absent(conn: &Connection, inviter_id: &str, invited_id: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO invitations (inviter_id, invited_id, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (inviter_id, invited_id) DO NOTHING",
        params![inviter_id, invited_id, format_timestamp(Utc::now())],
    )?;
    Ok(inserted > 0)
}

pub fn check_invitation(conn: &Connection, inviter_id: &str, invited_id: &str) -> Result<Option<Invitation>> {
    let invitation = conn
        .query_row(
            "SELECT id, inviter_id, invited_id, created_at
             FROM invitations
             WHERE inviter_id = ?1 AND invited_id = ?2",
            params![inviter_id, invited_id],
            |row| {
                Ok(Invitation {
                    id: row.get(0)?,
                    inviter_id: row.get(1)?,
                    invited_id: row.get(2)?,
                    created_at: timestamp_column(row, 3)?,
                })
            },
        )
        .optional()?;
    Ok(invitation)
}

/// Register the invited user, record the invitation, and add the invited
/// user to the inviter's close people, all in one transaction.
///
/// The close-person entry is only created when the invitation is new, so
/// accepting the same link twice changes nothing.
pub fn accept_invitation(conn: &mut Connection, acceptance: &InvitationAcceptance) -> Result<AcceptOutcome> {
    let tx = conn.transaction()?;

    ensure_user(&tx, &acceptance.invited)?;

    if !user_exists(&tx, &acceptance.inviter_id)? {
        return Err(StoreError::UnknownUser(acceptance.inviter_id.clone()));
    }

    let invited_id = &acceptance.invited.user_id;
    let invitation_created = record_invitation_if_absent(&tx, &acceptance.inviter_id, invited_id)?;

    let close_person_id = if invitation_created {
        let contact = NewClosePerson::named(acceptance.contact_name.clone()).linked_to(invited_id.clone());
        Some(add_close_person(&tx, &acceptance.inviter_id, &contact)?)
    } else {
        None
    };

    tx.commit()?;

    Ok(AcceptOutcome {
        invitation_created,
        close_person_id,
    })
}
