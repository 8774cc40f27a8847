//! Networked PostgreSQL backend.
//!
//! Same tables and semantics as the SQLite [`Database`](crate::Database):
//! the schema is created idempotently on connect, including the unique
//! `(inviter_id, invited_id)` constraint.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use postgres::types::ToSql;
use postgres::{Client, GenericClient, NoTls, Row};

use crate::error::{Result, StoreError};
use crate::models::{
    AcceptOutcome, ClosePerson, ClosePersonUpdate, Invitation, InvitationAcceptance,
    NewClosePerson, NewUser, User,
};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id    TEXT PRIMARY KEY,
    username   TEXT,
    first_name TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS close_people (
    id         BIGSERIAL PRIMARY KEY,
    owner_id   TEXT NOT NULL REFERENCES users(user_id),
    person_id  TEXT,
    name       TEXT NOT NULL,
    gender     TEXT,
    birthdate  TEXT,
    interests  TEXT,
    age        INTEGER,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_close_people_owner_created
    ON close_people(owner_id, created_at DESC);

CREATE TABLE IF NOT EXISTS invitations (
    id         BIGSERIAL PRIMARY KEY,
    inviter_id TEXT NOT NULL REFERENCES users(user_id),
    invited_id TEXT NOT NULL REFERENCES users(user_id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT invitations_pair_unique UNIQUE (inviter_id, invited_id)
);
"#;

const CLOSE_PERSON_COLUMNS: &str =
    "id, owner_id, person_id, name, gender, birthdate, interests, age, created_at";

/// PostgreSQL-backed store holding one client connection.
pub struct PgStore {
    client: Mutex<Client>,
}

impl PgStore {
    /// Connect to `database_url` and create the schema if missing.
    pub fn connect(database_url: &str) -> Result<Self> {
        let mut client = Client::connect(database_url, NoTls)?;

        tracing::info!("connected to postgres, ensuring schema");
        client.batch_execute(SCHEMA_SQL)?;

        Ok(Self {
            client: Mutex::new(client),
        })
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Client>> {
        self.client.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub fn ensure_user<C: GenericClient>(client: &mut C, user: &NewUser) -> Result<bool> {
    let inserted = client.execute(
        "INSERT INTO users (user_id, username, first_name, created_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (user_id) DO NOTHING",
        &[&user.user_id, &user.username, &user.first_name, &Utc::now()],
    )?;
    Ok(inserted > 0)
}

pub fn get_user<C: GenericClient>(client: &mut C, user_id: &str) -> Result<Option<User>> {
    let row = client.query_opt(
        "SELECT user_id, username, first_name, created_at FROM users WHERE user_id = $1",
        &[&user_id],
    )?;
    Ok(row.map(|row| User {
        user_id: row.get(0),
        username: row.get(1),
        first_name: row.get(2),
        created_at: row.get(3),
    }))
}

fn user_exists<C: GenericClient>(client: &mut C, user_id: &str) -> Result<bool> {
    let row = client.query_opt("SELECT 1 FROM users WHERE user_id = $1", &[&user_id])?;
    Ok(row.is_some())
}

// ---------------------------------------------------------------------------
// Close people
// ---------------------------------------------------------------------------

pub fn add_close_person<C: GenericClient>(
    client: &mut C,
    owner_id: &str,
    person: &NewClosePerson,
) -> Result<i64> {
    if !user_exists(client, owner_id)? {
        return Err(StoreError::UnknownUser(owner_id.to_string()));
    }

    let row = client.query_one(
        "INSERT INTO close_people
             (owner_id, person_id, name, gender, birthdate, interests, age, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id",
        &[
            &owner_id,
            &person.person_id,
            &person.name,
            &person.gender,
            &person.birthdate,
            &person.interests,
            &person.age,
            &Utc::now(),
        ],
    )?;
    Ok(row.get(0))
}

pub fn get_close_person<C: GenericClient>(client: &mut C, id: i64) -> Result<Option<ClosePerson>> {
    let sql = format!("SELECT {CLOSE_PERSON_COLUMNS} FROM close_people WHERE id = $1");
    let row = client.query_opt(sql.as_str(), &[&id])?;
    Ok(row.as_ref().map(row_to_close_person))
}

pub fn list_close_people<C: GenericClient>(client: &mut C, owner_id: &str) -> Result<Vec<ClosePerson>> {
    let sql = format!(
        "SELECT {CLOSE_PERSON_COLUMNS}
         FROM close_people
         WHERE owner_id = $1
         ORDER BY created_at DESC, id DESC"
    );
    let rows = client.query(sql.as_str(), &[&owner_id])?;
    Ok(rows.iter().map(row_to_close_person).collect())
}

pub fn update_close_person<C: GenericClient>(
    client: &mut C,
    owner_id: &str,
    id: i64,
    update: &ClosePersonUpdate,
) -> Result<bool> {
    if update.is_empty() {
        return Ok(false);
    }

    let owner_id = owner_id.to_string();
    let mut assignments = Vec::new();
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

    let text_columns = update.text_columns();
    for (column, value) in &text_columns {
        params.push(value);
        assignments.push(format!("{column} = ${}", params.len()));
    }
    if let Some(age) = &update.age {
        params.push(age);
        assignments.push(format!("age = ${}", params.len()));
    }

    params.push(&id);
    let id_idx = params.len();
    params.push(&owner_id);
    let owner_idx = params.len();

    let sql = format!(
        "UPDATE close_people SET {} WHERE id = ${id_idx} AND owner_id = ${owner_idx}",
        assignments.join(", ")
    );
    let affected = client.execute(sql.as_str(), &params)?;
    Ok(affected > 0)
}

pub fn delete_close_people<C: GenericClient>(client: &mut C, owner_id: &str, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let ids = ids.to_vec();
    let affected = client.execute(
        "DELETE FROM close_people WHERE owner_id = $1 AND id = ANY($2)",
        &[&owner_id, &ids],
    )?;
    Ok(affected as usize)
}

fn row_to_close_person(row: &Row) -> ClosePerson {
    ClosePerson {
        id: row.get(0),
        owner_id: row.get(1),
        person_id: row.get(2),
        name: row.get(3),
        gender: row.get(4),
        birthdate: row.get(5),
        interests: row.get(6),
        age: row.get(7),
        created_at: row.get(8),
    }
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

pub fn record_invitation_if_absent<C: GenericClient>(
    client: &mut C,
    inviter_id: &str,
    invited_id: &str,
) -> Result<bool> {
    let inserted = client.execute(
        "INSERT INTO invitations (inviter_id, invited_id, created_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (inviter_id, invited_id) DO NOTHING",
        &[&inviter_id, &invited_id, &Utc::now()],
    )?;
    Ok(inserted > 0)
}

pub fn check_invitation<C: GenericClient>(
    client: &mut C,
    inviter_id: &str,
    invited_id: &str,
) -> Result<Option<Invitation>> {
    let row = client.query_opt(
        "SELECT id, inviter_id, invited_id, created_at
         FROM invitations
         WHERE inviter_id = $1 AND invited_id = $2",
        &[&inviter_id, &invited_id],
    )?;
    Ok(row.map(|row| {
        let created_at: DateTime<Utc> = row.get(3);
        Invitation {
            id: row.get(0),
            inviter_id: row.get(1),
            invited_id: row.get(2),
            created_at,
        }
    }))
}

pub fn accept_invitation(client: &mut Client, acceptance: &InvitationAcceptance) -> Result<AcceptOutcome> {
    let mut tx = client.transaction()?;

    ensure_user(&mut tx, &acceptance.invited)?;

    if !user_exists(&mut tx, &acceptance.inviter_id)? {
        return Err(StoreError::UnknownUser(acceptance.inviter_id.clone()));
    }

    let invited_id = &acceptance.invited.user_id;
    let invitation_created = record_invitation_if_absent(&mut tx, &acceptance.inviter_id, invited_id)?;

    let close_person_id = if invitation_created {
        let contact = NewClosePerson::named(acceptance.contact_name.clone()).linked_to(invited_id.clone());
        Some(add_close_person(&mut tx, &acceptance.inviter_id, &contact)?)
    } else {
        None
    };

    tx.commit()?;

    Ok(AcceptOutcome {
        invitation_created,
        close_person_id,
    })
}
