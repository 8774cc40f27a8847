//! SQLite operations on the `close_people` table.

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::database::{format_timestamp, timestamp_column};
use crate::error::{Result, StoreError};
use crate::models::{ClosePerson, ClosePersonUpdate, NewClosePerson};
use crate::users::user_exists;

const SELECT_COLUMNS: &str =
    "id, owner_id, person_id, name, gender, birthdate, interests, age, created_at";

/// Insert a close person for `owner_id` and return the new row id.
pub fn add_close_person(conn: &Connection, owner_id: &str, person: &NewClosePerson) -> Result<i64> {
    if !user_exists(conn, owner_id)? {
        return Err(StoreError::UnknownUser(owner_id.to_string()));
    }

    conn.execute(
        "INSERT INTO close_people
             (owner_id, person_id, name, gender, birthdate, interests, age, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            owner_id,
            person.person_id,
            person.name,
            person.gender,
            person.birthdate,
            person.interests,
            person.age,
            format_timestamp(Utc::now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_close_person(conn: &Connection, id: i64) -> Result<Option<ClosePerson>> {
    let person = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM close_people WHERE id = ?1"),
            params![id],
            row_to_close_person,
        )
        .optional()?;
    Ok(person)
}

/// All close people of `owner_id`, most recently added first.
pub fn list_close_people(conn: &Connection, owner_id: &str) -> Result<Vec<ClosePerson>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS}
         FROM close_people
         WHERE owner_id = ?1
         ORDER BY created_at DESC, id DESC"
    ))?;

    let rows = stmt.query_map(params![owner_id], row_to_close_person)?;

    let mut people = Vec::new();
    for row in rows {
        people.push(row?);
    }
    Ok(people)
}

/// Apply the fields present in `update` to the row `id` owned by
/// `owner_id`. Returns `true` if a row was changed.
pub fn update_close_person(
    conn: &Connection,
    owner_id: &str,
    id: i64,
    update: &ClosePersonUpdate,
) -> Result<bool> {
    if update.is_empty() {
        return Ok(false);
    }

    let mut assignments = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    for (column, value) in update.text_columns() {
        values.push(Value::Text(value.to_string()));
        assignments.push(format!("{column} = ?{}", values.len()));
    }
    if let Some(age) = update.age {
        values.push(Value::Integer(age.into()));
        assignments.push(format!("age = ?{}", values.len()));
    }

    values.push(Value::Integer(id));
    let id_idx = values.len();
    values.push(Value::Text(owner_id.to_string()));
    let owner_idx = values.len();

    let sql = format!(
        "UPDATE close_people SET {} WHERE id = ?{id_idx} AND owner_id = ?{owner_idx}",
        assignments.join(", ")
    );
    let affected = conn.execute(&sql, params_from_iter(values))?;
    Ok(affected > 0)
}

/// Delete the rows in `ids` owned by `owner_id`. Unknown ids are ignored.
/// Returns the number of rows deleted.
pub fn delete_close_people(conn: &Connection, owner_id: &str, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders = (0..ids.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("DELETE FROM close_people WHERE owner_id = ?1 AND id IN ({placeholders})");

    let mut values: Vec<Value> = Vec::with_capacity(ids.len() + 1);
    values.push(Value::Text(owner_id.to_string()));
    values.extend(ids.iter().map(|id| Value::Integer(*id)));

    let affected = conn.execute(&sql, params_from_iter(values))?;
    Ok(affected)
}

fn row_to_close_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClosePerson> {
    Ok(ClosePerson {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        person_id: row.get(2)?,
        name: row.get(3)?,
        gender: row.get(4)?,
        birthdate: row.get(5)?,
        interests: row.get(6)?,
        age: row.get(7)?,
        created_at: timestamp_column(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::users::ensure_user;
    use crate::Database;

    fn db_with_owner(owner: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        ensure_user(&db.lock().unwrap(), &NewUser::new(owner)).unwrap();
        db
    }

    #[test]
    fn add_and_read_back() {
        let db = db_with_owner("1");
        let conn = db.lock().unwrap();

        let mut person = NewClosePerson::named("Alice");
        person.age = Some(30);
        person.interests = Some("climbing, tea".into());
        let id = add_close_person(&conn, "1", &person).unwrap();

        let stored = get_close_person(&conn, id).unwrap().unwrap();
        assert_eq!(stored.owner_id, "1");
        assert_eq!(stored.name, "Alice");
        assert_eq!(stored.gender.as_deref(), Some(""));
        assert_eq!(stored.person_id, None);
        assert_eq!(stored.age, Some(30));
        assert_eq!(stored.interests.as_deref(), Some("climbing, tea"));
    }

    #[test]
    fn add_for_unknown_owner_fails() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock().unwrap();
        let err = add_close_person(&conn, "ghost", &NewClosePerson::named("X")).unwrap_err();
        assert!(matches!(err, StoreError::UnknownUser(id) if id == "ghost"));
    }

    #[test]
    fn list_is_newest_first() {
        let db = db_with_owner("1");
        let conn = db.lock().unwrap();

        let p1 = add_close_person(&conn, "1", &NewClosePerson::named("P1")).unwrap();
        let p2 = add_close_person(&conn, "1", &NewClosePerson::named("P2")).unwrap();

        let ids: Vec<i64> = list_close_people(&conn, "1")
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![p2, p1]);
        assert!(list_close_people(&conn, "someone-else").unwrap().is_empty());
    }

    #[test]
    fn update_leaves_absent_fields() {
        let db = db_with_owner("1");
        let conn = db.lock().unwrap();

        let mut person = NewClosePerson::named("Alice");
        person.age = Some(30);
        person.gender = Some("f".into());
        let id = add_close_person(&conn, "1", &person).unwrap();

        let update = ClosePersonUpdate {
            age: Some(31),
            ..Default::default()
        };
        assert!(update_close_person(&conn, "1", id, &update).unwrap());

        let stored = get_close_person(&conn, id).unwrap().unwrap();
        assert_eq!(stored.name, "Alice");
        assert_eq!(stored.gender.as_deref(), Some("f"));
        assert_eq!(stored.age, Some(31));

        // Present but empty overwrites.
        let update = ClosePersonUpdate {
            gender: Some(String::new()),
            ..Default::default()
        };
        assert!(update_close_person(&conn, "1", id, &update).unwrap());
        let stored = get_close_person(&conn, id).unwrap().unwrap();
        assert_eq!(stored.gender.as_deref(), Some(""));
    }

    #[test]
    fn update_is_scoped_to_owner() {
        let db = db_with_owner("1");
        let conn = db.lock().unwrap();
        let id = add_close_person(&conn, "1", &NewClosePerson::named("Alice")).unwrap();

        let update = ClosePersonUpdate {
            name: Some("Mallory".into()),
            ..Default::default()
        };
        assert!(!update_close_person(&conn, "2", id, &update).unwrap());
        assert!(!update_close_person(&conn, "1", id + 100, &update).unwrap());
        assert!(!update_close_person(&conn, "1", id, &ClosePersonUpdate::default()).unwrap());

        let stored = get_close_person(&conn, id).unwrap().unwrap();
        assert_eq!(stored.name, "Alice");
    }

    #[test]
    fn delete_ignores_unknown_and_foreign_ids() {
        let db = db_with_owner("1");
        ensure_user(&db.lock().unwrap(), &NewUser::new("2")).unwrap();
        let conn = db.lock().unwrap();

        let a = add_close_person(&conn, "1", &NewClosePerson::named("A")).unwrap();
        let b = add_close_person(&conn, "1", &NewClosePerson::named("B")).unwrap();
        let theirs = add_close_person(&conn, "2", &NewClosePerson::named("C")).unwrap();

        let deleted = delete_close_people(&conn, "1", &[a, 9999, theirs]).unwrap();
        assert_eq!(deleted, 1);

        let left: Vec<i64> = list_close_people(&conn, "1")
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(left, vec![b]);
        assert!(get_close_person(&conn, theirs).unwrap().is_some());
        assert_eq!(delete_close_people(&conn, "1", &[]).unwrap(), 0);
    }
}
